//! Dimension constraint validation.
//!
//! A [`ConstraintValidator`] narrows the legal values of a dataflow's
//! dimensions one selection at a time, asking the service's availability
//! endpoint through a shared [`ConstraintCache`].

pub mod cache;
pub mod time;
pub mod validator;

pub use cache::{ConstraintCache, ConstraintKey};
pub use time::check_time_range;
pub use validator::{CONSTRAINT_KEY_BUDGET, ConstraintValidator, ValidationState, split_values};
