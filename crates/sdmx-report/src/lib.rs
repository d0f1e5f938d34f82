//! Presentation of SDMX tables.
//!
//! - [`pivot`] turns matched rows into a [`DisplayMatrix`] with one column per
//!   period and one row per series and country, in hierarchy order.
//! - [`HierarchyContext`] shortens row titles by stripping what their displayed
//!   ancestors and siblings already say.
//! - [`units`] reads unit and scale text out of labels and formats it back.

pub mod context;
pub mod pivot;
pub mod units;

pub use context::{ContextEntry, HierarchyContext, Simplified};
pub use pivot::{DateWindow, DisplayMatrix, DisplayRow, RowKind, format_value, pivot, pivot_table};
pub use units::{
    UnitScale, format_unit_suffix, is_bop_suffix_only, is_qualifier, strip_title_suffix,
};
