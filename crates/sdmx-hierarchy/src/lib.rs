//! Presentation hierarchy parsing.
//!
//! A raw [`sdmx_model::Hierarchy`] is walked in pre-order into a
//! [`ParsedHierarchy`] arena. Every node gets a display order, a depth computed
//! from its parent chain, a cleaned label and, when its code maps onto a
//! dimension of the dataflow, a deterministic series id. Post-parse transforms
//! in [`transform`] then fix structural quirks of published trees.

pub mod labels;
pub mod parser;
pub mod resolver;
pub mod series;
pub mod transform;
pub mod tree;

pub use parser::{HierarchyParser, ParseOptions, parse_hierarchy};
pub use resolver::{CodeResolver, CodeText, RegistryResolver};
pub use series::SeriesIdScheme;
pub use transform::{PostPass, ReparentSiblings, SyntheticGroups, apply_post_passes, default_passes};
pub use tree::ParsedHierarchy;
