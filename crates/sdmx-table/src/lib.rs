//! Presentation tables from SDMX data.
//!
//! [`TableBuilder::get_table`] runs one request end to end: the table is
//! resolved and parsed, its codes are grouped by dimension and narrowed to
//! what the service has, the observations are fetched and normalized, and
//! each observation is matched to a hierarchy node. Group nodes without data
//! of their own get header rows, and rows are returned in hierarchy order.

pub mod assemble;
pub mod builder;
pub mod matcher;
pub mod narrow;
pub mod normalize;
pub mod request;
pub mod select;
pub mod titles;

pub use assemble::{AssembledRows, RowAssembler};
pub use builder::TableBuilder;
pub use matcher::{MatchStage, NodeMatch, NodeMatcher};
pub use narrow::{FETCH_CODE_BUDGET, FetchPlan, Narrowing};
pub use normalize::Normalizer;
pub use request::{
    TableRef, TableRequest, describe_error, normalize_filters, parameter_name, resolve_table_ref,
};
pub use select::{DimensionCodes, NodeFilter, group_codes, select_nodes};
