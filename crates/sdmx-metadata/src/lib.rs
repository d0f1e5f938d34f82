//! Metadata registry for SDMX dataflows.
//!
//! [`MetadataRegistry`] is built once per process from the service's structural
//! metadata and shared by reference with every component that needs it.
//! Codelists are fetched lazily into a [`CodelistCache`]; the codelist behind a
//! dimension is found by the candidate pipeline in [`resolve`].

pub mod cache;
pub mod conventions;
pub mod registry;
pub mod resolve;
pub mod search;

pub use cache::CodelistCache;
pub use registry::{MetadataRegistry, TableSummary};
pub use resolve::{ResolveContext, resolve_codelist};
pub use search::{SearchQuery, parse_search_query};
