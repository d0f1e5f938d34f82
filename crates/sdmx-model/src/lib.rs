//! Data model for the SDMX presentation engine.
//!
//! These types are shared by every other crate in the workspace:
//!
//! - [`Dataflow`], [`DataStructure`], [`Dimension`] and [`Attribute`] describe what
//!   can be queried.
//! - [`Codelist`] maps codes to labels and descriptions.
//! - [`Hierarchy`] is a raw presentation tree as published by the service, and
//!   [`IndicatorNode`] is one node of it after parsing.
//! - [`ObservationRow`] and [`MatchedRow`] carry fetched data before and after it has
//!   been reconciled against a hierarchy.
//! - [`EngineError`] is the typed error for fatal conditions, while [`Warnings`]
//!   collects recoverable ones.

pub mod codelist;
pub mod error;
pub mod hierarchy;
pub mod node;
pub mod observation;
pub mod period;
pub mod structure;
pub mod table;
pub mod urn;
pub mod warning;

pub use codelist::{Code, Codelist};
pub use error::{EngineError, ErrorKind, Result};
pub use hierarchy::{HierarchicalCode, Hierarchy};
pub use node::{IndicatorNode, NodeIndex};
pub use observation::ObservationRow;
pub use period::{Frequency, parse_date_bound, parse_period_end};
pub use structure::{Attribute, ConceptRef, DataStructure, Dataflow, Dimension};
pub use table::{MatchedRow, RowOrder, SeriesMetadata, TableMetadata, TableResult};
pub use urn::{CodeUrn, clean_node_ref};
pub use warning::{Warning, Warnings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn matched_row_serializes_order_and_dimensions() {
        let row = MatchedRow {
            order: RowOrder::new(3, 1),
            level: 1,
            parent_id: Some("A_P".to_string()),
            parent_code: Some("A_P".to_string()),
            parent_order: Some(2),
            hierarchy_node_id: "X".to_string(),
            series_id: Some("BOP::X_A_P".to_string()),
            indicator_code: Some("X".to_string()),
            title: "Direct investment".to_string(),
            dimensions: BTreeMap::from([("INDICATOR".to_string(), "X".to_string())]),
            country: Some("Brazil".to_string()),
            time_period: Some("2024".to_string()),
            date: None,
            value: Some(12.5),
            unit: Some("US Dollar".to_string()),
            scale: Some("Millions".to_string()),
            is_header: false,
        };

        let json = serde_json::to_value(&row).expect("serialize row");
        assert_eq!(json["parent_id"], "A_P");
        assert_eq!(json["dimensions"]["INDICATOR"], "X");
        assert_eq!(json["order"]["node"], 3);

        let round_trip: MatchedRow = serde_json::from_value(json).expect("deserialize row");
        assert_eq!(round_trip.order, RowOrder::new(3, 1));
    }
}
