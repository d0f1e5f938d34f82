//! Results of a table build.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::warning::Warning;

/// Sort key of a table row: the hierarchy order plus a tie-breaking sub-order
/// for several series sharing one hierarchy node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RowOrder {
    pub node: u32,
    pub sub: u32,
}

impl RowOrder {
    pub const fn new(node: u32, sub: u32) -> Self {
        Self { node, sub }
    }

    /// Decimal form used for display (`12.002`).
    pub fn as_f64(self) -> f64 {
        f64::from(self.node) + f64::from(self.sub) * 0.001
    }
}

impl Ord for RowOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.node.cmp(&other.node).then(self.sub.cmp(&other.sub))
    }
}

impl PartialOrd for RowOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RowOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sub == 0 {
            write!(f, "{}", self.node)
        } else {
            write!(f, "{}.{:03}", self.node, self.sub)
        }
    }
}

/// An observation reconciled against a hierarchy node, or a synthesized header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRow {
    pub order: RowOrder,
    /// Display depth of the matched node.
    pub level: u32,
    pub parent_id: Option<String>,
    /// Code of the parent node, used to tell apart codes that recur under several parents.
    pub parent_code: Option<String>,
    /// Hierarchy order of the parent node.
    #[serde(default)]
    pub parent_order: Option<u32>,
    pub hierarchy_node_id: String,
    pub series_id: Option<String>,
    pub indicator_code: Option<String>,
    pub title: String,
    /// Dimension id to code for the series.
    pub dimensions: BTreeMap<String, String>,
    pub country: Option<String>,
    pub time_period: Option<String>,
    pub date: Option<NaiveDate>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub scale: Option<String>,
    /// True for rows synthesized for group nodes without data of their own.
    pub is_header: bool,
}

/// Descriptive metadata about the table that was built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table_id: String,
    pub name: String,
    pub description: Option<String>,
    pub dataflow_id: String,
    pub codelist_id: Option<String>,
    pub agency: String,
    pub version: String,
    pub total_indicators: usize,
    pub total_groups: usize,
}

/// Per-series summary returned alongside the rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub series_id: String,
    pub hierarchy_node_id: String,
    pub title: String,
    pub unit: Option<String>,
    pub scale: Option<String>,
    pub observation_count: usize,
}

/// Output of a table build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableResult {
    pub metadata: TableMetadata,
    pub rows: Vec<MatchedRow>,
    pub series: Vec<SeriesMetadata>,
    /// URL of the data query that produced the rows.
    pub query_url: String,
    pub warnings: Vec<Warning>,
}

impl TableResult {
    pub fn data_rows(&self) -> impl Iterator<Item = &MatchedRow> {
        self.rows.iter().filter(|row| !row.is_header)
    }
}
