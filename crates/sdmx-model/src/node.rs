//! Parsed hierarchy nodes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a node in a parsed hierarchy's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(pub usize);

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node of a parsed presentation hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorNode {
    /// Node id from the hierarchy entry.
    pub id: String,
    /// Code this node presents, parsed from the entry's URN.
    pub indicator_code: Option<String>,
    /// Codelist the code belongs to.
    pub codelist_id: Option<String>,
    /// Display label after cleaning.
    pub label: String,
    /// Label as published in the codelist, before cleaning.
    pub full_label: String,
    pub description: Option<String>,
    /// Pre-order position, unique and strictly increasing in traversal order.
    pub order: u32,
    /// Distance from the nearest root, computed from the parent chain.
    pub depth: u32,
    /// Id of the parent node, cleaned of any codelist prefix.
    pub parent_id: Option<String>,
    /// Arena index of the parent node.
    pub parent: Option<NodeIndex>,
    pub is_group: bool,
    /// Dataflow dimension the code belongs to.
    pub dimension_id: Option<String>,
    /// Codes accumulated along the path from the root, keyed by dimension.
    pub dimension_codes: BTreeMap<String, String>,
    /// Deterministic series key, set only when the code maps onto a dimension.
    pub series_id: Option<String>,
    /// True for nodes inserted by post-parse transforms.
    #[serde(default)]
    pub synthetic: bool,
}

impl IndicatorNode {
    /// Code used for data lookups: the indicator code, or the node id.
    pub fn code(&self) -> &str {
        self.indicator_code.as_deref().unwrap_or(&self.id)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
