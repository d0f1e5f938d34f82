//! Node selection and grouping of table codes by dimension.

use std::collections::BTreeMap;

use sdmx_hierarchy::ParsedHierarchy;
use sdmx_model::{IndicatorNode, NodeIndex};

/// Optional restriction on which nodes of a table are requested.
///
/// Only one criterion applies: indicator codes first, then parent, then depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeFilter {
    pub indicators: Vec<String>,
    pub parent: Option<String>,
    pub depth: Option<u32>,
}

impl NodeFilter {
    fn keeps(&self, node: &IndicatorNode) -> bool {
        if !self.indicators.is_empty() {
            return node
                .indicator_code
                .as_deref()
                .is_some_and(|code| {
                    self.indicators
                        .iter()
                        .any(|wanted| wanted.eq_ignore_ascii_case(code))
                });
        }
        if let Some(parent) = &self.parent {
            return node.parent_id.as_deref().is_some_and(|id| id.eq_ignore_ascii_case(parent));
        }
        if let Some(depth) = self.depth {
            return node.depth == depth;
        }
        true
    }
}

/// Nodes kept by the filter, in display order.
pub fn select_nodes(tree: &ParsedHierarchy, filter: &NodeFilter) -> Vec<NodeIndex> {
    tree.sequence()
        .iter()
        .copied()
        .filter(|idx| filter.keeps(tree.node(*idx)))
        .collect()
}

/// Codelists that label table rows rather than identify data.
fn is_presentation_codelist(codelist: &str) -> bool {
    codelist.contains("_LABELS") || codelist.contains("_TABLE_LEVEL")
}

/// Table codes of one dataflow dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionCodes {
    pub dimension: String,
    /// Codes in first-seen order, without duplicates.
    pub codes: Vec<String>,
    /// Shallowest depth each code was seen at.
    pub depths: BTreeMap<String, u32>,
}

impl DimensionCodes {
    fn new(dimension: &str) -> Self {
        Self {
            dimension: dimension.to_string(),
            codes: Vec::new(),
            depths: BTreeMap::new(),
        }
    }

    fn add(&mut self, code: &str, depth: u32) {
        match self.depths.get_mut(code) {
            Some(seen) => *seen = (*seen).min(depth),
            None => {
                self.codes.push(code.to_string());
                self.depths.insert(code.to_string(), depth);
            }
        }
    }

    pub fn depth(&self, code: &str) -> u32 {
        self.depths.get(code).copied().unwrap_or(0)
    }
}

/// Codes of the selected nodes grouped by dimension, dimensions in first-seen order.
///
/// Each node contributes every code on its path, so a filtered selection
/// still fetches the branch codes its series keys need.
pub fn group_codes(tree: &ParsedHierarchy, nodes: &[NodeIndex]) -> Vec<DimensionCodes> {
    let mut groups: Vec<DimensionCodes> = Vec::new();
    for idx in nodes {
        let node = tree.node(*idx);
        if node.indicator_code.is_none()
            || node
                .codelist_id
                .as_deref()
                .is_some_and(is_presentation_codelist)
        {
            continue;
        }
        let own = node.dimension_id.as_deref().zip(node.indicator_code.as_deref());
        let inherited = node
            .dimension_codes
            .iter()
            .map(|(dim, code)| (dim.as_str(), code.as_str()))
            .filter(|pair| Some(*pair) != own);
        for (dimension, code) in own.into_iter().chain(inherited) {
            let slot = match groups.iter().position(|g| g.dimension == dimension) {
                Some(slot) => slot,
                None => {
                    groups.push(DimensionCodes::new(dimension));
                    groups.len() - 1
                }
            };
            groups[slot].add(code, node.depth);
        }
    }
    groups
}

/// Number of selected nodes that carry a code.
pub fn count_indicators(tree: &ParsedHierarchy, nodes: &[NodeIndex]) -> usize {
    nodes
        .iter()
        .filter(|idx| tree.node(**idx).indicator_code.is_some())
        .count()
}
