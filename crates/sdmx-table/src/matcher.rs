//! Multi-stage matching of observation rows to hierarchy nodes.
//!
//! Stages run from most to least specific and the first hit wins:
//!
//! 1. exact series id (`IMF_STA_BOP_A_P_DI` or its `BOP::A_P_DI` form)
//! 2. the series codes in any order
//! 3. indicator code plus accounting entry, where the entry tells apart the
//!    copies of a code that sit under several parents
//! 4. bare indicator code, only for rows without an accounting entry
//! 5. the row code extends a node code with a unit suffix (`NGDP_USD`)

use std::collections::HashMap;

use sdmx_hierarchy::ParsedHierarchy;
use sdmx_metadata::conventions::is_entry_dimension;
use sdmx_model::{NodeIndex, ObservationRow, clean_node_ref};

/// Dimensions holding the row's indicator code, in lookup order.
pub const INDICATOR_CODE_DIMENSIONS: &[&str] = &[
    "INDICATOR",
    "COICOP_1999",
    "INDEX_TYPE",
    "CPI_INDEX_TYPE",
    "PRODUCTION_INDEX",
    "ACTIVITY",
    "PRODUCT",
    "SERIES",
    "ITEM",
    "CLASSIFICATION",
];

/// Words a node id or series id carries for each accounting entry.
const ENTRY_MARKERS: &[(&str, &[&str])] = &[
    ("CD_T", &["CD", "CREDIT"]),
    ("NEGCD_T", &["CD", "CREDIT"]),
    ("DB_T", &["DB", "DEBIT"]),
    ("A_P", &["ASSET", "ASSETS"]),
    ("L_P", &["LIAB", "LIABILITIES", "LIABILITY"]),
];

/// Which stage produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    SeriesId,
    SortedCodes,
    Entry,
    NetParent,
    Code,
    Prefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeMatch {
    pub node: NodeIndex,
    pub stage: MatchStage,
}

/// Lookup tables over the selected nodes of one table.
pub struct NodeMatcher<'t> {
    tree: &'t ParsedHierarchy,
    by_series: HashMap<String, NodeIndex>,
    by_sorted_codes: HashMap<String, NodeIndex>,
    /// Code to every node carrying it, in display order.
    by_code: HashMap<String, Vec<NodeIndex>>,
    /// (code, parent code) to nodes.
    by_code_and_parent: HashMap<(String, String), Vec<NodeIndex>>,
    /// Codes by descending length, for prefix matching.
    codes_longest_first: Vec<String>,
}

/// Tokens of an `_`-joined code string, sorted, so that dimension order does not matter.
fn sorted_codes(joined: &str) -> String {
    let mut tokens: Vec<&str> = joined.split('_').filter(|t| !t.is_empty()).collect();
    tokens.sort_unstable();
    tokens.join("_")
}

/// Indicator code of a row.
pub fn row_indicator_code(row: &ObservationRow) -> Option<&str> {
    INDICATOR_CODE_DIMENSIONS.iter().find_map(|dim| row.code(dim))
}

/// Accounting entry code of a row.
pub fn row_entry_code(row: &ObservationRow) -> Option<&str> {
    row.dimensions
        .iter()
        .find(|(dim, _)| is_entry_dimension(dim))
        .map(|(_, code)| code.as_str())
}

impl<'t> NodeMatcher<'t> {
    pub fn new(tree: &'t ParsedHierarchy, dataflow: &str, nodes: &[NodeIndex]) -> Self {
        let mut matcher = Self {
            tree,
            by_series: HashMap::new(),
            by_sorted_codes: HashMap::new(),
            by_code: HashMap::new(),
            by_code_and_parent: HashMap::new(),
            codes_longest_first: Vec::new(),
        };
        let marker = format!("_{dataflow}_");
        for idx in nodes.iter().copied() {
            let node = tree.node(idx);
            if let Some(series_id) = &node.series_id {
                matcher.by_series.entry(series_id.clone()).or_insert(idx);
                if let Some((_, codes)) = series_id.split_once(&marker) {
                    matcher
                        .by_series
                        .entry(format!("{dataflow}::{codes}"))
                        .or_insert(idx);
                    matcher.by_sorted_codes.entry(sorted_codes(codes)).or_insert(idx);
                }
            }
            let Some(code) = &node.indicator_code else {
                continue;
            };
            matcher.by_code.entry(code.clone()).or_default().push(idx);
            if let Some(parent) = tree.parent(idx).and_then(|p| p.indicator_code.clone()) {
                matcher
                    .by_code_and_parent
                    .entry((code.clone(), parent))
                    .or_default()
                    .push(idx);
            }
        }
        let mut codes: Vec<String> = matcher.by_code.keys().cloned().collect();
        codes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        matcher.codes_longest_first = codes;
        matcher
    }

    pub fn tree(&self) -> &'t ParsedHierarchy {
        self.tree
    }

    /// Finds the node an observation row belongs to.
    pub fn match_row(&self, row: &ObservationRow) -> Option<NodeMatch> {
        let found = |node: NodeIndex, stage: MatchStage| Some(NodeMatch { node, stage });

        if let Some(node) = self.by_series.get(&row.series_id) {
            return found(*node, MatchStage::SeriesId);
        }
        let codes = row
            .series_id
            .split_once("::")
            .map_or(row.series_id.as_str(), |(_, codes)| codes);
        if !codes.is_empty()
            && let Some(node) = self.by_sorted_codes.get(&sorted_codes(codes))
        {
            return found(*node, MatchStage::SortedCodes);
        }

        let indicator = row_indicator_code(row)?;
        let entry = row_entry_code(row);
        if let Some(entry) = entry {
            if let Some(node) = self.by_entry(indicator, entry) {
                return found(node, MatchStage::Entry);
            }
            if let Some(node) = self.net_parent(indicator, entry) {
                return found(node, MatchStage::NetParent);
            }
        } else if let Some(node) = self.by_code.get(indicator).and_then(|nodes| nodes.first()) {
            return found(*node, MatchStage::Code);
        }

        self.codes_longest_first
            .iter()
            .find(|code| {
                indicator
                    .strip_prefix(code.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
            })
            .and_then(|code| self.by_code.get(code))
            .and_then(|nodes| nodes.first())
            .and_then(|node| found(*node, MatchStage::Prefix))
    }

    /// Node for an indicator under a given accounting entry.
    ///
    /// Tries the indicator under the entry, then the entry under the
    /// indicator, then any copy of the indicator whose id names the entry.
    fn by_entry(&self, indicator: &str, entry: &str) -> Option<NodeIndex> {
        let pair = |code: &str, parent: &str| {
            self.by_code_and_parent
                .get(&(code.to_string(), parent.to_string()))
                .and_then(|nodes| nodes.first())
                .copied()
        };
        if let Some(node) = pair(indicator, entry).or_else(|| pair(entry, indicator)) {
            return Some(node);
        }

        let candidates = self.by_code.get(indicator)?;
        let markers = ENTRY_MARKERS
            .iter()
            .find(|(code, _)| *code == entry)
            .map(|(_, markers)| *markers)?;
        candidates.iter().copied().find(|idx| {
            let node = self.tree.node(*idx);
            let haystack = format!(
                "{}_{}",
                node.id.to_ascii_uppercase(),
                node.series_id.as_deref().unwrap_or_default().to_ascii_uppercase()
            );
            let tokens: Vec<&str> = haystack.split(['_', '-', '.']).collect();
            markers.iter().any(|marker| tokens.contains(marker))
        })
    }

    /// Credit and debit rows of an indicator whose table only has the net entry.
    fn net_parent(&self, indicator: &str, entry: &str) -> Option<NodeIndex> {
        if entry != "CD_T" && entry != "DB_T" {
            return None;
        }
        let under_indicator = |code: &str| {
            self.by_code_and_parent
                .get(&(code.to_string(), indicator.to_string()))
                .and_then(|nodes| nodes.first())
                .copied()
        };
        under_indicator("NETCD_T").or_else(|| {
            self.by_code_and_parent
                .iter()
                .filter(|((code, parent), _)| parent == indicator && code.starts_with("NET"))
                .filter_map(|(_, nodes)| nodes.first().copied())
                .min_by_key(|idx| self.tree.node(*idx).order)
        })
    }
}

/// Code of a node's parent, for rows and headers.
pub fn parent_code(tree: &ParsedHierarchy, node: NodeIndex) -> Option<String> {
    tree.parent(node).map(|parent| {
        parent
            .indicator_code
            .clone()
            .unwrap_or_else(|| clean_node_ref(&parent.id).to_string())
    })
}
