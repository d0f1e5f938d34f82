//! Deterministic series identifiers for hierarchy nodes.

use std::collections::BTreeMap;

use sdmx_metadata::conventions::is_indicator_dimension;
use sdmx_model::{DataStructure, Dataflow};

/// Builds `{agency}_{dataflow}_{codes}` identifiers.
///
/// Codes of indicator-like dimensions come first in structure order, the
/// remaining codes follow sorted by dimension id, so the result does not
/// depend on the path a node was reached by.
#[derive(Debug, Clone)]
pub struct SeriesIdScheme {
    prefix: String,
    /// Position of each indicator-like dimension in the structure.
    indicator_positions: BTreeMap<String, usize>,
}

impl SeriesIdScheme {
    pub fn new(flow: &Dataflow, structure: &DataStructure) -> Self {
        let indicator_positions = structure
            .dimensions_in_order()
            .into_iter()
            .enumerate()
            .filter(|(_, dim)| is_indicator_dimension(&dim.id))
            .map(|(index, dim)| (dim.id.clone(), index))
            .collect();
        Self {
            prefix: format!("{}_{}", flow.agency.replace('.', "_"), flow.id),
            indicator_positions,
        }
    }

    pub fn series_id(&self, codes: &BTreeMap<String, String>) -> Option<String> {
        if codes.is_empty() {
            return None;
        }
        let mut indicators: Vec<(usize, &str)> = Vec::new();
        let mut others: Vec<&str> = Vec::new();
        for (dimension, code) in codes {
            match self.indicator_positions.get(dimension) {
                Some(position) => indicators.push((*position, code)),
                // BTreeMap iteration keeps these sorted by dimension id
                None => others.push(code),
            }
        }
        indicators.sort_by_key(|(position, _)| *position);

        let mut id = self.prefix.clone();
        for code in indicators.into_iter().map(|(_, code)| code).chain(others) {
            id.push('_');
            id.push_str(code);
        }
        Some(id)
    }
}
