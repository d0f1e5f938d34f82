//! Turning matched observations into ordered table rows.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use sdmx_hierarchy::ParsedHierarchy;
use sdmx_model::{
    Codelist, MatchedRow, NodeIndex, ObservationRow, RowOrder, SeriesMetadata, Warning, Warnings,
};

use crate::matcher::{NodeMatcher, parent_code, row_indicator_code};
use crate::titles::{data_title, header_title, net_base};

/// Rows and per-series summaries of one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledRows {
    pub rows: Vec<MatchedRow>,
    pub series: Vec<SeriesMetadata>,
}

/// Builds table rows from the observations of one fetch.
pub struct RowAssembler<'t> {
    tree: &'t ParsedHierarchy,
    selected: &'t [NodeIndex],
    dataflow: &'t str,
    indicator_codelist: Option<&'t Codelist>,
}

impl<'t> RowAssembler<'t> {
    pub fn new(tree: &'t ParsedHierarchy, selected: &'t [NodeIndex], dataflow: &'t str) -> Self {
        Self {
            tree,
            selected,
            dataflow,
            indicator_codelist: None,
        }
    }

    /// Codelist used to name headers whose label is a bare code.
    #[must_use]
    pub fn with_indicator_codelist(mut self, codelist: Option<&'t Codelist>) -> Self {
        self.indicator_codelist = codelist;
        self
    }

    /// Matches, titles, orders and completes the rows with headers.
    ///
    /// Observations that match no node are dropped with a warning.
    pub fn assemble(
        &self,
        observations: Vec<ObservationRow>,
        warnings: &mut Warnings,
    ) -> AssembledRows {
        let matcher = NodeMatcher::new(self.tree, self.dataflow, self.selected);
        let mut rows = Vec::with_capacity(observations.len());
        for observation in observations {
            match matcher.match_row(&observation) {
                Some(found) => rows.push(self.data_row(found.node, observation)),
                None => warnings.push(Warning::UnmatchedSeries {
                    series_id: observation.series_id,
                }),
            }
        }

        assign_sub_orders(&mut rows);
        let series = summarize_series(&rows);
        let headers = self.header_rows(&rows);
        rows.extend(headers);
        rows.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| b.is_header.cmp(&a.is_header))
                .then_with(|| a.country.cmp(&b.country))
                .then_with(|| a.date.cmp(&b.date))
        });
        AssembledRows { rows, series }
    }

    fn data_row(&self, idx: NodeIndex, observation: ObservationRow) -> MatchedRow {
        let node = self.tree.node(idx);
        let title = data_title(&observation, node, self.dataflow);
        let indicator_code = node
            .indicator_code
            .clone()
            .or_else(|| row_indicator_code(&observation).map(str::to_string));
        MatchedRow {
            order: RowOrder::new(node.order, 0),
            level: node.depth,
            parent_id: node.parent_id.clone(),
            parent_code: parent_code(self.tree, idx),
            parent_order: self.tree.parent(idx).map(|parent| parent.order),
            hierarchy_node_id: node.id.clone(),
            series_id: Some(observation.series_id.clone()),
            indicator_code,
            title,
            country: observation.country().map(str::to_string),
            dimensions: observation.dimensions,
            time_period: Some(observation.time_period),
            date: observation.date,
            value: observation.value,
            unit: observation.unit,
            scale: observation.scale,
            is_header: false,
        }
    }

    /// Headers for selected group nodes without data of their own whose
    /// descendants have data.
    ///
    /// A group whose `"<label>, Net"` row exists gets no header; the net row
    /// heads it instead.
    fn header_rows(&self, rows: &[MatchedRow]) -> Vec<MatchedRow> {
        let mut by_order: HashMap<u32, &MatchedRow> = HashMap::new();
        for row in rows {
            by_order.entry(row.order.node).or_insert(row);
        }
        let net_bases: BTreeSet<&str> =
            rows.iter().filter_map(|row| net_base(&row.title)).collect();

        let mut headers = Vec::new();
        for idx in self.selected.iter().copied() {
            let node = self.tree.node(idx);
            if !node.is_group || by_order.contains_key(&node.order) {
                continue;
            }
            let Some(source) = self.nearest_data_row(idx, &by_order) else {
                continue;
            };
            let title = header_title(node, self.indicator_codelist);
            if net_bases.contains(title.as_str()) {
                continue;
            }
            headers.push(MatchedRow {
                order: RowOrder::new(node.order, 0),
                level: node.depth,
                parent_id: node.parent_id.clone(),
                parent_code: parent_code(self.tree, idx),
                parent_order: self.tree.parent(idx).map(|parent| parent.order),
                hierarchy_node_id: node.id.clone(),
                series_id: None,
                indicator_code: node.indicator_code.clone(),
                title,
                dimensions: node.dimension_codes.clone(),
                country: None,
                time_period: None,
                date: None,
                value: None,
                unit: source.unit.clone(),
                scale: source.scale.clone(),
                is_header: true,
            });
        }
        headers
    }

    /// First data row found breadth-first below a node.
    fn nearest_data_row<'r>(
        &self,
        idx: NodeIndex,
        by_order: &HashMap<u32, &'r MatchedRow>,
    ) -> Option<&'r MatchedRow> {
        let mut queue: VecDeque<NodeIndex> = self.tree.children(idx).iter().copied().collect();
        while let Some(child) = queue.pop_front() {
            if let Some(row) = by_order.get(&self.tree.node(child).order) {
                return Some(*row);
            }
            queue.extend(self.tree.children(child).iter().copied());
        }
        None
    }
}

/// Series sharing one node get distinct sub-orders, by series id.
fn assign_sub_orders(rows: &mut [MatchedRow]) {
    let mut series_by_order: BTreeMap<u32, BTreeSet<String>> = BTreeMap::new();
    for row in rows.iter() {
        if let Some(series_id) = &row.series_id {
            series_by_order
                .entry(row.order.node)
                .or_default()
                .insert(series_id.clone());
        }
    }
    for row in rows.iter_mut() {
        let Some(seen) = series_by_order.get(&row.order.node).filter(|seen| seen.len() > 1) else {
            continue;
        };
        let position = row
            .series_id
            .as_ref()
            .and_then(|id| seen.iter().position(|s| s == id));
        if let Some(position) = position {
            row.order.sub = u32::try_from(position + 1).unwrap_or(u32::MAX);
        }
    }
}

fn summarize_series(rows: &[MatchedRow]) -> Vec<SeriesMetadata> {
    let mut series: Vec<SeriesMetadata> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        let Some(series_id) = row.series_id.as_deref() else {
            continue;
        };
        match slots.get(series_id) {
            Some(slot) => series[*slot].observation_count += 1,
            None => {
                slots.insert(series_id, series.len());
                series.push(SeriesMetadata {
                    series_id: series_id.to_string(),
                    hierarchy_node_id: row.hierarchy_node_id.clone(),
                    title: row.title.clone(),
                    unit: row.unit.clone(),
                    scale: row.scale.clone(),
                    observation_count: 1,
                });
            }
        }
    }
    series
}
