//! Arena of parsed hierarchy nodes.
//!
//! Nodes live in a flat vector addressed by [`NodeIndex`]; child lists are the
//! source of truth for structure. After any structural change
//! [`ParsedHierarchy::renumber`] reassigns pre-order `order`, `depth`,
//! `parent_id` and `is_group` for every node.

use std::collections::{HashMap, HashSet};

use sdmx_model::{IndicatorNode, NodeIndex, TableMetadata, clean_node_ref};

/// A hierarchy after parsing: ordered indicator nodes plus table metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHierarchy {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub dataflow_id: String,
    pub codelist_id: Option<String>,
    pub agency: String,
    pub version: String,
    nodes: Vec<IndicatorNode>,
    children: Vec<Vec<NodeIndex>>,
    roots: Vec<NodeIndex>,
    /// Arena indexes in pre-order.
    sequence: Vec<NodeIndex>,
}

impl ParsedHierarchy {
    pub(crate) fn empty(
        id: String,
        name: String,
        description: Option<String>,
        dataflow_id: String,
        codelist_id: Option<String>,
        agency: String,
        version: String,
    ) -> Self {
        Self {
            id,
            name,
            description,
            dataflow_id,
            codelist_id,
            agency,
            version,
            nodes: Vec::new(),
            children: Vec::new(),
            roots: Vec::new(),
            sequence: Vec::new(),
        }
    }

    /// Nodes in display order.
    pub fn nodes(&self) -> impl Iterator<Item = &IndicatorNode> {
        self.sequence.iter().map(|idx| &self.nodes[idx.0])
    }

    /// Arena indexes in display order.
    pub fn sequence(&self) -> &[NodeIndex] {
        &self.sequence
    }

    pub fn node(&self, idx: NodeIndex) -> &IndicatorNode {
        &self.nodes[idx.0]
    }

    pub fn get(&self, idx: NodeIndex) -> Option<&IndicatorNode> {
        self.nodes.get(idx.0)
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn roots(&self) -> &[NodeIndex] {
        &self.roots
    }

    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.children.get(idx.0).map_or(&[], Vec::as_slice)
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<&IndicatorNode> {
        self.node(idx).parent.map(|parent| self.node(parent))
    }

    /// Node at a given order.
    pub fn by_order(&self, order: u32) -> Option<&IndicatorNode> {
        let position = usize::try_from(order).ok()?.checked_sub(1)?;
        self.sequence.get(position).map(|idx| self.node(*idx))
    }

    /// First node with the given id, in display order.
    pub fn find(&self, id: &str) -> Option<&IndicatorNode> {
        self.nodes().find(|node| node.id == id)
    }

    /// Number of leaf nodes.
    pub fn total_indicators(&self) -> usize {
        self.nodes().filter(|node| !node.is_group).count()
    }

    pub fn total_groups(&self) -> usize {
        self.nodes().filter(|node| node.is_group).count()
    }

    pub fn metadata(&self) -> TableMetadata {
        TableMetadata {
            table_id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            dataflow_id: self.dataflow_id.clone(),
            codelist_id: self.codelist_id.clone(),
            agency: self.agency.clone(),
            version: self.version.clone(),
            total_indicators: self.total_indicators(),
            total_groups: self.total_groups(),
        }
    }

    /// Consumes the tree and returns its nodes in display order.
    pub fn into_nodes(mut self) -> Vec<IndicatorNode> {
        let mut slots: Vec<Option<IndicatorNode>> = self.nodes.drain(..).map(Some).collect();
        self.sequence
            .iter()
            .filter_map(|idx| slots.get_mut(idx.0).and_then(Option::take))
            .collect()
    }

    /// Adds a node under `parent` (or as a root), at `position` among its
    /// siblings or last.
    pub(crate) fn insert(
        &mut self,
        mut node: IndicatorNode,
        parent: Option<NodeIndex>,
        position: Option<usize>,
    ) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len());
        node.parent = parent;
        self.nodes.push(node);
        self.children.push(Vec::new());
        let siblings = self.siblings_mut(parent);
        let at = position.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, idx);
        idx
    }

    /// Moves a node under a new parent at `position` among its new siblings.
    pub(crate) fn move_node(
        &mut self,
        idx: NodeIndex,
        parent: Option<NodeIndex>,
        position: Option<usize>,
    ) {
        let old_parent = self.nodes[idx.0].parent;
        self.siblings_mut(old_parent).retain(|sibling| *sibling != idx);
        let siblings = self.siblings_mut(parent);
        let at = position.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, idx);
        self.nodes[idx.0].parent = parent;
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> &mut IndicatorNode {
        &mut self.nodes[idx.0]
    }

    /// Children of `parent`, or the roots.
    pub(crate) fn siblings(&self, parent: Option<NodeIndex>) -> &[NodeIndex] {
        match parent {
            Some(parent) => self.children(parent),
            None => &self.roots,
        }
    }

    fn siblings_mut(&mut self, parent: Option<NodeIndex>) -> &mut Vec<NodeIndex> {
        match parent {
            Some(parent) => &mut self.children[parent.0],
            None => &mut self.roots,
        }
    }

    /// Recomputes display order, depth, parent ids and group flags.
    pub fn renumber(&mut self) {
        let mut sequence = Vec::with_capacity(self.nodes.len());
        let mut seen = HashSet::new();
        let mut stack: Vec<NodeIndex> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            if !seen.insert(idx) {
                continue;
            }
            sequence.push(idx);
            stack.extend(self.children[idx.0].iter().rev().copied());
        }

        let depths = self.depths(&sequence);
        for (position, idx) in sequence.iter().enumerate() {
            let parent_id = self.nodes[idx.0]
                .parent
                .map(|parent| clean_node_ref(&self.nodes[parent.0].id).to_string());
            let is_group = !self.children[idx.0].is_empty();
            let node = &mut self.nodes[idx.0];
            node.order = u32::try_from(position + 1).unwrap_or(u32::MAX);
            node.depth = depths.get(idx).copied().unwrap_or(0);
            node.parent_id = parent_id;
            node.is_group = is_group;
        }
        self.sequence = sequence;
    }

    /// Depth of every node by walking parent links, memoised. A node whose
    /// chain loops back on itself gets depth 0.
    fn depths(&self, sequence: &[NodeIndex]) -> HashMap<NodeIndex, u32> {
        let mut memo: HashMap<NodeIndex, u32> = HashMap::new();
        for &start in sequence {
            let mut chain = Vec::new();
            let mut visited = HashSet::new();
            let mut current = Some(start);
            let mut base = 0;
            let mut looped = false;
            while let Some(idx) = current {
                if let Some(depth) = memo.get(&idx) {
                    base = depth + 1;
                    break;
                }
                if !visited.insert(idx) {
                    looped = true;
                    break;
                }
                chain.push(idx);
                current = self.nodes[idx.0].parent;
            }
            if looped {
                for idx in chain {
                    memo.insert(idx, 0);
                }
                continue;
            }
            // chain runs from `start` up to the topmost unmemoised ancestor
            let top = chain.len();
            for (i, idx) in chain.into_iter().enumerate() {
                let depth = base + u32::try_from(top - 1 - i).unwrap_or(0);
                memo.insert(idx, depth);
            }
        }
        memo
    }
}
