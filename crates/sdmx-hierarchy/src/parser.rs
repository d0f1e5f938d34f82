//! Hierarchy parsing into an ordered node arena.

use std::collections::HashMap;
use std::time::Instant;

use sdmx_model::{
    CodeUrn, DataStructure, Dataflow, HierarchicalCode, Hierarchy, IndicatorNode, NodeIndex,
    Warning, Warnings, clean_node_ref,
};
use tracing::debug;

use crate::labels::{relative_label, tidy_label};
use crate::resolver::CodeResolver;
use crate::series::SeriesIdScheme;
use crate::transform::{PostPass, apply_post_passes, default_passes};
use crate::tree::ParsedHierarchy;

/// Optional restrictions applied while parsing.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Keep only the top-level entry with this id (`hierarchy:TOPCODE`).
    /// Every entry is kept when nothing matches.
    pub top_code: Option<String>,
}

/// Parses a hierarchy for one dataflow.
pub struct HierarchyParser<'a> {
    flow: &'a Dataflow,
    resolver: &'a dyn CodeResolver,
    scheme: SeriesIdScheme,
    passes: Vec<Box<dyn PostPass>>,
}

struct Pending<'h> {
    entry: &'h HierarchicalCode,
    parent: Option<NodeIndex>,
}

impl<'a> HierarchyParser<'a> {
    pub fn new(
        flow: &'a Dataflow,
        structure: &DataStructure,
        resolver: &'a dyn CodeResolver,
    ) -> Self {
        Self {
            flow,
            resolver,
            scheme: SeriesIdScheme::new(flow, structure),
            passes: default_passes(),
        }
    }

    /// Replaces the post-parse transforms.
    #[must_use]
    pub fn with_passes(mut self, passes: Vec<Box<dyn PostPass>>) -> Self {
        self.passes = passes;
        self
    }

    /// Base parse followed by the post-parse transforms.
    pub fn parse(
        &self,
        hierarchy: &Hierarchy,
        options: &ParseOptions,
        warnings: &mut Warnings,
    ) -> ParsedHierarchy {
        let started = Instant::now();
        let mut tree = self.parse_base(hierarchy, options, warnings);
        apply_post_passes(&mut tree, &self.passes);
        debug!(
            hierarchy = %hierarchy.id,
            dataflow = %self.flow.id,
            nodes = tree.len(),
            groups = tree.total_groups(),
            duration_ms = started.elapsed().as_millis(),
            "Parsed hierarchy"
        );
        tree
    }

    /// Pre-order walk of the raw tree with an explicit stack.
    pub fn parse_base(
        &self,
        hierarchy: &Hierarchy,
        options: &ParseOptions,
        warnings: &mut Warnings,
    ) -> ParsedHierarchy {
        let mut tree = ParsedHierarchy::empty(
            hierarchy.id.clone(),
            hierarchy.name.clone(),
            hierarchy.description.clone(),
            self.flow.id.clone(),
            hierarchy.primary_codelist(),
            hierarchy.agency.clone(),
            hierarchy.version.clone(),
        );

        let tops = top_entries(hierarchy, options.top_code.as_deref());
        let mut stack: Vec<Pending<'_>> = tops
            .into_iter()
            .rev()
            .map(|entry| Pending { entry, parent: None })
            .collect();
        let mut dimensions: HashMap<String, Option<String>> = HashMap::new();

        while let Some(Pending { entry, mut parent }) = stack.pop() {
            // A repeated ancestor id is kept as a root at depth 0.
            if self.revisits_ancestor(&tree, entry, parent) {
                warnings.push(Warning::HierarchyCycle {
                    node: entry.id.clone(),
                });
                parent = None;
            }
            let node = self.build_node(&tree, entry, parent, &mut dimensions, warnings);
            let idx = tree.insert(node, parent, None);
            stack.extend(entry.children.iter().rev().map(|child| Pending {
                entry: child,
                parent: Some(idx),
            }));
        }

        tree.renumber();
        tree
    }

    /// True when the entry's id already appears on its own ancestor path.
    fn revisits_ancestor(
        &self,
        tree: &ParsedHierarchy,
        entry: &HierarchicalCode,
        parent: Option<NodeIndex>,
    ) -> bool {
        let id = clean_node_ref(&entry.id);
        let mut current = parent;
        while let Some(idx) = current {
            let ancestor = tree.node(idx);
            if clean_node_ref(&ancestor.id) == id {
                return true;
            }
            current = ancestor.parent;
        }
        false
    }

    fn build_node(
        &self,
        tree: &ParsedHierarchy,
        entry: &HierarchicalCode,
        parent: Option<NodeIndex>,
        dimensions: &mut HashMap<String, Option<String>>,
        warnings: &mut Warnings,
    ) -> IndicatorNode {
        let mut dimension_codes = parent
            .map(|idx| tree.node(idx).dimension_codes.clone())
            .unwrap_or_default();

        let Some(urn) = CodeUrn::parse(&entry.code_urn) else {
            warnings.push(Warning::MalformedUrn {
                node: entry.id.clone(),
                urn: entry.code_urn.clone(),
            });
            return IndicatorNode {
                id: entry.id.clone(),
                indicator_code: None,
                codelist_id: None,
                label: entry.id.clone(),
                full_label: entry.id.clone(),
                description: None,
                order: 0,
                depth: 0,
                parent_id: None,
                parent,
                is_group: !entry.children.is_empty(),
                dimension_id: None,
                dimension_codes,
                series_id: None,
                synthetic: false,
            };
        };

        let codelist = urn.codelist_id().to_string();
        let code = urn.code().map(str::to_string);
        let dimension_id = dimensions
            .entry(codelist.clone())
            .or_insert_with(|| self.resolver.dimension_for_codelist(&codelist, warnings))
            .clone();

        let text = code
            .as_deref()
            .and_then(|code| self.resolver.code_text(&urn.agency, &codelist, code, warnings));
        let full_label = text
            .as_ref()
            .map(|text| text.label.clone())
            .or_else(|| code.clone())
            .unwrap_or_else(|| entry.id.clone());
        let ancestors = ancestor_labels(tree, parent);
        let ancestors: Vec<&str> = ancestors.iter().map(String::as_str).collect();
        let label = tidy_label(&relative_label(Some(&codelist), &full_label, &ancestors));

        let series_id = match (&dimension_id, &code) {
            (Some(dimension), Some(code)) => {
                dimension_codes.insert(dimension.clone(), code.clone());
                self.scheme.series_id(&dimension_codes)
            }
            _ => None,
        };

        IndicatorNode {
            id: entry.id.clone(),
            indicator_code: code,
            codelist_id: Some(codelist),
            label,
            full_label,
            description: text.and_then(|text| text.description),
            order: 0,
            depth: 0,
            parent_id: None,
            parent,
            is_group: !entry.children.is_empty(),
            dimension_id,
            dimension_codes,
            series_id,
            synthetic: false,
        }
    }
}

/// Top-level entries to walk, honouring an optional top code.
fn top_entries<'h>(hierarchy: &'h Hierarchy, top_code: Option<&str>) -> Vec<&'h HierarchicalCode> {
    let all: Vec<&HierarchicalCode> = hierarchy.codes.iter().collect();
    let Some(top_code) = top_code else {
        return all;
    };
    let matching: Vec<&HierarchicalCode> = all
        .iter()
        .copied()
        .filter(|entry| {
            entry.id.eq_ignore_ascii_case(top_code)
                || clean_node_ref(&entry.id).eq_ignore_ascii_case(top_code)
        })
        .collect();
    if matching.is_empty() {
        debug!(hierarchy = %hierarchy.id, top_code, "Top code not found, keeping every entry");
        all
    } else {
        matching
    }
}

/// Full labels from the root down to `parent`.
fn ancestor_labels(tree: &ParsedHierarchy, parent: Option<NodeIndex>) -> Vec<String> {
    let mut labels = Vec::new();
    let mut current = parent;
    while let Some(idx) = current {
        let node = tree.node(idx);
        labels.push(node.full_label.clone());
        current = node.parent;
    }
    labels.reverse();
    labels
}

/// Convenience wrapper: parses with the default post-passes.
pub fn parse_hierarchy(
    hierarchy: &Hierarchy,
    flow: &Dataflow,
    structure: &DataStructure,
    resolver: &dyn CodeResolver,
    options: &ParseOptions,
    warnings: &mut Warnings,
) -> ParsedHierarchy {
    HierarchyParser::new(flow, structure, resolver).parse(hierarchy, options, warnings)
}

