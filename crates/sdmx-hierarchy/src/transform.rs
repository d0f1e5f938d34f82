//! Post-parse transforms.
//!
//! Each [`PostPass`] fixes one structural quirk of published hierarchies. The
//! passes run repeatedly until none of them changes the tree, so applying the
//! whole set a second time is a no-op.

use std::collections::BTreeMap;

use sdmx_model::{IndicatorNode, NodeIndex, clean_node_ref};
use tracing::{debug, warn};

use crate::tree::ParsedHierarchy;

/// Upper bound on fixpoint rounds. Every pass strictly simplifies the tree,
/// so this is only reached by a faulty pass.
const MAX_ROUNDS: usize = 64;

/// A structural rewrite applied after the base parse.
pub trait PostPass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Applies one rewrite. Returns true when the tree changed.
    ///
    /// Passes may leave order and depth stale; the runner renumbers.
    fn apply(&self, tree: &mut ParsedHierarchy) -> bool;
}

/// Passes applied by default: instrument re-parenting, then synthetic groups.
pub fn default_passes() -> Vec<Box<dyn PostPass>> {
    vec![
        Box::new(ReparentSiblings::instruments()),
        Box::new(SyntheticGroups::default()),
    ]
}

/// Runs the passes until none of them changes the tree.
pub fn apply_post_passes(tree: &mut ParsedHierarchy, passes: &[Box<dyn PostPass>]) {
    for _ in 0..MAX_ROUNDS {
        let mut changed = false;
        for pass in passes {
            if pass.apply(tree) {
                debug!(hierarchy = %tree.id, pass = pass.name(), "Post-pass changed tree");
                tree.renumber();
                changed = true;
            }
        }
        if !changed {
            return;
        }
    }
    warn!(hierarchy = %tree.id, "Post-passes did not settle");
}

/// Moves listed children of a named node up to be its siblings.
///
/// Some reserve templates nest instrument types ("futures", "swaps") under
/// "forwards" although they sit at the same level.
#[derive(Debug, Clone)]
pub struct ReparentSiblings {
    /// Label of the node whose children are misplaced, compared case-insensitively.
    pub parent_label: String,
    /// Child labels to move, compared case-insensitively.
    pub child_labels: Vec<String>,
}

impl ReparentSiblings {
    pub fn instruments() -> Self {
        Self {
            parent_label: "forwards".to_string(),
            child_labels: ["futures", "swaps", "options", "other"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    fn is_listed_child(&self, node: &IndicatorNode) -> bool {
        self.child_labels
            .iter()
            .any(|label| label.eq_ignore_ascii_case(&node.label))
    }
}

impl PostPass for ReparentSiblings {
    fn name(&self) -> &'static str {
        "reparent_siblings"
    }

    fn apply(&self, tree: &mut ParsedHierarchy) -> bool {
        let Some(anchor) = tree
            .sequence()
            .iter()
            .copied()
            .find(|idx| tree.node(*idx).label.eq_ignore_ascii_case(&self.parent_label))
        else {
            return false;
        };
        let moved: Vec<NodeIndex> = tree
            .children(anchor)
            .iter()
            .copied()
            .filter(|idx| self.is_listed_child(tree.node(*idx)))
            .collect();
        if moved.is_empty() {
            return false;
        }

        let grandparent = tree.node(anchor).parent;
        let mut position = tree
            .siblings(grandparent)
            .iter()
            .position(|idx| *idx == anchor)
            .map_or(0, |at| at + 1);
        for idx in moved {
            tree.move_node(idx, grandparent, Some(position));
            position += 1;
        }
        true
    }
}

/// Groups siblings whose comma-separated labels share a first or last part.
///
/// "Up to 1 month, Long positions", "1 to 3 months, Long positions" and a
/// third such sibling get a synthetic "Long positions" parent and keep only
/// the part that differs.
#[derive(Debug, Clone)]
pub struct SyntheticGroups {
    pub min_siblings: usize,
}

impl Default for SyntheticGroups {
    fn default() -> Self {
        Self { min_siblings: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Prefix,
    Suffix,
}

struct Bucket {
    segment: String,
    side: Side,
    members: Vec<NodeIndex>,
}

impl SyntheticGroups {
    /// Largest qualifying bucket among one parent's children; suffixes win ties.
    fn best_bucket(&self, tree: &ParsedHierarchy, parent: Option<NodeIndex>) -> Option<Bucket> {
        let parent_label = parent.map(|idx| tree.node(idx).label.as_str());
        let siblings = tree.siblings(parent);
        let mut best: Option<Bucket> = None;
        for side in [Side::Suffix, Side::Prefix] {
            // segment -> members, in first-seen order
            let mut buckets: Vec<(String, Vec<NodeIndex>)> = Vec::new();
            let mut slots: BTreeMap<String, usize> = BTreeMap::new();
            for idx in siblings {
                let label = &tree.node(*idx).label;
                let parts: Vec<&str> = label.split(", ").collect();
                if parts.len() < 2 {
                    continue;
                }
                let segment = match side {
                    Side::Prefix => parts[0],
                    Side::Suffix => parts[parts.len() - 1],
                };
                if segment.trim().is_empty()
                    || parent_label.is_some_and(|p| p.eq_ignore_ascii_case(segment))
                {
                    continue;
                }
                let slot = *slots.entry(segment.to_string()).or_insert_with(|| {
                    buckets.push((segment.to_string(), Vec::new()));
                    buckets.len() - 1
                });
                buckets[slot].1.push(*idx);
            }
            for (segment, members) in buckets {
                let better = members.len() >= self.min_siblings
                    && best.as_ref().is_none_or(|b| members.len() > b.members.len());
                if better {
                    best = Some(Bucket { segment, side, members });
                }
            }
        }
        best
    }
}

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .take(30)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn strip_segment(label: &str, side: Side) -> String {
    let mut parts: Vec<&str> = label.split(", ").collect();
    match side {
        Side::Prefix => {
            parts.remove(0);
        }
        Side::Suffix => {
            parts.pop();
        }
    }
    parts.join(", ")
}

impl PostPass for SyntheticGroups {
    fn name(&self) -> &'static str {
        "synthetic_groups"
    }

    fn apply(&self, tree: &mut ParsedHierarchy) -> bool {
        let parents: Vec<Option<NodeIndex>> = std::iter::once(None)
            .chain(tree.sequence().iter().copied().map(Some))
            .collect();
        let Some((parent, bucket)) = parents
            .into_iter()
            .find_map(|parent| self.best_bucket(tree, parent).map(|bucket| (parent, bucket)))
        else {
            return false;
        };

        let parent_ref = parent.map_or_else(
            || "ROOT".to_string(),
            |idx| clean_node_ref(&tree.node(idx).id).to_string(),
        );
        let stem = format!("_SYNTH_{parent_ref}_{}", sanitize(&bucket.segment));
        let mut suffix = 0;
        let id = loop {
            let candidate = format!("{stem}_{suffix}");
            if tree.find(&candidate).is_none() {
                break candidate;
            }
            suffix += 1;
        };

        let dimension_codes = parent
            .map(|idx| tree.node(idx).dimension_codes.clone())
            .unwrap_or_default();
        let position = tree
            .siblings(parent)
            .iter()
            .position(|idx| *idx == bucket.members[0]);
        let group = IndicatorNode {
            id,
            indicator_code: None,
            codelist_id: None,
            label: bucket.segment.clone(),
            full_label: bucket.segment.clone(),
            description: None,
            order: 0,
            depth: 0,
            parent_id: None,
            parent,
            is_group: true,
            dimension_id: None,
            dimension_codes,
            series_id: None,
            synthetic: true,
        };
        let group_idx = tree.insert(group, parent, position);
        for member in bucket.members {
            tree.move_node(member, Some(group_idx), None);
            let node = tree.node_mut(member);
            node.label = strip_segment(&node.label, bucket.side);
        }
        true
    }
}
