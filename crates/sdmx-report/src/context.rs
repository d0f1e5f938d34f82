//! Hierarchy context for shortening row titles.
//!
//! Table rows repeat the words of their ancestors: `"Financial account,
//! Direct investment"` sits under `"Financial account"`, and `"Goods,
//! Credit"` sits next to `"Goods, Net"`. [`HierarchyContext`] knows every
//! order's title and level and strips what the surrounding rows already say.
//!
//! Entries are kept in order, so the ancestors of a row are found by walking
//! backwards to each lower level, and its siblings are the rows of the same
//! level between two lower-level rows.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use sdmx_model::{MatchedRow, RowOrder};

use crate::units::{is_bop_suffix_only, is_qualifier, strip_title_suffix};

/// Where an ancestor title splits into parts: `", "` before a capital or a colon.
static PART_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r", [A-Z:]").expect("valid part regex"));

/// Title endings that make a shared sibling prefix the meaningful name.
const ENTRY_ENDINGS: &[&str] = &[
    ", Credit",
    ", Debit",
    ", Net",
    ", Credit/Revenue",
    ", Debit/Expenditure",
    ", Assets",
    ", Liabilities",
    " Assets",
    " Liabilities",
];

/// Ancestor parts never stripped from the end of a title.
const PROTECTED_SUFFIXES: &[&str] = &[
    "Assets",
    "Liabilities",
    "Net",
    "Credit",
    "Debit",
    "Credit/Revenue",
    "Debit/Expenditure",
];

/// One-word ancestor parts that may still be stripped as a prefix.
const STRIPPABLE_WORDS: &[&str] = &["Assets", "Liabilities"];

/// Minimum number of displayed siblings sharing a prefix before it is dropped.
const MIN_SHARED_SIBLINGS: usize = 3;

/// The representative title and level of one table order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntry {
    pub order: RowOrder,
    pub title: String,
    pub level: u32,
    pub is_header: bool,
}

/// A simplified title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Simplified {
    pub title: String,
    /// Base name of a Credit/Debit pair whose `"<base>, Net"` sibling heads it.
    pub net_group: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HierarchyContext {
    entries: Vec<ContextEntry>,
}

impl HierarchyContext {
    pub fn new(mut entries: Vec<ContextEntry>) -> Self {
        entries.sort_by_key(|entry| entry.order);
        entries.dedup_by_key(|entry| entry.order);
        Self { entries }
    }

    /// One entry per order: a header row when there is one, otherwise the row
    /// with the longest title.
    pub fn from_rows<'r>(rows: impl IntoIterator<Item = &'r MatchedRow>) -> Self {
        let mut best: BTreeMap<RowOrder, &MatchedRow> = BTreeMap::new();
        for row in rows {
            best.entry(row.order)
                .and_modify(|current| {
                    let better = (row.is_header, row.title.len())
                        > (current.is_header, current.title.len());
                    if better {
                        *current = row;
                    }
                })
                .or_insert(row);
        }
        let entries = best
            .into_values()
            .map(|row| ContextEntry {
                order: row.order,
                title: strip_title_suffix(&row.title).to_string(),
                level: row.level,
                is_header: row.is_header,
            })
            .collect();
        Self::new(entries)
    }

    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    pub fn entry(&self, order: RowOrder) -> Option<&ContextEntry> {
        self.position(order).map(|idx| &self.entries[idx])
    }

    fn position(&self, order: RowOrder) -> Option<usize> {
        self.entries.binary_search_by_key(&order, |entry| entry.order).ok()
    }

    /// Nearest entry at each lower level, closest first.
    pub fn ancestors(&self, order: RowOrder) -> Vec<&ContextEntry> {
        self.position(order).map(|idx| self.ancestors_at(idx)).unwrap_or_default()
    }

    fn ancestors_at(&self, idx: usize) -> Vec<&ContextEntry> {
        let mut ceiling = self.entries[idx].level;
        let mut found = Vec::new();
        for entry in self.entries[..idx].iter().rev() {
            if ceiling == 0 {
                break;
            }
            if entry.level < ceiling {
                ceiling = entry.level;
                found.push(entry);
            }
        }
        found
    }

    /// Entries at the same level between the surrounding lower-level entries.
    fn siblings_at(&self, idx: usize) -> Vec<&ContextEntry> {
        let level = self.entries[idx].level;
        let start = self.entries[..idx]
            .iter()
            .rposition(|entry| entry.level < level)
            .map_or(0, |at| at + 1);
        let end = self.entries[idx + 1..]
            .iter()
            .position(|entry| entry.level < level)
            .map_or(self.entries.len(), |at| idx + 1 + at);
        self.entries[start..end]
            .iter()
            .filter(|entry| entry.level == level)
            .collect()
    }

    /// The sibling of `order` titled `"<base>, Net"`.
    pub fn net_sibling(&self, order: RowOrder, base: &str) -> Option<RowOrder> {
        let idx = self.position(order)?;
        self.siblings_at(idx)
            .into_iter()
            .find(|entry| is_net_of(&entry.title, base))
            .map(|entry| entry.order)
    }

    /// Shortens a title using the titles around it.
    ///
    /// Only entries in `displayed` count as context when it is given. The
    /// result is never empty and never a bare bookkeeping term, except for the
    /// Credit and Debit rows of a group headed by its Net row. Simplifying a
    /// simplified title returns it unchanged.
    pub fn simplify(
        &self,
        order: RowOrder,
        title: &str,
        displayed: Option<&BTreeSet<RowOrder>>,
    ) -> Simplified {
        let idx = self.position(order);
        let mut current = title.to_string();
        let mut net_group = None;
        loop {
            let (next, group) = self.simplify_step(idx, &current, displayed);
            if group.is_some() {
                net_group = group;
            }
            if next == current {
                break;
            }
            current = next;
        }
        Simplified {
            title: current,
            net_group,
        }
    }

    pub fn simplify_title(
        &self,
        order: RowOrder,
        title: &str,
        displayed: Option<&BTreeSet<RowOrder>>,
    ) -> String {
        self.simplify(order, title, displayed).title
    }

    /// One pass of every stripping rule. The result is never longer than the input.
    fn simplify_step(
        &self,
        idx: Option<usize>,
        title: &str,
        displayed: Option<&BTreeSet<RowOrder>>,
    ) -> (String, Option<String>) {
        let start = strip_title_suffix(title);
        let Some(idx) = idx else {
            return (start.to_string(), None);
        };
        let mut current = start.to_string();
        let mut net_group = None;

        if let Some(len) = self.best_prefix(idx, &current, displayed) {
            let relative = current[len..].trim_start_matches([',', ' ', ':']);
            if !relative.is_empty() && len < current.len() {
                current = relative.to_string();
            }
        }

        if let Some(len) = self.sibling_common_prefix(idx, &current, displayed)
            && len < current.len()
        {
            current.replace_range(..len, "");
        }

        if let Some(len) = self.bop_group_prefix(idx, &current, displayed)
            && len < current.len()
        {
            net_group = Some(current[..len - 2].to_string());
            current.replace_range(..len, "");
        }

        while let Some(len) = self.ancestor_part_prefix(idx, &current, displayed) {
            current.replace_range(..len, "");
        }
        while let Some(len) = self.best_suffix(idx, &current, displayed) {
            current.truncate(current.len() - len);
        }

        if net_group.is_none() && is_qualifier(&current) {
            return (start.to_string(), None);
        }
        if current.trim().is_empty() {
            return (start.to_string(), None);
        }
        (current, net_group)
    }

    fn displayed_ancestors<'s>(
        &'s self,
        idx: usize,
        displayed: Option<&'s BTreeSet<RowOrder>>,
    ) -> impl Iterator<Item = &'s ContextEntry> {
        self.ancestors_at(idx)
            .into_iter()
            .filter(move |entry| is_displayed(entry, displayed) && !entry.title.is_empty())
    }

    /// Length of the longest displayed ancestor title that starts `title`.
    ///
    /// Falls back to an ancestor's key phrase followed by `", "`, `": "` or
    /// `" - "`. Never leaves only a bookkeeping term behind.
    fn best_prefix(
        &self,
        idx: usize,
        title: &str,
        displayed: Option<&BTreeSet<RowOrder>>,
    ) -> Option<usize> {
        let ancestors: Vec<&ContextEntry> = self.displayed_ancestors(idx, displayed).collect();
        let mut best = ancestors
            .iter()
            .filter(|entry| title.starts_with(entry.title.as_str()))
            .map(|entry| entry.title.len())
            .max();

        if best.is_none() {
            let mut phrases: Vec<String> = ancestors
                .iter()
                .map(|entry| key_phrase(&entry.title))
                .collect();
            phrases.sort_by_key(|phrase| std::cmp::Reverse(phrase.len()));
            let target = normalize(title);
            best = phrases.iter().filter(|phrase| !phrase.is_empty()).find_map(|phrase| {
                [", ", ": ", " - "].into_iter().find_map(|sep| {
                    let pattern = format!("{phrase}{sep}");
                    target.starts_with(&pattern).then_some(pattern.len())
                })
            });
        }

        best.filter(|len| !is_bop_suffix_only(title[*len..].trim_start_matches([',', ' ', ':'])))
    }

    /// Length of a `", "`-terminated prefix shared by at least three displayed siblings.
    fn sibling_common_prefix(
        &self,
        idx: usize,
        title: &str,
        displayed: Option<&BTreeSet<RowOrder>>,
    ) -> Option<usize> {
        let siblings: Vec<&str> = self
            .siblings_at(idx)
            .into_iter()
            .filter(|entry| is_displayed(entry, displayed) && !entry.title.is_empty())
            .map(|entry| entry.title.as_str())
            .collect();
        if siblings.len() < MIN_SHARED_SIBLINGS {
            return None;
        }

        let segmented: Vec<Vec<&str>> = siblings.iter().map(|t| prefix_segments(t)).collect();
        let shortest = segmented.iter().map(Vec::len).min().unwrap_or(0);
        let first = &segmented[0];
        let shared = (0..shortest)
            .take_while(|i| segmented.iter().all(|segs| segs[*i].eq_ignore_ascii_case(first[*i])))
            .count();
        if shared == 0 {
            return None;
        }

        let len: usize = first[..shared].iter().map(|seg| seg.len()).sum();
        let prefix = &siblings[0][..len];
        let matches = title.get(..len).is_some_and(|head| head.eq_ignore_ascii_case(prefix));
        let all_entries = siblings
            .iter()
            .all(|t| ENTRY_ENDINGS.iter().any(|ending| t.ends_with(ending)));
        (matches && !all_entries).then_some(len)
    }

    /// Length of `"<base>, "` for a Credit or Debit title with a displayed
    /// `"<base>, Net"` sibling. Net titles head their group and keep their base.
    fn bop_group_prefix(
        &self,
        idx: usize,
        title: &str,
        displayed: Option<&BTreeSet<RowOrder>>,
    ) -> Option<usize> {
        let base = title
            .strip_suffix(", Credit")
            .or_else(|| title.strip_suffix(", Debit"))?;
        self.siblings_at(idx)
            .into_iter()
            .filter(|entry| is_displayed(entry, displayed))
            .any(|entry| is_net_of(&entry.title, base))
            .then_some(base.len() + 2)
    }

    /// Length of a trailing `", <part>"` that repeats a displayed ancestor's part.
    fn best_suffix(
        &self,
        idx: usize,
        title: &str,
        displayed: Option<&BTreeSet<RowOrder>>,
    ) -> Option<usize> {
        let mut parts = BTreeSet::new();
        for entry in self.displayed_ancestors(idx, displayed) {
            for part in title_parts(&entry.title) {
                parts.insert(part.to_string());
                for implied in implied_parts(part) {
                    parts.insert((*implied).to_string());
                }
            }
        }
        parts
            .iter()
            .filter(|part| !PROTECTED_SUFFIXES.contains(&part.as_str()))
            .map(|part| format!(", {part}"))
            .find(|suffix| title.ends_with(suffix.as_str()) && suffix.len() < title.len())
            .map(|suffix| suffix.len())
    }

    /// Length of a leading `"<part>, "` or `"<part>: "` that repeats a displayed
    /// ancestor's part, or a shortened form of one.
    fn ancestor_part_prefix(
        &self,
        idx: usize,
        title: &str,
        displayed: Option<&BTreeSet<RowOrder>>,
    ) -> Option<usize> {
        let mut parts = BTreeSet::new();
        for entry in self.displayed_ancestors(idx, displayed) {
            if entry.title == title {
                continue;
            }
            for part in title_parts(&entry.title) {
                parts.insert(part.to_string());
                if part == "Liabilities" {
                    parts.insert("Total liabilities".to_string());
                }
            }
        }
        if parts.is_empty() {
            return None;
        }

        let target = normalize(title);
        for part in &parts {
            if !part.contains(' ') && !STRIPPABLE_WORDS.contains(&part.as_str()) {
                continue;
            }
            let part = normalize(part);
            for sep in [", ", ": "] {
                let len = part.len() + sep.len();
                let matches = target.starts_with(&part) && target[part.len()..].starts_with(sep);
                if matches && !is_bop_suffix_only(&title[len..]) {
                    return Some(len);
                }
            }
        }

        let comma = title.find(", ")?;
        let head = &target[..comma];
        let remainder = &title[comma + 2..];
        let partial = head.len() > 10 && parts.iter().any(|part| normalize(part).starts_with(head));
        (partial && !is_bop_suffix_only(remainder)).then_some(comma + 2)
    }
}

fn is_displayed(entry: &ContextEntry, displayed: Option<&BTreeSet<RowOrder>>) -> bool {
    displayed.is_none_or(|orders| orders.contains(&entry.order))
}

fn is_net_of(title: &str, base: &str) -> bool {
    title
        .strip_suffix(", Net")
        .is_some_and(|head| {
            head == base
                || head
                    .strip_suffix(base)
                    .is_some_and(|rest| rest.ends_with(", "))
        })
}

/// Lowercase with hyphens read as spaces; byte offsets match the input.
fn normalize(text: &str) -> String {
    text.to_ascii_lowercase().replace('-', " ")
}

/// An ancestor title reduced to the entity it names.
fn key_phrase(title: &str) -> String {
    let base = crate::units::split_parenthetical(title).map_or(title, |(base, _)| base);
    let phrase = normalize(base);
    phrase.strip_suffix(" survey").map(str::to_string).unwrap_or(phrase).trim().to_string()
}

/// `"A, B, C"` as `["A, ", "B, "]`: every segment that ends in `", "`.
fn prefix_segments(title: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (at, sep) in title.match_indices(", ") {
        segments.push(&title[start..at + sep.len()]);
        start = at + sep.len();
    }
    segments
}

/// Splits a title on `", "` followed by a capital letter or a colon.
fn title_parts(title: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for found in PART_BREAK.find_iter(title) {
        parts.push(title[start..found.start()].trim());
        start = found.start() + 2;
    }
    parts.push(title[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// Parts that an ancestor part implies without spelling out.
fn implied_parts(part: &str) -> &'static [&'static str] {
    if part == "Liabilities" || part.contains("Creditors") {
        &["Net incurrence of liabilities", "Total liabilities"]
    } else if part == "Financial assets" {
        &["Assets"]
    } else if part.contains("Debtors") {
        &["Net acquisition of financial assets", "Assets"]
    } else {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(node: u32, title: &str, level: u32, is_header: bool) -> ContextEntry {
        ContextEntry {
            order: RowOrder::new(node, 0),
            title: title.to_string(),
            level,
            is_header,
        }
    }

    fn bop() -> HierarchyContext {
        HierarchyContext::new(vec![
            entry(1, "Current account", 0, true),
            entry(3, "Goods, Credit", 1, false),
            entry(4, "Goods, Debit", 1, false),
            entry(5, "Goods, Net", 1, false),
            entry(10, "Financial account", 0, true),
            entry(11, "Financial account, Direct investment", 1, false),
            entry(12, "Financial account, Portfolio investment", 1, false),
            entry(20, "Domestic Creditors, Liabilities", 0, true),
            entry(
                21,
                "Currency and deposits, Net incurrence of liabilities, Domestic Creditors",
                1,
                false,
            ),
        ])
    }

    fn order(node: u32) -> RowOrder {
        RowOrder::new(node, 0)
    }

    #[test]
    fn credit_and_debit_lose_their_base_next_to_net() {
        let ctx = bop();
        let credit = ctx.simplify(order(3), "Goods, Credit", None);
        assert_eq!(credit.title, "Credit");
        assert_eq!(credit.net_group.as_deref(), Some("Goods"));
        assert_eq!(ctx.simplify_title(order(5), "Goods, Net", None), "Goods, Net");
        assert_eq!(ctx.net_sibling(order(4), "Goods"), Some(order(5)));
    }

    #[test]
    fn net_must_be_displayed_for_grouping() {
        let ctx = bop();
        let displayed = BTreeSet::from([order(1), order(3), order(4)]);
        assert_eq!(
            ctx.simplify_title(order(3), "Goods, Credit", Some(&displayed)),
            "Goods, Credit"
        );
    }

    #[test]
    fn ancestor_prefix_and_suffix_are_stripped() {
        let ctx = bop();
        assert_eq!(
            ctx.simplify_title(order(11), "Financial account, Direct investment, Flows", None),
            "Direct investment"
        );
        assert_eq!(
            ctx.simplify_title(
                order(21),
                "Currency and deposits, Net incurrence of liabilities, Domestic Creditors",
                None
            ),
            "Currency and deposits"
        );
    }

    #[test]
    fn titles_never_reduce_to_a_bare_qualifier() {
        let ctx = HierarchyContext::new(vec![
            entry(1, "Direct investment", 0, true),
            entry(2, "Direct investment, Assets", 1, false),
            entry(3, "Direct investment, Liabilities", 1, false),
        ]);
        assert_eq!(
            ctx.simplify_title(order(2), "Direct investment, Assets", None),
            "Direct investment, Assets"
        );
    }

    #[test]
    fn shared_sibling_prefix_needs_three_siblings() {
        let ctx = HierarchyContext::new(vec![
            entry(1, "Depository corporations", 0, true),
            entry(2, "Liabilities, Deposits", 1, false),
            entry(3, "Liabilities, Loans", 1, false),
            entry(4, "Liabilities, Securities", 1, false),
        ]);
        assert_eq!(ctx.simplify_title(order(3), "Liabilities, Loans", None), "Loans");

        let displayed = BTreeSet::from([order(1), order(2), order(3)]);
        assert_eq!(
            ctx.simplify_title(order(3), "Liabilities, Loans", Some(&displayed)),
            "Liabilities, Loans"
        );
    }

    #[test]
    fn unknown_orders_only_lose_suffixes() {
        let ctx = bop();
        assert_eq!(ctx.simplify_title(order(99), "Goods (US Dollar, Millions)", None), "Goods");
    }

    #[test]
    fn parts_split_before_capitals() {
        assert_eq!(
            title_parts("Loans, Net incurrence of liabilities, Domestic Creditors"),
            ["Loans", "Net incurrence of liabilities", "Domestic Creditors"]
        );
        assert_eq!(title_parts("Cars, trucks, Other"), ["Cars, trucks", "Other"]);
        assert_eq!(prefix_segments("A, B, C"), ["A, ", "B, "]);
    }
}
