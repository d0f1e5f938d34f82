//! Raw presentation hierarchies as published by the service.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::urn::CodeUrn;

/// One entry of a hierarchy tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchicalCode {
    /// Node id, unique among siblings.
    pub id: String,
    /// URN of the concrete code this entry presents.
    pub code_urn: String,
    /// Authored nesting level. Informational only, upstream levels are inconsistent.
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub children: Vec<HierarchicalCode>,
}

impl HierarchicalCode {
    pub fn new(id: impl Into<String>, code_urn: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code_urn: code_urn.into(),
            level: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<HierarchicalCode>) -> Self {
        self.children = children;
        self
    }
}

/// A presentation table: an authored tree over codes of one or more codelists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub id: String,
    pub agency: String,
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Value of the `owningCodelistUrn` annotation, when present.
    #[serde(default)]
    pub owning_codelist_urn: Option<String>,
    pub codes: Vec<HierarchicalCode>,
}

impl Hierarchy {
    /// Codelist this hierarchy primarily presents.
    ///
    /// Uses the owning codelist annotation and falls back to the codelist of the
    /// first top-level entry.
    pub fn primary_codelist(&self) -> Option<String> {
        self.owning_codelist_urn
            .as_deref()
            .and_then(CodeUrn::parse)
            .or_else(|| self.codes.first().and_then(|code| CodeUrn::parse(&code.code_urn)))
            .map(|urn| urn.maintainable_id)
    }

    /// Every codelist referenced anywhere in the tree.
    pub fn referenced_codelists(&self) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut stack: Vec<&HierarchicalCode> = self.codes.iter().collect();
        while let Some(code) = stack.pop() {
            if let Some(urn) = CodeUrn::parse(&code.code_urn) {
                found.insert(urn.maintainable_id);
            }
            stack.extend(code.children.iter());
        }
        found
    }

    /// Total number of entries in the tree.
    pub fn entry_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&HierarchicalCode> = self.codes.iter().collect();
        while let Some(code) = stack.pop() {
            count += 1;
            stack.extend(code.children.iter());
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urn(codelist: &str, code: &str) -> String {
        format!("urn:sdmx:org.sdmx.infomodel.codelist.Code=IMF:{codelist}(1.0).{code}")
    }

    fn sample() -> Hierarchy {
        Hierarchy {
            id: "H_BOP".to_string(),
            agency: "IMF".to_string(),
            version: "1.0".to_string(),
            name: "Balance of payments".to_string(),
            description: None,
            owning_codelist_urn: None,
            codes: vec![
                HierarchicalCode::new("CA", urn("CL_BOP_INDICATOR", "CA")).with_children(vec![
                    HierarchicalCode::new("A_P", urn("CL_BOP_ACCOUNTING_ENTRY", "A_P")),
                ]),
            ],
        }
    }

    #[test]
    fn primary_codelist_falls_back_to_first_code() {
        let mut hierarchy = sample();
        assert_eq!(hierarchy.primary_codelist().as_deref(), Some("CL_BOP_INDICATOR"));

        hierarchy.owning_codelist_urn =
            Some("urn:sdmx:org.sdmx.infomodel.codelist.Codelist=IMF:CL_OWNER(2.0)".to_string());
        assert_eq!(hierarchy.primary_codelist().as_deref(), Some("CL_OWNER"));
    }

    #[test]
    fn referenced_codelists_scans_all_levels() {
        let hierarchy = sample();
        let codelists: Vec<_> = hierarchy.referenced_codelists().into_iter().collect();
        assert_eq!(codelists, ["CL_BOP_ACCOUNTING_ENTRY", "CL_BOP_INDICATOR"]);
        assert_eq!(hierarchy.entry_count(), 2);
    }
}
