//! Codelists: enumerable code to label mappings.
//!
//! A codelist can back several dimensions across several dataflows, so the
//! engine resolves dimensions to codelists rather than storing codes per
//! dimension.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single code with its display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Codes of one codelist keyed by code id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codelist {
    /// Codelist identifier (e.g., "CL_BOP_INDICATOR").
    pub id: String,
    /// Maintenance agency.
    #[serde(default)]
    pub agency: String,
    /// Codes keyed by id.
    #[serde(default)]
    pub codes: BTreeMap<String, Code>,
}

impl Codelist {
    pub fn new(id: impl Into<String>, agency: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agency: agency.into(),
            codes: BTreeMap::new(),
        }
    }

    /// Adds a code, replacing any previous code with the same id.
    pub fn add_code(&mut self, code: Code) {
        self.codes.insert(code.id.clone(), code);
    }

    /// Builder-style helper used by fixtures and parsers.
    #[must_use]
    pub fn with_code(mut self, id: &str, name: &str) -> Self {
        self.add_code(Code {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
        });
        self
    }

    pub fn label(&self, code: &str) -> Option<&str> {
        self.codes.get(code).map(|c| c.name.as_str())
    }

    /// Description of a code, falling back to its name.
    pub fn description(&self, code: &str) -> Option<&str> {
        self.codes
            .get(code)
            .map(|c| c.description.as_deref().unwrap_or(c.name.as_str()))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code_ids(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_falls_back_to_name() {
        let mut codelist = Codelist::new("CL_UNIT", "IMF").with_code("USD", "US Dollar");
        codelist.add_code(Code {
            id: "EUR".to_string(),
            name: "Euro".to_string(),
            description: Some("Euro area currency".to_string()),
        });

        assert_eq!(codelist.description("USD"), Some("US Dollar"));
        assert_eq!(codelist.description("EUR"), Some("Euro area currency"));
        assert_eq!(codelist.label("GBP"), None);
        assert_eq!(codelist.code_ids().collect::<Vec<_>>(), ["EUR", "USD"]);
    }
}
