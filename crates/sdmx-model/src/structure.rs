//! Dataflows and their data structure definitions.

use serde::{Deserialize, Serialize};

/// A named, queryable dataset definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataflow {
    /// Dataflow identifier (e.g., "BOP").
    pub id: String,
    /// Maintenance agency (e.g., "IMF.STA").
    pub agency: String,
    /// Dataflow version.
    pub version: String,
    /// Display name.
    pub name: String,
    /// Free-text description, empty when unpublished.
    #[serde(default)]
    pub description: String,
    /// Identifier of the data structure this dataflow is built on.
    pub structure_id: String,
}

impl Dataflow {
    /// First `_`-separated segment of the id, used by naming conventions
    /// that share codelists across dataflow variants (e.g. "QNEA_SA" -> "QNEA").
    pub fn base_id(&self) -> &str {
        self.id.split('_').next().unwrap_or(&self.id)
    }
}

/// Reference to a concept inside a concept scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptRef {
    /// Concept scheme id (e.g., "CS_MASTER_SYSTEM").
    pub scheme_id: String,
    /// Concept id within the scheme (e.g., "COUNTRY").
    pub concept_id: String,
}

/// One coded axis of a data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub id: String,
    /// Zero-based position in the series key.
    pub position: usize,
    /// Explicit codelist from the local representation, when declared.
    #[serde(default)]
    pub codelist: Option<String>,
    #[serde(default)]
    pub concept: Option<ConceptRef>,
}

/// A series or observation level attribute (unit, scale, status...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: String,
    #[serde(default)]
    pub codelist: Option<String>,
    #[serde(default)]
    pub concept: Option<ConceptRef>,
}

/// Ordered dimensions and attributes of a dataflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStructure {
    pub id: String,
    pub agency: String,
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl DataStructure {
    /// Dimensions sorted by their declared position.
    pub fn dimensions_in_order(&self) -> Vec<&Dimension> {
        let mut dims: Vec<&Dimension> = self.dimensions.iter().collect();
        dims.sort_by_key(|dim| dim.position);
        dims
    }

    /// Dimension ids sorted by position.
    pub fn dimension_ids(&self) -> Vec<String> {
        self.dimensions_in_order()
            .into_iter()
            .map(|dim| dim.id.clone())
            .collect()
    }

    /// Case-insensitive dimension lookup.
    pub fn dimension(&self, id: &str) -> Option<&Dimension> {
        self.dimensions
            .iter()
            .find(|dim| dim.id.eq_ignore_ascii_case(id))
    }

    /// Case-insensitive attribute lookup.
    pub fn attribute(&self, id: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|attr| attr.id.eq_ignore_ascii_case(id))
    }

    pub fn has_dimension(&self, id: &str) -> bool {
        self.dimension(id).is_some()
    }

    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.dimension(id).map(|dim| dim.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(id: &str, position: usize) -> Dimension {
        Dimension {
            id: id.to_string(),
            position,
            codelist: None,
            concept: None,
        }
    }

    #[test]
    fn dimensions_are_ordered_by_position() {
        let dsd = DataStructure {
            id: "DSD_BOP".to_string(),
            agency: "IMF.STA".to_string(),
            dimensions: vec![dim("FREQUENCY", 2), dim("COUNTRY", 0), dim("INDICATOR", 1)],
            attributes: Vec::new(),
        };
        assert_eq!(dsd.dimension_ids(), ["COUNTRY", "INDICATOR", "FREQUENCY"]);
        assert_eq!(dsd.position_of("indicator"), Some(1));
        assert!(!dsd.has_dimension("SECTOR"));
    }

    #[test]
    fn base_id_takes_first_segment() {
        let flow = Dataflow {
            id: "QNEA_SA".to_string(),
            agency: "IMF.STA".to_string(),
            version: "1.0".to_string(),
            name: "Quarterly national accounts".to_string(),
            description: String::new(),
            structure_id: "DSD_QNEA".to_string(),
        };
        assert_eq!(flow.base_id(), "QNEA");
    }
}
