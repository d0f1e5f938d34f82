//! SDMX-JSON structure and availability messages.
//!
//! Only the fields the engine uses are modelled; everything else is ignored.
//! Localised text comes either as a plain `name` or a `names` map, with English
//! preferred.

use std::collections::{BTreeMap, BTreeSet};

use sdmx_model::{
    Attribute, Code, CodeUrn, Codelist, ConceptRef, DataStructure, Dataflow, Dimension,
    HierarchicalCode, Hierarchy,
};
use serde::Deserialize;

use crate::error::{ClientError, Result};
use crate::service::{Availability, StructureBundle};

const OWNING_CODELIST_ANNOTATION: &str = "owningCodelistUrn";

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    data: MessageData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageData {
    #[serde(default)]
    dataflows: Vec<WireDataflow>,
    #[serde(default)]
    data_structures: Vec<WireDataStructure>,
    #[serde(default)]
    codelists: Vec<WireCodelist>,
    #[serde(default)]
    hierarchies: Vec<WireHierarchy>,
    #[serde(default)]
    data_constraints: Vec<WireConstraint>,
    #[serde(default)]
    content_constraints: Vec<WireConstraint>,
}

#[derive(Debug, Default, Deserialize)]
struct Text {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    names: BTreeMap<String, String>,
}

impl Text {
    fn resolve(&self) -> Option<String> {
        self.names
            .get("en")
            .or_else(|| self.names.values().next())
            .or(self.name.as_ref())
            .cloned()
    }
}

#[derive(Debug, Default, Deserialize)]
struct Description {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    descriptions: BTreeMap<String, String>,
}

impl Description {
    fn resolve(&self) -> Option<String> {
        self.descriptions
            .get("en")
            .or_else(|| self.descriptions.values().next())
            .or(self.description.as_ref())
            .cloned()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDataflow {
    id: String,
    #[serde(rename = "agencyID", default)]
    agency_id: String,
    #[serde(default)]
    version: String,
    #[serde(flatten)]
    text: Text,
    #[serde(flatten)]
    description: Description,
    #[serde(default)]
    structure: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDataStructure {
    id: String,
    #[serde(rename = "agencyID", default)]
    agency_id: String,
    #[serde(default)]
    data_structure_components: WireComponents,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireComponents {
    #[serde(default)]
    dimension_list: WireDimensionList,
    #[serde(default)]
    attribute_list: WireAttributeList,
}

#[derive(Debug, Default, Deserialize)]
struct WireDimensionList {
    #[serde(default)]
    dimensions: Vec<WireComponent>,
}

#[derive(Debug, Default, Deserialize)]
struct WireAttributeList {
    #[serde(default)]
    attributes: Vec<WireComponent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireComponent {
    id: String,
    #[serde(default)]
    position: Option<usize>,
    #[serde(default)]
    concept_identity: Option<String>,
    #[serde(default)]
    local_representation: Option<WireRepresentation>,
}

#[derive(Debug, Deserialize)]
struct WireRepresentation {
    #[serde(default)]
    enumeration: Option<String>,
}

impl WireComponent {
    fn codelist(&self) -> Option<String> {
        self.local_representation
            .as_ref()
            .and_then(|rep| rep.enumeration.as_deref())
            .and_then(CodeUrn::parse)
            .map(|urn| urn.maintainable_id)
    }

    fn concept(&self) -> Option<ConceptRef> {
        let urn = CodeUrn::parse(self.concept_identity.as_deref()?)?;
        Some(ConceptRef {
            scheme_id: urn.maintainable_id,
            concept_id: urn.item_id?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireCodelist {
    id: String,
    #[serde(rename = "agencyID", default)]
    agency_id: String,
    #[serde(default)]
    codes: Vec<WireCode>,
}

#[derive(Debug, Deserialize)]
struct WireCode {
    id: String,
    #[serde(flatten)]
    text: Text,
    #[serde(flatten)]
    description: Description,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHierarchy {
    id: String,
    #[serde(rename = "agencyID", default)]
    agency_id: String,
    #[serde(default)]
    version: String,
    #[serde(flatten)]
    text: Text,
    #[serde(flatten)]
    description: Description,
    #[serde(default)]
    annotations: Vec<WireAnnotation>,
    #[serde(default)]
    hierarchical_codes: Vec<WireHierarchicalCode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireHierarchicalCode {
    id: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    level: Option<serde_json::Value>,
    #[serde(default)]
    hierarchical_codes: Vec<WireHierarchicalCode>,
}

#[derive(Debug, Deserialize)]
struct WireAnnotation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<serde_json::Value>,
    #[serde(default)]
    value: Option<String>,
}

impl WireAnnotation {
    fn content(&self) -> Option<String> {
        if let Some(title) = self.title.as_ref().filter(|t| !t.is_empty()) {
            return Some(title.clone());
        }
        if let Some(value) = self.value.as_ref().filter(|v| !v.is_empty()) {
            return Some(value.clone());
        }
        match self.text.as_ref()? {
            serde_json::Value::String(text) => Some(text.clone()),
            serde_json::Value::Object(map) => map
                .get("en")
                .or_else(|| map.values().next())
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireConstraint {
    #[serde(default)]
    annotations: Vec<WireAnnotation>,
    #[serde(default)]
    cube_regions: Vec<WireCubeRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCubeRegion {
    #[serde(default)]
    key_values: Vec<WireKeyValue>,
    #[serde(default)]
    components: Vec<WireKeyValue>,
}

#[derive(Debug, Deserialize)]
struct WireKeyValue {
    id: String,
    #[serde(default)]
    values: Vec<WireValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireValue {
    Plain(String),
    Object { value: Option<String> },
}

fn parse_message(url: &str, body: &str) -> Result<MessageData> {
    serde_json::from_str::<Message>(body)
        .map(|message| message.data)
        .map_err(|e| ClientError::Json {
            url: url.to_string(),
            message: e.to_string(),
        })
}

/// Parses every codelist in a structure message.
pub fn parse_codelists(url: &str, body: &str) -> Result<Vec<Codelist>> {
    let data = parse_message(url, body)?;
    Ok(data.codelists.into_iter().map(convert_codelist).collect())
}

fn convert_codelist(wire: WireCodelist) -> Codelist {
    let mut codelist = Codelist::new(wire.id, wire.agency_id);
    for code in wire.codes {
        let name = code.text.resolve().unwrap_or_else(|| code.id.clone());
        codelist.add_code(Code {
            description: code.description.resolve(),
            id: code.id,
            name,
        });
    }
    codelist
}

/// Parses dataflows, data structures and hierarchies from one or more structure messages.
pub fn parse_structures(url: &str, body: &str) -> Result<StructureBundle> {
    let data = parse_message(url, body)?;
    Ok(StructureBundle {
        dataflows: data.dataflows.into_iter().map(convert_dataflow).collect(),
        structures: data
            .data_structures
            .into_iter()
            .map(convert_structure)
            .collect(),
        hierarchies: data
            .hierarchies
            .into_iter()
            .map(convert_hierarchy)
            .collect(),
    })
}

fn convert_dataflow(wire: WireDataflow) -> Dataflow {
    let structure_id = CodeUrn::parse(&wire.structure)
        .map(|urn| urn.maintainable_id)
        .unwrap_or(wire.structure);
    Dataflow {
        name: wire.text.resolve().unwrap_or_else(|| wire.id.clone()),
        description: wire.description.resolve().unwrap_or_default(),
        id: wire.id,
        agency: wire.agency_id,
        version: wire.version,
        structure_id,
    }
}

fn convert_structure(wire: WireDataStructure) -> DataStructure {
    let components = wire.data_structure_components;
    let dimensions = components
        .dimension_list
        .dimensions
        .iter()
        .enumerate()
        .map(|(index, dim)| Dimension {
            id: dim.id.clone(),
            position: dim.position.unwrap_or(index),
            codelist: dim.codelist(),
            concept: dim.concept(),
        })
        .collect();
    let attributes = components
        .attribute_list
        .attributes
        .iter()
        .map(|attr| Attribute {
            id: attr.id.clone(),
            codelist: attr.codelist(),
            concept: attr.concept(),
        })
        .collect();
    DataStructure {
        id: wire.id,
        agency: wire.agency_id,
        dimensions,
        attributes,
    }
}

fn convert_hierarchy(wire: WireHierarchy) -> Hierarchy {
    let owning_codelist_urn = wire
        .annotations
        .iter()
        .find(|annotation| annotation.id == OWNING_CODELIST_ANNOTATION)
        .and_then(WireAnnotation::content);
    Hierarchy {
        name: wire.text.resolve().unwrap_or_else(|| wire.id.clone()),
        description: wire.description.resolve(),
        id: wire.id,
        agency: wire.agency_id,
        version: wire.version,
        owning_codelist_urn,
        codes: wire
            .hierarchical_codes
            .into_iter()
            .map(convert_hierarchical_code)
            .collect(),
    }
}

fn convert_hierarchical_code(wire: WireHierarchicalCode) -> HierarchicalCode {
    let level = wire.level.map(|level| match level {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    });
    HierarchicalCode {
        id: wire.id,
        code_urn: wire.code,
        level,
        children: wire
            .hierarchical_codes
            .into_iter()
            .map(convert_hierarchical_code)
            .collect(),
    }
}

/// Parses an availability (data constraint) message.
///
/// Values from key values and components are merged and de-duplicated. Time
/// coverage annotations are read from content constraints first, then from
/// data constraints.
pub fn parse_availability(url: &str, body: &str) -> Result<Availability> {
    let data = parse_message(url, body)?;
    let mut values: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for constraint in &data.data_constraints {
        for region in &constraint.cube_regions {
            for entry in region.key_values.iter().chain(region.components.iter()) {
                let bucket = values.entry(entry.id.clone()).or_default();
                for value in &entry.values {
                    let value = match value {
                        WireValue::Plain(text) => Some(text.as_str()),
                        WireValue::Object { value } => value.as_deref(),
                    };
                    if let Some(value) = value.filter(|v| !v.is_empty()) {
                        bucket.insert(value.to_string());
                    }
                }
            }
        }
    }

    let mut availability = Availability {
        values,
        ..Availability::default()
    };
    for constraint in data.content_constraints.iter().chain(data.data_constraints.iter()) {
        for annotation in &constraint.annotations {
            let Some(content) = annotation.content() else {
                continue;
            };
            match annotation.id.as_str() {
                "time_period_start" if availability.time_start.is_none() => {
                    availability.time_start = Some(content);
                }
                "time_period_end" if availability.time_end.is_none() => {
                    availability.time_end = Some(content);
                }
                "series_count" if availability.series_count.is_none() => {
                    availability.series_count = content.trim().parse().ok();
                }
                _ => {}
            }
        }
    }
    Ok(availability)
}
