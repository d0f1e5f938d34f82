//! The remote service seam and its request/response types.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use sdmx_model::{Codelist, DataStructure, Dataflow, Frequency, Hierarchy};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Structural metadata published by a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureBundle {
    #[serde(default)]
    pub dataflows: Vec<Dataflow>,
    #[serde(default)]
    pub structures: Vec<DataStructure>,
    #[serde(default)]
    pub hierarchies: Vec<Hierarchy>,
}

/// Request for the values that remain legal given a partial key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AvailabilityQuery {
    pub agency: String,
    pub dataflow: String,
    /// Dot-separated series key; `*` leaves a dimension open.
    pub key: String,
    /// Dimension to report on, or all dimensions when `None`.
    pub component: Option<String>,
}

/// Legal values per dimension plus the annotated time coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub values: BTreeMap<String, BTreeSet<String>>,
    pub time_start: Option<String>,
    pub time_end: Option<String>,
    pub series_count: Option<u64>,
}

impl Availability {
    /// Legal values for a dimension, sorted. Lookup is case-insensitive.
    pub fn values_for(&self, dimension: &str) -> Vec<String> {
        self.values
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(dimension))
            .map(|(_, values)| values.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_dimension(&self, dimension: &str) -> bool {
        self.values
            .keys()
            .any(|id| id.eq_ignore_ascii_case(dimension))
    }
}

/// Request for observations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataQuery {
    pub agency: String,
    pub dataflow: String,
    /// Dot-separated series key.
    pub key: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Frequency of the request, which decides the precision of the time filter.
    pub frequency: Option<Frequency>,
    /// Keep only the last N observations of each series.
    pub last_n: Option<u32>,
    /// Additional query parameters passed through unchanged.
    pub params: BTreeMap<String, String>,
}

/// One observation as read from the payload: raw attribute strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObservation {
    /// `TIME_PERIOD`, `OBS_VALUE` and observation-level attributes.
    pub attributes: BTreeMap<String, String>,
}

/// One series: its key and attributes plus observations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSeries {
    pub attributes: BTreeMap<String, String>,
    pub observations: Vec<RawObservation>,
}

/// A group: partial key plus attributes shared by the matching series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawGroup {
    pub key: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
}

impl RawGroup {
    /// A series belongs to the group when it agrees on every key value.
    pub fn matches(&self, series: &RawSeries) -> bool {
        self.key
            .iter()
            .all(|(dim, value)| series.attributes.get(dim) == Some(value))
    }
}

/// Parsed data message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMessage {
    /// URL the message was fetched from.
    pub url: String,
    pub series: Vec<RawSeries>,
    pub groups: Vec<RawGroup>,
}

impl DataMessage {
    pub fn observation_count(&self) -> usize {
        self.series.iter().map(|s| s.observations.len()).sum()
    }

    /// Copies group attributes onto the series they apply to, without
    /// overwriting attributes the series sets itself.
    pub fn apply_groups(&mut self) {
        for group in &self.groups {
            for series in self.series.iter_mut().filter(|s| group.matches(s)) {
                for (id, value) in &group.attributes {
                    series
                        .attributes
                        .entry(id.clone())
                        .or_insert_with(|| value.clone());
                }
            }
        }
    }
}

/// A remote SDMX service. Calls are blocking.
pub trait SdmxService: Send + Sync {
    /// Root URL, used in diagnostics.
    fn base_url(&self) -> &str;

    /// Dataflows, data structures and hierarchies.
    fn structures(&self) -> Result<StructureBundle>;

    /// Every codelist referenced by a dataflow, in one call.
    fn codelists_for_dataflow(&self, agency: &str, dataflow: &str) -> Result<Vec<Codelist>>;

    /// One codelist by id.
    fn codelist(&self, agency: &str, id: &str) -> Result<Codelist>;

    fn availability(&self, query: &AvailabilityQuery) -> Result<Availability>;

    fn data(&self, query: &DataQuery) -> Result<DataMessage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(pairs: &[(&str, &str)]) -> RawSeries {
        RawSeries {
            attributes: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            observations: Vec::new(),
        }
    }

    #[test]
    fn group_attributes_fill_matching_series_only() {
        let mut message = DataMessage {
            url: String::new(),
            series: vec![
                series(&[("COUNTRY", "BRA"), ("INDICATOR", "CA")]),
                series(&[("COUNTRY", "ARG"), ("INDICATOR", "CA"), ("UNIT", "EUR")]),
            ],
            groups: vec![RawGroup {
                key: BTreeMap::from([("INDICATOR".to_string(), "CA".to_string())]),
                attributes: BTreeMap::from([("UNIT".to_string(), "USD".to_string())]),
            }],
        };
        message.apply_groups();
        assert_eq!(message.series[0].attributes["UNIT"], "USD");
        assert_eq!(message.series[1].attributes["UNIT"], "EUR");
    }

    #[test]
    fn availability_lookup_is_case_insensitive() {
        let availability = Availability {
            values: BTreeMap::from([(
                "INDICATOR".to_string(),
                BTreeSet::from(["KA".to_string(), "CA".to_string()]),
            )]),
            ..Availability::default()
        };
        assert_eq!(availability.values_for("indicator"), ["CA", "KA"]);
        assert!(availability.values_for("COUNTRY").is_empty());
    }
}
