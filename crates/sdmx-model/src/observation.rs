//! Observation rows as returned by a data query, before hierarchy matching.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single observation with its series key and resolved attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    /// `{dataflow}::{indicator codes}` key identifying the series.
    pub series_id: String,
    /// Dimension id to code.
    pub dimensions: BTreeMap<String, String>,
    /// Dimension id to display label.
    pub labels: BTreeMap<String, String>,
    /// Title composed from the descriptive dimensions of the series.
    pub title: String,
    pub time_period: String,
    /// End date of the period, when it parses.
    pub date: Option<NaiveDate>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub scale: Option<String>,
    /// Power of ten applied to values, from the `SCALE` attribute.
    pub unit_multiplier: Option<f64>,
    pub derivation_type: Option<String>,
}

impl ObservationRow {
    pub fn code(&self, dimension: &str) -> Option<&str> {
        self.dimensions.get(dimension).map(String::as_str)
    }

    pub fn label(&self, dimension: &str) -> Option<&str> {
        self.labels.get(dimension).map(String::as_str)
    }

    /// Country label of the row, from any of the area-like dimensions.
    pub fn country(&self) -> Option<&str> {
        ["COUNTRY", "REF_AREA", "JURISDICTION"]
            .iter()
            .find_map(|dim| self.label(dim).or_else(|| self.code(dim)))
    }
}
