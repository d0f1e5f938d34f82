//! In-memory SDMX service backed by a fixture of series.
//!
//! Availability is computed the way a real service does it: series whose key
//! matches the partial key are collected and their dimension values reported.
//! Used by tests across the workspace and by the CLI's offline mode.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Days;
use sdmx_model::period::{parse_period_end, parse_period_start};
use sdmx_model::{Codelist, DataStructure};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::service::{
    Availability, AvailabilityQuery, DataMessage, DataQuery, RawObservation, RawSeries, SdmxService,
    StructureBundle,
};
use crate::urls;

const BASE_URL: &str = "memory://fixture";

/// One observation of a fixture series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureObservation {
    pub period: String,
    pub value: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A series of a fixture: full key plus series attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSeries {
    pub dataflow: String,
    pub key: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub observations: Vec<FixtureObservation>,
}

impl FixtureSeries {
    pub fn new(dataflow: &str, key: &[(&str, &str)]) -> Self {
        Self {
            dataflow: dataflow.to_string(),
            key: key
                .iter()
                .map(|(dim, code)| ((*dim).to_string(), (*code).to_string()))
                .collect(),
            attributes: BTreeMap::new(),
            observations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, id: &str, value: &str) -> Self {
        self.attributes.insert(id.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_observation(mut self, period: &str, value: &str) -> Self {
        self.observations.push(FixtureObservation {
            period: period.to_string(),
            value: Some(value.to_string()),
            attributes: BTreeMap::new(),
        });
        self
    }
}

/// Everything an [`InMemoryService`] serves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(flatten)]
    pub structures: StructureBundle,
    #[serde(default)]
    pub codelists: Vec<Codelist>,
    #[serde(default)]
    pub series: Vec<FixtureSeries>,
}

/// Service endpoints, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Structures,
    BulkCodelists,
    Codelist,
    Availability,
    Data,
}

impl Endpoint {
    const ALL: [Endpoint; 5] = [
        Endpoint::Structures,
        Endpoint::BulkCodelists,
        Endpoint::Codelist,
        Endpoint::Availability,
        Endpoint::Data,
    ];

    fn index(self) -> usize {
        match self {
            Self::Structures => 0,
            Self::BulkCodelists => 1,
            Self::Codelist => 2,
            Self::Availability => 3,
            Self::Data => 4,
        }
    }
}

/// Fixture-backed [`SdmxService`].
pub struct InMemoryService {
    fixture: Fixture,
    calls: [AtomicUsize; 5],
    failing: Mutex<HashSet<Endpoint>>,
    /// Codelists left out of bulk responses, to exercise single fetches.
    bulk_excluded: HashSet<String>,
}

impl InMemoryService {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            calls: Default::default(),
            failing: Mutex::new(HashSet::new()),
            bulk_excluded: HashSet::new(),
        }
    }

    /// Loads a JSON fixture file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read fixture {}: {e}", path.display()))
        })?;
        let fixture: Fixture = serde_json::from_str(&content).map_err(|e| ClientError::Json {
            url: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(fixture))
    }

    /// Leaves a codelist out of bulk responses so it is only served by id.
    #[must_use]
    pub fn exclude_from_bulk(mut self, codelist: &str) -> Self {
        self.bulk_excluded.insert(codelist.to_string());
        self
    }

    /// Makes every call to `endpoint` fail with a network error.
    pub fn fail(&self, endpoint: Endpoint) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(endpoint);
        }
    }

    pub fn recover(&self, endpoint: Endpoint) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(&endpoint);
        }
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls[endpoint.index()].load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        Endpoint::ALL.iter().map(|e| self.calls(*e)).sum()
    }

    fn enter(&self, endpoint: Endpoint, url: &str) -> Result<()> {
        self.calls[endpoint.index()].fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing
            .lock()
            .map(|failing| failing.contains(&endpoint))
            .unwrap_or(false);
        if failing {
            return Err(ClientError::Network {
                url: url.to_string(),
                message: "simulated failure".to_string(),
            });
        }
        Ok(())
    }

    fn structure_for(&self, dataflow: &str) -> Option<&DataStructure> {
        let flow = self
            .fixture
            .structures
            .dataflows
            .iter()
            .find(|flow| flow.id == dataflow)?;
        self.fixture
            .structures
            .structures
            .iter()
            .find(|dsd| dsd.id == flow.structure_id)
    }

    /// Series of a dataflow matching a dot-separated partial key.
    fn matching_series(&self, dataflow: &str, key: &str) -> Vec<&FixtureSeries> {
        let dims = self
            .structure_for(dataflow)
            .map(DataStructure::dimension_ids)
            .unwrap_or_default();
        let parts: Vec<&str> = key.split('.').collect();
        self.fixture
            .series
            .iter()
            .filter(|series| series.dataflow == dataflow)
            .filter(|series| {
                dims.iter().zip(parts.iter()).all(|(dim, part)| {
                    *part == "*"
                        || series
                            .key
                            .get(dim)
                            .is_some_and(|code| part.split('+').any(|p| p == code))
                })
            })
            .collect()
    }
}

impl SdmxService for InMemoryService {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    fn structures(&self) -> Result<StructureBundle> {
        self.enter(Endpoint::Structures, BASE_URL)?;
        Ok(self.fixture.structures.clone())
    }

    fn codelists_for_dataflow(&self, agency: &str, dataflow: &str) -> Result<Vec<Codelist>> {
        let url = urls::bulk_codelist_url(BASE_URL, agency, dataflow);
        self.enter(Endpoint::BulkCodelists, &url)?;

        let mut referenced: BTreeSet<&str> = BTreeSet::new();
        if let Some(dsd) = self.structure_for(dataflow) {
            referenced.extend(dsd.dimensions.iter().filter_map(|d| d.codelist.as_deref()));
            referenced.extend(dsd.attributes.iter().filter_map(|a| a.codelist.as_deref()));
        }
        Ok(self
            .fixture
            .codelists
            .iter()
            .filter(|cl| !self.bulk_excluded.contains(&cl.id))
            .filter(|cl| referenced.contains(cl.id.as_str()) || cl.id.contains(dataflow))
            .cloned()
            .collect())
    }

    fn codelist(&self, agency: &str, id: &str) -> Result<Codelist> {
        let url = urls::codelist_url(BASE_URL, agency, id);
        self.enter(Endpoint::Codelist, &url)?;
        self.fixture
            .codelists
            .iter()
            .find(|cl| cl.id == id)
            .cloned()
            .ok_or(ClientError::NotFound { url })
    }

    fn availability(&self, query: &AvailabilityQuery) -> Result<Availability> {
        let url = urls::availability_url(BASE_URL, query);
        self.enter(Endpoint::Availability, &url)?;

        let series = self.matching_series(&query.dataflow, &query.key);
        let mut availability = Availability {
            series_count: Some(series.len() as u64),
            ..Availability::default()
        };
        for item in &series {
            for (dim, code) in &item.key {
                let wanted = query
                    .component
                    .as_deref()
                    .is_none_or(|component| component.eq_ignore_ascii_case(dim));
                if wanted {
                    availability
                        .values
                        .entry(dim.clone())
                        .or_default()
                        .insert(code.clone());
                }
            }
        }

        let periods = series
            .iter()
            .flat_map(|s| s.observations.iter().map(|o| o.period.as_str()));
        let starts = periods.clone().filter_map(parse_period_start).min();
        let ends = periods.filter_map(parse_period_end).max();
        availability.time_start = starts.map(|d| d.format("%Y-%m-%d").to_string());
        availability.time_end = ends
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .map(|d| d.format("%Y-%m-%d").to_string());
        Ok(availability)
    }

    fn data(&self, query: &DataQuery) -> Result<DataMessage> {
        let url = urls::data_url(BASE_URL, query);
        self.enter(Endpoint::Data, &url)?;

        let mut message = DataMessage {
            url,
            ..DataMessage::default()
        };
        for item in self.matching_series(&query.dataflow, &query.key) {
            let mut observations: Vec<&FixtureObservation> = item
                .observations
                .iter()
                .filter(|obs| {
                    let start_ok = query.start.is_none_or(|start| {
                        parse_period_end(&obs.period).is_some_and(|end| end >= start)
                    });
                    let end_ok = query.end.is_none_or(|end| {
                        parse_period_start(&obs.period).is_some_and(|begin| begin <= end)
                    });
                    start_ok && end_ok
                })
                .collect();
            observations.sort_by_key(|obs| parse_period_end(&obs.period));
            if let Some(limit) = query.last_n {
                let keep = observations.len().saturating_sub(limit as usize);
                observations.drain(..keep);
            }
            if observations.is_empty() {
                continue;
            }

            let mut attributes = item.key.clone();
            attributes.extend(item.attributes.clone());
            message.series.push(RawSeries {
                attributes,
                observations: observations
                    .into_iter()
                    .map(|obs| {
                        let mut attributes = obs.attributes.clone();
                        attributes.insert("TIME_PERIOD".to_string(), obs.period.clone());
                        if let Some(value) = &obs.value {
                            attributes.insert("OBS_VALUE".to_string(), value.clone());
                        }
                        RawObservation { attributes }
                    })
                    .collect(),
            });
        }
        Ok(message)
    }
}
