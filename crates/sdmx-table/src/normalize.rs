//! Flattening a data message into observation rows.
//!
//! Series keys are translated to labels through the dimension codelists, the
//! unit and scale attributes are resolved, and a series id and title are
//! derived from the key.

use std::collections::BTreeMap;
use std::sync::Arc;

use sdmx_client::{DataMessage, RawSeries};
use sdmx_metadata::MetadataRegistry;
use sdmx_metadata::conventions::{is_country_dimension, is_indicator_dimension};
use sdmx_model::{Codelist, DataStructure, ObservationRow, Result, Warnings, parse_period_end};

/// Dimensions and attributes that never contribute to a series title.
const UNTITLED_COMPONENTS: &[&str] = &[
    "COUNTRY",
    "REF_AREA",
    "TIME_PERIOD",
    "SCALE",
    "UNIT",
    "FREQ",
    "FREQUENCY",
    "OBS_VALUE",
    "OBS_STATUS",
];

const SCALE_ATTRIBUTES: &[&str] = &["SCALE", "UNIT_MULT"];

/// Observation values the service uses for suppressed data.
const SUPPRESSED: &str = "D";

/// A resolved scale: display label plus multiplier.
#[derive(Debug, Clone, PartialEq)]
struct Scale {
    label: String,
    multiplier: Option<f64>,
}

/// Turns data messages of one dataflow into [`ObservationRow`]s.
pub struct Normalizer {
    dataflow: String,
    /// Dimension ids in positional order, without the time dimension.
    dimensions: Vec<String>,
    codelists: BTreeMap<String, Arc<Codelist>>,
    unit_codelist: Option<Arc<Codelist>>,
    scale_codelist: Option<Arc<Codelist>>,
    derivation_codelist: Option<Arc<Codelist>>,
}

impl Normalizer {
    pub fn new(
        registry: &MetadataRegistry,
        dataflow: &str,
        warnings: &mut Warnings,
    ) -> Result<Self> {
        let flow = registry.dataflow(dataflow)?;
        let structure = registry.structure(dataflow)?;
        let dimensions: Vec<String> = structure
            .dimension_ids()
            .into_iter()
            .filter(|dim| dim != "TIME_PERIOD")
            .collect();
        let codelists = dimensions
            .iter()
            .filter_map(|dim| {
                registry
                    .dimension_codelist(&flow.id, dim, warnings)
                    .map(|codelist| (dim.clone(), codelist))
            })
            .collect::<BTreeMap<_, _>>();

        let unit_codelist = codelists
            .get("UNIT")
            .cloned()
            .or_else(|| {
                attribute_codelist(registry, &flow.id, structure, &["UNIT"], "CL_UNIT", warnings)
            });
        let scale_codelist = attribute_codelist(
            registry,
            &flow.id,
            structure,
            SCALE_ATTRIBUTES,
            "CL_UNIT_MULT",
            warnings,
        );
        let derivation_codelist = structure
            .attribute("DERIVATION_TYPE")
            .and_then(|attr| attr.codelist.as_deref())
            .map(|id| registry.codelist(&flow.id, id, warnings));

        Ok(Self {
            dataflow: flow.id.clone(),
            dimensions,
            codelists,
            unit_codelist,
            scale_codelist,
            derivation_codelist,
        })
    }

    /// Rows of every observation with a value, series by series.
    pub fn rows(&self, message: &DataMessage) -> Vec<ObservationRow> {
        message.series.iter().flat_map(|series| self.series_rows(series)).collect()
    }

    fn label(&self, dimension: &str, code: &str) -> String {
        self.codelists
            .get(dimension)
            .and_then(|codelist| codelist.label(code))
            .unwrap_or(code)
            .to_string()
    }

    /// `{dataflow}::{indicator codes in dimension order}`.
    pub fn series_id(&self, dimensions: &BTreeMap<String, String>) -> String {
        let mut codes: Vec<&str> = self
            .dimensions
            .iter()
            .filter(|dim| is_indicator_dimension(dim))
            .filter_map(|dim| dimensions.get(dim).map(String::as_str))
            .collect();
        if codes.is_empty() {
            codes = self
                .dimensions
                .iter()
                .filter(|dim| is_titled(dim))
                .filter_map(|dim| dimensions.get(dim).map(String::as_str))
                .collect();
        }
        format!("{}::{}", self.dataflow, codes.join("_"))
    }

    fn unit(&self, code: &str) -> String {
        self.unit_codelist
            .as_ref()
            .and_then(|codelist| codelist.label(code))
            .unwrap_or(code)
            .to_string()
    }

    fn scale(&self, code: &str) -> Scale {
        let Ok(power) = code.trim().parse::<i32>() else {
            return Scale {
                label: code.to_string(),
                multiplier: None,
            };
        };
        let label = self
            .scale_codelist
            .as_ref()
            .and_then(|codelist| codelist.label(code))
            .map_or_else(|| format!("10^{power}"), str::to_string);
        Scale {
            label,
            multiplier: Some(10f64.powi(power)),
        }
    }

    fn series_rows(&self, series: &RawSeries) -> Vec<ObservationRow> {
        let mut dimensions = BTreeMap::new();
        let mut labels = BTreeMap::new();
        for dim in &self.dimensions {
            if let Some(code) = series.attributes.get(dim) {
                labels.insert(dim.clone(), self.label(dim, code));
                dimensions.insert(dim.clone(), code.clone());
            }
        }
        let title = self
            .dimensions
            .iter()
            .filter(|dim| is_titled(dim))
            .filter_map(|dim| labels.get(dim).map(String::as_str))
            .collect::<Vec<_>>()
            .join(" - ");
        let series_id = self.series_id(&dimensions);
        let unit = series.attributes.get("UNIT").map(|code| self.unit(code));
        let scale = scale_code(&series.attributes).map(|code| self.scale(code));

        let mut rows = Vec::with_capacity(series.observations.len());
        for obs in &series.observations {
            let Some(period) = obs
                .attributes
                .get("TIME_PERIOD")
                .or_else(|| obs.attributes.get("TIME"))
            else {
                continue;
            };
            let Some(raw) = obs
                .attributes
                .get("OBS_VALUE")
                .or_else(|| obs.attributes.get("OBSERVATION"))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty() && *value != SUPPRESSED)
            else {
                continue;
            };

            let obs_scale = scale_code(&obs.attributes).map(|code| self.scale(code));
            let effective_scale = obs_scale.as_ref().or(scale.as_ref());
            let derivation_type = obs.attributes.get("DERIVATION_TYPE").map(|code| {
                self.derivation_codelist
                    .as_ref()
                    .and_then(|codelist| codelist.label(code))
                    .unwrap_or(code)
                    .to_string()
            });
            rows.push(ObservationRow {
                series_id: series_id.clone(),
                dimensions: dimensions.clone(),
                labels: labels.clone(),
                title: title.clone(),
                time_period: period.clone(),
                date: parse_period_end(period),
                value: raw.parse::<f64>().ok(),
                unit: obs
                    .attributes
                    .get("UNIT")
                    .map(|code| self.unit(code))
                    .or_else(|| unit.clone()),
                scale: effective_scale.map(|s| s.label.clone()),
                unit_multiplier: effective_scale.and_then(|s| s.multiplier),
                derivation_type,
            });
        }
        rows
    }
}

fn is_titled(dimension: &str) -> bool {
    !UNTITLED_COMPONENTS.contains(&dimension) && !is_country_dimension(dimension)
}

fn scale_code(attributes: &BTreeMap<String, String>) -> Option<&str> {
    SCALE_ATTRIBUTES
        .iter()
        .find_map(|id| attributes.get(*id))
        .map(String::as_str)
        .filter(|code| !code.trim().is_empty())
}

/// Codelist of the first attribute present, or a well-known default.
fn attribute_codelist(
    registry: &MetadataRegistry,
    dataflow: &str,
    structure: &DataStructure,
    attributes: &[&str],
    default: &str,
    warnings: &mut Warnings,
) -> Option<Arc<Codelist>> {
    let attribute = attributes.iter().find_map(|id| structure.attribute(id))?;
    let id = attribute.codelist.as_deref().unwrap_or(default);
    Some(registry.codelist(dataflow, id, warnings)).filter(|codelist| !codelist.is_empty())
}
