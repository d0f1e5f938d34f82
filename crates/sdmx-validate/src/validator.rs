//! Progressive constraint validation over the dimensions of one dataflow.
//!
//! Dimensions are visited in positional order. The legal values of a
//! dimension are asked for with a partial key built from the selections on
//! the dimensions positioned before it, every other slot left as `*`.
//! Selections only accumulate; [`ConstraintValidator::reset`] starts over.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use sdmx_client::{Availability, AvailabilityQuery};
use sdmx_metadata::MetadataRegistry;
use sdmx_model::{EngineError, Result, Warning, Warnings};
use tracing::debug;

use crate::cache::ConstraintCache;
use crate::time::check_time_range;

/// A key slot whose joined values exceed this many characters becomes `*`
/// and the selection is accepted without a lookup.
pub const CONSTRAINT_KEY_BUDGET: usize = 2000;

const TIME_DIMENSION: &str = "TIME_PERIOD";

/// How much of the key has been selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Unconstrained,
    PartiallyConstrained,
    FullyConstrained,
}

/// Splits a filter value on `,` or `+`, dropping empty parts.
pub fn split_values(value: &str) -> Vec<String> {
    value
        .split([',', '+'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_wildcard(values: &[String]) -> bool {
    values.iter().any(|value| value == "*")
}

fn key_part(values: &[String]) -> String {
    if values.is_empty() || is_wildcard(values) {
        return "*".to_string();
    }
    let joined = values.join("+");
    if joined.len() > CONSTRAINT_KEY_BUDGET {
        "*".to_string()
    } else {
        joined
    }
}

/// Step-by-step narrowing of one dataflow's key.
pub struct ConstraintValidator<'a> {
    registry: &'a MetadataRegistry,
    cache: &'a ConstraintCache,
    agency: String,
    dataflow: String,
    /// Dimension ids in positional order, without the time dimension.
    dimensions: Vec<String>,
    selections: BTreeMap<String, Vec<String>>,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new(
        registry: &'a MetadataRegistry,
        cache: &'a ConstraintCache,
        dataflow: &str,
    ) -> Result<Self> {
        let flow = registry.dataflow(dataflow)?;
        let dimensions = registry
            .structure(&flow.id)?
            .dimension_ids()
            .into_iter()
            .filter(|dim| dim != TIME_DIMENSION)
            .collect();
        Ok(Self {
            registry,
            cache,
            agency: flow.agency.clone(),
            dataflow: flow.id.clone(),
            dimensions,
            selections: BTreeMap::new(),
        })
    }

    pub fn dataflow(&self) -> &str {
        &self.dataflow
    }

    /// Dimension ids in positional order.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn selections(&self) -> &BTreeMap<String, Vec<String>> {
        &self.selections
    }

    pub fn selection(&self, dimension: &str) -> Option<&[String]> {
        let id = self.canonical(dimension)?;
        self.selections.get(id).map(Vec::as_slice)
    }

    pub fn state(&self) -> ValidationState {
        if self.selections.is_empty() {
            ValidationState::Unconstrained
        } else if self.dimensions.iter().all(|dim| self.selections.contains_key(dim)) {
            ValidationState::FullyConstrained
        } else {
            ValidationState::PartiallyConstrained
        }
    }

    /// Forgets every selection. Cached answers are kept.
    pub fn reset(&mut self) {
        self.selections.clear();
    }

    /// Next unselected dimension in positional order.
    pub fn next_dimension(&self) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|dim| !self.selections.contains_key(*dim))
            .map(String::as_str)
    }

    /// Dimension id as declared, matched case-insensitively.
    pub fn canonical(&self, dimension: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|dim| dim.eq_ignore_ascii_case(dimension))
            .map(String::as_str)
    }

    fn require(&self, dimension: &str) -> Result<String> {
        self.canonical(dimension)
            .map(str::to_string)
            .ok_or_else(|| EngineError::UnknownDimension {
                dataflow: self.dataflow.clone(),
                dimension: dimension.to_string(),
            })
    }

    /// Selections on dimensions positioned before `dimension`, joined for display.
    pub fn prior_selections(&self, dimension: &str) -> BTreeMap<String, String> {
        self.dimensions
            .iter()
            .take_while(|dim| !dim.eq_ignore_ascii_case(dimension))
            .filter_map(|dim| {
                self.selections
                    .get(dim)
                    .map(|values| (dim.clone(), values.join("+")))
            })
            .collect()
    }

    /// Partial key used to ask for the legal values of `dimension`.
    pub fn partial_key(&self, dimension: &str) -> String {
        let mut before = true;
        self.dimensions
            .iter()
            .map(|dim| {
                if dim.eq_ignore_ascii_case(dimension) {
                    before = false;
                }
                match self.selections.get(dim) {
                    Some(values) if before => key_part(values),
                    _ => "*".to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Key over every selection, used for coverage lookups.
    pub fn full_key(&self) -> String {
        self.dimensions
            .iter()
            .map(|dim| self.selections.get(dim).map_or_else(|| "*".to_string(), |v| key_part(v)))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Legal values for a dimension given the prior selections, sorted.
    pub fn options_for(&self, dimension: &str) -> Result<Vec<String>> {
        let dimension = self.require(dimension)?;
        let availability = self.lookup(self.partial_key(&dimension), Some(dimension.clone()))?;
        Ok(availability.values_for(&dimension))
    }

    /// Availability of the whole key as selected so far.
    pub fn coverage(&self) -> Result<Arc<Availability>> {
        self.lookup(self.full_key(), None)
    }

    fn lookup(&self, key: String, component: Option<String>) -> Result<Arc<Availability>> {
        let query = AvailabilityQuery {
            agency: self.agency.clone(),
            dataflow: self.dataflow.clone(),
            key,
            component,
        };
        debug!(dataflow = %query.dataflow, key = %query.key, "Availability lookup");
        Ok(self.cache.get_or_fetch(self.registry.service(), &query)?)
    }

    /// Validates and records a selection.
    ///
    /// `*` is always legal. Values whose joined length exceeds the key budget
    /// are recorded unchecked. When the lookup itself fails the selection is
    /// recorded and a warning is left instead.
    pub fn set_dimension(
        &mut self,
        dimension: &str,
        value: &str,
        warnings: &mut Warnings,
    ) -> Result<()> {
        let dimension = self.require(dimension)?;
        let values = split_values(value);
        if values.is_empty() {
            return Ok(());
        }
        if is_wildcard(&values) || values.join("+").len() > CONSTRAINT_KEY_BUDGET {
            self.selections.insert(dimension, vec!["*".to_string()]);
            return Ok(());
        }

        match self.options_for(&dimension) {
            Ok(available) => {
                let invalid: Vec<String> = values
                    .iter()
                    .filter(|value| !available.contains(value))
                    .cloned()
                    .collect();
                if !invalid.is_empty() {
                    return Err(EngineError::ConstraintViolation {
                        prior: self.prior_selections(&dimension),
                        dimension,
                        invalid,
                        available,
                    });
                }
            }
            Err(err) => warnings.push(Warning::ConstraintLookupFailed {
                dimension: dimension.clone(),
                message: err.to_string(),
            }),
        }
        self.selections.insert(dimension, values);
        Ok(())
    }

    /// Records values derived from availability without checking them again.
    pub fn constrain(&mut self, dimension: &str, values: Vec<String>) -> Result<()> {
        let dimension = self.require(dimension)?;
        if !values.is_empty() {
            self.selections.insert(dimension, values);
        }
        Ok(())
    }

    /// Validates a set of filters in positional order.
    ///
    /// Unknown dimension ids are rejected before any lookup is made.
    pub fn validate(
        &mut self,
        filters: &BTreeMap<String, String>,
        warnings: &mut Warnings,
    ) -> Result<()> {
        let mut ordered = Vec::with_capacity(filters.len());
        for (dimension, value) in filters {
            let id = self.require(dimension)?;
            let position = self.dimensions.iter().position(|dim| *dim == id).unwrap_or(usize::MAX);
            ordered.push((position, id, value));
        }
        ordered.sort_by_key(|(position, _, _)| *position);
        for (_, dimension, value) in ordered {
            self.set_dimension(&dimension, value, warnings)?;
        }
        Ok(())
    }

    /// Checks a requested date range against the coverage of the current key.
    ///
    /// A failed coverage lookup skips the check with a warning.
    pub fn check_time_range(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        warnings: &mut Warnings,
    ) -> Result<()> {
        if start.is_none() && end.is_none() {
            return Ok(());
        }
        match self.coverage() {
            Ok(availability) => check_time_range(&availability, start, end),
            Err(err) => {
                warnings.push(Warning::ConstraintLookupFailed {
                    dimension: TIME_DIMENSION.to_string(),
                    message: err.to_string(),
                });
                Ok(())
            }
        }
    }
}
