//! Recoverable warnings.
//!
//! Partial-match gaps never fail a request. Components record them here and the
//! list travels back to the caller with the result. Each variant carries only
//! the data needed to describe it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A recoverable problem met while building a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    // Metadata
    /// No codelist could be resolved for a dimension.
    CodelistUnresolved { dataflow: String, dimension: String },
    /// The service did not return the requested codelist.
    CodelistNotFound { codelist: String },
    /// Fetching codelists failed; cached values were kept.
    CodelistFetchFailed { codelist: String, message: String },

    // Hierarchy
    /// An entry's code URN could not be parsed.
    MalformedUrn { node: String, urn: String },
    /// An entry references one of its own ancestors and was moved to the top level.
    HierarchyCycle { node: String },
    /// A hierarchy codelist does not map to any dimension of the dataflow.
    UnmappedCodelist { codelist: String, dataflow: String },

    // Constraints and data
    /// An availability lookup failed and the dimension was left unconstrained.
    ConstraintLookupFailed { dimension: String, message: String },
    /// Codes were too long for the query and a wildcard was used instead.
    WildcardFetch { dimension: String, code_count: usize },
    /// Codes from the table that the service does not report as available.
    UnavailableCodes { dimension: String, codes: Vec<String> },
    /// An observation series did not match any hierarchy node.
    UnmatchedSeries { series_id: String },

    // Presentation
    /// A requested country has no values in the displayed periods.
    CountryWithoutData { country: String, latest: Option<String> },
}

impl Warning {
    /// Stable identifier of the warning type.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CodelistUnresolved { .. } => "codelist_unresolved",
            Self::CodelistNotFound { .. } => "codelist_not_found",
            Self::CodelistFetchFailed { .. } => "codelist_fetch_failed",
            Self::MalformedUrn { .. } => "malformed_urn",
            Self::HierarchyCycle { .. } => "hierarchy_cycle",
            Self::UnmappedCodelist { .. } => "unmapped_codelist",
            Self::ConstraintLookupFailed { .. } => "constraint_lookup_failed",
            Self::WildcardFetch { .. } => "wildcard_fetch",
            Self::UnavailableCodes { .. } => "unavailable_codes",
            Self::UnmatchedSeries { .. } => "unmatched_series",
            Self::CountryWithoutData { .. } => "country_without_data",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CodelistUnresolved {
                dataflow,
                dimension,
            } => write!(f, "no codelist resolved for dimension '{dimension}' of '{dataflow}'"),
            Self::CodelistNotFound { codelist } => write!(f, "Codelist '{codelist}' not found"),
            Self::CodelistFetchFailed { codelist, message } => {
                write!(f, "failed to fetch codelist '{codelist}': {message}")
            }
            Self::MalformedUrn { node, urn } => {
                write!(f, "hierarchy entry '{node}' has a malformed code URN '{urn}'")
            }
            Self::HierarchyCycle { node } => {
                write!(
                    f,
                    "hierarchy entry '{node}' references its own ancestor and was moved to the top level"
                )
            }
            Self::UnmappedCodelist { codelist, dataflow } => {
                write!(f, "codelist '{codelist}' does not map to a dimension of '{dataflow}'")
            }
            Self::ConstraintLookupFailed { dimension, message } => {
                write!(f, "availability lookup for '{dimension}' failed: {message}")
            }
            Self::WildcardFetch {
                dimension,
                code_count,
            } => write!(
                f,
                "{code_count} codes for '{dimension}' exceed the query budget, fetched with a wildcard"
            ),
            Self::UnavailableCodes { dimension, codes } => write!(
                f,
                "{} code(s) for '{dimension}' are not available: {}",
                codes.len(),
                codes.join(", ")
            ),
            Self::UnmatchedSeries { series_id } => {
                write!(f, "series '{series_id}' did not match any table node")
            }
            Self::CountryWithoutData { country, latest } => match latest {
                Some(period) => write!(
                    f,
                    "no data for '{country}' in the selected periods, latest available period is {period}"
                ),
                None => write!(f, "no data for '{country}'"),
            },
        }
    }
}

/// Side list of warnings collected during one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Warnings {
    items: Vec<Warning>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning, ignoring exact duplicates.
    pub fn push(&mut self, warning: Warning) {
        if self.items.contains(&warning) {
            return;
        }
        tracing::warn!(code = warning.code(), "{warning}");
        self.items.push(warning);
    }

    pub fn extend(&mut self, other: Warnings) {
        for warning in other.items {
            self.push(warning);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_recorded_once() {
        let mut warnings = Warnings::new();
        warnings.push(Warning::UnmatchedSeries {
            series_id: "BOP::X".to_string(),
        });
        warnings.push(Warning::UnmatchedSeries {
            series_id: "BOP::X".to_string(),
        });
        warnings.push(Warning::CodelistNotFound {
            codelist: "CL_X".to_string(),
        });
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            warnings.iter().nth(1).map(ToString::to_string).as_deref(),
            Some("Codelist 'CL_X' not found")
        );
    }

    #[test]
    fn serializes_with_kind_tag() {
        let warning = Warning::HierarchyCycle {
            node: "A".to_string(),
        };
        let json = serde_json::to_value(&warning).expect("serialize warning");
        assert_eq!(json["kind"], "hierarchy_cycle");
        assert_eq!(json["node"], "A");
    }
}
