//! Narrowing table codes to what the service reports as available.
//!
//! Dimensions are visited in positional order so every availability lookup
//! sees the selections made before it. Table codes that are not available
//! are dropped; a dimension left with no codes fails the request.

use std::collections::{BTreeMap, BTreeSet};

use sdmx_model::{EngineError, ErrorKind, Result, Warning, Warnings};
use sdmx_validate::{CONSTRAINT_KEY_BUDGET, ConstraintValidator, split_values};
use tracing::debug;

use crate::select::DimensionCodes;

/// Codes of one dimension whose joined length exceeds this are fetched with
/// a wildcard and filtered after the fetch.
pub const FETCH_CODE_BUDGET: usize = 850;

/// Dimensions whose table codes may be base codes of suffixed dataflow codes
/// (`FSI688` for `FSI688_USD`).
const PREFIX_MATCH_DIMENSIONS: &[&str] = &["INDICATOR", "CLASSIFICATION"];

/// Dimensions that must be pinned by the table or a filter.
const REQUIRED_INDICATOR_DIMENSIONS: &[&str] =
    &["INDICATOR", "BOP_ACCOUNTING_ENTRY", "SERIES", "ITEM"];

/// What to fetch once narrowing is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchPlan {
    /// Dimension id to the codes for the data key.
    pub selections: BTreeMap<String, Vec<String>>,
    /// Dimensions fetched with a wildcard, with the codes to keep afterwards.
    pub post_filters: BTreeMap<String, BTreeSet<String>>,
}

impl FetchPlan {
    /// True when a series key passes every post-fetch filter.
    pub fn keeps(&self, dimensions: &BTreeMap<String, String>) -> bool {
        self.post_filters
            .iter()
            .all(|(dim, codes)| dimensions.get(dim).is_none_or(|code| codes.contains(code)))
    }
}

/// Fails when an indicator dimension of the dataflow is neither covered by
/// the table nor set by a filter.
pub fn check_compatible(
    dataflow: &str,
    table: &str,
    dimensions: &[String],
    groups: &[DimensionCodes],
    filters: &BTreeMap<String, String>,
) -> Result<()> {
    if groups.is_empty() {
        return Err(EngineError::IncompatibleTable {
            dataflow: dataflow.to_string(),
            table: table.to_string(),
            reason: "none of its codes map onto a dimension of the dataflow".to_string(),
        });
    }
    let missing: Vec<&str> = dimensions
        .iter()
        .map(String::as_str)
        .filter(|dim| REQUIRED_INDICATOR_DIMENSIONS.contains(dim))
        .filter(|dim| !groups.iter().any(|g| g.dimension == *dim) && !filters.contains_key(*dim))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(EngineError::IncompatibleTable {
        dataflow: dataflow.to_string(),
        table: table.to_string(),
        reason: format!("dimension(s) {} are not covered by the table", missing.join(", ")),
    })
}

/// Walks the dimensions in order and fills the validator and the fetch plan.
pub struct Narrowing<'v, 'a> {
    validator: &'v mut ConstraintValidator<'a>,
    table: &'v str,
    /// Report table codes the service does not have.
    report_unavailable: bool,
}

impl<'v, 'a> Narrowing<'v, 'a> {
    pub fn new(validator: &'v mut ConstraintValidator<'a>, table: &'v str) -> Self {
        Self {
            validator,
            table,
            report_unavailable: false,
        }
    }

    #[must_use]
    pub fn report_unavailable(mut self, report: bool) -> Self {
        self.report_unavailable = report;
        self
    }

    /// Applies filters and table codes dimension by dimension.
    ///
    /// A filter on a table dimension overrides the table's codes.
    pub fn run(
        mut self,
        groups: &[DimensionCodes],
        filters: &BTreeMap<String, String>,
        warnings: &mut Warnings,
    ) -> Result<FetchPlan> {
        let mut plan = FetchPlan::default();
        let dimensions = self.validator.dimensions().to_vec();
        for dimension in &dimensions {
            if let Some(value) = filters.get(dimension) {
                self.validator.set_dimension(dimension, value, warnings)?;
                plan.selections.insert(dimension.clone(), split_values(value));
                continue;
            }
            let Some(group) = groups.iter().find(|g| g.dimension == *dimension) else {
                continue;
            };
            self.narrow_dimension(group, &mut plan, warnings)?;
        }
        Ok(plan)
    }

    fn narrow_dimension(
        &mut self,
        group: &DimensionCodes,
        plan: &mut FetchPlan,
        warnings: &mut Warnings,
    ) -> Result<()> {
        let dimension = group.dimension.as_str();
        let available = match self.validator.options_for(dimension) {
            Ok(available) => available,
            Err(err) if err.kind() == ErrorKind::Remote => {
                warnings.push(Warning::ConstraintLookupFailed {
                    dimension: dimension.to_string(),
                    message: err.to_string(),
                });
                plan.selections.insert(dimension.to_string(), group.codes.clone());
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        let mut codes = available_codes(group, &available, dimension);
        if codes.is_empty() {
            return Err(EngineError::NoLegalValues {
                dimension: dimension.to_string(),
                table: self.table.to_string(),
                prior: self.validator.prior_selections(dimension),
            });
        }
        if self.report_unavailable {
            let missing: Vec<String> = group
                .codes
                .iter()
                .filter(|code| !covers(&codes, code))
                .cloned()
                .collect();
            if !missing.is_empty() {
                warnings.push(Warning::UnavailableCodes {
                    dimension: dimension.to_string(),
                    codes: missing,
                });
            }
        }

        if codes.join("+").len() > FETCH_CODE_BUDGET {
            warnings.push(Warning::WildcardFetch {
                dimension: dimension.to_string(),
                code_count: codes.len(),
            });
            let constraint = constraint_codes(group, &codes);
            debug!(
                dimension,
                codes = codes.len(),
                constraint = constraint.len(),
                "Fetching with wildcard"
            );
            plan.selections.insert(dimension.to_string(), vec!["*".to_string()]);
            plan.post_filters
                .insert(dimension.to_string(), codes.drain(..).collect());
            self.validator.constrain(dimension, constraint)?;
        } else {
            plan.selections.insert(dimension.to_string(), codes.clone());
            self.validator.constrain(dimension, codes)?;
        }
        Ok(())
    }
}

/// Table codes the service has, exactly or, for indicator dimensions, as a
/// prefix of available codes.
fn available_codes(group: &DimensionCodes, available: &[String], dimension: &str) -> Vec<String> {
    let exact: Vec<String> = group
        .codes
        .iter()
        .filter(|code| available.contains(code))
        .cloned()
        .collect();
    if !exact.is_empty() || !PREFIX_MATCH_DIMENSIONS.contains(&dimension) {
        return exact;
    }
    available
        .iter()
        .filter(|value| group.codes.iter().any(|code| is_code_or_suffixed(value, code)))
        .cloned()
        .collect()
}

fn is_code_or_suffixed(value: &str, code: &str) -> bool {
    value == code || value.strip_prefix(code).is_some_and(|rest| rest.starts_with('_'))
}

fn covers(kept: &[String], code: &str) -> bool {
    kept.iter().any(|value| is_code_or_suffixed(value, code))
}

/// Codes used for later availability lookups when the full set is too long:
/// the shallow codes when they fit, otherwise as many codes as fit.
fn constraint_codes(group: &DimensionCodes, codes: &[String]) -> Vec<String> {
    let shallow: Vec<String> = codes
        .iter()
        .filter(|code| group.depth(code) <= 1)
        .cloned()
        .collect();
    if !shallow.is_empty() && shallow.join("+").len() <= CONSTRAINT_KEY_BUDGET {
        return shallow;
    }
    let mut kept = Vec::new();
    let mut length = 0;
    for code in codes {
        let added = code.len() + usize::from(!kept.is_empty());
        if length + added > CONSTRAINT_KEY_BUDGET {
            break;
        }
        length += added;
        kept.push(code.clone());
    }
    if kept.is_empty() {
        vec!["*".to_string()]
    } else {
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(dimension: &str, codes: &[(&str, u32)]) -> DimensionCodes {
        DimensionCodes {
            dimension: dimension.to_string(),
            codes: codes.iter().map(|(code, _)| (*code).to_string()).collect(),
            depths: codes
                .iter()
                .map(|(code, depth)| ((*code).to_string(), *depth))
                .collect(),
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn exact_codes_win_over_prefixes() {
        let table = group("INDICATOR", &[("CA", 0), ("FSI688", 1)]);
        assert_eq!(
            available_codes(&table, &strings(&["CA", "FSI688_USD"]), "INDICATOR"),
            ["CA"]
        );
        assert_eq!(
            available_codes(
                &table,
                &strings(&["FSI688_USD", "FSI688_XDC", "FSI6880"]),
                "INDICATOR",
            ),
            ["FSI688_USD", "FSI688_XDC"]
        );
        assert!(available_codes(&table, &strings(&["FSI688_USD"]), "SECTOR").is_empty());
    }

    #[test]
    fn constraint_codes_prefer_shallow_codes() {
        let codes: Vec<(String, u32)> = (0..300)
            .map(|i| (format!("CODE{i:04}"), if i < 3 { 1 } else { 3 }))
            .collect();
        let pairs: Vec<(&str, u32)> = codes.iter().map(|(c, d)| (c.as_str(), *d)).collect();
        let table = group("INDICATOR", &pairs);
        assert_eq!(constraint_codes(&table, &table.codes), ["CODE0000", "CODE0001", "CODE0002"]);

        let deep = group("INDICATOR", &pairs.iter().map(|(c, _)| (*c, 4)).collect::<Vec<_>>());
        let kept = constraint_codes(&deep, &deep.codes);
        assert!(kept.join("+").len() <= CONSTRAINT_KEY_BUDGET);
        assert_eq!(kept.len(), 222);
    }

    #[test]
    fn incompatible_when_indicator_dimension_is_uncovered() {
        let dims = strings(&["COUNTRY", "BOP_ACCOUNTING_ENTRY", "INDICATOR"]);
        let groups = vec![group("INDICATOR", &[("G", 0)])];
        let err = check_compatible("BOP", "H", &dims, &groups, &BTreeMap::new())
            .expect_err("entry missing");
        assert!(err.to_string().contains("BOP_ACCOUNTING_ENTRY"));

        let filters = BTreeMap::from([("BOP_ACCOUNTING_ENTRY".to_string(), "CD_T".to_string())]);
        assert!(check_compatible("BOP", "H", &dims, &groups, &filters).is_ok());
        assert!(check_compatible("BOP", "H", &dims, &[], &filters).is_err());
    }

    #[test]
    fn post_filters_keep_listed_codes() {
        let plan = FetchPlan {
            selections: BTreeMap::new(),
            post_filters: BTreeMap::from([(
                "INDICATOR".to_string(),
                BTreeSet::from(["G".to_string()]),
            )]),
        };
        let keep = BTreeMap::from([("INDICATOR".to_string(), "G".to_string())]);
        let drop = BTreeMap::from([("INDICATOR".to_string(), "S".to_string())]);
        assert!(plan.keeps(&keep));
        assert!(!plan.keeps(&drop));
    }
}
