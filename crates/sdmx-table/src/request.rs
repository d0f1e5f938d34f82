//! Table requests: table references, filter keys and user-facing messages.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sdmx_model::{DataStructure, EngineError, Result};

/// Dimensions the `country` filter key may stand for, in lookup order.
pub const COUNTRY_ALIASES: &[&str] = &["COUNTRY", "REF_AREA", "JURISDICTION", "COUNTERPART_AREA"];

/// Dimensions the `indicator` filter key may stand for, in lookup order.
pub const INDICATOR_ALIASES: &[&str] = &["INDICATOR", "CLASSIFICATION"];

/// Everything needed to build one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRequest {
    /// Dataflow id. May be omitted when `table` is `dataflow::table`.
    pub dataflow: Option<String>,
    /// Table id, `dataflow::table`, optionally suffixed with `:TOPCODE`.
    pub table: Option<String>,
    /// Filter key (dimension id or alias) to value (`,` or `+` separated).
    pub filters: BTreeMap<String, String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Last N observations per series.
    pub limit: Option<u32>,
    /// Keep only nodes at this depth.
    pub depth: Option<u32>,
    /// Keep only direct children of this node.
    pub parent: Option<String>,
    /// Keep only nodes with these indicator codes.
    pub indicators: Vec<String>,
}

impl TableRequest {
    pub fn new(dataflow: &str) -> Self {
        Self {
            dataflow: Some(dataflow.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.filters.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

/// A table reference after `dataflow::table:TOP` has been taken apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub dataflow: String,
    pub table: Option<String>,
    pub top_code: Option<String>,
}

/// Splits a table reference and checks it against the requested dataflow.
pub fn resolve_table_ref(dataflow: Option<&str>, table: Option<&str>) -> Result<TableRef> {
    let table = table.map(str::trim).filter(|t| !t.is_empty());
    let (from_table, rest) = match table.and_then(|t| t.split_once("::")) {
        Some((flow, rest)) => (Some(flow.trim()), Some(rest.trim())),
        None => (None, table),
    };

    let dataflow = match (dataflow.map(str::trim).filter(|d| !d.is_empty()), from_table) {
        (Some(requested), Some(from_table)) if !requested.eq_ignore_ascii_case(from_table) => {
            return Err(EngineError::DataflowMismatch {
                requested: requested.to_string(),
                from_table: from_table.to_string(),
            });
        }
        (Some(requested), _) => requested.to_string(),
        (None, Some(from_table)) => from_table.to_string(),
        (None, None) => {
            return Err(EngineError::InvalidRequest(
                "a dataflow is required, either directly or as 'dataflow::table'".to_string(),
            ));
        }
    };

    let (table, top_code) = match rest.filter(|r| !r.is_empty()) {
        Some(rest) => match rest.split_once(':') {
            Some((id, top)) if !top.trim().is_empty() => {
                (Some(id.to_string()), Some(top.trim().to_string()))
            }
            Some((id, _)) => (Some(id.to_string()), None),
            None => (Some(rest.to_string()), None),
        },
        None => (None, None),
    };
    Ok(TableRef {
        dataflow,
        table,
        top_code,
    })
}

/// Maps filter keys onto the dimension ids of a structure.
///
/// Keys match case-insensitively; `country` and `indicator` stand for the
/// first of their aliases the structure has. Empty values are dropped.
pub fn normalize_filters(
    dataflow: &str,
    structure: &DataStructure,
    filters: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let mut normalized = BTreeMap::new();
    for (key, value) in filters {
        if value.trim().is_empty() {
            continue;
        }
        let aliases = match key.to_ascii_lowercase().as_str() {
            "country" => COUNTRY_ALIASES,
            "indicator" => INDICATOR_ALIASES,
            _ => &[][..],
        };
        let dimension = structure
            .dimension(key)
            .or_else(|| aliases.iter().find_map(|alias| structure.dimension(alias)))
            .ok_or_else(|| EngineError::UnknownDimension {
                dataflow: dataflow.to_string(),
                dimension: key.clone(),
            })?;
        normalized.insert(dimension.id.clone(), value.trim().to_string());
    }
    Ok(normalized)
}

/// Name of the request parameter a dimension is set through.
pub fn parameter_name(dimension: &str) -> String {
    let upper = dimension.to_ascii_uppercase();
    if COUNTRY_ALIASES.contains(&upper.as_str()) {
        "country".to_string()
    } else if INDICATOR_ALIASES.contains(&upper.as_str()) {
        "indicator".to_string()
    } else if upper == "FREQ" || upper == "FREQUENCY" {
        "frequency".to_string()
    } else {
        dimension.to_ascii_lowercase()
    }
}

fn parameter_map(selections: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    selections
        .iter()
        .map(|(dim, value)| (parameter_name(dim), value.clone()))
        .collect()
}

/// Error text with dimension ids replaced by the parameters that set them.
pub fn describe_error(err: &EngineError) -> String {
    match err {
        EngineError::ConstraintViolation {
            dimension,
            invalid,
            prior,
            available,
        } => format!(
            "Invalid value(s) for parameter '{}': {invalid:?}. Given prior selections {:?}, available values are: {available:?}",
            parameter_name(dimension),
            parameter_map(prior)
        ),
        EngineError::NoLegalValues {
            dimension,
            table,
            prior,
        } => format!(
            "No data available for parameter '{}' in table '{table}' given prior selections {:?}",
            parameter_name(dimension),
            parameter_map(prior)
        ),
        EngineError::UnknownDimension { dataflow, dimension } => {
            format!("unknown parameter '{dimension}' for dataflow '{dataflow}'")
        }
        other => other.to_string(),
    }
}
