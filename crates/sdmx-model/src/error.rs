//! Error types for the presentation engine.

use std::collections::BTreeMap;

use thiserror::Error;

/// Broad category of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A dataflow, table, dimension or structure could not be found.
    Resolution,
    /// A requested value is not legal given the prior selections.
    Constraint,
    /// The query was valid but the service had no observations.
    EmptyResult,
    /// Network or payload failure talking to the remote service.
    Remote,
}

/// Fatal errors of the presentation engine.
///
/// Recoverable gaps (unmatched observations, unresolved codelists) are never
/// reported through this type; see [`crate::Warnings`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// Dataflow id is unknown to the registry.
    #[error("dataflow '{dataflow}' not found")]
    DataflowNotFound { dataflow: String },

    /// Dataflow exists but its data structure was not loaded.
    #[error("no data structure found for dataflow '{dataflow}'")]
    StructureNotFound { dataflow: String },

    /// Table id is unknown for the dataflow.
    #[error("table '{table}' not found for dataflow '{dataflow}'")]
    TableNotFound {
        dataflow: String,
        table: String,
        /// Tables that do exist for the dataflow.
        available: Vec<String>,
    },

    /// Dataflow has no presentation tables at all.
    #[error("no presentation tables are available for dataflow '{dataflow}'")]
    NoTables { dataflow: String },

    /// Several tables exist and none was named.
    #[error("dataflow '{dataflow}' has several tables, choose one of: {}", available.join(", "))]
    AmbiguousTable {
        dataflow: String,
        available: Vec<String>,
    },

    /// A `dataflow::table` id names a different dataflow than the one requested.
    #[error("dataflow mismatch: table id refers to '{from_table}' but '{requested}' was requested")]
    DataflowMismatch { requested: String, from_table: String },

    /// A filter names a dimension the dataflow does not have.
    #[error("unknown dimension '{dimension}' for dataflow '{dataflow}'")]
    UnknownDimension { dataflow: String, dimension: String },

    /// Requested value(s) are outside the legal set for a dimension.
    #[error(
        "Invalid value(s) for dimension '{dimension}': {invalid:?}. Given prior selections {prior:?}, available values are: {available:?}"
    )]
    ConstraintViolation {
        dimension: String,
        invalid: Vec<String>,
        /// Selections on earlier dimensions that produced the legal set.
        prior: BTreeMap<String, String>,
        /// Legal values, sorted.
        available: Vec<String>,
    },

    /// None of a table's codes are available for a dimension.
    #[error(
        "No data available for dimension '{dimension}' in table '{table}' given prior selections {prior:?}"
    )]
    NoLegalValues {
        dimension: String,
        table: String,
        prior: BTreeMap<String, String>,
    },

    /// Table codes cannot be mapped onto the dataflow's dimensions.
    #[error("table '{table}' is not compatible with dataflow '{dataflow}': {reason}")]
    IncompatibleTable {
        dataflow: String,
        table: String,
        reason: String,
    },

    /// Requested start is after the last available period.
    #[error("start date {requested} is after the latest available data ({latest})")]
    StartAfterLatest { requested: String, latest: String },

    /// Requested end is before the first available period.
    #[error("end date {requested} is before the earliest available data ({earliest})")]
    EndBeforeEarliest { requested: String, earliest: String },

    /// Valid query, but no observations came back.
    #[error("no observations returned for dataflow '{dataflow}' ({url})")]
    EmptyResult { dataflow: String, url: String },

    /// Network, HTTP or payload failure.
    #[error("remote request failed for {url}: {message}")]
    Remote {
        url: String,
        message: String,
        /// Whether the failure is worth retrying at the transport layer.
        retryable: bool,
    },

    /// Malformed request arguments.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EngineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataflowNotFound { .. }
            | Self::StructureNotFound { .. }
            | Self::TableNotFound { .. }
            | Self::NoTables { .. }
            | Self::AmbiguousTable { .. }
            | Self::DataflowMismatch { .. }
            | Self::UnknownDimension { .. }
            | Self::IncompatibleTable { .. }
            | Self::InvalidRequest(_) => ErrorKind::Resolution,
            Self::ConstraintViolation { .. }
            | Self::NoLegalValues { .. }
            | Self::StartAfterLatest { .. }
            | Self::EndBeforeEarliest { .. } => ErrorKind::Constraint,
            Self::EmptyResult { .. } => ErrorKind::EmptyResult,
            Self::Remote { .. } => ErrorKind::Remote,
        }
    }

    /// Short message suitable for end users.
    #[must_use]
    pub fn user_message(&self) -> &str {
        match self.kind() {
            ErrorKind::Resolution => "The requested dataflow or table could not be found.",
            ErrorKind::Constraint => {
                "The requested selection is not available. Check the listed values and try again."
            }
            ErrorKind::EmptyResult => "No data is available for this selection.",
            ErrorKind::Remote => "Could not reach the statistical data service.",
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Remote { retryable: true, .. })
    }

    /// URL involved in the failure, when there is one.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::EmptyResult { url, .. } | Self::Remote { url, .. } => Some(url),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_message_lists_legal_values() {
        let err = EngineError::ConstraintViolation {
            dimension: "INDICATOR".to_string(),
            invalid: vec!["XX".to_string()],
            prior: BTreeMap::from([("COUNTRY".to_string(), "BRA".to_string())]),
            available: vec!["CA".to_string(), "KA".to_string()],
        };
        let message = err.to_string();
        assert_eq!(
            message,
            r#"Invalid value(s) for dimension 'INDICATOR': ["XX"]. Given prior selections {"COUNTRY": "BRA"}, available values are: ["CA", "KA"]"#
        );
        assert_eq!(err.kind(), ErrorKind::Constraint);
    }

    #[test]
    fn test_user_messages() {
        let err = EngineError::DataflowNotFound {
            dataflow: "NOPE".to_string(),
        };
        assert!(err.user_message().contains("could not be found"));

        let err = EngineError::EmptyResult {
            dataflow: "BOP".to_string(),
            url: "https://example.org/data".to_string(),
        };
        assert!(err.user_message().contains("No data"));
        assert_eq!(err.url(), Some("https://example.org/data"));
    }

    #[test]
    fn test_retryable() {
        let remote = EngineError::Remote {
            url: "https://example.org".to_string(),
            message: "timeout".to_string(),
            retryable: true,
        };
        assert!(remote.is_retryable());
        assert_eq!(remote.kind(), ErrorKind::Remote);
        assert!(!EngineError::InvalidRequest("bad".to_string()).is_retryable());
    }
}
