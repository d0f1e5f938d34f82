//! Service configuration.
//!
//! Settings are read from an optional TOML file and then overridden by
//! environment variables:
//! - `SDMX_BASE_URL`: service root
//! - `SDMX_AGENCY`: default maintenance agency

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

pub const BASE_URL_ENV_VAR: &str = "SDMX_BASE_URL";
pub const AGENCY_ENV_VAR: &str = "SDMX_AGENCY";

const DEFAULT_BASE_URL: &str = "https://api.imf.org/external/sdmx/3.0";
const DEFAULT_AGENCY: &str = "IMF.STA";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the remote SDMX service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service root, without a trailing slash.
    pub base_url: String,
    /// Agency used for structure queries.
    pub agency: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            agency: DEFAULT_AGENCY.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("sdmx-present/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ServiceConfig {
    /// Loads the configuration file when given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;
        tracing::info!("Loaded service configuration from {:?}", path);
        Ok(config.normalized())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BASE_URL_ENV_VAR) {
            self.base_url = url;
        }
        if let Ok(agency) = std::env::var(AGENCY_ENV_VAR) {
            self.agency = agency;
        }
        *self = std::mem::take(self).normalized();
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.normalized()
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn normalized(mut self) -> Self {
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self
    }
}
