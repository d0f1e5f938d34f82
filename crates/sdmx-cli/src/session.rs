//! Service, metadata registry and constraint cache shared by one invocation.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use sdmx_client::{HttpService, InMemoryService, SdmxService, ServiceConfig};
use sdmx_metadata::MetadataRegistry;
use sdmx_validate::ConstraintCache;
use tracing::{info, info_span};

use crate::cli::ServiceArgs;

pub struct Session {
    pub registry: MetadataRegistry,
    pub constraints: ConstraintCache,
}

impl Session {
    /// Connects to the configured service, or to a fixture with `--offline`.
    pub fn open(args: &ServiceArgs) -> Result<Self> {
        let service: Arc<dyn SdmxService> = match &args.offline {
            Some(fixture) => Arc::new(open_fixture(fixture)?),
            None => {
                let config = service_config(args)?;
                info!(base_url = %config.base_url, agency = %config.agency, "using remote service");
                Arc::new(HttpService::new(config).context("create HTTP client")?)
            }
        };
        Self::with_service(service)
    }

    pub fn with_service(service: Arc<dyn SdmxService>) -> Result<Self> {
        let start = Instant::now();
        let registry = info_span!("metadata")
            .in_scope(|| MetadataRegistry::load(service))
            .context("load service metadata")?;
        info!(duration_ms = start.elapsed().as_millis(), "session ready");
        Ok(Self {
            registry,
            constraints: ConstraintCache::new(),
        })
    }
}

fn open_fixture(path: &Path) -> Result<InMemoryService> {
    InMemoryService::from_json_file(path)
        .with_context(|| format!("load fixture {}", path.display()))
}

/// Configuration file and environment, then command-line flags.
pub fn service_config(args: &ServiceArgs) -> Result<ServiceConfig> {
    let mut config =
        ServiceConfig::load(args.config.as_deref()).context("load service configuration")?;
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.as_str());
    }
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout_secs(secs);
    }
    Ok(config)
}
