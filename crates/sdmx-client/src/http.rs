//! Blocking HTTP implementation of [`SdmxService`].

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use sdmx_model::Codelist;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::error::{ClientError, Result};
use crate::json::{parse_availability, parse_codelists, parse_structures};
use crate::service::{
    Availability, AvailabilityQuery, DataMessage, DataQuery, SdmxService, StructureBundle,
};
use crate::urls;
use crate::xml::parse_data_message;

const ACCEPT_STRUCTURE_JSON: &str =
    "application/vnd.sdmx.structure+json;version=2.0.0, application/json";
const ACCEPT_DATA_XML: &str =
    "application/vnd.sdmx.structurespecificdata+xml;version=3.0.0, application/xml";

/// Client for an SDMX 3.0 REST service.
pub struct HttpService {
    client: Client,
    config: ServiceConfig,
}

impl HttpService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClientError::Network {
                url: config.base_url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn get(&self, url: &str, accept: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, accept)
            .send()
            .map_err(|e| ClientError::Network {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        response.text().map_err(|e| ClientError::Network {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn structure(&self, kind: &str) -> Result<StructureBundle> {
        let url = urls::structure_url(&self.config.base_url, kind, &self.config.agency);
        let body = self.get(&url, ACCEPT_STRUCTURE_JSON)?;
        parse_structures(&url, &body)
    }
}

impl SdmxService for HttpService {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn structures(&self) -> Result<StructureBundle> {
        let dataflows = self.structure("dataflow")?.dataflows;
        let structures = self.structure("datastructure")?.structures;
        let hierarchies = self.structure("hierarchy")?.hierarchies;
        debug!(
            dataflows = dataflows.len(),
            structures = structures.len(),
            hierarchies = hierarchies.len(),
            "Loaded structural metadata"
        );
        Ok(StructureBundle {
            dataflows,
            structures,
            hierarchies,
        })
    }

    fn codelists_for_dataflow(&self, agency: &str, dataflow: &str) -> Result<Vec<Codelist>> {
        let url = urls::bulk_codelist_url(&self.config.base_url, agency, dataflow);
        let body = self.get(&url, ACCEPT_STRUCTURE_JSON)?;
        parse_codelists(&url, &body)
    }

    fn codelist(&self, agency: &str, id: &str) -> Result<Codelist> {
        let url = urls::codelist_url(&self.config.base_url, agency, id);
        let body = self.get(&url, ACCEPT_STRUCTURE_JSON)?;
        parse_codelists(&url, &body)?
            .into_iter()
            .find(|codelist| codelist.id == id)
            .ok_or(ClientError::NotFound { url })
    }

    fn availability(&self, query: &AvailabilityQuery) -> Result<Availability> {
        let url = urls::availability_url(&self.config.base_url, query);
        let body = self.get(&url, ACCEPT_STRUCTURE_JSON)?;
        parse_availability(&url, &body)
    }

    fn data(&self, query: &DataQuery) -> Result<DataMessage> {
        let url = urls::data_url(&self.config.base_url, query);
        let body = self.get(&url, ACCEPT_DATA_XML)?;
        parse_data_message(&url, &body)
    }
}
