//! Access to a remote SDMX statistical data service.
//!
//! The engine talks to the service only through the [`SdmxService`] trait.
//! [`HttpService`] implements it over blocking HTTP; [`InMemoryService`] answers
//! from a local fixture and backs tests and offline use.

pub mod config;
pub mod error;
pub mod http;
pub mod json;
pub mod memory;
pub mod service;
pub mod urls;
pub mod xml;

pub use config::ServiceConfig;
pub use error::{ClientError, Result};
pub use http::HttpService;
pub use memory::{Endpoint, Fixture, FixtureObservation, FixtureSeries, InMemoryService};
pub use service::{
    Availability, AvailabilityQuery, DataMessage, DataQuery, RawGroup, RawObservation, RawSeries,
    SdmxService, StructureBundle,
};
