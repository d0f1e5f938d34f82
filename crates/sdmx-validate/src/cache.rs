//! Cache of availability answers keyed by query signature.
//!
//! The key is the full signature of the request (agency, dataflow, partial
//! key and target dimension), so one cache can be shared by every validator in the
//! process. Entries never expire on their own; call [`ConstraintCache::clear`]
//! to drop them.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use sdmx_client::{Availability, AvailabilityQuery, SdmxService};
use tracing::debug;

/// Signature of an availability request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintKey {
    pub agency: String,
    pub dataflow: String,
    pub key: String,
    /// Target dimension, `None` for an all-dimensions request.
    pub dimension: Option<String>,
}

impl From<&AvailabilityQuery> for ConstraintKey {
    fn from(query: &AvailabilityQuery) -> Self {
        Self {
            agency: query.agency.clone(),
            dataflow: query.dataflow.clone(),
            key: query.key.clone(),
            dimension: query.component.clone(),
        }
    }
}

/// Shared availability cache.
#[derive(Default)]
pub struct ConstraintCache {
    entries: RwLock<HashMap<ConstraintKey, Arc<Availability>>>,
}

impl ConstraintCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ConstraintKey) -> Option<Arc<Availability>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: ConstraintKey, availability: Availability) -> Arc<Availability> {
        let availability = Arc::new(availability);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, Arc::clone(&availability));
        availability
    }

    /// Cached answer for the query, asking the service on a miss.
    ///
    /// Failures are not cached.
    pub fn get_or_fetch(
        &self,
        service: &dyn SdmxService,
        query: &AvailabilityQuery,
    ) -> sdmx_client::Result<Arc<Availability>> {
        let key = ConstraintKey::from(query);
        if let Some(hit) = self.get(&key) {
            debug!(
                agency = %key.agency,
                dataflow = %key.dataflow,
                key = %key.key,
                "Constraint cache hit"
            );
            return Ok(hit);
        }
        let availability = service.availability(query)?;
        Ok(self.insert(key, availability))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached answer.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
