//! Codelist cache.
//!
//! Codelists are fetched in bulk per dataflow on first use, with a single
//! codelist fetch as fallback when the bulk response lacks an id. Entries live
//! for the lifetime of the cache. A failed fetch never disturbs cached entries;
//! it is recorded as a warning and an empty codelist is returned.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use sdmx_client::SdmxService;
use sdmx_model::{Codelist, Warning, Warnings};
use tracing::debug;

#[derive(Default)]
struct CacheState {
    codelists: HashMap<String, Arc<Codelist>>,
    /// `agency,dataflow` pairs whose bulk fetch has been attempted.
    bulk_attempted: HashSet<String>,
    /// Ids the service reported as missing.
    missing: HashSet<String>,
}

/// Thread-safe codelist store guarded by a single read/write lock.
#[derive(Default)]
pub struct CodelistCache {
    state: RwLock<CacheState>,
    /// Held for the whole bulk fetch so concurrent callers wait for its result.
    bulk_lock: Mutex<()>,
}

impl CodelistCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached codelist, without any fetching.
    pub fn get(&self, id: &str) -> Option<Arc<Codelist>> {
        self.read(|state| state.codelists.get(id).cloned())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read(|state| state.codelists.contains_key(id))
    }

    /// Sorted snapshot of cached ids.
    pub fn ids(&self) -> BTreeSet<String> {
        self.read(|state| state.codelists.keys().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.read(|state| state.codelists.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, codelist: Codelist) -> Arc<Codelist> {
        let codelist = Arc::new(codelist);
        self.write(|state| {
            state.missing.remove(&codelist.id);
            state
                .codelists
                .insert(codelist.id.clone(), Arc::clone(&codelist));
        });
        codelist
    }

    /// Drops every entry, forcing fresh fetches.
    pub fn clear(&self) {
        self.write(|state| *state = CacheState::default());
    }

    /// Runs the bulk fetch for a dataflow once.
    pub fn ensure_dataflow(
        &self,
        service: &dyn SdmxService,
        agency: &str,
        dataflow: &str,
        warnings: &mut Warnings,
    ) {
        let marker = format!("{agency},{dataflow}");
        let _guard = self.bulk_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let first_attempt = self.write(|state| state.bulk_attempted.insert(marker));
        if !first_attempt {
            return;
        }

        match service.codelists_for_dataflow(agency, dataflow) {
            Ok(codelists) => {
                debug!(dataflow, count = codelists.len(), "Bulk-loaded codelists");
                self.write(|state| {
                    for codelist in codelists {
                        state.missing.remove(&codelist.id);
                        state
                            .codelists
                            .insert(codelist.id.clone(), Arc::new(codelist));
                    }
                });
            }
            Err(err) => warnings.push(Warning::CodelistFetchFailed {
                codelist: format!("{dataflow} (bulk)"),
                message: err.to_string(),
            }),
        }
    }

    /// Cached codelist, fetching it when needed.
    ///
    /// With a dataflow, the bulk fetch for that dataflow runs first. Never
    /// fails: a missing or unreachable codelist yields an empty one plus a
    /// warning.
    pub fn get_or_fetch(
        &self,
        service: &dyn SdmxService,
        agency: &str,
        id: &str,
        dataflow: Option<&str>,
        warnings: &mut Warnings,
    ) -> Arc<Codelist> {
        if let Some(codelist) = self.get(id) {
            return codelist;
        }
        if let Some(dataflow) = dataflow {
            self.ensure_dataflow(service, agency, dataflow, warnings);
            if let Some(codelist) = self.get(id) {
                return codelist;
            }
        }
        if self.read(|state| state.missing.contains(id)) {
            return Arc::new(Codelist::new(id, agency));
        }

        debug!(codelist = id, "Fetching single codelist");
        match service.codelist(agency, id) {
            Ok(codelist) => self.insert(codelist),
            Err(err) if err.is_not_found() => {
                self.write(|state| state.missing.insert(id.to_string()));
                warnings.push(Warning::CodelistNotFound {
                    codelist: id.to_string(),
                });
                Arc::new(Codelist::new(id, agency))
            }
            Err(err) => {
                warnings.push(Warning::CodelistFetchFailed {
                    codelist: id.to_string(),
                    message: err.to_string(),
                });
                Arc::new(Codelist::new(id, agency))
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&CacheState) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut CacheState) -> T) -> T {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdmx_client::{Endpoint, Fixture, InMemoryService};
    use sdmx_model::{DataStructure, Dataflow, Dimension};

    fn service() -> InMemoryService {
        let fixture = Fixture {
            structures: sdmx_client::StructureBundle {
                dataflows: vec![Dataflow {
                    id: "BOP".to_string(),
                    agency: "IMF.STA".to_string(),
                    version: "1.0".to_string(),
                    name: "Balance of payments".to_string(),
                    description: String::new(),
                    structure_id: "DSD_BOP".to_string(),
                }],
                structures: vec![DataStructure {
                    id: "DSD_BOP".to_string(),
                    agency: "IMF.STA".to_string(),
                    dimensions: vec![Dimension {
                        id: "COUNTRY".to_string(),
                        position: 0,
                        codelist: Some("CL_COUNTRY".to_string()),
                        concept: None,
                    }],
                    attributes: Vec::new(),
                }],
                hierarchies: Vec::new(),
            },
            codelists: vec![
                Codelist::new("CL_COUNTRY", "IMF").with_code("BRA", "Brazil"),
                Codelist::new("CL_UNIT", "IMF").with_code("USD", "US Dollar"),
            ],
            series: Vec::new(),
        };
        InMemoryService::new(fixture)
    }

    #[test]
    fn bulk_fetch_runs_once_per_dataflow() {
        let service = service();
        let cache = CodelistCache::new();
        let mut warnings = Warnings::new();

        let country = cache.get_or_fetch(
            &service,
            "IMF.STA",
            "CL_COUNTRY",
            Some("BOP"),
            &mut warnings,
        );
        assert_eq!(country.label("BRA"), Some("Brazil"));
        cache.get_or_fetch(&service, "IMF.STA", "CL_COUNTRY", Some("BOP"), &mut warnings);

        assert_eq!(service.calls(Endpoint::BulkCodelists), 1);
        assert_eq!(service.calls(Endpoint::Codelist), 0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn single_fetch_fills_bulk_gaps() {
        let service = service();
        let cache = CodelistCache::new();
        let mut warnings = Warnings::new();

        let unit = cache.get_or_fetch(&service, "IMF.STA", "CL_UNIT", Some("BOP"), &mut warnings);
        assert_eq!(unit.label("USD"), Some("US Dollar"));
        assert_eq!(service.calls(Endpoint::Codelist), 1);
    }

    #[test]
    fn missing_codelist_is_a_warning_and_empty() {
        let service = service();
        let cache = CodelistCache::new();
        let mut warnings = Warnings::new();

        let missing = cache.get_or_fetch(&service, "IMF.STA", "CL_NOPE", None, &mut warnings);
        assert!(missing.is_empty());
        cache.get_or_fetch(&service, "IMF.STA", "CL_NOPE", None, &mut warnings);

        assert_eq!(service.calls(Endpoint::Codelist), 1);
        assert_eq!(
            warnings.iter().next(),
            Some(&Warning::CodelistNotFound {
                codelist: "CL_NOPE".to_string()
            })
        );
    }

    #[test]
    fn fetch_failure_keeps_cached_entries() {
        let service = service();
        let cache = CodelistCache::new();
        let mut warnings = Warnings::new();
        cache.insert(Codelist::new("CL_UNIT", "IMF").with_code("EUR", "Euro"));

        service.fail(Endpoint::BulkCodelists);
        service.fail(Endpoint::Codelist);
        let country = cache.get_or_fetch(
            &service,
            "IMF.STA",
            "CL_COUNTRY",
            Some("BOP"),
            &mut warnings,
        );

        assert!(country.is_empty());
        assert_eq!(warnings.len(), 2);
        assert_eq!(
            cache.get("CL_UNIT").and_then(|cl| cl.label("EUR").map(str::to_string)).as_deref(),
            Some("Euro")
        );
        assert!(!cache.contains("CL_COUNTRY"));
    }
}
