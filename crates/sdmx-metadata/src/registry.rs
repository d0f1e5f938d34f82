//! The metadata registry.
//!
//! Holds dataflows, data structures and presentation hierarchies loaded once
//! from the service, plus the codelist cache and memoised codelist
//! resolutions. Construct one per process and pass it by reference.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use sdmx_client::{SdmxService, StructureBundle};
use sdmx_model::{
    CodeUrn, Codelist, DataStructure, Dataflow, Dimension, EngineError, HierarchicalCode, Hierarchy,
    Result, Warning, Warnings,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::CodelistCache;
use crate::conventions::{TABLE_CODELIST_DIMENSIONS, is_indicator_dimension};
use crate::resolve::{ResolveContext, resolve_codelist};
use crate::search::parse_search_query;

/// Number of hierarchy codes sampled when checking that a table is queryable.
const QUERYABLE_SAMPLE_SIZE: usize = 10;

/// A presentation table available for a dataflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub dataflow_id: String,
    pub codelist_id: Option<String>,
    pub entry_count: usize,
}

/// Shared, read-mostly metadata for every dataflow of a service.
pub struct MetadataRegistry {
    service: Arc<dyn SdmxService>,
    dataflows: BTreeMap<String, Dataflow>,
    structures: BTreeMap<String, DataStructure>,
    hierarchies: BTreeMap<String, Hierarchy>,
    /// Hierarchy id to its primary codelist.
    hierarchy_codelists: BTreeMap<String, String>,
    /// Codelist id to every hierarchy that references it.
    codelist_hierarchies: BTreeMap<String, Vec<String>>,
    codelists: CodelistCache,
    resolutions: RwLock<HashMap<(String, String), Option<String>>>,
}

impl MetadataRegistry {
    /// Loads structural metadata from the service.
    pub fn load(service: Arc<dyn SdmxService>) -> Result<Self> {
        let start = Instant::now();
        let bundle = service.structures()?;
        let registry = Self::from_bundle(service, bundle);
        info!(
            dataflows = registry.dataflows.len(),
            structures = registry.structures.len(),
            hierarchies = registry.hierarchies.len(),
            duration_ms = start.elapsed().as_millis(),
            "Metadata registry loaded"
        );
        Ok(registry)
    }

    /// Builds a registry from already fetched metadata.
    pub fn from_bundle(service: Arc<dyn SdmxService>, bundle: StructureBundle) -> Self {
        let mut hierarchy_codelists = BTreeMap::new();
        let mut codelist_hierarchies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for hierarchy in &bundle.hierarchies {
            if let Some(primary) = hierarchy.primary_codelist() {
                hierarchy_codelists.insert(hierarchy.id.clone(), primary);
            }
            for codelist in hierarchy.referenced_codelists() {
                codelist_hierarchies
                    .entry(codelist)
                    .or_default()
                    .push(hierarchy.id.clone());
            }
        }

        Self {
            service,
            dataflows: bundle
                .dataflows
                .into_iter()
                .map(|flow| (flow.id.clone(), flow))
                .collect(),
            structures: bundle
                .structures
                .into_iter()
                .map(|dsd| (dsd.id.clone(), dsd))
                .collect(),
            hierarchies: bundle
                .hierarchies
                .into_iter()
                .map(|h| (h.id.clone(), h))
                .collect(),
            hierarchy_codelists,
            codelist_hierarchies,
            codelists: CodelistCache::new(),
            resolutions: RwLock::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &dyn SdmxService {
        self.service.as_ref()
    }

    pub fn codelist_cache(&self) -> &CodelistCache {
        &self.codelists
    }

    pub fn dataflows(&self) -> impl Iterator<Item = &Dataflow> {
        self.dataflows.values()
    }

    pub fn dataflow(&self, id: &str) -> Result<&Dataflow> {
        self.dataflows
            .get(id)
            .or_else(|| self.dataflows.values().find(|f| f.id.eq_ignore_ascii_case(id)))
            .ok_or_else(|| EngineError::DataflowNotFound {
                dataflow: id.to_string(),
            })
    }

    pub fn structure(&self, dataflow_id: &str) -> Result<&DataStructure> {
        let flow = self.dataflow(dataflow_id)?;
        self.structures
            .get(&flow.structure_id)
            .ok_or_else(|| EngineError::StructureNotFound {
                dataflow: flow.id.clone(),
            })
    }

    pub fn hierarchy(&self, id: &str) -> Option<&Hierarchy> {
        self.hierarchies.get(id)
    }

    pub fn hierarchies(&self) -> impl Iterator<Item = &Hierarchy> {
        self.hierarchies.values()
    }

    /// Primary codelist of a hierarchy.
    pub fn primary_codelist(&self, hierarchy_id: &str) -> Option<&str> {
        self.hierarchy_codelists.get(hierarchy_id).map(String::as_str)
    }

    /// Hierarchies referencing a codelist at any level.
    pub fn hierarchies_for_codelist(&self, codelist_id: &str) -> Vec<&Hierarchy> {
        self.codelist_hierarchies
            .get(codelist_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.hierarchies.get(id))
            .collect()
    }

    /// Resolves the codelist behind a dimension. Results are memoised.
    ///
    /// Returns `None` when the dataflow, dimension or codelist is unknown; the
    /// dimension then has no enumerable value set.
    pub fn resolve_codelist(
        &self,
        dataflow_id: &str,
        dimension_id: &str,
        warnings: &mut Warnings,
    ) -> Option<String> {
        let memo_key = (dataflow_id.to_string(), dimension_id.to_ascii_uppercase());
        if let Some(hit) = self.read_resolutions(|memo| memo.get(&memo_key).cloned()) {
            return hit;
        }

        let flow = self.dataflow(dataflow_id).ok()?;
        let structure = self.structure(dataflow_id).ok()?;
        let fallback;
        let dimension = match structure.dimension(dimension_id) {
            Some(dimension) => dimension,
            None => {
                fallback = Dimension {
                    id: dimension_id.to_string(),
                    position: usize::MAX,
                    codelist: None,
                    concept: None,
                };
                &fallback
            }
        };

        if dimension.codelist.is_none() {
            self.codelists
                .ensure_dataflow(self.service(), &flow.agency, &flow.id, warnings);
        }
        let ctx = ResolveContext {
            dataflow: flow,
            structure,
            dimension,
        };
        let resolved = resolve_codelist(&ctx, &self.codelists.ids());
        match &resolved {
            Some(codelist) => {
                debug!(
                    dataflow = %flow.id,
                    dimension = dimension_id,
                    codelist = %codelist,
                    "Resolved codelist"
                );
            }
            None => warnings.push(Warning::CodelistUnresolved {
                dataflow: flow.id.clone(),
                dimension: dimension_id.to_string(),
            }),
        }

        if let Ok(mut memo) = self.resolutions.write() {
            memo.insert(memo_key, resolved.clone());
        }
        resolved
    }

    /// Codelist by id, fetched through the dataflow's bulk request when needed.
    pub fn codelist(
        &self,
        dataflow_id: &str,
        codelist_id: &str,
        warnings: &mut Warnings,
    ) -> Arc<Codelist> {
        match self.dataflow(dataflow_id) {
            Ok(flow) => self.codelists.get_or_fetch(
                self.service(),
                &flow.agency,
                codelist_id,
                Some(&flow.id),
                warnings,
            ),
            Err(_) => self.codelists.get_or_fetch(
                self.service(),
                &self.default_agency(),
                codelist_id,
                None,
                warnings,
            ),
        }
    }

    /// Codelist by id from a specific agency, skipping bulk requests.
    pub fn codelist_from_agency(
        &self,
        agency: &str,
        codelist_id: &str,
        warnings: &mut Warnings,
    ) -> Arc<Codelist> {
        self.codelists
            .get_or_fetch(self.service(), agency, codelist_id, None, warnings)
    }

    /// Codelist of a dimension, when one resolves.
    pub fn dimension_codelist(
        &self,
        dataflow_id: &str,
        dimension_id: &str,
        warnings: &mut Warnings,
    ) -> Option<Arc<Codelist>> {
        let id = self.resolve_codelist(dataflow_id, dimension_id, warnings)?;
        Some(self.codelist(dataflow_id, &id, warnings))
    }

    /// Dimension of a dataflow backed by the given codelist.
    ///
    /// Tries, in order: a dimension whose resolved codelist is the id, a
    /// dimension named like one `_` segment of the id, and a dimension whose
    /// name appears inside the id.
    pub fn dimension_for_codelist(
        &self,
        dataflow_id: &str,
        codelist_id: &str,
        warnings: &mut Warnings,
    ) -> Option<String> {
        let structure = self.structure(dataflow_id).ok()?;
        let dims = structure.dimension_ids();

        for dim in &dims {
            let resolved = self.resolve_codelist(dataflow_id, dim, warnings);
            if resolved.is_some_and(|id| id.eq_ignore_ascii_case(codelist_id)) {
                return Some(dim.clone());
            }
        }

        let upper = codelist_id.to_ascii_uppercase();
        let segments: BTreeSet<&str> = upper.split('_').collect();
        if let Some(dim) = dims
            .iter()
            .find(|dim| segments.contains(dim.to_ascii_uppercase().as_str()))
        {
            return Some(dim.clone());
        }

        dims.into_iter()
            .find(|dim| upper.contains(&dim.to_ascii_uppercase()))
    }

    /// Indicator-like dimensions of a dataflow in positional order.
    pub fn indicator_dimensions(&self, dataflow_id: &str) -> Vec<String> {
        self.structure(dataflow_id)
            .map(|dsd| {
                dsd.dimension_ids()
                    .into_iter()
                    .filter(|dim| is_indicator_dimension(dim))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when at least half of a sample of the hierarchy's codes map onto
    /// dimensions of the dataflow.
    pub fn is_hierarchy_queryable(
        &self,
        dataflow_id: &str,
        hierarchy: &Hierarchy,
        warnings: &mut Warnings,
    ) -> bool {
        let sample: Vec<String> = preorder(&hierarchy.codes)
            .into_iter()
            .filter_map(|code| CodeUrn::parse(&code.code_urn))
            .map(|urn| urn.maintainable_id)
            .take(QUERYABLE_SAMPLE_SIZE)
            .collect();
        if sample.is_empty() {
            return false;
        }
        let mapped = sample
            .iter()
            .filter(|codelist| {
                self.dimension_for_codelist(dataflow_id, codelist, warnings)
                    .is_some()
            })
            .count();
        mapped * 2 >= sample.len()
    }

    /// Presentation tables of a dataflow.
    ///
    /// The table codelist is the first indicator-like dimension whose codelist
    /// has hierarchies. With `available`, tables are kept only when one of
    /// their codes is available, exactly or as a prefix (`CODE_...`).
    pub fn dataflow_tables(
        &self,
        dataflow_id: &str,
        available: Option<&BTreeSet<String>>,
        warnings: &mut Warnings,
    ) -> Result<Vec<TableSummary>> {
        let flow = self.dataflow(dataflow_id)?;
        let structure = self.structure(dataflow_id)?;

        let mut found: Option<(String, Vec<&Hierarchy>)> = None;
        for dim in TABLE_CODELIST_DIMENSIONS {
            if !structure.has_dimension(dim) {
                continue;
            }
            let Some(codelist) = self.resolve_codelist(&flow.id, dim, warnings) else {
                continue;
            };
            let hierarchies = self.hierarchies_for_codelist(&codelist);
            if !hierarchies.is_empty() {
                found = Some((codelist, hierarchies));
                break;
            }
        }
        let Some((codelist, hierarchies)) = found else {
            return Ok(Vec::new());
        };

        let mut tables: Vec<TableSummary> = hierarchies
            .into_iter()
            .filter(|hierarchy| available.is_none_or(|codes| has_available_code(hierarchy, codes)))
            .map(|hierarchy| TableSummary {
                id: hierarchy.id.clone(),
                name: hierarchy.name.clone(),
                description: hierarchy.description.clone(),
                dataflow_id: flow.id.clone(),
                codelist_id: self
                    .primary_codelist(&hierarchy.id)
                    .map(str::to_string)
                    .or_else(|| Some(codelist.clone())),
                entry_count: hierarchy.entry_count(),
            })
            .collect();
        tables.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tables)
    }

    /// Dataflows whose id, name or description match a search query.
    pub fn search_dataflows(&self, query: &str) -> Vec<&Dataflow> {
        let query = parse_search_query(query);
        if query.is_empty() {
            return self.dataflows.values().collect();
        }
        self.dataflows
            .values()
            .filter(|flow| {
                query.matches(&format!("{} {} {}", flow.id, flow.name, flow.description))
            })
            .collect()
    }

    fn default_agency(&self) -> String {
        self.dataflows
            .values()
            .next()
            .map(|flow| flow.agency.clone())
            .unwrap_or_default()
    }

    fn read_resolutions<T>(
        &self,
        f: impl FnOnce(&HashMap<(String, String), Option<String>>) -> T,
    ) -> T {
        let guard = self.resolutions.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

fn has_available_code(hierarchy: &Hierarchy, available: &BTreeSet<String>) -> bool {
    preorder(&hierarchy.codes).into_iter().any(|entry| {
        let code = CodeUrn::parse(&entry.code_urn)
            .and_then(|urn| urn.item_id)
            .unwrap_or_else(|| entry.id.clone());
        let prefix = format!("{code}_");
        available
            .iter()
            .any(|value| *value == code || value.starts_with(&prefix))
    })
}

/// Entries of a hierarchy in pre-order.
fn preorder(roots: &[HierarchicalCode]) -> Vec<&HierarchicalCode> {
    let mut out = Vec::new();
    let mut stack: Vec<&HierarchicalCode> = roots.iter().rev().collect();
    while let Some(entry) = stack.pop() {
        out.push(entry);
        stack.extend(entry.children.iter().rev());
    }
    out
}
