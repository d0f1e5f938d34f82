//! The table build: resolve, select, narrow, fetch, match.

use std::collections::BTreeMap;
use std::time::Instant;

use sdmx_client::DataQuery;
use sdmx_client::urls::build_data_key;
use sdmx_hierarchy::{HierarchyParser, ParseOptions, ParsedHierarchy, RegistryResolver};
use sdmx_metadata::{MetadataRegistry, TableSummary};
use sdmx_model::{EngineError, Frequency, Result, TableResult, Warnings};
use sdmx_validate::{ConstraintCache, ConstraintValidator};
use tracing::{debug, info, info_span};

use crate::assemble::RowAssembler;
use crate::narrow::{Narrowing, check_compatible};
use crate::normalize::Normalizer;
use crate::request::{TableRef, TableRequest, normalize_filters, resolve_table_ref};
use crate::select::{NodeFilter, count_indicators, group_codes, select_nodes};

const FREQUENCY_DIMENSIONS: &[&str] = &["FREQUENCY", "FREQ"];

/// Builds tables against one registry and a shared constraint cache.
pub struct TableBuilder<'a> {
    registry: &'a MetadataRegistry,
    constraints: &'a ConstraintCache,
}

impl<'a> TableBuilder<'a> {
    pub fn new(registry: &'a MetadataRegistry, constraints: &'a ConstraintCache) -> Self {
        Self { registry, constraints }
    }

    /// Picks the table a reference names, or the only table of its dataflow.
    pub fn resolve_table(
        &self,
        table_ref: &TableRef,
        warnings: &mut Warnings,
    ) -> Result<TableSummary> {
        let tables = self.registry.dataflow_tables(&table_ref.dataflow, None, warnings)?;
        let available = || tables.iter().map(|t| t.id.clone()).collect::<Vec<_>>();
        match &table_ref.table {
            Some(id) => tables
                .iter()
                .find(|t| t.id.eq_ignore_ascii_case(id))
                .cloned()
                .ok_or_else(|| EngineError::TableNotFound {
                    dataflow: table_ref.dataflow.clone(),
                    table: id.clone(),
                    available: available(),
                }),
            None => match tables.as_slice() {
                [only] => {
                    debug!(
                        dataflow = %table_ref.dataflow,
                        table = %only.id,
                        "Auto-selected the only table"
                    );
                    Ok(only.clone())
                }
                [] => Err(EngineError::NoTables {
                    dataflow: table_ref.dataflow.clone(),
                }),
                _ => Err(EngineError::AmbiguousTable {
                    dataflow: table_ref.dataflow.clone(),
                    available: available(),
                }),
            },
        }
    }

    /// Parsed structure of a table without fetching any data.
    pub fn table_structure(
        &self,
        table_ref: &TableRef,
        warnings: &mut Warnings,
    ) -> Result<ParsedHierarchy> {
        let summary = self.resolve_table(table_ref, warnings)?;
        let flow = self.registry.dataflow(&table_ref.dataflow)?;
        let structure = self.registry.structure(&flow.id)?;
        let hierarchy = self
            .registry
            .hierarchy(&summary.id)
            .ok_or_else(|| EngineError::TableNotFound {
                dataflow: flow.id.clone(),
                table: summary.id.clone(),
                available: Vec::new(),
            })?;
        let resolver = RegistryResolver::new(self.registry, &flow.id);
        let options = ParseOptions {
            top_code: table_ref.top_code.clone(),
        };
        Ok(HierarchyParser::new(flow, structure, &resolver).parse(hierarchy, &options, warnings))
    }

    /// Fetches the data of one table and reconciles it against the hierarchy.
    pub fn get_table(&self, request: &TableRequest) -> Result<TableResult> {
        let started = Instant::now();
        let table_ref = resolve_table_ref(request.dataflow.as_deref(), request.table.as_deref())?;
        let span = info_span!(
            "get_table",
            dataflow = %table_ref.dataflow,
            table = table_ref.table.as_deref().unwrap_or("auto")
        );
        let _guard = span.enter();
        let mut warnings = Warnings::new();

        let flow = self.registry.dataflow(&table_ref.dataflow)?;
        let structure = self.registry.structure(&flow.id)?;
        let filters = normalize_filters(&flow.id, structure, &request.filters)?;

        let tree =
            info_span!("parse").in_scope(|| self.table_structure(&table_ref, &mut warnings))?;
        let node_filter = NodeFilter {
            indicators: request.indicators.clone(),
            parent: request.parent.clone(),
            depth: request.depth,
        };
        let selected = select_nodes(&tree, &node_filter);
        let total_indicators = count_indicators(&tree, &selected);
        if total_indicators == 0 {
            return Err(EngineError::InvalidRequest(format!(
                "no entries of table '{}' match the requested indicators, parent or depth",
                tree.id
            )));
        }
        let groups = group_codes(&tree, &selected);

        let mut validator = ConstraintValidator::new(self.registry, self.constraints, &flow.id)?;
        check_compatible(&flow.id, &tree.id, validator.dimensions(), &groups, &filters)?;
        let plan = info_span!("narrow").in_scope(|| {
            Narrowing::new(&mut validator, &tree.id)
                .report_unavailable(!request.indicators.is_empty())
                .run(&groups, &filters, &mut warnings)
        })?;
        validator.check_time_range(request.start, request.end, &mut warnings)?;

        let query = DataQuery {
            agency: flow.agency.clone(),
            dataflow: flow.id.clone(),
            key: build_data_key(validator.dimensions(), &plan.selections),
            start: request.start,
            end: request.end,
            frequency: requested_frequency(&filters),
            last_n: request.limit,
            params: BTreeMap::new(),
        };
        let message = info_span!("fetch").in_scope(|| -> Result<_> {
            let fetch_started = Instant::now();
            let mut message = self.registry.service().data(&query)?;
            message.apply_groups();
            debug!(
                key = %query.key,
                series = message.series.len(),
                observations = message.observation_count(),
                duration_ms = fetch_started.elapsed().as_millis(),
                "fetch complete"
            );
            Ok(message)
        })?;

        let normalizer = Normalizer::new(self.registry, &flow.id, &mut warnings)?;
        let observations: Vec<_> = normalizer
            .rows(&message)
            .into_iter()
            .filter(|row| plan.keeps(&row.dimensions))
            .collect();
        if observations.is_empty() {
            return Err(EngineError::EmptyResult {
                dataflow: flow.id.clone(),
                url: message.url,
            });
        }

        let indicator_codelist = tree
            .codelist_id
            .as_deref()
            .map(|id| self.registry.codelist(&flow.id, id, &mut warnings));
        let assembled = info_span!("match").in_scope(|| {
            RowAssembler::new(&tree, &selected, &flow.id)
                .with_indicator_codelist(indicator_codelist.as_deref())
                .assemble(observations, &mut warnings)
        });

        let mut metadata = tree.metadata();
        metadata.total_indicators = total_indicators;
        info!(
            rows = assembled.rows.len(),
            series = assembled.series.len(),
            warnings = warnings.len(),
            duration_ms = started.elapsed().as_millis(),
            "table complete"
        );
        Ok(TableResult {
            metadata,
            rows: assembled.rows,
            series: assembled.series,
            query_url: message.url,
            warnings: warnings.into_vec(),
        })
    }
}

/// A single frequency code from the filters, used for period bounds.
fn requested_frequency(filters: &BTreeMap<String, String>) -> Option<Frequency> {
    FREQUENCY_DIMENSIONS
        .iter()
        .find_map(|dim| filters.get(*dim))
        .filter(|value| !value.contains(['+', ',']))
        .and_then(|value| Frequency::parse(value.trim()))
}
