use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use sdmx_metadata::TableSummary;
use sdmx_model::{
    Dataflow, EngineError, TableResult, Warning, Warnings, parse_date_bound, parse_period_end,
};
use sdmx_report::{DateWindow, DisplayMatrix, pivot_table};
use sdmx_table::request::COUNTRY_ALIASES;
use sdmx_table::{TableBuilder, TableRequest, describe_error, normalize_filters};
use sdmx_validate::{ConstraintValidator, split_values};
use serde::Serialize;
use tracing::{info, info_span};

use crate::cli::{Command, DataflowsArgs, OptionsArgs, OutputFormatArg, TableArgs, TablesArgs};
use crate::output::{
    dataflows_table, matrix_table, options_table, rows_table, tables_table, write_json,
    write_matrix_csv, write_records_csv, write_rows_csv,
};
use crate::session::Session;

/// One legal value of a dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionOption {
    pub code: String,
    pub label: Option<String>,
}

/// A built table and its pivoted display form.
#[derive(Debug, Clone)]
pub struct TableOutput {
    pub result: TableResult,
    pub matrix: DisplayMatrix,
}

impl TableOutput {
    /// Warnings of the build followed by those of the pivot.
    pub fn warnings(&self) -> Vec<Warning> {
        let mut warnings = self.result.warnings.clone();
        warnings.extend(self.matrix.warnings.iter().cloned());
        warnings
    }
}

/// Runs a command and writes its output; returns the warnings to report.
pub fn execute(command: &Command, session: &Session, out: &mut dyn Write) -> Result<Vec<Warning>> {
    match command {
        Command::Dataflows(args) => run_dataflows(session, args, out).map(|()| Vec::new()),
        Command::Tables(args) => run_tables(session, args, out),
        Command::Options(args) => run_options(session, args, out),
        Command::Table(args) => run_table(session, args, out),
    }
}

pub fn run_dataflows(session: &Session, args: &DataflowsArgs, out: &mut dyn Write) -> Result<()> {
    let flows = list_dataflows(session, args.search.as_deref());
    match args.format {
        OutputFormatArg::Table => writeln!(out, "{}", dataflows_table(&flows))?,
        OutputFormatArg::Csv => write_records_csv(&flows, out)?,
        OutputFormatArg::Json => write_json(&flows, out)?,
    }
    Ok(())
}

pub fn run_tables(
    session: &Session,
    args: &TablesArgs,
    out: &mut dyn Write,
) -> Result<Vec<Warning>> {
    let (tables, warnings) = list_tables(session, &args.dataflow, args.available)?;
    match args.format {
        OutputFormatArg::Table => writeln!(out, "{}", tables_table(&tables))?,
        OutputFormatArg::Csv => write_records_csv(&tables, out)?,
        OutputFormatArg::Json => write_json(&tables, out)?,
    }
    Ok(warnings.into_vec())
}

pub fn run_options(
    session: &Session,
    args: &OptionsArgs,
    out: &mut dyn Write,
) -> Result<Vec<Warning>> {
    let (dimension, options, warnings) =
        list_options(session, &args.dataflow, &args.dimension, &args.select)?;
    match args.format {
        OutputFormatArg::Table => writeln!(out, "{}", options_table(&dimension, &options))?,
        OutputFormatArg::Csv => write_records_csv(&options, out)?,
        OutputFormatArg::Json => write_json(&options, out)?,
    }
    Ok(warnings.into_vec())
}

pub fn run_table(session: &Session, args: &TableArgs, out: &mut dyn Write) -> Result<Vec<Warning>> {
    let output = build_table(session, args)?;
    match (args.format, args.raw) {
        (OutputFormatArg::Table, true) => writeln!(out, "{}", rows_table(&output.result.rows))?,
        (OutputFormatArg::Table, false) => {
            if let Some(heading) = output.matrix.heading() {
                writeln!(out, "{}", heading.trim_start())?;
            }
            writeln!(out, "{}", matrix_table(&output.matrix))?;
        }
        (OutputFormatArg::Csv, true) => write_rows_csv(&output.result.rows, out)?,
        (OutputFormatArg::Csv, false) => write_matrix_csv(&output.matrix, out)?,
        (OutputFormatArg::Json, true) => write_json(&output.result, out)?,
        (OutputFormatArg::Json, false) => write_json(&output.matrix, out)?,
    }
    Ok(output.warnings())
}

/// Dataflows matching a search query, or all of them.
pub fn list_dataflows(session: &Session, search: Option<&str>) -> Vec<Dataflow> {
    session
        .registry
        .search_dataflows(search.unwrap_or_default())
        .into_iter()
        .cloned()
        .collect()
}

/// Presentation tables of a dataflow.
///
/// With `available`, only tables with an indicator the service has data for
/// are kept.
pub fn list_tables(
    session: &Session,
    dataflow: &str,
    available: bool,
) -> Result<(Vec<TableSummary>, Warnings)> {
    let mut warnings = Warnings::new();
    let codes = if available {
        Some(available_indicators(session, dataflow)?)
    } else {
        None
    };
    let tables = session
        .registry
        .dataflow_tables(dataflow, codes.as_ref(), &mut warnings)
        .map_err(engine_error)?;
    Ok((tables, warnings))
}

fn available_indicators(session: &Session, dataflow: &str) -> Result<BTreeSet<String>> {
    let validator = ConstraintValidator::new(&session.registry, &session.constraints, dataflow)
        .map_err(engine_error)?;
    let mut codes = BTreeSet::new();
    for dimension in session.registry.indicator_dimensions(dataflow) {
        codes.extend(validator.options_for(&dimension).map_err(engine_error)?);
    }
    Ok(codes)
}

/// Legal values of a dimension after the given selections.
///
/// Returns the dimension id the key resolved to, the values with their
/// labels when a codelist is known, and any warnings.
pub fn list_options(
    session: &Session,
    dataflow: &str,
    dimension: &str,
    select: &[(String, String)],
) -> Result<(String, Vec<DimensionOption>, Warnings)> {
    let mut warnings = Warnings::new();
    let registry = &session.registry;
    let flow = registry.dataflow(dataflow).map_err(engine_error)?;
    let dimension = resolve_dimension(session, &flow.id, dimension)?;
    let selections = normalize_filters(
        &flow.id,
        registry.structure(&flow.id).map_err(engine_error)?,
        &select.iter().cloned().collect(),
    )
    .map_err(engine_error)?;

    let mut validator = ConstraintValidator::new(registry, &session.constraints, &flow.id)
        .map_err(engine_error)?;
    validator.validate(&selections, &mut warnings).map_err(engine_error)?;
    let codes = validator.options_for(&dimension).map_err(engine_error)?;

    let codelist = registry.dimension_codelist(&flow.id, &dimension, &mut warnings);
    let options = codes
        .into_iter()
        .map(|code| DimensionOption {
            label: codelist.as_ref().and_then(|cl| cl.label(&code)).map(str::to_string),
            code,
        })
        .collect();
    Ok((dimension, options, warnings))
}

/// Builds the requested table and pivots it for display.
pub fn build_table(session: &Session, args: &TableArgs) -> Result<TableOutput> {
    let span = info_span!("table", dataflow = %args.dataflow);
    let _guard = span.enter();
    let start = Instant::now();

    let request = TableRequest {
        dataflow: Some(args.dataflow.clone()),
        table: args.table.clone(),
        filters: args.filters.iter().cloned().collect(),
        start: args.start.as_deref().and_then(parse_date_bound),
        end: args.end.as_deref().and_then(parse_date_bound),
        limit: args.limit,
        depth: args.depth,
        parent: args.parent.clone(),
        indicators: args.indicators.clone(),
    };
    let result = TableBuilder::new(&session.registry, &session.constraints)
        .get_table(&request)
        .map_err(engine_error)?;

    let window = DateWindow {
        start: request.start,
        end: args.end.as_deref().and_then(parse_period_end),
        limit: args.limit.map(|n| n as usize),
    };
    let countries = country_labels(session, &result.metadata.dataflow_id, &request.filters);
    let matrix = pivot_table(&result, &window, &countries);
    info!(
        rows = result.rows.len(),
        lines = matrix.rows.len(),
        columns = matrix.columns.len(),
        duration_ms = start.elapsed().as_millis(),
        "table ready"
    );
    Ok(TableOutput { result, matrix })
}

/// Labels of the countries named by the filters, for the missing-country check.
fn country_labels(
    session: &Session,
    dataflow: &str,
    filters: &BTreeMap<String, String>,
) -> Vec<String> {
    let mut warnings = Warnings::new();
    let mut labels = Vec::new();
    for (key, value) in filters {
        let is_country = key.eq_ignore_ascii_case("country")
            || COUNTRY_ALIASES.iter().any(|alias| alias.eq_ignore_ascii_case(key));
        if !is_country {
            continue;
        }
        let codes = split_values(value);
        if codes.iter().any(|code| code == "*") {
            return Vec::new();
        }
        let codelist = resolve_dimension(session, dataflow, key)
            .ok()
            .and_then(|dimension| {
                session
                    .registry
                    .dimension_codelist(dataflow, &dimension, &mut warnings)
            });
        labels.extend(codes.into_iter().map(|code| {
            codelist
                .as_ref()
                .and_then(|cl| cl.label(&code))
                .map_or(code.clone(), str::to_string)
        }));
    }
    labels
}

/// Dimension id for a filter key or alias.
fn resolve_dimension(session: &Session, dataflow: &str, key: &str) -> Result<String> {
    let structure = session.registry.structure(dataflow).map_err(engine_error)?;
    let probe = BTreeMap::from([(key.to_string(), "*".to_string())]);
    normalize_filters(dataflow, structure, &probe)
        .map_err(engine_error)?
        .into_keys()
        .next()
        .with_context(|| format!("unknown dimension '{key}' for dataflow '{dataflow}'"))
}

fn engine_error(err: EngineError) -> anyhow::Error {
    anyhow!(describe_error(&err))
}
