//! Integration tests for the metadata registry against the shared BOP fixture.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use sdmx_client::{Endpoint, InMemoryService};
use sdmx_metadata::MetadataRegistry;
use sdmx_model::{ErrorKind, Warning, Warnings};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/bop.json");

fn load() -> (Arc<InMemoryService>, MetadataRegistry) {
    let service = Arc::new(InMemoryService::from_json_file(Path::new(FIXTURE)).expect("fixture"));
    let registry = MetadataRegistry::load(service.clone()).expect("registry");
    (service, registry)
}

#[test]
fn resolves_every_bop_dimension() {
    let (_, registry) = load();
    let mut warnings = Warnings::new();

    let resolved: Vec<Option<String>> = [
        "COUNTRY",
        "BOP_ACCOUNTING_ENTRY",
        "INDICATOR",
        "UNIT",
        "FREQUENCY",
    ]
    .iter()
    .map(|dim| registry.resolve_codelist("BOP", dim, &mut warnings))
    .collect();

    assert_eq!(
        resolved,
        [
            Some("CL_BOP_COUNTRY".to_string()),
            Some("CL_BOP_ACCOUNTING_ENTRY".to_string()),
            Some("CL_BOP_INDICATOR".to_string()),
            Some("CL_UNIT".to_string()),
            Some("CL_FREQ".to_string()),
        ]
    );
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
}

#[test]
fn resolutions_are_memoised() {
    let (service, registry) = load();
    let mut warnings = Warnings::new();

    for _ in 0..3 {
        registry.resolve_codelist("BOP", "INDICATOR", &mut warnings);
        registry.resolve_codelist("bop", "country", &mut warnings);
    }

    assert_eq!(service.calls(Endpoint::BulkCodelists), 1);
    assert_eq!(service.calls(Endpoint::Codelist), 0);
}

#[test]
fn unknown_dimension_is_unresolved_with_warning() {
    let (_, registry) = load();
    let mut warnings = Warnings::new();

    assert_eq!(registry.resolve_codelist("BOP", "SECTOR", &mut warnings), None);
    assert_eq!(
        warnings.iter().next(),
        Some(&Warning::CodelistUnresolved {
            dataflow: "BOP".to_string(),
            dimension: "SECTOR".to_string(),
        })
    );
}

#[test]
fn codelist_labels_come_from_the_service() {
    let (_, registry) = load();
    let mut warnings = Warnings::new();

    let entries = registry
        .dimension_codelist("BOP", "BOP_ACCOUNTING_ENTRY", &mut warnings)
        .expect("entry codelist");
    assert_eq!(entries.label("NETCD_T"), Some("Net (credits less debits)"));

    let countries = registry.codelist("CPI", "CL_COUNTRY", &mut warnings);
    assert_eq!(countries.label("BRA"), Some("Brazil"));
    assert!(warnings.is_empty());
}

#[test]
fn dimension_for_codelist_matches_resolved_codelists() {
    let (_, registry) = load();
    let mut warnings = Warnings::new();

    assert_eq!(
        registry
            .dimension_for_codelist("BOP", "CL_BOP_ACCOUNTING_ENTRY", &mut warnings)
            .as_deref(),
        Some("BOP_ACCOUNTING_ENTRY")
    );
    assert_eq!(
        registry
            .dimension_for_codelist("BOP", "CL_BOP_INDICATOR", &mut warnings)
            .as_deref(),
        Some("INDICATOR")
    );
    assert_eq!(registry.dimension_for_codelist("BOP", "CL_SECTOR", &mut warnings), None);
}

#[test]
fn indicator_dimensions_follow_position() {
    let (_, registry) = load();
    assert_eq!(registry.indicator_dimensions("BOP"), ["BOP_ACCOUNTING_ENTRY", "INDICATOR"]);
}

#[test]
fn lists_tables_for_a_dataflow() {
    let (_, registry) = load();
    let mut warnings = Warnings::new();

    let tables = registry.dataflow_tables("BOP", None, &mut warnings).expect("tables");
    let ids: Vec<&str> = tables.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["H_BOP_BPM6", "H_BOP_GOODS_SERVICES"]);
    assert_eq!(tables[0].entry_count, 16);
    assert_eq!(tables[1].entry_count, 8);
    assert_eq!(tables[0].codelist_id.as_deref(), Some("CL_BOP_INDICATOR"));

    let cpi = registry.dataflow_tables("CPI", None, &mut warnings).expect("cpi tables");
    assert!(cpi.is_empty());
}

#[test]
fn availability_filters_tables() {
    let (_, registry) = load();
    let mut warnings = Warnings::new();

    let available = BTreeSet::from(["DI".to_string()]);
    let tables = registry
        .dataflow_tables("BOP", Some(&available), &mut warnings)
        .expect("tables");
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].id, "H_BOP_BPM6");
}

#[test]
fn unknown_dataflow_is_a_resolution_error() {
    let (_, registry) = load();
    let mut warnings = Warnings::new();

    let err = registry
        .dataflow_tables("NOPE", None, &mut warnings)
        .expect_err("unknown dataflow");
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert_eq!(registry.dataflow("cpi").map(|f| f.id.as_str()).ok(), Some("CPI"));
}

#[test]
fn hierarchy_queryability_depends_on_dataflow() {
    let (_, registry) = load();
    let mut warnings = Warnings::new();
    let hierarchy = registry.hierarchy("H_BOP_BPM6").expect("hierarchy").clone();

    assert!(registry.is_hierarchy_queryable("BOP", &hierarchy, &mut warnings));
    assert!(!registry.is_hierarchy_queryable("CPI", &hierarchy, &mut warnings));
}

#[test]
fn search_matches_names_and_descriptions() {
    let (_, registry) = load();

    let ids = |query: &str| -> Vec<String> {
        registry
            .search_dataflows(query)
            .into_iter()
            .map(|flow| flow.id.clone())
            .collect()
    };
    assert_eq!(ids("\"consumer price\""), ["CPI"]);
    assert_eq!(ids("balance | coicop"), ["BOP", "CPI"]);
    assert_eq!(ids("investment position"), ["BOP"]);
    assert_eq!(ids("").len(), 2);
    assert!(ids("tourism").is_empty());
}

#[test]
fn concurrent_resolution_shares_one_bulk_fetch() {
    let (service, registry) = load();
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let mut warnings = Warnings::new();
                let country = registry.resolve_codelist("BOP", "COUNTRY", &mut warnings);
                let codelist = registry.codelist("BOP", "CL_BOP_INDICATOR", &mut warnings);
                (country, codelist.label("CA").map(str::to_string))
            })
        })
        .collect();

    for handle in handles {
        let (country, label) = handle.join().expect("thread");
        assert_eq!(country.as_deref(), Some("CL_BOP_COUNTRY"));
        assert_eq!(label.as_deref(), Some("Current account"));
    }
    assert_eq!(service.calls(Endpoint::BulkCodelists), 1);
}

#[test]
fn failed_bulk_fetch_is_a_warning() {
    let (service, registry) = load();
    service.fail(Endpoint::BulkCodelists);
    let mut warnings = Warnings::new();

    let country = registry.resolve_codelist("BOP", "COUNTRY", &mut warnings);
    assert_eq!(country, None);
    assert!(warnings.iter().any(|w| w.code() == "codelist_fetch_failed"));
}
