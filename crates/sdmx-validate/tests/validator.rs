//! Progressive validation against the in-memory service.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use sdmx_client::{Endpoint, InMemoryService};
use sdmx_metadata::MetadataRegistry;
use sdmx_model::{EngineError, ErrorKind, Warnings};
use sdmx_validate::{ConstraintCache, ConstraintValidator, ValidationState};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/bop.json");

fn load() -> (Arc<InMemoryService>, MetadataRegistry) {
    let service = Arc::new(InMemoryService::from_json_file(Path::new(FIXTURE)).expect("fixture"));
    let registry = MetadataRegistry::load(service.clone()).expect("registry");
    (service, registry)
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

#[test]
fn options_narrow_with_prior_selections() {
    let (_, registry) = load();
    let cache = ConstraintCache::new();
    let mut validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
    let mut warnings = Warnings::new();

    assert_eq!(validator.options_for("COUNTRY").expect("countries"), ["ARG", "BRA"]);
    assert_eq!(validator.options_for("INDICATOR").expect("indicators"), ["DI", "G", "PI", "S"]);

    validator.set_dimension("country", "ARG", &mut warnings).expect("ARG is legal");
    assert_eq!(validator.partial_key("INDICATOR"), "ARG.*.*.*.*");
    assert_eq!(validator.options_for("INDICATOR").expect("indicators"), ["G"]);
}

#[test]
fn invalid_value_lists_exactly_the_legal_set() {
    let (_, registry) = load();
    let cache = ConstraintCache::new();
    let mut validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
    let mut warnings = Warnings::new();

    validator.set_dimension("COUNTRY", "BRA", &mut warnings).expect("BRA is legal");
    let err = validator
        .set_dimension("INDICATOR", "XX", &mut warnings)
        .expect_err("XX is not legal");

    assert_eq!(err.kind(), ErrorKind::Constraint);
    assert_eq!(
        err.to_string(),
        r#"Invalid value(s) for dimension 'INDICATOR': ["XX"]. Given prior selections {"COUNTRY": "BRA"}, available values are: ["DI", "G", "PI", "S"]"#
    );
    assert!(validator.selection("INDICATOR").is_none());
}

#[test]
fn wildcard_is_always_legal() {
    let (service, registry) = load();
    let cache = ConstraintCache::new();
    let mut validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
    let mut warnings = Warnings::new();

    validator.set_dimension("INDICATOR", "*", &mut warnings).expect("wildcard");
    assert_eq!(validator.selection("INDICATOR"), Some(&["*".to_string()][..]));
    assert_eq!(service.calls(Endpoint::Availability), 0);
}

#[test]
fn answers_are_cached_by_signature() {
    let (service, registry) = load();
    let cache = ConstraintCache::new();
    let validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");

    validator.options_for("COUNTRY").expect("countries");
    validator.options_for("country").expect("countries");
    assert_eq!(service.calls(Endpoint::Availability), 1);

    cache.clear();
    validator.options_for("COUNTRY").expect("countries");
    assert_eq!(service.calls(Endpoint::Availability), 2);
}

#[test]
fn shared_cache_does_not_leak_selections() {
    let (_, registry) = load();
    let cache = ConstraintCache::new();
    let mut warnings = Warnings::new();

    let mut argentina = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
    argentina.set_dimension("COUNTRY", "ARG", &mut warnings).expect("ARG");
    let brazil_free = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");

    assert_eq!(argentina.options_for("INDICATOR").expect("arg"), ["G"]);
    assert_eq!(brazil_free.options_for("INDICATOR").expect("all"), ["DI", "G", "PI", "S"]);
}

#[test]
fn state_follows_selections() {
    let (_, registry) = load();
    let cache = ConstraintCache::new();
    let mut validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
    let mut warnings = Warnings::new();
    assert_eq!(validator.state(), ValidationState::Unconstrained);
    assert_eq!(validator.next_dimension(), Some("COUNTRY"));

    let filters = BTreeMap::from([
        ("INDICATOR".to_string(), "G".to_string()),
        ("country".to_string(), "BRA".to_string()),
    ]);
    validator.validate(&filters, &mut warnings).expect("valid filters");
    assert_eq!(validator.state(), ValidationState::PartiallyConstrained);
    assert_eq!(validator.next_dimension(), Some("BOP_ACCOUNTING_ENTRY"));

    for (dim, value) in [("BOP_ACCOUNTING_ENTRY", "CD_T"), ("UNIT", "USD"), ("FREQUENCY", "A")] {
        validator.set_dimension(dim, value, &mut warnings).expect("legal");
    }
    assert_eq!(validator.state(), ValidationState::FullyConstrained);

    validator.reset();
    assert_eq!(validator.state(), ValidationState::Unconstrained);
}

#[test]
fn unknown_dimension_is_rejected() {
    let (_, registry) = load();
    let cache = ConstraintCache::new();
    let mut validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
    let mut warnings = Warnings::new();

    let err = validator
        .set_dimension("SECTOR", "S13", &mut warnings)
        .expect_err("unknown");
    assert!(matches!(err, EngineError::UnknownDimension { .. }));
}

#[test]
fn failed_lookup_accepts_with_warning() {
    let (service, registry) = load();
    let cache = ConstraintCache::new();
    let mut validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
    let mut warnings = Warnings::new();

    service.fail(Endpoint::Availability);
    validator.set_dimension("COUNTRY", "ZZZ", &mut warnings).expect("accepted");
    assert_eq!(validator.selection("COUNTRY"), Some(&["ZZZ".to_string()][..]));
    assert_eq!(warnings.iter().next().map(|w| w.code()), Some("constraint_lookup_failed"));

    let err = validator.options_for("INDICATOR").expect_err("remote failure");
    assert!(err.is_retryable());
}

#[test]
fn time_range_is_checked_against_coverage() {
    let (_, registry) = load();
    let cache = ConstraintCache::new();
    let mut validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
    let mut warnings = Warnings::new();
    validator.set_dimension("COUNTRY", "BRA", &mut warnings).expect("BRA");

    let err = validator
        .check_time_range(date(2024, 1, 1), None, &mut warnings)
        .expect_err("after coverage");
    assert!(matches!(err, EngineError::StartAfterLatest { .. }));

    let err = validator
        .check_time_range(None, date(2021, 12, 31), &mut warnings)
        .expect_err("before coverage");
    assert!(matches!(err, EngineError::EndBeforeEarliest { .. }));

    validator
        .check_time_range(date(2023, 1, 1), date(2023, 12, 31), &mut warnings)
        .expect("inside coverage");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn accepted_values_are_in_the_options_for_the_same_priors(
        country in prop::sample::select(vec!["BRA", "ARG"]),
        indicator in prop::sample::select(vec!["CA", "G", "S", "DI", "PI"]),
    ) {
        let (_, registry) = load();
        let cache = ConstraintCache::new();
        let mut warnings = Warnings::new();

        let mut validator = ConstraintValidator::new(&registry, &cache, "BOP").expect("validator");
        validator.set_dimension("COUNTRY", country, &mut warnings).expect("country");
        let accepted = validator.set_dimension("INDICATOR", indicator, &mut warnings).is_ok();

        let fresh_cache = ConstraintCache::new();
        let mut fresh =
            ConstraintValidator::new(&registry, &fresh_cache, "BOP").expect("validator");
        fresh.set_dimension("COUNTRY", country, &mut warnings).expect("country");
        let options = fresh.options_for("INDICATOR").expect("options");

        prop_assert_eq!(accepted, options.iter().any(|o| o == indicator));
    }
}
