//! Codelist resolution for dimensions.
//!
//! Candidate codelist ids are produced by an ordered list of pure strategies.
//! The first candidate present among the known codelists wins (exact match
//! first, then case-insensitive). When no candidate matches, counterpart
//! dimensions resolve through their base dimension, and a fuzzy pass over the
//! known ids runs last.

use std::collections::BTreeSet;

use sdmx_model::{DataStructure, Dataflow, Dimension};

use crate::conventions::is_country_dimension;

/// Inputs shared by every candidate strategy.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub dataflow: &'a Dataflow,
    pub structure: &'a DataStructure,
    pub dimension: &'a Dimension,
}

impl ResolveContext<'_> {
    fn dim(&self) -> String {
        self.dimension.id.to_ascii_uppercase()
    }

    fn concept(&self) -> Option<&str> {
        self.dimension
            .concept
            .as_ref()
            .map(|concept| concept.concept_id.as_str())
    }
}

/// Produces candidate codelist ids for one naming convention.
pub type CandidateStrategy = fn(&ResolveContext<'_>) -> Vec<String>;

/// Strategies in priority order.
pub const STRATEGIES: &[(&str, CandidateStrategy)] = &[
    ("country", country_candidates),
    ("dataflow", dataflow_candidates),
    ("structure", structure_candidates),
    ("concept_scheme", concept_scheme_candidates),
    ("generic", generic_candidates),
    ("common_mapping", common_mapping_candidates),
    ("known_fallback", known_fallback_candidates),
];

/// Dimensions that share a codelist under a common base name.
const COMMON_MAPPINGS: &[(&[&str], &str)] = &[
    (&["REF_AREA", "AREA", "COUNTRY", "JURISDICTION", "GEOGRAPHICAL_AREA"], "AREA"),
    (&["COUNTERPART_COUNTRY"], "COUNTRY"),
    (&["COMPOSITE_BREAKDOWN", "COMP_BREAKDOWN"], "COMPOSITE_BREAKDOWN"),
    (&["DISABILITY_STATUS", "DISABILITY"], "DISABILITY"),
    (&["INCOME_WEALTH_QUANTILE", "QUANTILE"], "QUANTILE"),
    (&["TYPE_OF_TRANSFORMATION", "TRANSFORMATION"], "TRANSFORMATION"),
    (&["WGT_TYPE", "WEIGHT_TYPE", "CTOT_WEIGHT_TYPE"], "WEIGHT_TYPE"),
    (&["INDICATOR", "INDICATORS"], "INDICATOR"),
    (&["UNIT", "UNIT_MEASURE", "UNIT_MULT"], "UNIT"),
];

const ACTIVITY_FALLBACKS: &[&str] = &[
    "CL_PPI_ACTIVITY",
    "CL_MCDREO_ACTIVITY",
    "CL_ACTIVITY_ISIC4",
    "CL_NEA_ACTIVITY",
    "CL_ACTIVITY",
];

const COICOP_FALLBACKS: &[&str] = &["CL_COICOP_1999", "CL_COICOP_2018"];

fn country_candidates(ctx: &ResolveContext<'_>) -> Vec<String> {
    let concept_is_country = ctx
        .concept()
        .is_some_and(|c| matches!(c, "COUNTRY" | "REF_AREA"));
    if !is_country_dimension(&ctx.dim()) && !concept_is_country {
        return Vec::new();
    }
    let df = &ctx.dataflow.id;
    let base = ctx.dataflow.base_id();
    vec![
        format!("CL_{base}_ISO_COUNTRY"),
        format!("CL_{df}_COUNTRY"),
        format!("CL_{base}_COUNTRY"),
    ]
}

fn dataflow_candidates(ctx: &ResolveContext<'_>) -> Vec<String> {
    let df = &ctx.dataflow.id;
    let dim = ctx.dim();
    let mut out = vec![format!("CL_{df}_{dim}"), format!("CL_{df}_{dim}_PUB")];
    if dim.contains("COUNTRY") {
        out.push(format!("CL_{df}_COUNTRY"));
        out.push(format!("CL_{df}_COUNTRY_PUB"));
    }
    if df.contains('_') {
        let base = ctx.dataflow.base_id();
        out.push(format!("CL_{base}_{dim}"));
        out.push(format!("CL_{base}_{dim}_PUB"));
    }
    out
}

fn structure_candidates(ctx: &ResolveContext<'_>) -> Vec<String> {
    let dsd = ctx.structure.id.strip_prefix("DSD_").unwrap_or(&ctx.structure.id);
    vec![format!("CL_{dsd}_{}", ctx.dim())]
}

fn concept_scheme_candidates(ctx: &ResolveContext<'_>) -> Vec<String> {
    let Some(concept) = &ctx.dimension.concept else {
        return Vec::new();
    };
    let scheme = concept.scheme_id.replacen("CS_", "CL_", 1);
    vec![format!("{scheme}_{}", ctx.dim()), scheme]
}

fn generic_candidates(ctx: &ResolveContext<'_>) -> Vec<String> {
    let mut out = vec![format!("CL_{}", ctx.dim())];
    if let Some(concept) = ctx.concept() {
        out.push(format!("CL_{}", concept.to_ascii_uppercase()));
    }
    out
}

fn common_mapping_candidates(ctx: &ResolveContext<'_>) -> Vec<String> {
    let dim = ctx.dim();
    let df = &ctx.dataflow.id;
    COMMON_MAPPINGS
        .iter()
        .filter(|(dims, _)| dims.contains(&dim.as_str()))
        .flat_map(|(_, base)| [format!("CL_{base}"), format!("CL_{df}_{base}")])
        .collect()
}

fn known_fallback_candidates(ctx: &ResolveContext<'_>) -> Vec<String> {
    let dim = ctx.dim();
    let list: &[&str] = if dim == "ACTIVITY" || dim == "PRODUCTION_INDEX" {
        ACTIVITY_FALLBACKS
    } else if dim.contains("COICOP") {
        COICOP_FALLBACKS
    } else {
        &[]
    };
    list.iter().map(|id| (*id).to_string()).collect()
}

/// Every candidate for a dimension, de-duplicated, in priority order.
pub fn candidate_codelists(ctx: &ResolveContext<'_>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    STRATEGIES
        .iter()
        .flat_map(|(_, strategy)| strategy(ctx))
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}

/// Resolves the codelist backing a dimension.
///
/// An explicit codelist reference on the dimension wins outright. Otherwise
/// `known` is the set of codelist ids that exist. Returns `None` when nothing
/// plausible is found.
pub fn resolve_codelist(ctx: &ResolveContext<'_>, known: &BTreeSet<String>) -> Option<String> {
    if let Some(explicit) = &ctx.dimension.codelist {
        return Some(explicit.clone());
    }

    let candidates = candidate_codelists(ctx);
    if let Some(hit) = candidates.iter().find(|c| known.contains(*c)) {
        return Some(hit.clone());
    }
    for candidate in &candidates {
        if let Some(hit) = known.iter().find(|k| k.eq_ignore_ascii_case(candidate)) {
            return Some(hit.clone());
        }
    }

    if let Some(base) = ctx.dim().strip_prefix("COUNTERPART_").filter(|b| !b.is_empty()) {
        let base_dimension = Dimension {
            id: base.to_string(),
            position: ctx.dimension.position,
            codelist: None,
            concept: None,
        };
        let base_ctx = ResolveContext {
            dimension: &base_dimension,
            ..*ctx
        };
        if let Some(hit) = resolve_codelist(&base_ctx, known) {
            return Some(hit);
        }
    }

    fuzzy_match(&ctx.dim(), known)
}

/// Last-resort matching on id fragments. Master codelists are never chosen.
fn fuzzy_match(dim: &str, known: &BTreeSet<String>) -> Option<String> {
    let eligible = || {
        known
            .iter()
            .filter(|id| !id.to_ascii_uppercase().starts_with("CL_MASTER"))
    };

    if let Some(hit) = eligible().find(|id| id.to_ascii_uppercase().contains(dim)) {
        return Some(hit.clone());
    }

    let dim_parts: Vec<&str> = dim.split('_').filter(|p| p.len() > 2).collect();
    if dim_parts.len() > 1 {
        if let Some(hit) = eligible().find(|id| {
            let upper = id.to_ascii_uppercase();
            dim_parts.iter().all(|part| upper.contains(part))
        }) {
            return Some(hit.clone());
        }
    }

    eligible()
        .find(|id| {
            let upper = id.to_ascii_uppercase();
            let segments: Vec<&str> = upper
                .split('_')
                .filter(|s| *s != "CL" && s.len() > 2)
                .collect();
            !segments.is_empty() && segments.iter().all(|s| dim.contains(s))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdmx_model::ConceptRef;

    fn flow(id: &str) -> Dataflow {
        Dataflow {
            id: id.to_string(),
            agency: "IMF.STA".to_string(),
            version: "1.0".to_string(),
            name: id.to_string(),
            description: String::new(),
            structure_id: format!("DSD_{id}"),
        }
    }

    fn structure(id: &str) -> DataStructure {
        DataStructure {
            id: id.to_string(),
            agency: "IMF.STA".to_string(),
            dimensions: Vec::new(),
            attributes: Vec::new(),
        }
    }

    fn dimension(id: &str) -> Dimension {
        Dimension {
            id: id.to_string(),
            position: 0,
            codelist: None,
            concept: None,
        }
    }

    fn known(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    fn resolve(df: &str, dsd: &str, dim: &Dimension, ids: &[&str]) -> Option<String> {
        let flow = flow(df);
        let structure = structure(dsd);
        let ctx = ResolveContext {
            dataflow: &flow,
            structure: &structure,
            dimension: dim,
        };
        resolve_codelist(&ctx, &known(ids))
    }

    #[test]
    fn explicit_reference_wins() {
        let mut dim = dimension("INDICATOR");
        dim.codelist = Some("CL_EXPLICIT".to_string());
        assert_eq!(resolve("BOP", "DSD_BOP", &dim, &[]).as_deref(), Some("CL_EXPLICIT"));
    }

    #[test]
    fn dataflow_pattern_beats_generic() {
        let dim = dimension("INDICATOR");
        let hit = resolve("BOP", "DSD_BOP", &dim, &["CL_INDICATOR", "CL_BOP_INDICATOR"]);
        assert_eq!(hit.as_deref(), Some("CL_BOP_INDICATOR"));
    }

    #[test]
    fn country_dimension_prefers_iso_codelist() {
        let dim = dimension("COUNTRY");
        let hit = resolve("QNEA_SA", "DSD_QNEA", &dim, &["CL_COUNTRY", "CL_QNEA_ISO_COUNTRY"]);
        assert_eq!(hit.as_deref(), Some("CL_QNEA_ISO_COUNTRY"));
    }

    #[test]
    fn case_insensitive_after_exact() {
        let dim = dimension("sector");
        let hit = resolve("GFS", "DSD_GFS", &dim, &["cl_gfs_sector"]);
        assert_eq!(hit.as_deref(), Some("cl_gfs_sector"));
    }

    #[test]
    fn concept_scheme_pattern() {
        let mut dim = dimension("TYPE");
        dim.concept = Some(ConceptRef {
            scheme_id: "CS_CPI".to_string(),
            concept_id: "TYPE".to_string(),
        });
        let hit = resolve("CPI", "DSD_CPI", &dim, &["CL_CPI_TYPE"]);
        assert_eq!(hit.as_deref(), Some("CL_CPI_TYPE"));
        let hit = resolve("CPI", "DSD_CPI", &dim, &["CL_CPI"]);
        assert_eq!(hit.as_deref(), Some("CL_CPI"));
    }

    #[test]
    fn common_mapping_and_counterpart() {
        let dim = dimension("REF_AREA");
        assert_eq!(resolve("X", "DSD_X", &dim, &["CL_AREA"]).as_deref(), Some("CL_AREA"));

        let dim = dimension("COUNTERPART_SECTOR");
        assert_eq!(resolve("X", "DSD_X", &dim, &["CL_SECTOR"]).as_deref(), Some("CL_SECTOR"));
    }

    #[test]
    fn activity_fallbacks() {
        let dim = dimension("ACTIVITY");
        assert_eq!(
            resolve("PPI", "DSD_PPI", &dim, &["CL_NEA_ACTIVITY", "CL_ACTIVITY_ISIC4"]).as_deref(),
            Some("CL_ACTIVITY_ISIC4")
        );
    }

    #[test]
    fn fuzzy_skips_master_lists() {
        let dim = dimension("PRICE_TYPE");
        assert_eq!(
            resolve("X", "DSD_X", &dim, &["CL_MASTER_PRICE_TYPE", "CL_X_PRICE_TYPE_V2"]).as_deref(),
            Some("CL_X_PRICE_TYPE_V2")
        );
        let dim = dimension("VALUATION_PRICE");
        assert_eq!(
            resolve("X", "DSD_X", &dim, &["CL_PRICE_AND_VALUATION"]).as_deref(),
            Some("CL_PRICE_AND_VALUATION")
        );
    }

    #[test]
    fn nothing_plausible_is_none() {
        let dim = dimension("FREQUENCY");
        assert_eq!(resolve("X", "DSD_X", &dim, &["CL_UNIT", "CL_MASTER_FREQ"]), None);
    }

    #[test]
    fn candidates_are_unique() {
        let flow = flow("BOP");
        let structure = structure("DSD_BOP");
        let dim = dimension("COUNTRY");
        let ctx = ResolveContext {
            dataflow: &flow,
            structure: &structure,
            dimension: &dim,
        };
        let candidates = candidate_codelists(&ctx);
        let unique: BTreeSet<_> = candidates.iter().collect();
        assert_eq!(unique.len(), candidates.len());
        assert_eq!(candidates[0], "CL_BOP_ISO_COUNTRY");
    }
}
