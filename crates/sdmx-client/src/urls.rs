//! URL builders for the SDMX 3.0 REST API.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use sdmx_model::Frequency;
use sdmx_model::period::next_month_start;

use crate::service::{AvailabilityQuery, DataQuery};

/// A dimension whose joined codes exceed this many characters is sent as `*`.
pub const DATA_KEY_WILDCARD_THRESHOLD: usize = 1500;

const STRUCTURE_PARAMS: &str = "detail=full&references=none";
const DATA_PARAMS: &str = "dimensionAtObservation=TIME_PERIOD&detail=full&includeHistory=false";

/// Builds a dot-separated series key.
///
/// `dimension_ids` must be in positional order. Selections are matched
/// case-insensitively; missing, empty, wildcard or over-long selections become `*`.
pub fn build_data_key(
    dimension_ids: &[String],
    selections: &BTreeMap<String, Vec<String>>,
) -> String {
    dimension_ids
        .iter()
        .map(|dim| {
            let values = selections
                .iter()
                .find(|(id, _)| id.eq_ignore_ascii_case(dim))
                .map(|(_, values)| values.as_slice())
                .unwrap_or_default();
            key_part(values)
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn key_part(values: &[String]) -> String {
    let values: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() || values.contains(&"*") {
        return "*".to_string();
    }
    let joined = values.join("+");
    if joined.len() > DATA_KEY_WILDCARD_THRESHOLD {
        "*".to_string()
    } else {
        joined
    }
}

/// Structure query for one artefact type (`dataflow`, `datastructure`, `hierarchy`).
pub fn structure_url(base: &str, kind: &str, agency: &str) -> String {
    format!("{base}/structure/{kind}/{agency}/*/+?{STRUCTURE_PARAMS}")
}

/// All codelists referenced by a dataflow.
pub fn bulk_codelist_url(base: &str, agency: &str, dataflow: &str) -> String {
    format!("{base}/structure/codelist/{agency},{dataflow}/all?{STRUCTURE_PARAMS}")
}

pub fn codelist_url(base: &str, agency: &str, id: &str) -> String {
    format!("{base}/structure/codelist/{agency}/{id}/+?{STRUCTURE_PARAMS}")
}

pub fn availability_url(base: &str, query: &AvailabilityQuery) -> String {
    let component = query.component.as_deref().unwrap_or("all");
    format!(
        "{base}/availability/dataflow/{}/{}/+/{}/{component}",
        query.agency, query.dataflow, query.key
    )
}

/// `ge:`/`le:` bounds for the `c[TIME_PERIOD]` filter.
///
/// Annual requests are widened to whole years and everything else to whole
/// months; the upper bound is the first day of the following period.
pub fn time_period_filter(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    frequency: Option<Frequency>,
) -> Option<String> {
    let annual = frequency == Some(Frequency::Annual);
    let lower = start.and_then(|date| {
        if annual {
            NaiveDate::from_ymd_opt(date.year(), 1, 1)
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        }
    });
    let upper = end.and_then(|date| {
        if annual {
            NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
        } else {
            next_month_start(date)
        }
    });

    let mut parts = Vec::new();
    if let Some(lower) = lower {
        parts.push(format!("ge:{}", lower.format("%Y-%m-%d")));
    }
    if let Some(upper) = upper {
        parts.push(format!("le:{}", upper.format("%Y-%m-%d")));
    }
    (!parts.is_empty()).then(|| parts.join("+"))
}

pub fn data_url(base: &str, query: &DataQuery) -> String {
    let mut url = format!(
        "{base}/data/dataflow/{}/{}/+/{}?",
        query.agency, query.dataflow, query.key
    );
    for (name, value) in &query.params {
        url.push_str(&format!("{name}={value}&"));
    }
    if let Some(filter) = time_period_filter(query.start, query.end, query.frequency) {
        url.push_str(&format!("c[TIME_PERIOD]={filter}&"));
    }
    url.push_str(DATA_PARAMS);
    if let Some(limit) = query.last_n {
        url.push_str(&format!("&lastNObservations={limit}"));
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| (*id).to_string()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn data_key_orders_and_wildcards() {
        let selections = BTreeMap::from([
            ("indicator".to_string(), vec!["CA".to_string(), "KA".to_string()]),
            ("FREQUENCY".to_string(), vec!["*".to_string()]),
            ("SECTOR".to_string(), vec![" ".to_string()]),
        ]);
        let key = build_data_key(
            &dims(&["COUNTRY", "INDICATOR", "SECTOR", "FREQUENCY"]),
            &selections,
        );
        assert_eq!(key, "*.CA+KA.*.*");
    }

    #[test]
    fn over_long_selection_becomes_wildcard() {
        let codes: Vec<String> = (0..400).map(|i| format!("CODE{i}")).collect();
        let selections = BTreeMap::from([("INDICATOR".to_string(), codes)]);
        assert_eq!(build_data_key(&dims(&["INDICATOR"]), &selections), "*");
    }

    #[test]
    fn time_filter_precision_follows_frequency() {
        assert_eq!(
            time_period_filter(
                Some(date(2020, 6, 15)),
                Some(date(2022, 3, 1)),
                Some(Frequency::Annual),
            )
            .as_deref(),
            Some("ge:2020-01-01+le:2023-01-01")
        );
        assert_eq!(
            time_period_filter(
                Some(date(2020, 6, 15)),
                Some(date(2022, 12, 1)),
                Some(Frequency::Monthly),
            )
            .as_deref(),
            Some("ge:2020-06-01+le:2023-01-01")
        );
        assert_eq!(time_period_filter(None, None, None), None);
    }

    #[test]
    fn data_url_shape() {
        let query = DataQuery {
            agency: "IMF.STA".to_string(),
            dataflow: "BOP".to_string(),
            key: "BRA.CA.A".to_string(),
            start: Some(date(2020, 1, 1)),
            end: None,
            frequency: Some(Frequency::Annual),
            last_n: Some(5),
            params: BTreeMap::new(),
        };
        assert_eq!(
            data_url("https://sdmx.example.org", &query),
            "https://sdmx.example.org/data/dataflow/IMF.STA/BOP/+/BRA.CA.A?c[TIME_PERIOD]=ge:2020-01-01&dimensionAtObservation=TIME_PERIOD&detail=full&includeHistory=false&lastNObservations=5"
        );
    }

    #[test]
    fn availability_url_defaults_to_all_components() {
        let query = AvailabilityQuery {
            agency: "IMF.STA".to_string(),
            dataflow: "BOP".to_string(),
            key: "BRA.*.*".to_string(),
            component: None,
        };
        assert_eq!(
            availability_url("https://h", &query),
            "https://h/availability/dataflow/IMF.STA/BOP/+/BRA.*.*/all"
        );
    }
}
