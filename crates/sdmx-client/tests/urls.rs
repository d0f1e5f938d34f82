//! Request URLs as sent to the service.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use sdmx_client::urls::{availability_url, bulk_codelist_url, codelist_url, data_url};
use sdmx_client::{AvailabilityQuery, DataQuery};
use sdmx_model::Frequency;

const BASE: &str = "https://sdmx.example.org/rest";

fn query(frequency: Option<Frequency>, last_n: Option<u32>) -> DataQuery {
    DataQuery {
        agency: "IMF.STA".to_string(),
        dataflow: "BOP".to_string(),
        key: "BRA.*.G+S".to_string(),
        start: NaiveDate::from_ymd_opt(2020, 6, 15),
        end: NaiveDate::from_ymd_opt(2023, 3, 1),
        frequency,
        last_n,
        params: BTreeMap::new(),
    }
}

#[test]
fn annual_data_query_covers_whole_years() {
    insta::assert_snapshot!(
        data_url(BASE, &query(Some(Frequency::Annual), Some(3))),
        @"https://sdmx.example.org/rest/data/dataflow/IMF.STA/BOP/+/BRA.*.G+S?c[TIME_PERIOD]=ge:2020-01-01+le:2024-01-01&dimensionAtObservation=TIME_PERIOD&detail=full&includeHistory=false&lastNObservations=3"
    );
}

#[test]
fn other_data_queries_cover_whole_months() {
    insta::assert_snapshot!(
        data_url(BASE, &query(None, None)),
        @"https://sdmx.example.org/rest/data/dataflow/IMF.STA/BOP/+/BRA.*.G+S?c[TIME_PERIOD]=ge:2020-06-01+le:2023-04-01&dimensionAtObservation=TIME_PERIOD&detail=full&includeHistory=false"
    );
}

#[test]
fn structure_and_availability_queries() {
    insta::assert_snapshot!(
        bulk_codelist_url(BASE, "IMF.STA", "BOP"),
        @"https://sdmx.example.org/rest/structure/codelist/IMF.STA,BOP/all?detail=full&references=none"
    );
    insta::assert_snapshot!(
        codelist_url(BASE, "IMF.STA", "CL_UNIT"),
        @"https://sdmx.example.org/rest/structure/codelist/IMF.STA/CL_UNIT/+?detail=full&references=none"
    );
    let availability = AvailabilityQuery {
        agency: "IMF.STA".to_string(),
        dataflow: "BOP".to_string(),
        key: "BRA.*.*".to_string(),
        component: Some("INDICATOR".to_string()),
    };
    insta::assert_snapshot!(
        availability_url(BASE, &availability),
        @"https://sdmx.example.org/rest/availability/dataflow/IMF.STA/BOP/+/BRA.*.*/INDICATOR"
    );
}
