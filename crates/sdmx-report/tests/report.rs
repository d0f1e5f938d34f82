//! Display matrices built from hand-made table rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use proptest::prelude::*;
use sdmx_model::{MatchedRow, RowOrder};
use sdmx_report::{
    ContextEntry, DateWindow, HierarchyContext, RowKind, is_qualifier, pivot, strip_title_suffix,
};

fn header(node: u32, level: u32, title: &str) -> MatchedRow {
    MatchedRow {
        order: RowOrder::new(node, 0),
        level,
        parent_id: None,
        parent_code: None,
        parent_order: None,
        hierarchy_node_id: format!("N{node}"),
        series_id: None,
        indicator_code: None,
        title: title.to_string(),
        dimensions: BTreeMap::new(),
        country: None,
        time_period: None,
        date: None,
        value: None,
        unit: Some("US Dollar".to_string()),
        scale: Some("Millions".to_string()),
        is_header: true,
    }
}

fn data(
    node: u32,
    level: u32,
    title: &str,
    country: (&str, &str),
    values: &[(i32, f64)],
) -> Vec<MatchedRow> {
    values
        .iter()
        .map(|(year, value)| MatchedRow {
            order: RowOrder::new(node, 0),
            level,
            parent_id: None,
            parent_code: None,
            parent_order: None,
            hierarchy_node_id: format!("N{node}"),
            series_id: Some(format!("BOP::N{node}")),
            indicator_code: None,
            title: title.to_string(),
            dimensions: BTreeMap::from([("COUNTRY".to_string(), country.0.to_string())]),
            country: Some(country.1.to_string()),
            time_period: Some(year.to_string()),
            date: NaiveDate::from_ymd_opt(*year, 12, 31),
            value: Some(*value),
            unit: Some("US Dollar".to_string()),
            scale: Some("Millions".to_string()),
            is_header: false,
        })
        .collect()
}

const BRA: (&str, &str) = ("BRA", "Brazil");
const ARG: (&str, &str) = ("ARG", "Argentina");

fn balance_of_payments() -> Vec<MatchedRow> {
    let mut rows = vec![header(1, 0, "Current account"), header(10, 0, "Financial account")];
    rows.extend(data(3, 2, "Goods, Credit", BRA, &[(2023, 90.0), (2024, 100.0)]));
    rows.extend(data(4, 2, "Goods, Debit", BRA, &[(2023, 70.0), (2024, 80.0)]));
    rows.extend(data(5, 2, "Goods, Net", BRA, &[(2023, 20.0), (2024, 20.0)]));
    rows.extend(data(7, 2, "Services, Credit", BRA, &[(2023, 30.0), (2024, 35.0)]));
    rows.extend(data(8, 2, "Services, Debit", BRA, &[(2023, 40.0), (2024, 45.0)]));
    rows.extend(data(9, 2, "Services, Net", BRA, &[(2023, -10.0), (2024, -10.0)]));
    rows.extend(data(
        11,
        1,
        "Financial account, Direct investment",
        BRA,
        &[(2023, 5.0), (2024, 6.5)],
    ));
    rows.extend(data(12, 1, "Financial account, Portfolio investment", BRA, &[(2024, 1.25)]));
    rows
}

#[test]
fn renders_balance_of_payments() {
    let mut matrix = pivot(&balance_of_payments(), &DateWindow::default(), &[]);
    matrix.title = Some("Balance of payments".to_string());
    insta::assert_snapshot!(matrix.to_string(), @r"
Balance of payments (US Dollar, Millions)
Indicator | Country | 2024 | 2023
▸ Current account
   ▸ Goods, Net | Brazil | 20 | 20
      Credit | Brazil | 100 | 90
      Debit | Brazil | 80 | 70
   ▸ Services, Net | Brazil | -10 | -10
      Credit | Brazil | 35 | 30
      Debit | Brazil | 45 | 40
▸ Financial account
   Direct investment | Brazil | 6.5 | 5
   Portfolio investment | Brazil | 1.25 | ..
");
}

#[test]
fn net_heads_credit_and_debit() {
    let matrix = pivot(&balance_of_payments(), &DateWindow::default(), &[]);
    let goods: Vec<(&str, u32, RowKind)> = matrix.rows[1..4]
        .iter()
        .map(|row| (row.label.as_str(), row.level, row.kind))
        .collect();
    assert_eq!(
        goods,
        [
            ("Goods, Net", 1, RowKind::Group),
            ("Credit", 2, RowKind::Data),
            ("Debit", 2, RowKind::Data),
        ]
    );
}

#[test]
fn countries_share_each_order() {
    let mut rows = vec![header(1, 0, "Current account")];
    for country in [BRA, ARG] {
        rows.extend(data(3, 1, "Goods, Credit", country, &[(2024, 10.0)]));
        rows.extend(data(4, 1, "Goods, Debit", country, &[(2024, 8.0)]));
        rows.extend(data(5, 1, "Goods, Net", country, &[(2024, 2.0)]));
    }
    let matrix = pivot(&rows, &DateWindow::default(), &[]);
    let lines: Vec<(&str, Option<&str>)> = matrix
        .rows
        .iter()
        .map(|row| (row.label.as_str(), row.country.as_deref()))
        .collect();
    assert_eq!(
        lines,
        [
            ("Current account", None),
            ("Goods, Net", Some("Argentina")),
            ("Goods, Net", Some("Brazil")),
            ("Credit", Some("Argentina")),
            ("Credit", Some("Brazil")),
            ("Debit", Some("Argentina")),
            ("Debit", Some("Brazil")),
        ]
    );
}

#[test]
fn bookkeeping_headers_are_hidden_and_children_move_up() {
    let mut rows = vec![header(1, 0, "Current account"), header(2, 1, "Net")];
    rows.extend(data(3, 2, "Balance on goods", BRA, &[(2024, 1.0)]));
    let matrix = pivot(&rows, &DateWindow::default(), &[]);
    let labels: Vec<String> = matrix.rows.iter().map(|row| row.indented_label()).collect();
    assert_eq!(labels, ["▸ Current account", "   Balance on goods"]);
}

#[test]
fn headers_without_data_below_are_dropped() {
    let mut rows = balance_of_payments();
    rows.retain(|row| row.order.node < 10);
    rows.push(header(10, 0, "Financial account"));
    let matrix = pivot(&rows, &DateWindow::default(), &[]);
    assert!(matrix.rows.iter().all(|row| row.label != "Financial account"));
}

#[test]
fn window_limits_columns_and_drops_empty_rows() {
    let window = DateWindow {
        start: NaiveDate::from_ymd_opt(2023, 1, 1),
        end: NaiveDate::from_ymd_opt(2023, 12, 31),
        limit: None,
    };
    let matrix = pivot(&balance_of_payments(), &window, &[]);
    assert_eq!(matrix.columns, ["2023"]);
    assert!(matrix.rows.iter().all(|row| row.label != "Portfolio investment"));
    assert!(matrix.rows.iter().any(|row| row.label == "Direct investment"));
}

const PARTS: &[&str] = &[
    "Goods",
    "Services",
    "Loans",
    "Assets",
    "Liabilities",
    "Current account",
    "Financial account",
    "Direct investment",
    "Domestic Creditors",
    "Total liabilities",
    "Net incurrence of liabilities",
];

const ENDINGS: &[&str] = &["", ", Credit", ", Debit", ", Net"];

fn title() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(prop::sample::select(PARTS), 1..4),
        prop::sample::select(ENDINGS),
    )
        .prop_map(|(parts, ending)| format!("{}{ending}", parts.join(", ")))
}

fn context() -> impl Strategy<Value = HierarchyContext> {
    prop::collection::vec((0u32..4, title(), any::<bool>()), 1..14).prop_map(|raw| {
        let mut previous: Option<u32> = None;
        let entries = raw
            .into_iter()
            .zip(1u32..)
            .map(|((level, title, is_header), node)| {
                let level = previous.map_or(0, |prev| level.min(prev + 1));
                previous = Some(level);
                ContextEntry {
                    order: RowOrder::new(node, 0),
                    title,
                    level,
                    is_header,
                }
            })
            .collect();
        HierarchyContext::new(entries)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn simplification_is_idempotent_and_keeps_content(ctx in context()) {
        for entry in ctx.entries() {
            let once = ctx.simplify(entry.order, &entry.title, None);
            prop_assert!(!once.title.trim().is_empty());
            prop_assert_eq!(ctx.simplify_title(entry.order, &once.title, None), once.title.clone());
            if is_qualifier(&once.title) {
                prop_assert!(
                    once.net_group.is_some() || is_qualifier(strip_title_suffix(&entry.title))
                );
            }
        }
    }
}
