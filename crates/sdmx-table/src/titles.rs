//! Row titles for matched observations and synthesized headers.

use sdmx_hierarchy::labels::is_unit_part;
use sdmx_model::{Codelist, IndicatorNode, ObservationRow};

use crate::matcher::{row_entry_code, row_indicator_code};

/// Trailing label parts that describe how a value is recorded, not what it is.
pub const RECORDING_SUFFIXES: &[&str] = &[
    "Stock positions",
    "Transactions",
    "Flows",
    "Stocks",
    "Cash basis",
    "Transactions (cash basis of recording)",
    "Memorandum Item",
];

/// Classification tags carried inside indicator names.
const CLASSIFICATION_TAGS: &[&str] = &["(Core FSI)", "(Additional FSI)"];

/// Currency codes that never qualify a title.
const AGGREGATE_CURRENCIES: &[&str] = &["_T", "W0", "W1", "W2", "ALL"];

/// Display text of the accounting entries.
pub fn entry_label(code: &str) -> Option<&'static str> {
    Some(match code {
        "CD_T" => "Credit",
        "DB_T" => "Debit",
        "NETCD_T" => "Net",
        "A_T" | "A_P" => "Assets",
        "L_T" | "L_P" => "Liabilities",
        "A_NFA_T" => "Assets (excl. reserves)",
        "L_NIL_T" => "Liabilities (incl. net incurrence)",
        "NNAFANIL_T" => "Net (Assets excl. reserves less Liabilities)",
        _ => return None,
    })
}

/// Codelists whose names are full comma-separated paths.
pub fn uses_path_labels(codelist: &str) -> bool {
    codelist.ends_with("_INDICATOR_PUB")
        || codelist.ends_with("_INDICATOR_DEFAULT_PUB")
        || codelist == "CL_DIP_INDICATOR"
}

/// Cleans a codelist name for use as a title.
///
/// Drops a trailing unit part and recording suffixes, removes classification
/// tags and repeated consecutive parts.
pub fn clean_indicator_name(name: &str) -> String {
    if !name.contains(", ") {
        return name.to_string();
    }
    let mut parts: Vec<&str> = name.split(", ").collect();
    if parts.last().is_some_and(|last| is_unit_part(last)) {
        parts.pop();
    }
    while parts.len() > 1 && parts.last().is_some_and(|last| RECORDING_SUFFIXES.contains(last)) {
        parts.pop();
    }
    parts.retain(|part| !CLASSIFICATION_TAGS.contains(part));
    parts.dedup();
    if parts.is_empty() {
        name.to_string()
    } else {
        parts.join(", ")
    }
}

/// Removes recording suffixes from a header label.
pub fn strip_recording_suffixes(label: &str) -> String {
    let mut parts: Vec<&str> = label.split(", ").collect();
    while parts.len() > 1 && parts.last().is_some_and(|last| RECORDING_SUFFIXES.contains(last)) {
        parts.pop();
    }
    parts.join(", ")
}

/// Title of a data row.
///
/// The indicator's codelist name is preferred; path-style codelists and rows
/// without a name use the node label, and the code is the last resort. The
/// accounting entry, a non-aggregate currency and a non-default CPI index type
/// qualify the title.
pub fn data_title(row: &ObservationRow, node: &IndicatorNode, dataflow: &str) -> String {
    let indicator = row_indicator_code(row);
    let codelist_name = INDICATOR_LABEL_DIMENSIONS
        .iter()
        .find_map(|dim| row.code(dim).and(row.label(dim)))
        .filter(|name| Some(*name) != indicator);

    let path_labels = node.codelist_id.as_deref().is_some_and(uses_path_labels);
    let mut title = match codelist_name {
        _ if path_labels && !node.label.is_empty() => node.label.clone(),
        Some(name) => clean_indicator_name(name),
        None if !node.label.is_empty() => node.label.clone(),
        None => indicator.unwrap_or(node.code()).replace('_', " "),
    };

    if let Some(label) = row_entry_code(row).and_then(entry_label) {
        title = format!("{title}, {label}");
    }

    if let (Some(code), Some(label)) = (row.code("CURRENCY"), row.label("CURRENCY")) {
        let same_as_unit = row.code("UNIT").is_some_and(|unit| unit == code);
        if !AGGREGATE_CURRENCIES.contains(&code) && !same_as_unit {
            title = format!("{title} ({label})");
        }
    }

    if dataflow == "CPI"
        && let Some(index_type) = row.code("INDEX_TYPE").filter(|code| *code != "CPI")
    {
        title = format!("{title} ({index_type})");
    }
    title
}

/// Indicator dimensions whose labels name the series.
const INDICATOR_LABEL_DIMENSIONS: &[&str] = &[
    "INDICATOR",
    "COICOP_1999",
    "PRODUCTION_INDEX",
    "ACTIVITY",
    "PRODUCT",
    "SERIES",
    "ITEM",
    "CLASSIFICATION",
];

/// Title of a synthesized header.
///
/// A label that is only the node's code is looked up in the indicator
/// codelist, exactly or as the base of a suffixed code.
pub fn header_title(node: &IndicatorNode, indicator_codelist: Option<&Codelist>) -> String {
    let code = node.indicator_code.as_deref();
    let mut label = node.label.clone();
    if let (Some(code), Some(codelist)) = (code, indicator_codelist)
        && label == code
    {
        let prefix = format!("{code}_");
        let name = codelist.label(code).or_else(|| {
            codelist
                .codes
                .values()
                .find(|entry| entry.id.starts_with(&prefix))
                .map(|entry| entry.name.as_str())
        });
        if let Some(name) = name {
            label = clean_indicator_name(name);
        }
    }
    strip_recording_suffixes(&label)
}

/// Part of a title before `", Net"`, when there is one.
pub fn net_base(title: &str) -> Option<&str> {
    title.find(", Net").filter(|at| *at > 0).map(|at| &title[..at])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn node(code: &str, label: &str, codelist: &str) -> IndicatorNode {
        IndicatorNode {
            id: code.to_string(),
            indicator_code: Some(code.to_string()),
            codelist_id: Some(codelist.to_string()),
            label: label.to_string(),
            full_label: label.to_string(),
            description: None,
            order: 1,
            depth: 0,
            parent_id: None,
            parent: None,
            is_group: false,
            dimension_id: Some("INDICATOR".to_string()),
            dimension_codes: BTreeMap::new(),
            series_id: None,
            synthetic: false,
        }
    }

    fn row(pairs: &[(&str, &str, &str)]) -> ObservationRow {
        ObservationRow {
            series_id: "BOP::X".to_string(),
            dimensions: pairs
                .iter()
                .map(|(dim, code, _)| ((*dim).to_string(), (*code).to_string()))
                .collect(),
            labels: pairs
                .iter()
                .map(|(dim, _, label)| ((*dim).to_string(), (*label).to_string()))
                .collect(),
            title: String::new(),
            time_period: "2024".to_string(),
            date: None,
            value: Some(1.0),
            unit: None,
            scale: None,
            unit_multiplier: None,
            derivation_type: None,
        }
    }

    #[test]
    fn indicator_names_lose_units_and_recording_suffixes() {
        assert_eq!(clean_indicator_name("Revenue, Transactions, Cash basis"), "Revenue");
        assert_eq!(
            clean_indicator_name("Capital to assets, (Core FSI), Percent"),
            "Capital to assets"
        );
        assert_eq!(clean_indicator_name("Loans, Loans, US dollar"), "Loans");
        assert_eq!(clean_indicator_name("Transactions"), "Transactions");
    }

    #[test]
    fn entry_qualifies_bop_titles() {
        let row = row(&[("INDICATOR", "G", "Goods"), ("BOP_ACCOUNTING_ENTRY", "CD_T", "Credit")]);
        assert_eq!(
            data_title(&row, &node("G", "Goods", "CL_BOP_INDICATOR"), "BOP"),
            "Goods, Credit"
        );

        let row = row_with_currency();
        assert_eq!(
            data_title(&row, &node("RES", "Reserves", "CL_X"), "IIPCC"),
            "Reserve assets (Euro)"
        );
    }

    fn row_with_currency() -> ObservationRow {
        row(&[
            ("INDICATOR", "RES", "Reserve assets"),
            ("CURRENCY", "EUR", "Euro"),
            ("UNIT", "USD", "US Dollar"),
        ])
    }

    #[test]
    fn path_codelists_and_missing_names_use_the_node_label() {
        let gold = row(&[("INDICATOR", "RAF", "Official reserve assets, Gold, US dollar")]);
        assert_eq!(
            data_title(&gold, &node("RAF", "Gold", "CL_IRFCL_INDICATOR_PUB"), "IRFCL"),
            "Gold"
        );

        let bare = row(&[("INDICATOR", "RAF_X", "RAF_X")]);
        assert_eq!(data_title(&bare, &node("RAF_X", "", "CL_X"), "IRFCL"), "RAF X");
    }

    #[test]
    fn cpi_index_type_is_appended() {
        let hicp = row(&[("INDEX_TYPE", "HICP", "Harmonised"), ("COICOP_1999", "_T", "All items")]);
        assert_eq!(
            data_title(&hicp, &node("_T", "All items", "CL_COICOP_1999"), "CPI"),
            "All items (HICP)"
        );
    }

    #[test]
    fn header_labels_fall_back_to_codelist_names() {
        let codelist = Codelist::new("CL_X", "IMF.STA")
            .with_code("AQ1_XDC", "Assets quality, Domestic currency");
        assert_eq!(header_title(&node("AQ1", "AQ1", "CL_X"), Some(&codelist)), "Assets quality");
        assert_eq!(
            header_title(&node("FA", "Financial account, Flows", "CL_X"), None),
            "Financial account"
        );
        assert_eq!(net_base("Goods, Net"), Some("Goods"));
        assert_eq!(net_base("Net lending"), None);
    }
}
