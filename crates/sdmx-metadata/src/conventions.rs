//! Naming conventions for dimensions shared across dataflows.

/// Dimensions that identify what is measured, in the order they are
/// preferred when composing series identifiers.
pub const INDICATOR_DIMENSIONS: &[&str] = &[
    "INDICATOR",
    "PRODUCTION_INDEX",
    "COICOP_1999",
    "INDEX_TYPE",
    "ACTIVITY",
    "PRODUCT",
    "SERIES",
    "ITEM",
    "BOP_ACCOUNTING_ENTRY",
    "ACCOUNTING_ENTRY",
];

/// Dimensions whose codelist may carry presentation tables, in lookup order.
pub const TABLE_CODELIST_DIMENSIONS: &[&str] = &[
    "INDICATOR",
    "COICOP_1999",
    "PRODUCTION_INDEX",
    "ACTIVITY",
    "PRODUCT",
    "SERIES",
    "ITEM",
    "ACCOUNTING_ENTRY",
    "SECTOR",
];

/// Dimensions holding a reporting country or area.
pub const COUNTRY_DIMENSIONS: &[&str] = &["COUNTRY", "REF_AREA", "JURISDICTION", "AREA"];

/// True for dimensions that identify the measured quantity.
pub fn is_indicator_dimension(dimension: &str) -> bool {
    let upper = dimension.to_ascii_uppercase();
    INDICATOR_DIMENSIONS.contains(&upper.as_str())
        || upper.contains("INDICATOR")
        || upper.contains("ENTRY")
}

pub fn is_country_dimension(dimension: &str) -> bool {
    let upper = dimension.to_ascii_uppercase();
    COUNTRY_DIMENSIONS.contains(&upper.as_str())
}

/// Accounting-entry dimensions discriminate one indicator code between
/// branches (credit/debit, assets/liabilities).
pub fn is_entry_dimension(dimension: &str) -> bool {
    dimension.to_ascii_uppercase().contains("ACCOUNTING_ENTRY")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_like_dimensions() {
        assert!(is_indicator_dimension("INDICATOR"));
        assert!(is_indicator_dimension("bop_accounting_entry"));
        assert!(is_indicator_dimension("GFS_INDICATOR"));
        assert!(!is_indicator_dimension("COUNTRY"));
        assert!(is_entry_dimension("BOP_ACCOUNTING_ENTRY"));
        assert!(is_country_dimension("ref_area"));
    }
}
