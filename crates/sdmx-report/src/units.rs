//! Unit and scale text carried inside indicator labels.

use serde::Serialize;

/// Recording qualifiers dropped from the end of display titles.
const RECORDING_SUFFIXES: &[&str] = &[", Transactions", ", Stocks", ", Flows"];

/// Words that mark a trailing parenthetical as a scale or unit.
const SCALE_WORDS: &[&str] = &["Millions", "Billions", "Thousands", "Percent", "Units"];

const PARENTHETICAL_UNIT_KEYWORDS: &[&str] = &[
    "dollar",
    "Dollar",
    "USD",
    "Euro",
    "euro",
    "Yen",
    "yen",
    "Percent",
    "percent",
    "%",
    "Millions",
    "Billions",
    "Thousands",
    "Units",
    "Per capita",
    "per capita",
    "Index",
    "index",
    "currency",
    "SDR",
];

const TRAILING_UNIT_KEYWORDS: &[&str] = &[
    "dollar", "percent", "index", "ratio", "currency", "capita", "cent",
];

/// Words that make the last comma-separated part of a title a unit.
const UNIT_WORDS: &[&str] = &[
    "dollars", "cents", "pound", "tonne", "ton", "meter", "metre", "liter", "litre", "barrel",
    "ounce", "kilogram", "gram", "index", "percent", "ratio", "rate", "number", "per",
];

const UNIT_OF_PREFIXES: &[&str] = &["Percent of ", "Ratio of ", "Index of ", "Number of "];
const SCALE_PREFIXES: &[&str] = &[
    "Per capita, ",
    "Percent, ",
    "Millions, ",
    "Billions, ",
    "Thousands, ",
    "Mean, ",
];
const SCALE_SUFFIXES: &[&str] = &[", Millions", ", Billions", ", Thousands", ", Per capita"];
const SCALE_ONLY: &[&str] = &["Per capita", "Millions", "Billions", "Thousands"];
const KNOWN_UNITS: &[&str] = &[
    "Percent",
    "US dollar",
    "US Dollar",
    "Index",
    "Ratio",
    "SDR",
    "EUR",
    "Domestic currency",
    "National currency",
    "Euro",
];

/// Bookkeeping qualifiers that never stand alone as a title.
pub const QUALIFIER_TERMS: &[&str] = &[
    "Net",
    "Credit",
    "Debit",
    "Credit/Revenue",
    "Debit/Expenditure",
    "Assets",
    "Liabilities",
    "Assets (excl. reserves)",
    "Liabilities (incl. net incurrence)",
];

/// A unit of measure and its scale, either of which may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitScale {
    pub unit: Option<String>,
    pub scale: Option<String>,
}

impl UnitScale {
    pub fn new(unit: Option<&str>, scale: Option<&str>) -> Self {
        Self {
            unit: unit.filter(|u| is_present(u)).map(str::to_string),
            scale: scale.filter(|s| is_present(s)).map(str::to_string),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unit.is_some() && self.scale.is_some()
    }

    /// Fills whichever half is missing from `other`.
    pub fn fill_from(&mut self, other: &UnitScale) {
        if self.unit.is_none() {
            self.unit.clone_from(&other.unit);
        }
        if self.scale.is_none() {
            self.scale.clone_from(&other.scale);
        }
    }
}

fn is_present(text: &str) -> bool {
    !text.is_empty() && text != "-" && text != "nan"
}

/// Splits `"Title (inner)"` into the title and the parenthetical content.
pub(crate) fn split_parenthetical(label: &str) -> Option<(&str, &str)> {
    let inner = label.strip_suffix(')')?;
    let start = inner.rfind(" (").filter(|at| *at > 0)?;
    Some((&label[..start], &inner[start + 2..]))
}

/// The unit part of an indicator label, if it carries one.
///
/// Looks at a trailing parenthetical first, then at the last comma-separated part.
pub fn extract_unit_from_label(label: &str) -> Option<&str> {
    if let Some((_, inner)) = split_parenthetical(label)
        && PARENTHETICAL_UNIT_KEYWORDS.iter().any(|kw| inner.contains(kw))
    {
        return Some(inner);
    }
    let (_, last) = label.rsplit_once(", ")?;
    let lower = last.to_ascii_lowercase();
    let is_unit =
        lower.contains(" per ") || TRAILING_UNIT_KEYWORDS.iter().any(|kw| lower.contains(kw));
    is_unit.then_some(last)
}

/// Splits a combined unit text such as `"US Dollar, Millions"` or
/// `"US cents per pound"` into unit and scale.
pub fn parse_unit_and_scale(text: &str) -> UnitScale {
    if text.is_empty() {
        return UnitScale::default();
    }
    for prefix in UNIT_OF_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            let unit = prefix.trim_end_matches(" of ");
            return owned(Some(unit), Some(format!("of {}", title_case(rest.trim())).as_str()));
        }
    }
    if let Some(at) = text.to_ascii_lowercase().find(" per ").filter(|at| *at > 0) {
        return owned(Some(text[..at].trim()), Some(title_case(text[at + 1..].trim()).as_str()));
    }
    for prefix in SCALE_PREFIXES {
        if let Some(unit) = text.strip_prefix(prefix) {
            return owned(Some(unit), Some(prefix.trim_end_matches(", ")));
        }
    }
    for suffix in SCALE_SUFFIXES {
        if let Some(unit) = text.strip_suffix(suffix) {
            return owned(Some(unit), Some(suffix.trim_start_matches(", ")));
        }
    }
    if let Some((scale, unit)) = text.rsplit_once(", ")
        && !scale.is_empty()
        && KNOWN_UNITS.contains(&unit)
    {
        return owned(Some(unit), Some(scale));
    }
    if SCALE_ONLY.contains(&text) {
        return owned(None, Some(text));
    }
    owned(Some(text), None)
}

fn owned(unit: Option<&str>, scale: Option<&str>) -> UnitScale {
    UnitScale {
        unit: unit.map(str::to_string),
        scale: scale.map(str::to_string),
    }
}

/// Capitalizes the first letter of every word.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut boundary = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if boundary {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(ch);
            boundary = true;
        }
    }
    out
}

/// Drops recording qualifiers and a trailing scale parenthetical.
///
/// Parentheticals that name a dimension value, such as `(Euro)`, stay.
pub fn strip_title_suffix(title: &str) -> &str {
    let title = RECORDING_SUFFIXES
        .iter()
        .find_map(|suffix| title.strip_suffix(suffix))
        .unwrap_or(title);
    match split_parenthetical(title) {
        Some((base, inner)) if SCALE_WORDS.iter().any(|word| inner.contains(word)) => base,
        _ => title,
    }
}

/// `" (unit, scale)"`, leaving out placeholders and the `Units` scale.
pub fn format_unit_suffix(unit: Option<&str>, scale: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(unit) = unit.filter(|u| is_present(u)) {
        parts.push(unit);
    }
    if let Some(scale) = scale.filter(|s| is_present(s) && *s != "Units") {
        parts.push(scale);
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

/// Unit and scale from a title's trailing parenthetical or last comma part.
pub fn extract_unit_scale_from_title(title: &str) -> UnitScale {
    if let Some((_, inner)) = split_parenthetical(title)
        && SCALE_WORDS.iter().any(|word| inner.contains(word))
    {
        let parts: Vec<&str> = inner.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
        return match parts.as_slice() {
            [only] if SCALE_WORDS.contains(only) => owned(None, Some(*only)),
            [only] => owned(Some(*only), None),
            [unit, scale, ..] => owned(Some(*unit), Some(*scale)),
            [] => UnitScale::default(),
        };
    }
    if let Some((_, last)) = title.rsplit_once(',') {
        let last = last.trim();
        let lower = last.to_ascii_lowercase();
        if lower
            .split(|c: char| !c.is_ascii_alphabetic())
            .any(|word| UNIT_WORDS.contains(&word))
        {
            return owned(Some(last), None);
        }
    }
    UnitScale::default()
}

/// Unit and scale read from a title by any of the known label shapes.
pub fn unit_scale_from_title(title: &str) -> UnitScale {
    let parsed = extract_unit_scale_from_title(title);
    if parsed.unit.is_some() || parsed.scale.is_some() {
        return parsed;
    }
    extract_unit_from_label(title).map(parse_unit_and_scale).unwrap_or_default()
}

/// True when the title is exactly one of [`QUALIFIER_TERMS`].
pub fn is_qualifier(title: &str) -> bool {
    QUALIFIER_TERMS.contains(&title.trim())
}

/// True when `text` is only an accounting-entry term or a lowercase fragment.
pub fn is_bop_suffix_only(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let normalized = text.trim_start_matches([',', ' ', ':']);
    if normalized.is_empty() {
        return true;
    }
    let starts_lowercase = normalized
        .split_whitespace()
        .next()
        .and_then(|word| word.chars().next())
        .is_some_and(char::is_lowercase);
    if starts_lowercase {
        return true;
    }
    let check = split_parenthetical(normalized).map_or(normalized, |(base, _)| base.trim());
    QUALIFIER_TERMS.iter().any(|term| term.eq_ignore_ascii_case(check))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_from_label_shapes() {
        assert_eq!(
            extract_unit_from_label("Trade balance (US Dollar, Millions)"),
            Some("US Dollar, Millions")
        );
        assert_eq!(extract_unit_from_label("GDP growth rate, Percent"), Some("Percent"));
        assert_eq!(extract_unit_from_label("Reserve assets (Euro)"), Some("Euro"));
        assert_eq!(extract_unit_from_label("Goods, Credit"), None);
    }

    #[test]
    fn unit_and_scale_split() {
        assert_eq!(
            parse_unit_and_scale("Per capita, US dollar"),
            owned(Some("US dollar"), Some("Per capita"))
        );
        assert_eq!(
            parse_unit_and_scale("US Dollar, Millions"),
            owned(Some("US Dollar"), Some("Millions"))
        );
        assert_eq!(
            parse_unit_and_scale("US dollars per metric tonne"),
            owned(Some("US dollars"), Some("Per Metric Tonne"))
        );
        assert_eq!(
            parse_unit_and_scale("Percent of exports"),
            owned(Some("Percent"), Some("of Exports"))
        );
        assert_eq!(parse_unit_and_scale("Millions"), owned(None, Some("Millions")));
        assert_eq!(parse_unit_and_scale("Index"), owned(Some("Index"), None));
    }

    #[test]
    fn title_suffixes() {
        assert_eq!(strip_title_suffix("Financial account, Flows"), "Financial account");
        assert_eq!(strip_title_suffix("Goods (US Dollar, Millions)"), "Goods");
        assert_eq!(strip_title_suffix("Reserve assets (Euro)"), "Reserve assets (Euro)");
        assert_eq!(
            format_unit_suffix(Some("US Dollar"), Some("Millions")),
            " (US Dollar, Millions)"
        );
        assert_eq!(format_unit_suffix(Some("Percent"), Some("Units")), " (Percent)");
        assert_eq!(format_unit_suffix(Some("-"), None), "");
    }

    #[test]
    fn unit_scale_from_titles() {
        assert_eq!(
            extract_unit_scale_from_title("Exports (US Dollar, Millions)"),
            owned(Some("US Dollar"), Some("Millions"))
        );
        assert_eq!(
            extract_unit_scale_from_title("Exports (Millions)"),
            owned(None, Some("Millions"))
        );
        assert_eq!(
            extract_unit_scale_from_title("Lamb, Unit prices, US cents per pound"),
            owned(Some("US cents per pound"), None)
        );
        assert_eq!(extract_unit_scale_from_title("Income, Property"), UnitScale::default());
        assert_eq!(
            unit_scale_from_title("Imports, US dollar"),
            owned(Some("US dollar"), None)
        );
    }

    #[test]
    fn bookkeeping_terms() {
        assert!(is_bop_suffix_only("Net"));
        assert!(is_bop_suffix_only(", Credit"));
        assert!(is_bop_suffix_only("Assets (excl. reserves)"));
        assert!(is_bop_suffix_only("excluding reserves, Net"));
        assert!(!is_bop_suffix_only("Goods, Net"));
        assert!(!is_bop_suffix_only(""));
        assert!(is_qualifier(" Debit "));
        assert!(!is_qualifier("Goods"));
    }
}
