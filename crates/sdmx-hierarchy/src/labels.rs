//! Label cleaning for hierarchy nodes.
//!
//! Codelist labels are often full paths ("Financial account, Direct
//! investment, Assets"). Inside a hierarchy the ancestors already show the
//! leading part, so a node keeps only what is new at its level.

/// Leading words of a label part that names a unit rather than a concept.
pub const UNIT_PREFIXES: &[&str] = &[
    "US dollar",
    "Percent",
    "Euro",
    "Domestic currency",
    "SDR",
    "Yen",
    "Pound",
    "Yuan",
    "National currency",
    "Basis points",
    "Units",
];

/// Codelists whose labels are comma-separated paths from the root.
fn is_path_style(codelist: &str) -> bool {
    codelist.contains("_INDICATOR_PUB") || codelist == "CL_DIP_INDICATOR"
}

/// Splits on `", "` and then on `":"`, trimming and dropping empty parts.
fn split_path(label: &str) -> Vec<String> {
    let mut parts = Vec::new();
    for part in label.split(", ") {
        if part.contains(':') {
            parts.extend(
                part.split(':')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string),
            );
        } else {
            parts.push(part.to_string());
        }
    }
    parts
}

fn normalize(part: &str) -> String {
    part.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// True when a child part is already said by one of the ancestor parts.
fn said_by_ancestor(part: &str, ancestors: &[String]) -> bool {
    if ancestors.iter().any(|a| a == part) {
        return true;
    }
    ancestors.iter().any(|ancestor| {
        if ancestor.strip_prefix("total") == Some(part) {
            return true;
        }
        if ancestor.len() >= 6 && part.contains(ancestor.as_str()) {
            return true;
        }
        if part.len() >= 15 && ancestor.len() >= 15 {
            let (shorter, longer) = if part.len() <= ancestor.len() {
                (part, ancestor.as_str())
            } else {
                (ancestor.as_str(), part)
            };
            if longer.contains(shorter) {
                return true;
            }
            if shorter.len() > 30 {
                return (0..shorter.len() - 30)
                    .filter(|i| shorter.is_char_boundary(*i) && shorter.is_char_boundary(i + 30))
                    .any(|i| longer.contains(&shorter[i..i + 30]));
            }
        }
        false
    })
}

/// Label of a node relative to its ancestors.
///
/// `ancestor_labels` are the full labels from the root down to the parent.
pub fn relative_label(
    codelist: Option<&str>,
    full_label: &str,
    ancestor_labels: &[&str],
) -> String {
    let parent = ancestor_labels.last().copied();
    let has_separator = full_label.contains(", ") || full_label.contains(": ");

    let Some(codelist) = codelist.filter(|id| is_path_style(id)) else {
        return match parent {
            Some(parent) if full_label.contains(", ") && full_label.starts_with(parent) => {
                last_part(full_label).to_string()
            }
            _ => full_label.to_string(),
        };
    };

    if codelist == "CL_DIP_INDICATOR" {
        let parts: Vec<&str> = full_label.split(", ").collect();
        if parts.len() > 1 && (parts[0].starts_with("Inward") || parts[0].starts_with("Outward")) {
            return parts[1..].join(", ");
        }
        return full_label.to_string();
    }

    if let Some(parent) = parent.filter(|p| full_label.starts_with(*p)) {
        let relative = full_label[parent.len()..].trim_start_matches([',', ' ', ':']);
        if !relative.is_empty() {
            return relative.to_string();
        }
        if has_separator {
            return full_label
                .split(", ")
                .flat_map(|p| p.split(": "))
                .last()
                .unwrap_or(full_label)
                .to_string();
        }
        return full_label.to_string();
    }

    if !ancestor_labels.is_empty() && has_separator {
        let ancestors: Vec<String> = ancestor_labels
            .iter()
            .flat_map(|label| split_path(label))
            .map(|part| normalize(&part))
            .collect();
        let child_parts = split_path(full_label);
        let new_parts: Vec<&str> = child_parts
            .iter()
            .filter(|part| !said_by_ancestor(&normalize(part), &ancestors))
            .map(String::as_str)
            .collect();
        if !new_parts.is_empty() {
            return new_parts.join(", ");
        }
        return child_parts
            .last()
            .cloned()
            .unwrap_or_else(|| full_label.to_string());
    }

    if full_label.contains(", ") {
        return last_part(full_label).to_string();
    }
    full_label.to_string()
}

fn last_part(label: &str) -> &str {
    label.rsplit(", ").next().unwrap_or(label)
}

/// True when a label part names a unit ("US dollar", "Percent of GDP").
pub fn is_unit_part(part: &str) -> bool {
    let lower = part.trim().to_lowercase();
    UNIT_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
}

/// Drops a trailing unit part and repeated consecutive parts.
///
/// Never returns an empty label.
pub fn tidy_label(label: &str) -> String {
    let mut parts: Vec<&str> = label.split(", ").collect();
    if parts.len() > 1 && parts.last().is_some_and(|p| is_unit_part(p)) {
        parts.pop();
    }
    parts.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
    let tidy = parts.join(", ");
    if tidy.trim().is_empty() {
        label.to_string()
    } else {
        tidy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_codelists_keep_label_unless_parent_prefixed() {
        assert_eq!(
            relative_label(Some("CL_BOP_INDICATOR"), "Goods", &["Current account"]),
            "Goods"
        );
        assert_eq!(
            relative_label(
                Some("CL_BOP_INDICATOR"),
                "Current account, Goods",
                &["Current account"]
            ),
            "Goods"
        );
    }

    #[test]
    fn path_style_labels_are_relative_to_parent() {
        let codelist = Some("CL_IRFCL_INDICATOR_PUB");
        assert_eq!(
            relative_label(codelist, "Official reserve assets, Gold", &["Official reserve assets"]),
            "Gold"
        );
        assert_eq!(
            relative_label(codelist, "Reserves, Gold", &["Reserves, Gold"]),
            "Gold"
        );
        assert_eq!(relative_label(codelist, "Reserves, Gold", &[]), "Gold");
    }

    #[test]
    fn path_style_labels_drop_parts_said_by_ancestors() {
        let label = relative_label(
            Some("CL_IRFCL_INDICATOR_PUB"),
            "Predetermined drains, Outflows, Up to 1 month, Principal",
            &["Predetermined short-term drains", "Outflows"],
        );
        assert_eq!(label, "Predetermined drains, Up to 1 month, Principal");
    }

    #[test]
    fn dip_labels_drop_direction() {
        assert_eq!(
            relative_label(
                Some("CL_DIP_INDICATOR"),
                "Inward Direct investment, Equity, Total",
                &[],
            ),
            "Equity, Total"
        );
    }

    #[test]
    fn tidy_label_strips_units_and_repeats() {
        assert_eq!(tidy_label("Exports, Goods, Goods, US dollar"), "Exports, Goods");
        assert_eq!(tidy_label("Percent"), "Percent");
        assert_eq!(tidy_label("Net lending, Net lending"), "Net lending");
    }
}
