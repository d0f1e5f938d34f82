//! Pivoting table rows into a display matrix.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use sdmx_model::{MatchedRow, RowOrder, TableResult, Warning, Warnings};
use serde::Serialize;
use tracing::debug;

use crate::context::HierarchyContext;
use crate::units::{
    UnitScale, format_unit_suffix, is_bop_suffix_only, strip_title_suffix, unit_scale_from_title,
};

/// Dimensions whose codes identify the country of a row.
const COUNTRY_DIMENSIONS: &[&str] = &["COUNTRY", "REF_AREA", "JURISDICTION", "COUNTERPART_AREA"];

/// Which periods become columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Keep only the most recent periods.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    /// A group without values of its own.
    Header,
    /// A Net row heading its Credit and Debit rows.
    Group,
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub order: RowOrder,
    pub level: u32,
    pub kind: RowKind,
    pub label: String,
    pub country: Option<String>,
    /// One value per column of the matrix.
    pub values: Vec<Option<f64>>,
}

impl DisplayRow {
    /// Label indented three spaces per level, headers marked with `▸`.
    pub fn indented_label(&self) -> String {
        let indent = "   ".repeat(self.level as usize);
        match self.kind {
            RowKind::Header | RowKind::Group => format!("{indent}▸ {}", self.label),
            RowKind::Data => format!("{indent}{}", self.label),
        }
    }
}

/// Rows by hierarchy order and columns by period, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayMatrix {
    pub title: Option<String>,
    /// Unit and scale shared by every row, already formatted as `" (unit, scale)"`.
    pub unit_suffix: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<DisplayRow>,
    pub warnings: Vec<Warning>,
}

impl DisplayMatrix {
    pub fn heading(&self) -> Option<String> {
        match (&self.title, &self.unit_suffix) {
            (None, None) => None,
            (title, suffix) => Some(format!(
                "{}{}",
                title.as_deref().unwrap_or_default(),
                suffix.as_deref().unwrap_or_default()
            )),
        }
    }
}

/// Display form of one value; missing values show as `..`.
pub fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "..".to_string(), |v| v.to_string())
}

impl fmt::Display for DisplayMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(heading) = self.heading() {
            writeln!(f, "{}", heading.trim_start())?;
        }
        write!(f, "Indicator | Country")?;
        for column in &self.columns {
            write!(f, " | {column}")?;
        }
        writeln!(f)?;
        for row in &self.rows {
            write!(f, "{}", row.indented_label())?;
            if row.kind != RowKind::Header {
                write!(f, " | {}", row.country.as_deref().unwrap_or_default())?;
                for value in &row.values {
                    write!(f, " | {}", format_value(*value))?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Pivots a built table, titled with the table's name.
pub fn pivot_table(
    table: &TableResult,
    window: &DateWindow,
    countries: &[String],
) -> DisplayMatrix {
    let mut matrix = pivot(&table.rows, window, countries);
    if !table.metadata.name.is_empty() {
        matrix.title = Some(table.metadata.name.clone());
    }
    matrix
}

/// Pivots table rows into one line per series and country.
///
/// `countries` restricts the rows to those countries, by name or code; an
/// empty list keeps every country. Requested countries without values in the
/// chosen periods are reported as warnings.
pub fn pivot(rows: &[MatchedRow], window: &DateWindow, countries: &[String]) -> DisplayMatrix {
    let mut warnings = Warnings::new();
    let rows: Vec<&MatchedRow> = rows
        .iter()
        .filter(|row| {
            row.is_header || countries.is_empty() || countries.iter().any(|c| is_country(row, c))
        })
        .collect();
    let columns = select_columns(&rows, window);
    let column_index: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.as_str(), i))
        .collect();

    let context = HierarchyContext::from_rows(rows.iter().copied());
    let units = UnitTable::new(&rows);
    let mut lines = collect_lines(&rows, &column_index, &units);
    report_missing_countries(&rows, &lines, countries, &mut warnings);

    let data_orders: BTreeSet<RowOrder> = lines.iter().map(|line| line.order).collect();
    let leads_to_data: BTreeSet<RowOrder> = data_orders
        .iter()
        .flat_map(|order| context.ancestors(*order))
        .map(|entry| entry.order)
        .collect();
    let headers: BTreeSet<RowOrder> = context
        .entries()
        .iter()
        .filter(|entry| {
            !data_orders.contains(&entry.order)
                && leads_to_data.contains(&entry.order)
                && !is_bop_suffix_only(&entry.title)
        })
        .map(|entry| entry.order)
        .collect();

    let mut by_country: HashMap<Option<String>, BTreeSet<RowOrder>> = HashMap::new();
    for line in &lines {
        by_country.entry(line.country.clone()).or_default().insert(line.order);
    }
    for line in &mut lines {
        let mut displayed = headers.clone();
        if let Some(own) = by_country.get(&line.country) {
            displayed.extend(own.iter().copied());
        }
        let simplified = context.simplify(line.order, &line.raw_title, Some(&displayed));
        line.title = simplified.title;
        line.net_group = simplified.net_group;
    }

    let shared = shared_unit(&lines);
    let shown: BTreeSet<RowOrder> = headers.union(&data_orders).copied().collect();
    let level_of = |order: RowOrder| -> u32 {
        let count = context
            .ancestors(order)
            .iter()
            .filter(|entry| shown.contains(&entry.order))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    };

    // Net rows move ahead of the Credit and Debit rows they head.
    let mut sequence: Vec<RowOrder> = shown.iter().copied().collect();
    let mut heads: HashMap<RowOrder, RowOrder> = HashMap::new();
    for line in &lines {
        if let Some(base) = &line.net_group
            && let Some(net) = context.net_sibling(line.order, base)
            && data_orders.contains(&net)
        {
            heads.insert(line.order, net);
        }
    }
    let net_orders: BTreeSet<RowOrder> = heads.values().copied().collect();
    for net in &net_orders {
        let first_child = sequence
            .iter()
            .position(|order| heads.get(order) == Some(net));
        let current = sequence.iter().position(|order| order == net);
        if let (Some(child), Some(at)) = (first_child, current)
            && at > child
        {
            let moved = sequence.remove(at);
            sequence.insert(child, moved);
        }
    }

    let mut display_rows = Vec::new();
    for order in sequence {
        let level = level_of(order);
        if headers.contains(&order) {
            let title = context.entry(order).map(|entry| entry.title.clone()).unwrap_or_default();
            display_rows.push(DisplayRow {
                order,
                level,
                kind: RowKind::Header,
                label: strip_title_suffix(&title).to_string(),
                country: None,
                values: vec![None; columns.len()],
            });
            continue;
        }
        let kind = if net_orders.contains(&order) {
            RowKind::Group
        } else {
            RowKind::Data
        };
        for line in lines.iter().filter(|line| line.order == order) {
            let level = match (&line.net_group, heads.get(&order)) {
                (Some(_), Some(net)) => level_of(*net) + 1,
                _ => level,
            };
            let mut label = line.title.clone();
            if shared.is_none() {
                label.push_str(&format_unit_suffix(
                    line.unit.unit.as_deref(),
                    line.unit.scale.as_deref(),
                ));
            }
            display_rows.push(DisplayRow {
                order,
                level,
                kind,
                label,
                country: line.country.clone(),
                values: line.values.clone(),
            });
        }
    }

    debug!(rows = display_rows.len(), columns = columns.len(), "pivoted table");
    DisplayMatrix {
        title: None,
        unit_suffix: shared,
        columns,
        rows: display_rows,
        warnings: warnings.into_vec(),
    }
}

/// One series of one country.
struct Line {
    order: RowOrder,
    series_id: Option<String>,
    country: Option<String>,
    raw_title: String,
    title: String,
    net_group: Option<String>,
    unit: UnitScale,
    values: Vec<Option<f64>>,
}

fn is_country(row: &MatchedRow, wanted: &str) -> bool {
    row.country.as_deref().is_some_and(|name| name.eq_ignore_ascii_case(wanted))
        || COUNTRY_DIMENSIONS
            .iter()
            .filter_map(|dim| row.dimensions.get(*dim))
            .any(|code| code.eq_ignore_ascii_case(wanted))
}

/// Periods with data inside the window, most recent first.
fn select_columns(rows: &[&MatchedRow], window: &DateWindow) -> Vec<String> {
    let mut periods: BTreeSet<(Option<NaiveDate>, &str)> = BTreeSet::new();
    for row in rows.iter().filter(|row| !row.is_header && row.value.is_some()) {
        let Some(period) = row.time_period.as_deref() else {
            continue;
        };
        let inside = row.date.is_none_or(|date| {
            window.start.is_none_or(|start| date >= start)
                && window.end.is_none_or(|end| date <= end)
        });
        if inside {
            periods.insert((row.date, period));
        }
    }
    let mut columns: Vec<String> = Vec::new();
    for (_, period) in periods.into_iter().rev() {
        if !columns.iter().any(|c| c == period) {
            columns.push(period.to_string());
        }
    }
    if let Some(limit) = window.limit.filter(|limit| *limit > 0) {
        columns.truncate(limit);
    }
    columns
}

/// Unit and scale per hierarchy node, inherited from the parent chain when a
/// node has none of its own.
struct UnitTable {
    by_node: HashMap<u32, UnitScale>,
}

impl UnitTable {
    fn new(rows: &[&MatchedRow]) -> Self {
        let mut own: HashMap<u32, UnitScale> = HashMap::new();
        let mut parents: HashMap<u32, u32> = HashMap::new();
        for row in rows {
            if let Some(parent) = row.parent_order {
                parents.entry(row.order.node).or_insert(parent);
            }
            let found = own.entry(row.order.node).or_default();
            if !found.is_complete() {
                found.fill_from(&UnitScale::new(row.unit.as_deref(), row.scale.as_deref()));
                found.fill_from(&unit_scale_from_title(&row.title));
            }
        }

        let mut by_node = own.clone();
        for (node, units) in &mut by_node {
            let mut seen = HashSet::from([*node]);
            let mut next = parents.get(node).copied();
            while let Some(parent) = next {
                if units.is_complete() || !seen.insert(parent) {
                    break;
                }
                if let Some(inherited) = own.get(&parent) {
                    units.fill_from(inherited);
                }
                next = parents.get(&parent).copied();
            }
        }
        Self { by_node }
    }

    fn get(&self, node: u32) -> UnitScale {
        self.by_node.get(&node).cloned().unwrap_or_default()
    }
}

/// Groups data rows into lines with one value slot per column.
fn collect_lines(
    rows: &[&MatchedRow],
    column_index: &HashMap<&str, usize>,
    units: &UnitTable,
) -> Vec<Line> {
    let mut lines: Vec<Line> = Vec::new();
    let mut slots: HashMap<(RowOrder, Option<&str>, Option<&str>), usize> = HashMap::new();
    for row in rows.iter().filter(|row| !row.is_header) {
        let key = (row.order, row.country.as_deref(), row.series_id.as_deref());
        let slot = *slots.entry(key).or_insert_with(|| {
            let mut unit = UnitScale::new(row.unit.as_deref(), row.scale.as_deref());
            unit.fill_from(&units.get(row.order.node));
            lines.push(Line {
                order: row.order,
                series_id: row.series_id.clone(),
                country: row.country.clone(),
                raw_title: row_title(row),
                title: String::new(),
                net_group: None,
                unit,
                values: vec![None; column_index.len()],
            });
            lines.len() - 1
        });
        if let (Some(period), Some(value)) = (row.time_period.as_deref(), row.value)
            && let Some(at) = column_index.get(period)
        {
            lines[slot].values[*at] = Some(value);
        }
    }
    lines.retain(|line| line.values.iter().any(Option::is_some));
    lines.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.country.cmp(&b.country))
            .then_with(|| a.series_id.cmp(&b.series_id))
    });
    lines
}

fn row_title(row: &MatchedRow) -> String {
    if !row.title.is_empty() {
        return row.title.clone();
    }
    let code = row.indicator_code.as_deref().unwrap_or(&row.hierarchy_node_id).replace('_', " ");
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// `" (unit, scale)"` when every line has the same unit and scale.
fn shared_unit(lines: &[Line]) -> Option<String> {
    let units: BTreeSet<&str> = lines
        .iter()
        .filter_map(|line| line.unit.unit.as_deref())
        .collect();
    let scales: BTreeSet<&str> = lines
        .iter()
        .filter_map(|line| line.unit.scale.as_deref())
        .collect();
    if units.len() != 1 || scales.len() > 1 {
        return None;
    }
    let suffix = format_unit_suffix(units.first().copied(), scales.first().copied());
    Some(suffix).filter(|suffix| !suffix.is_empty())
}

fn report_missing_countries(
    rows: &[&MatchedRow],
    lines: &[Line],
    countries: &[String],
    warnings: &mut Warnings,
) {
    for wanted in countries {
        let has_values = rows
            .iter()
            .filter(|row| !row.is_header && is_country(row, wanted))
            .any(|row| lines.iter().any(|line| line.country == row.country));
        if has_values {
            continue;
        }
        let latest = rows
            .iter()
            .filter(|row| !row.is_header && row.value.is_some() && is_country(row, wanted))
            .max_by_key(|row| row.date)
            .and_then(|row| row.time_period.clone());
        warnings.push(Warning::CountryWithoutData {
            country: wanted.clone(),
            latest,
        });
    }
}
