//! Rendering command results as terminal tables, CSV or JSON.

use std::io::Write;

use anyhow::{Context, Result};
use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};
use sdmx_metadata::TableSummary;
use sdmx_model::{Dataflow, MatchedRow};
use sdmx_report::{DisplayMatrix, RowKind, format_value};
use serde::Serialize;

use crate::commands::DimensionOption;

pub fn dataflows_table(flows: &[Dataflow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Dataflow"),
        header_cell("Name"),
        header_cell("Description"),
    ]);
    apply_table_style(&mut table);
    for flow in flows {
        table.add_row(vec![
            Cell::new(&flow.id).fg(Color::Green).add_attribute(Attribute::Bold),
            Cell::new(&flow.name),
            dim_cell(&flow.description),
        ]);
    }
    table
}

pub fn tables_table(tables: &[TableSummary]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Name"),
        header_cell("Codelist"),
        header_cell("Entries"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    for summary in tables {
        table.add_row(vec![
            Cell::new(&summary.id).fg(Color::Green).add_attribute(Attribute::Bold),
            Cell::new(&summary.name),
            dim_cell(summary.codelist_id.as_deref().unwrap_or("-")),
            Cell::new(summary.entry_count),
        ]);
    }
    table
}

pub fn options_table(dimension: &str, options: &[DimensionOption]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell(dimension), header_cell("Label")]);
    apply_table_style(&mut table);
    for option in options {
        table.add_row(vec![
            Cell::new(&option.code).fg(Color::Green),
            Cell::new(option.label.as_deref().unwrap_or_default()),
        ]);
    }
    table
}

/// The pivoted matrix; headers in cyan, Net groups in bold.
pub fn matrix_table(matrix: &DisplayMatrix) -> Table {
    let mut table = Table::new();
    let mut header = vec![header_cell("Indicator"), header_cell("Country")];
    header.extend(matrix.columns.iter().map(|column| header_cell(column)));
    table.set_header(header);
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(165);
    let mut constraints = vec![
        ColumnConstraint::UpperBoundary(Width::Percentage(45)),
        ColumnConstraint::UpperBoundary(Width::Fixed(20)),
    ];
    constraints.extend(
        matrix
            .columns
            .iter()
            .map(|_| ColumnConstraint::LowerBoundary(Width::Fixed(8))),
    );
    table.set_constraints(constraints);
    for index in 0..matrix.columns.len() {
        align_column(&mut table, index + 2, CellAlignment::Right);
    }

    for row in &matrix.rows {
        let label = Cell::new(row.indented_label());
        let mut cells = match row.kind {
            RowKind::Header => vec![
                label.fg(Color::Cyan).add_attribute(Attribute::Bold),
                Cell::new(""),
            ],
            RowKind::Group => vec![
                label.add_attribute(Attribute::Bold),
                country_cell(row.country.as_deref()),
            ],
            RowKind::Data => vec![label, country_cell(row.country.as_deref())],
        };
        if row.kind == RowKind::Header {
            cells.extend(matrix.columns.iter().map(|_| Cell::new("")));
        } else {
            cells.extend(row.values.iter().map(|value| match value {
                Some(_) => Cell::new(format_value(*value)),
                None => dim_cell(format_value(None)),
            }));
        }
        table.add_row(cells);
    }
    table
}

/// Matched rows as returned by the table builder.
pub fn rows_table(rows: &[MatchedRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Order"),
        header_cell("Level"),
        header_cell("Title"),
        header_cell("Country"),
        header_cell("Period"),
        header_cell("Value"),
        header_cell("Unit"),
        header_cell("Scale"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Right);
    for row in rows {
        let title = if row.is_header {
            Cell::new(&row.title).fg(Color::Cyan).add_attribute(Attribute::Bold)
        } else {
            Cell::new(&row.title)
        };
        table.add_row(vec![
            Cell::new(row.order),
            Cell::new(row.level),
            title,
            country_cell(row.country.as_deref()),
            Cell::new(row.time_period.as_deref().unwrap_or_default()),
            Cell::new(row.value.map(|v| v.to_string()).unwrap_or_default()),
            dim_cell(row.unit.as_deref().unwrap_or_default()),
            dim_cell(row.scale.as_deref().unwrap_or_default()),
        ]);
    }
    table
}

/// Level, label, country, then one column per period; missing values are empty.
pub fn write_matrix_csv<W: Write>(matrix: &DisplayMatrix, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    let mut header = vec!["Level", "Indicator", "Country"];
    header.extend(matrix.columns.iter().map(String::as_str));
    writer.write_record(&header).context("write CSV header")?;
    for row in &matrix.rows {
        let mut record = vec![
            row.level.to_string(),
            row.label.clone(),
            row.country.clone().unwrap_or_default(),
        ];
        record.extend(
            row.values
                .iter()
                .map(|value| value.map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&record).context("write CSV row")?;
    }
    writer.flush().context("flush CSV output")?;
    Ok(())
}

pub fn write_rows_csv<W: Write>(rows: &[MatchedRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record([
            "order",
            "level",
            "hierarchy_node_id",
            "indicator_code",
            "title",
            "country",
            "time_period",
            "value",
            "unit",
            "scale",
            "is_header",
        ])
        .context("write CSV header")?;
    for row in rows {
        writer
            .write_record([
                row.order.to_string(),
                row.level.to_string(),
                row.hierarchy_node_id.clone(),
                row.indicator_code.clone().unwrap_or_default(),
                row.title.clone(),
                row.country.clone().unwrap_or_default(),
                row.time_period.clone().unwrap_or_default(),
                row.value.map(|v| v.to_string()).unwrap_or_default(),
                row.unit.clone().unwrap_or_default(),
                row.scale.clone().unwrap_or_default(),
                row.is_header.to_string(),
            ])
            .context("write CSV row")?;
    }
    writer.flush().context("flush CSV output")?;
    Ok(())
}

/// Flat records, one CSV row each.
pub fn write_records_csv<W: Write, T: Serialize>(records: &[T], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        writer.serialize(record).context("write CSV row")?;
    }
    writer.flush().context("flush CSV output")?;
    Ok(())
}

pub fn write_json<W: Write, T: Serialize + ?Sized>(value: &T, mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, value).context("write JSON output")?;
    writeln!(out).context("write JSON output")?;
    Ok(())
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn country_cell(country: Option<&str>) -> Cell {
    Cell::new(country.unwrap_or_default())
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).fg(Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdmx_model::RowOrder;
    use sdmx_report::DisplayRow;

    fn matrix() -> DisplayMatrix {
        DisplayMatrix {
            title: Some("Balance of payments".to_string()),
            unit_suffix: Some(" (US Dollar, Millions)".to_string()),
            columns: vec!["2024".to_string(), "2023".to_string()],
            rows: vec![
                DisplayRow {
                    order: RowOrder::new(1, 0),
                    level: 0,
                    kind: RowKind::Header,
                    label: "Current account".to_string(),
                    country: None,
                    values: vec![None, None],
                },
                DisplayRow {
                    order: RowOrder::new(5, 0),
                    level: 1,
                    kind: RowKind::Group,
                    label: "Goods, Net".to_string(),
                    country: Some("Brazil".to_string()),
                    values: vec![Some(20.0), None],
                },
                DisplayRow {
                    order: RowOrder::new(3, 0),
                    level: 2,
                    kind: RowKind::Data,
                    label: "Credit, total".to_string(),
                    country: Some("Brazil".to_string()),
                    values: vec![Some(100.5), Some(90.0)],
                },
            ],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn matrix_csv_quotes_labels_and_leaves_gaps_empty() {
        let mut out = Vec::new();
        write_matrix_csv(&matrix(), &mut out).expect("csv");
        let text = String::from_utf8(out).expect("utf8");
        insta::assert_snapshot!(text, @r#"
        Level,Indicator,Country,2024,2023
        0,Current account,,,
        1,"Goods, Net",Brazil,20,
        2,"Credit, total",Brazil,100.5,90
        "#);
    }

    #[test]
    fn matrix_table_has_a_column_per_period() {
        let mut table = matrix_table(&matrix());
        assert_eq!(table.column_count(), 4);
        let rendered = table.to_string();
        assert!(rendered.contains("Goods, Net"));
        assert!(rendered.contains(".."));
    }

    #[test]
    fn json_output_ends_with_newline() {
        let mut out = Vec::new();
        write_json(&matrix(), &mut out).expect("json");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.ends_with("}\n"));
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(value["rows"][1]["kind"], "group");
    }
}
