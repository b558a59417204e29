//! Output formatting: JSON, table, and Markdown.

use arq_core::audit::{self, AuditEntry};
use arq_core::record::{columns, Record};
use serde::Serialize;

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
    Markdown,
}

/// Rows of display strings under a fixed header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

const RECORD_COLUMNS: &[&str] = &[
    columns::ID,
    columns::STATUS,
    columns::LOCATION,
    columns::SHELF,
    columns::RACK,
    columns::BOX_LABEL,
    columns::CATEGORY,
    columns::DOCUMENT_TYPE,
    columns::DISPOSAL_DATE,
];

const HISTORY_COLUMNS: &[&str] = &[
    audit::columns::TIMESTAMP,
    audit::columns::EVENT,
    audit::columns::RECORD_ID,
    audit::columns::ACTOR,
    audit::columns::FIELDS,
    audit::columns::NOTE,
];

impl Grid {
    #[must_use]
    pub fn records(records: &[Record]) -> Self {
        Self {
            columns: RECORD_COLUMNS.iter().map(ToString::to_string).collect(),
            rows: records
                .iter()
                .map(|r| RECORD_COLUMNS.iter().map(|c| r.field(c).unwrap_or_default()).collect())
                .collect(),
        }
    }

    #[must_use]
    pub fn history(entries: &[AuditEntry]) -> Self {
        let rows = entries
            .iter()
            .map(|e| {
                let fields: Vec<&str> = e.changes.iter().map(|c| c.field.as_str()).collect();
                vec![
                    e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    e.event.clone(),
                    e.record_id.clone(),
                    e.actor.clone(),
                    fields.join(", "),
                    e.note.clone(),
                ]
            })
            .collect();
        Self {
            columns: HISTORY_COLUMNS.iter().map(ToString::to_string).collect(),
            rows,
        }
    }
}

/// Render `value` as JSON or `grid` as text.
#[must_use]
pub fn render<T: Serialize + ?Sized>(value: &T, grid: impl FnOnce() -> Grid, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => to_json(value),
        OutputFormat::Table => format_table(&grid()),
        OutputFormat::Markdown => format_markdown(&grid()),
    }
}

#[must_use]
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string())
}

fn format_table(grid: &Grid) -> String {
    if grid.rows.is_empty() {
        return "(no results)".to_string();
    }

    let mut widths: Vec<usize> = grid.columns.iter().map(|c| c.chars().count()).collect();
    for row in &grid.rows {
        for (i, value) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(value.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut output = String::new();
    output.push_str(&line(&grid.columns));
    output.push('\n');
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&sep.join("-+-"));
    output.push('\n');
    for row in &grid.rows {
        output.push_str(&line(row));
        output.push('\n');
    }
    output
}

fn format_markdown(grid: &Grid) -> String {
    if grid.rows.is_empty() {
        return "*No results*\n".to_string();
    }

    let escape = |v: &String| v.replace('|', "\\|");
    let mut output = String::new();
    output.push_str("| ");
    output.push_str(&grid.columns.join(" | "));
    output.push_str(" |\n| ");
    output.push_str(&vec!["---"; grid.columns.len()].join(" | "));
    output.push_str(" |\n");
    for row in &grid.rows {
        output.push_str("| ");
        output.push_str(&row.iter().map(escape).collect::<Vec<_>>().join(" | "));
        output.push_str(" |\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use arq_core::Status;

    fn sample() -> Vec<Record> {
        vec![
            Record {
                id: "RHCT00A".to_string(),
                location: "1".to_string(),
                category: "RH".to_string(),
                ..Record::default()
            },
            Record {
                id: "RHCT00B".to_string(),
                status: Status::Retrieved,
                box_label: "caixa | azul".to_string(),
                ..Record::default()
            },
        ]
    }

    #[test]
    fn table_aligns_columns() {
        let out = format_table(&Grid::records(&sample()));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("ID      | Status"));
        assert!(lines[1].starts_with("--------+-"));
        assert!(lines[2].starts_with("RHCT00A | ARQUIVADO"));
        assert!(lines[3].contains("DESARQUIVADO"));
    }

    #[test]
    fn markdown_escapes_pipes() {
        let out = format_markdown(&Grid::records(&sample()));
        assert!(out.starts_with("| ID | Status |"));
        assert!(out.contains("caixa \\| azul"));
    }

    #[test]
    fn empty_results() {
        assert_eq!(format_table(&Grid::default()), "(no results)");
        assert_eq!(format_markdown(&Grid::default()), "*No results*\n");
    }

    #[test]
    fn json_ignores_the_grid() {
        let records = sample();
        let out = render(&records, Grid::default, OutputFormat::Json);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[1]["status"], "RETRIEVED");
    }
}
