//! Tabular sheet model: named string columns over ordered rows.
//!
//! Every persisted table (records, options, history) is a [`Sheet`]. Cells
//! are plain strings and an absent cell reads as the empty string, so sheets
//! written by older versions with fewer columns stay readable.

use serde::{Deserialize, Serialize};

/// An ordered table of string cells with named columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    /// Create an empty sheet with the given header.
    #[must_use]
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column by exact name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First column from `candidates` present in this sheet.
    #[must_use]
    pub fn find_column<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates
            .iter()
            .copied()
            .find(|c| self.column_index(c).is_some())
    }

    /// Add a column if it does not exist yet. Returns its position.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        self.columns.len() - 1
    }

    /// Cell value, or `""` when the row or column is missing.
    #[must_use]
    pub fn cell(&self, row: usize, column: &str) -> &str {
        self.column_index(column)
            .and_then(|c| self.rows.get(row).and_then(|r| r.get(c)))
            .map_or("", String::as_str)
    }

    /// Set a cell, creating the column and padding the row as needed.
    pub fn set_cell(&mut self, row: usize, column: &str, value: impl Into<String>) {
        let col = self.ensure_column(column);
        if let Some(r) = self.rows.get_mut(row) {
            if r.len() <= col {
                r.resize(col + 1, String::new());
            }
            r[col] = value.into();
        }
    }

    /// Append a row given as `(column, value)` pairs. Unknown columns are
    /// added to the header; columns not mentioned stay empty.
    pub fn push_row<I, K, V>(&mut self, cells: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let pairs: Vec<(usize, String)> = cells
            .into_iter()
            .map(|(k, v)| (self.ensure_column(k.as_ref()), v.into()))
            .collect();
        let mut row = vec![String::new(); self.columns.len()];
        for (idx, value) in pairs {
            row[idx] = value;
        }
        self.rows.push(row);
    }

    /// Row as `(column, value)` pairs in header order.
    pub fn row_pairs(&self, row: usize) -> impl Iterator<Item = (&str, &str)> {
        let cells = self.rows.get(row);
        self.columns.iter().enumerate().map(move |(i, c)| {
            let value = cells.and_then(|r| r.get(i)).map_or("", String::as_str);
            (c.as_str(), value)
        })
    }

    /// Append all rows of `other`, taking the union of both headers.
    pub fn append(&mut self, other: &Sheet) {
        for column in &other.columns {
            self.ensure_column(column);
        }
        for row in 0..other.len() {
            let pairs: Vec<(String, String)> = other
                .row_pairs(row)
                .map(|(c, v)| (c.to_string(), v.to_string()))
                .collect();
            self.push_row(pairs);
        }
        self.normalize();
    }

    /// Pad every row to the header width.
    pub fn normalize(&mut self) {
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
    }

    /// Distinct non-empty values of a column, trimmed, in first-seen order.
    #[must_use]
    pub fn distinct(&self, column: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for row in 0..self.len() {
            let value = self.cell(row, column).trim();
            if !value.is_empty() && !seen.iter().any(|s| s == value) {
                seen.push(value.to_string());
            }
        }
        seen
    }
}
