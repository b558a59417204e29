//! Audit trail: immutable history rows for every mutation.
//!
//! Each entry is one normalized row of the history sheet. Field-level changes
//! are kept in order as a JSON array in a single cell, so the sheet schema
//! stays fixed no matter which fields an operation touches.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArqError;
use crate::sheet::Sheet;

/// Column names of the history sheet.
pub mod columns {
    pub const TIMESTAMP: &str = "Data/Hora";
    pub const ACTOR: &str = "Usuário";
    pub const EVENT: &str = "Evento";
    pub const RECORD_ID: &str = "ID";
    pub const FIELDS: &str = "Campos";
    pub const CHANGES: &str = "Alterações";
    pub const NOTE: &str = "Observação";

    /// Fixed schema of the history sheet.
    pub const ALL: &[&str] = &[TIMESTAMP, ACTOR, EVENT, RECORD_ID, FIELDS, CHANGES, NOTE];
}

/// Kind of mutation recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Record created (enters ARCHIVED).
    Archived,
    Retrieved,
    Returned,
    Moved,
    Edited,
    OptionsUpdated,
}

impl EventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Archived => "ARCHIVED",
            EventKind::Retrieved => "RETRIEVED",
            EventKind::Returned => "RETURNED",
            EventKind::Moved => "MOVED",
            EventKind::Edited => "EDITED",
            EventKind::OptionsUpdated => "OPTIONS_UPDATED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ARCHIVED" | "CREATED" => Ok(EventKind::Archived),
            "RETRIEVED" => Ok(EventKind::Retrieved),
            "RETURNED" => Ok(EventKind::Returned),
            "MOVED" => Ok(EventKind::Moved),
            "EDITED" => Ok(EventKind::Edited),
            "OPTIONS_UPDATED" => Ok(EventKind::OptionsUpdated),
            other => Err(format!("unknown event kind '{other}'")),
        }
    }
}

/// One field's value before and after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: String,
    pub after: String,
}

impl FieldChange {
    #[must_use]
    pub fn new(field: impl Into<String>, before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            before: before.into(),
            after: after.into(),
        }
    }
}

/// An immutable history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    /// Raw event text; entries written by other tools may carry kinds this
    /// version does not know.
    pub event: String,
    pub record_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
}

impl AuditEntry {
    #[must_use]
    pub fn new(
        kind: EventKind,
        record_id: impl Into<String>,
        actor: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            actor: actor.into(),
            event: kind.as_str().to_string(),
            record_id: record_id.into(),
            changes: Vec::new(),
            note: String::new(),
        }
    }

    #[must_use]
    pub fn with_changes(mut self, changes: Vec<FieldChange>) -> Self {
        self.changes = changes;
        self
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Parsed event kind, if known.
    #[must_use]
    pub fn kind(&self) -> Option<EventKind> {
        self.event.parse().ok()
    }

    /// Normalized row cells in schema order.
    ///
    /// # Errors
    ///
    /// Returns [`ArqError::Serialization`] if the change list cannot be encoded.
    pub fn to_cells(&self) -> Result<Vec<(&'static str, String)>, ArqError> {
        let changes = if self.changes.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&self.changes)
                .map_err(|e| ArqError::Serialization(e.to_string()))?
        };
        let fields = self
            .changes
            .iter()
            .map(|c| c.field.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        Ok(vec![
            (columns::TIMESTAMP, self.timestamp.to_rfc3339()),
            (columns::ACTOR, self.actor.clone()),
            (columns::EVENT, self.event.clone()),
            (columns::RECORD_ID, self.record_id.clone()),
            (columns::FIELDS, fields),
            (columns::CHANGES, changes),
            (columns::NOTE, self.note.clone()),
        ])
    }

    /// Read an entry from a history row. Missing columns read as empty; an
    /// unreadable change cell reads as no changes; an unreadable timestamp
    /// reads as the Unix epoch so the row still sorts first.
    #[must_use]
    pub fn from_row(sheet: &Sheet, row: usize) -> Self {
        let cell = |c: &str| sheet.cell(row, c).trim().to_string();
        Self {
            timestamp: parse_timestamp(&cell(columns::TIMESTAMP)).unwrap_or_default(),
            actor: cell(columns::ACTOR),
            event: cell(columns::EVENT),
            record_id: cell(columns::RECORD_ID),
            changes: serde_json::from_str(sheet.cell(row, columns::CHANGES)).unwrap_or_default(),
            note: cell(columns::NOTE),
        }
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%d/%m/%Y %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// An empty history sheet with the fixed schema.
#[must_use]
pub fn empty_history() -> Sheet {
    Sheet::with_columns(columns::ALL.iter().copied())
}

/// Append one entry to a history sheet, adding any missing schema column.
///
/// # Errors
///
/// Returns [`ArqError::Serialization`] if the entry cannot be encoded; the
/// sheet is left unchanged.
pub fn append_entry(sheet: &mut Sheet, entry: &AuditEntry) -> Result<(), ArqError> {
    let cells = entry.to_cells()?;
    for column in columns::ALL {
        sheet.ensure_column(column);
    }
    sheet.push_row(cells);
    Ok(())
}

/// All entries of a history sheet in insertion order.
#[must_use]
pub fn entries_from_sheet(sheet: &Sheet) -> Vec<AuditEntry> {
    (0..sheet.len())
        .map(|row| AuditEntry::from_row(sheet, row))
        .collect()
}

/// Filter for history queries. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub record_id: Option<String>,
    pub event: Option<EventKind>,
    pub actor: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AuditFilter {
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let id_ok = self
            .record_id
            .as_ref()
            .is_none_or(|id| entry.record_id.eq_ignore_ascii_case(id.trim()));
        let event_ok = self.event.is_none_or(|kind| entry.kind() == Some(kind));
        let actor_ok = self
            .actor
            .as_ref()
            .is_none_or(|actor| entry.actor.trim().eq_ignore_ascii_case(actor.trim()));
        let since_ok = self.since.is_none_or(|since| entry.timestamp >= since);
        let until_ok = self.until.is_none_or(|until| entry.timestamp <= until);
        id_ok && event_ok && actor_ok && since_ok && until_ok
    }

    /// Matching entries, newest first. Ties keep the later-inserted entry first.
    #[must_use]
    pub fn apply(&self, entries: &[AuditEntry]) -> Vec<AuditEntry> {
        let mut matched: Vec<(usize, &AuditEntry)> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| self.matches(e))
            .collect();
        matched.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
        matched
            .into_iter()
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|(_, e)| e.clone())
            .collect()
    }
}
