//! Record lifecycle state machine.
//!
//! ```text
//!   create ──▶ ARCHIVED ──retrieve──▶ RETRIEVED
//!                 ▲                       │
//!                 └─────────return────────┘
//! ```
//!
//! Every operation validates before touching the record, so a rejected
//! request leaves the record untouched and produces no audit entry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEntry, EventKind, FieldChange};
use crate::error::LifecycleError;
use crate::options::{normalize_key, RetentionTable, SpacesTable};
use crate::record::{columns, format_date, Record, Status, NOT_APPLICABLE};
use crate::retention::RetentionPolicy;

fn require(field: &str, value: &str) -> Result<(), LifecycleError> {
    if value.trim().is_empty() {
        return Err(LifecycleError::MissingRequiredField {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn or_not_applicable(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_APPLICABLE)
        .to_string()
}

// === Creation ===

/// Input for registering a new box.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRecord {
    pub category: String,
    pub document_type: String,
    pub submission_origin: String,
    pub location: String,
    pub shelf: String,
    pub rack: String,
    pub box_label: String,
    pub contents: String,
    pub requester: String,
    /// Person archiving the box; becomes `archive_responsible`.
    pub responsible: String,
    #[serde(default)]
    pub coding: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub book: Option<String>,
    #[serde(default)]
    pub seal: Option<String>,
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
}

impl NewRecord {
    /// Check every mandatory field.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::MissingRequiredField`] for the first blank
    /// mandatory field.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        require("box_label", &self.box_label)?;
        require("contents", &self.contents)?;
        require("category", &self.category)?;
        require("requester", &self.requester)?;
        require("responsible", &self.responsible)?;
        require("rack", &self.rack)?;
        require("location", &self.location)?;
        require("shelf", &self.shelf)?;
        require("document_type", &self.document_type)?;
        require("submission_origin", &self.submission_origin)?;
        Ok(())
    }
}

/// Build a new ARCHIVED record under an already reserved id.
///
/// Retention is looked up by submission origin; when the period text does
/// not start with a year count the disposal date is left unset.
///
/// # Errors
///
/// Returns [`LifecycleError::MissingRequiredField`] if `input` is incomplete.
pub fn create(
    id: String,
    input: &NewRecord,
    retention: &RetentionTable,
    now: DateTime<Utc>,
) -> Result<(Record, AuditEntry), LifecycleError> {
    input.validate()?;

    let today = now.date_naive();
    let policy = retention
        .period_for(&input.submission_origin)
        .map(|p| RetentionPolicy::parse(&p));

    let record = Record {
        id,
        location: input.location.trim().to_string(),
        shelf: input.shelf.trim().to_string(),
        rack: input.rack.trim().to_string(),
        box_label: input.box_label.trim().to_string(),
        coding: or_not_applicable(&input.coding),
        tag: or_not_applicable(&input.tag),
        book: input.book.as_deref().map(str::trim).unwrap_or_default().to_string(),
        seal: or_not_applicable(&input.seal),
        document_type: input.document_type.trim().to_string(),
        contents: input.contents.trim().to_string(),
        category: input.category.trim().to_string(),
        submission_origin: input.submission_origin.trim().to_string(),
        requester: input.requester.trim().to_string(),
        period_start: input.period_start,
        period_end: input.period_end,
        status: Status::Archived,
        archive_responsible: input.responsible.trim().to_string(),
        archive_date: Some(today),
        retention_period: policy.as_ref().map(|p| p.period.clone()).unwrap_or_default(),
        disposal_date: policy.as_ref().and_then(|p| p.disposal_date(today)),
        ..Record::default()
    };

    let changes = [
        columns::LOCATION,
        columns::SHELF,
        columns::RACK,
        columns::CATEGORY,
        columns::DOCUMENT_TYPE,
        columns::SUBMISSION_ORIGIN,
        columns::RETENTION_PERIOD,
        columns::DISPOSAL_DATE,
    ]
    .iter()
    .filter_map(|c| record.field(c).map(|v| FieldChange::new(*c, "", v)))
    .filter(|c| !c.after.is_empty())
    .collect();

    let entry = AuditEntry::new(EventKind::Archived, &record.id, &record.archive_responsible, now)
        .with_changes(changes);
    Ok((record, entry))
}

// === Status transitions ===

/// Actor and date of a retrieve or return.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transition {
    pub responsible: String,
    pub date: Option<NaiveDate>,
    /// Which documents left the box on a partial retrieval.
    #[serde(default)]
    pub note: Option<String>,
}

impl Transition {
    fn validated(&self) -> Result<(String, NaiveDate), LifecycleError> {
        require("responsible", &self.responsible)?;
        let date = self.date.ok_or_else(|| LifecycleError::MissingRequiredField {
            field: "date".to_string(),
        })?;
        Ok((self.responsible.trim().to_string(), date))
    }
}

/// Apply a set of column updates, returning the changes that differ.
fn apply(record: &mut Record, updates: &[(&str, String)]) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    for (column, after) in updates {
        let before = record.field(column).unwrap_or_default();
        if before != *after {
            changes.push(FieldChange::new(*column, before, after.clone()));
        }
    }
    for (column, after) in updates {
        set_field(record, column, after);
    }
    changes
}

/// Set the status, returning the change when it differs.
fn set_status(record: &mut Record, status: Status) -> Option<FieldChange> {
    let before = record.field(columns::STATUS).unwrap_or_default();
    let after = status.as_persisted();
    record.status = status;
    record.clear_unparsed(columns::STATUS);
    (before != after).then(|| FieldChange::new(columns::STATUS, before, after))
}

fn set_field(record: &mut Record, column: &str, value: &str) {
    let date = || crate::record::parse_date(value);
    record.clear_unparsed(column);
    match column {
        columns::LOCATION => record.location = value.to_string(),
        columns::SHELF => record.shelf = value.to_string(),
        columns::RACK => record.rack = value.to_string(),
        columns::BOX_LABEL => record.box_label = value.to_string(),
        columns::CODING => record.coding = value.to_string(),
        columns::TAG => record.tag = value.to_string(),
        columns::BOOK => record.book = value.to_string(),
        columns::SEAL => record.seal = value.to_string(),
        columns::CONTENTS => record.contents = value.to_string(),
        columns::REQUESTER => record.requester = value.to_string(),
        columns::PERIOD_START => record.period_start = date(),
        columns::PERIOD_END => record.period_end = date(),
        columns::ARCHIVE_RESPONSIBLE => record.archive_responsible = value.to_string(),
        columns::ARCHIVE_DATE => record.archive_date = date(),
        columns::RETRIEVAL_RESPONSIBLE => record.retrieval_responsible = value.to_string(),
        columns::RETRIEVAL_DATE => record.retrieval_date = date(),
        columns::RETRIEVAL_NOTE => record.retrieval_note = value.to_string(),
        _ => {}
    }
}

/// ARCHIVED → RETRIEVED.
///
/// # Errors
///
/// Returns [`LifecycleError::AlreadyRetrieved`] if the record is already
/// retrieved, or [`LifecycleError::MissingRequiredField`] without an actor
/// or date.
pub fn retrieve(
    record: &mut Record,
    transition: &Transition,
    now: DateTime<Utc>,
) -> Result<AuditEntry, LifecycleError> {
    if record.status == Status::Retrieved {
        return Err(LifecycleError::AlreadyRetrieved {
            id: record.id.clone(),
        });
    }
    let (responsible, date) = transition.validated()?;
    let note = transition.note.as_deref().unwrap_or_default().trim().to_string();

    let mut changes: Vec<FieldChange> = set_status(record, Status::Retrieved).into_iter().collect();
    changes.extend(apply(
        record,
        &[
            (columns::RETRIEVAL_RESPONSIBLE, responsible.clone()),
            (columns::RETRIEVAL_DATE, format_date(Some(date))),
            (columns::RETRIEVAL_NOTE, note.clone()),
        ],
    ));
    Ok(AuditEntry::new(EventKind::Retrieved, &record.id, responsible, now)
        .with_changes(changes)
        .with_note(note))
}

/// RETRIEVED → ARCHIVED. Clears the retrieval fields.
///
/// # Errors
///
/// Returns [`LifecycleError::NotRetrieved`] if the record is already
/// archived, or [`LifecycleError::MissingRequiredField`] without an actor or
/// date.
pub fn return_to_archive(
    record: &mut Record,
    transition: &Transition,
    now: DateTime<Utc>,
) -> Result<AuditEntry, LifecycleError> {
    if record.status != Status::Retrieved {
        return Err(LifecycleError::NotRetrieved {
            id: record.id.clone(),
        });
    }
    let (responsible, date) = transition.validated()?;

    let mut changes: Vec<FieldChange> = set_status(record, Status::Archived).into_iter().collect();
    changes.extend(apply(
        record,
        &[
            (columns::ARCHIVE_RESPONSIBLE, responsible.clone()),
            (columns::ARCHIVE_DATE, format_date(Some(date))),
            (columns::RETRIEVAL_RESPONSIBLE, String::new()),
            (columns::RETRIEVAL_DATE, String::new()),
            (columns::RETRIEVAL_NOTE, String::new()),
        ],
    ));
    let mut entry = AuditEntry::new(EventKind::Returned, &record.id, responsible, now)
        .with_changes(changes);
    if let Some(note) = transition.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        entry = entry.with_note(note);
    }
    Ok(entry)
}

// === Move ===

/// Target placement of a move.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Placement {
    pub location: String,
    pub shelf: String,
    pub rack: String,
}

impl Placement {
    /// Check the placement is complete and, when the location is a known
    /// storage space, that shelf and rack numbers exist there.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::MissingRequiredField`] or
    /// [`LifecycleError::OutOfRange`].
    pub fn validate(&self, spaces: &SpacesTable) -> Result<(), LifecycleError> {
        require("location", &self.location)?;
        require("shelf", &self.shelf)?;
        require("rack", &self.rack)?;

        let Some(layout) = spaces.layout(&self.location) else {
            return Ok(());
        };
        for (field, value, max) in [
            ("shelf", &self.shelf, layout.shelves),
            ("rack", &self.rack, layout.racks),
        ] {
            // free-text positions are allowed; only numbers are range-checked
            if let Ok(n) = value.trim().parse::<u32>() {
                if n == 0 || n > max {
                    return Err(LifecycleError::OutOfRange {
                        location: self.location.clone(),
                        field: field.to_string(),
                        value: value.clone(),
                        max,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Result of a batch move.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// Ids that were moved.
    pub moved: Vec<String>,
    /// Ids found but rejected because the box is retrieved.
    pub ineligible: Vec<String>,
    /// Ids not present in the table.
    pub missing: Vec<String>,
    #[serde(skip)]
    pub entries: Vec<AuditEntry>,
}

/// Trim, upper-case and de-duplicate ids, keeping first-seen order. Accepts
/// comma-separated lists inside each item.
#[must_use]
pub fn parse_ids<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for part in raw.iter().flat_map(|r| r.as_ref().split(',')) {
        let id = normalize_key(part);
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Move every ARCHIVED record named in `ids` to `target`.
///
/// RETRIEVED records are left untouched and reported as ineligible; unknown
/// ids are reported as missing. Neither aborts the batch.
///
/// # Errors
///
/// Returns an error only if `target` itself is invalid, before any record
/// is touched.
pub fn move_records(
    records: &mut [Record],
    ids: &[String],
    target: &Placement,
    spaces: &SpacesTable,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<MoveOutcome, LifecycleError> {
    require("responsible", actor)?;
    target.validate(spaces)?;

    let mut outcome = MoveOutcome::default();
    for id in parse_ids(ids) {
        let Some(record) = records.iter_mut().find(|r| r.id.eq_ignore_ascii_case(&id)) else {
            outcome.missing.push(id);
            continue;
        };
        if record.status == Status::Retrieved {
            outcome.ineligible.push(record.id.clone());
            continue;
        }
        let changes = apply(
            record,
            &[
                (columns::LOCATION, target.location.trim().to_string()),
                (columns::SHELF, target.shelf.trim().to_string()),
                (columns::RACK, target.rack.trim().to_string()),
            ],
        );
        outcome.entries.push(
            AuditEntry::new(EventKind::Moved, &record.id, actor.trim(), now).with_changes(changes),
        );
        outcome.moved.push(record.id.clone());
    }
    Ok(outcome)
}

// === Edit ===

/// Descriptive fields that may be changed after creation. `None` leaves a
/// field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordEdit {
    pub box_label: Option<String>,
    pub contents: Option<String>,
    pub coding: Option<String>,
    pub tag: Option<String>,
    pub book: Option<String>,
    pub seal: Option<String>,
    pub requester: Option<String>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

impl RecordEdit {
    /// Set one field by its snake_case name or persisted column name.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotEditable`] for any other field and
    /// [`LifecycleError::InvalidDate`] for an unparseable period date.
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), LifecycleError> {
        let date = |value: &str| {
            crate::record::parse_date(value).ok_or_else(|| LifecycleError::InvalidDate {
                field: field.to_string(),
                value: value.to_string(),
            })
        };
        match field.trim() {
            "box_label" | columns::BOX_LABEL => self.box_label = Some(value.to_string()),
            "contents" | columns::CONTENTS => self.contents = Some(value.to_string()),
            "coding" | columns::CODING => self.coding = Some(value.to_string()),
            "tag" | columns::TAG => self.tag = Some(value.to_string()),
            "book" | columns::BOOK => self.book = Some(value.to_string()),
            "seal" | columns::SEAL => self.seal = Some(value.to_string()),
            "requester" | columns::REQUESTER => self.requester = Some(value.to_string()),
            "period_start" | columns::PERIOD_START => self.period_start = Some(date(value)?),
            "period_end" | columns::PERIOD_END => self.period_end = Some(date(value)?),
            other => {
                return Err(LifecycleError::NotEditable {
                    field: other.to_string(),
                })
            }
        }
        Ok(())
    }

    fn updates(&self) -> Vec<(&'static str, String)> {
        let text = |column: &'static str, value: &Option<String>| {
            value.as_ref().map(|v| (column, v.trim().to_string()))
        };
        let date = |column: &'static str, value: Option<NaiveDate>| {
            value.map(|d| (column, format_date(Some(d))))
        };
        [
            text(columns::BOX_LABEL, &self.box_label),
            text(columns::CONTENTS, &self.contents),
            text(columns::CODING, &self.coding),
            text(columns::TAG, &self.tag),
            text(columns::BOOK, &self.book),
            text(columns::SEAL, &self.seal),
            text(columns::REQUESTER, &self.requester),
            date(columns::PERIOD_START, self.period_start),
            date(columns::PERIOD_END, self.period_end),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Edit descriptive metadata.
///
/// # Errors
///
/// Returns [`LifecycleError::MissingRequiredField`] if a mandatory field
/// would become blank or no actor is given, and
/// [`LifecycleError::NothingToChange`] if every value is already current.
pub fn edit(
    record: &mut Record,
    changes: &RecordEdit,
    actor: &str,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AuditEntry, LifecycleError> {
    require("responsible", actor)?;
    let updates = changes.updates();
    for (column, value) in &updates {
        let field = match *column {
            columns::BOX_LABEL => "box_label",
            columns::CONTENTS => "contents",
            columns::REQUESTER => "requester",
            _ => continue,
        };
        require(field, value)?;
    }

    let pending: Vec<(&str, String)> = updates
        .into_iter()
        .filter(|(c, v)| record.field(c).as_deref() != Some(v.as_str()))
        .collect();
    if pending.is_empty() {
        return Err(LifecycleError::NothingToChange {
            id: record.id.clone(),
        });
    }

    let applied = apply(record, &pending);
    let mut entry = AuditEntry::new(EventKind::Edited, &record.id, actor.trim(), now).with_changes(applied);
    if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
        entry = entry.with_note(note);
    }
    Ok(entry)
}
