//! Record type: one tracked document box, one row of the `Arquivos` sheet.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::LifecycleError;
use crate::sheet::Sheet;

/// Persisted column names of the records sheet.
pub mod columns {
    pub const ID: &str = "ID";
    pub const LOCATION: &str = "Local";
    pub const SHELF: &str = "Estante";
    pub const RACK: &str = "Prateleira";
    pub const BOX_LABEL: &str = "Caixa";
    pub const CODING: &str = "Codificação";
    pub const TAG: &str = "Tag";
    pub const BOOK: &str = "Livro";
    pub const SEAL: &str = "Lacre";
    pub const DOCUMENT_TYPE: &str = "Tipo de Documento";
    pub const CONTENTS: &str = "Conteúdo da Caixa";
    pub const CATEGORY: &str = "Departamento Origem";
    pub const SUBMISSION_ORIGIN: &str = "Origem Departamento Submissão";
    pub const ARCHIVE_RESPONSIBLE: &str = "Responsável Arquivamento";
    pub const ARCHIVE_DATE: &str = "Data Arquivamento";
    pub const PERIOD_START: &str = "Período Utilizado Início";
    pub const PERIOD_END: &str = "Período Utilizado Fim";
    pub const STATUS: &str = "Status";
    pub const RETENTION_PERIOD: &str = "Período de Retenção";
    pub const DISPOSAL_DATE: &str = "Data Prevista de Descarte";
    pub const REQUESTER: &str = "Solicitante";
    pub const RETRIEVAL_RESPONSIBLE: &str = "Responsável Desarquivamento";
    pub const RETRIEVAL_DATE: &str = "Data Desarquivamento";
    pub const RETRIEVAL_NOTE: &str = "Observação Desarquivamento";

    /// Header of a freshly created records sheet, in display order.
    pub const ALL: &[&str] = &[
        ID,
        LOCATION,
        SHELF,
        RACK,
        BOX_LABEL,
        CODING,
        TAG,
        BOOK,
        SEAL,
        DOCUMENT_TYPE,
        CONTENTS,
        CATEGORY,
        SUBMISSION_ORIGIN,
        ARCHIVE_RESPONSIBLE,
        ARCHIVE_DATE,
        PERIOD_START,
        PERIOD_END,
        STATUS,
        RETENTION_PERIOD,
        DISPOSAL_DATE,
        REQUESTER,
        RETRIEVAL_RESPONSIBLE,
        RETRIEVAL_DATE,
        RETRIEVAL_NOTE,
    ];
}

/// Placeholder stored for optional free-text fields left blank.
pub const NOT_APPLICABLE: &str = "N/A";

/// Archival status of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    #[default]
    Archived,
    Retrieved,
}

impl Status {
    /// Value written to the `Status` column.
    #[must_use]
    pub fn as_persisted(&self) -> &'static str {
        match self {
            Status::Archived => "ARQUIVADO",
            Status::Retrieved => "DESARQUIVADO",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Archived => f.write_str("ARCHIVED"),
            Status::Retrieved => f.write_str("RETRIEVED"),
        }
    }
}

impl FromStr for Status {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ARQUIVADO" | "ARCHIVED" => Ok(Status::Archived),
            "DESARQUIVADO" | "RETRIEVED" => Ok(Status::Retrieved),
            _ => Err(LifecycleError::InvalidStatus(s.to_string())),
        }
    }
}

/// A tracked document box.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    // === Identity ===
    pub id: String,

    // === Placement ===
    pub location: String,
    pub shelf: String,
    pub rack: String,
    pub box_label: String,

    // === Description ===
    pub coding: String,
    pub tag: String,
    pub book: String,
    pub seal: String,
    pub document_type: String,
    pub contents: String,
    pub category: String,
    pub submission_origin: String,
    pub requester: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_start: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,

    // === Lifecycle ===
    pub status: Status,
    pub archive_responsible: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub retrieval_responsible: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub retrieval_note: String,

    // === Retention (fixed at creation) ===
    #[serde(skip_serializing_if = "String::is_empty")]
    pub retention_period: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposal_date: Option<NaiveDate>,

    // === Columns this version does not know about, kept for write-back ===
    #[serde(skip)]
    pub extra: Vec<(String, String)>,

    /// Status and date cells whose text did not parse, written back as read
    /// until the field is set.
    #[serde(skip)]
    pub unparsed: Vec<(String, String)>,
}

/// Columns read into typed fields, where unreadable text falls back to a
/// default.
const TYPED_COLUMNS: &[&str] = &[
    columns::STATUS,
    columns::PERIOD_START,
    columns::PERIOD_END,
    columns::ARCHIVE_DATE,
    columns::RETRIEVAL_DATE,
    columns::DISPOSAL_DATE,
];

impl Record {
    /// Read a record from one row of the records sheet.
    ///
    /// Unknown status text reads as archived and unparseable dates read as
    /// unset; the original text is kept in [`Record::unparsed`].
    #[must_use]
    pub fn from_row(sheet: &Sheet, row: usize) -> Self {
        let cell = |c: &str| sheet.cell(row, c).trim().to_string();
        let date = |c: &str| parse_date(sheet.cell(row, c));

        let extra = sheet
            .row_pairs(row)
            .filter(|(c, _)| !columns::ALL.contains(c))
            .map(|(c, v)| (c.to_string(), v.to_string()))
            .collect();

        let unparsed = TYPED_COLUMNS
            .iter()
            .filter_map(|c| {
                let text = sheet.cell(row, c);
                let readable = if *c == columns::STATUS {
                    text.parse::<Status>().is_ok()
                } else {
                    parse_date(text).is_some()
                };
                (!text.trim().is_empty() && !readable).then(|| (c.to_string(), text.to_string()))
            })
            .collect();

        Self {
            id: cell(columns::ID).to_uppercase(),
            location: cell(columns::LOCATION),
            shelf: cell(columns::SHELF),
            rack: cell(columns::RACK),
            box_label: cell(columns::BOX_LABEL),
            coding: cell(columns::CODING),
            tag: cell(columns::TAG),
            book: cell(columns::BOOK),
            seal: cell(columns::SEAL),
            document_type: cell(columns::DOCUMENT_TYPE),
            contents: cell(columns::CONTENTS),
            category: cell(columns::CATEGORY),
            submission_origin: cell(columns::SUBMISSION_ORIGIN),
            requester: cell(columns::REQUESTER),
            period_start: date(columns::PERIOD_START),
            period_end: date(columns::PERIOD_END),
            status: cell(columns::STATUS).parse().unwrap_or_default(),
            archive_responsible: cell(columns::ARCHIVE_RESPONSIBLE),
            archive_date: date(columns::ARCHIVE_DATE),
            retrieval_responsible: cell(columns::RETRIEVAL_RESPONSIBLE),
            retrieval_date: date(columns::RETRIEVAL_DATE),
            retrieval_note: cell(columns::RETRIEVAL_NOTE),
            retention_period: cell(columns::RETENTION_PERIOD),
            disposal_date: date(columns::DISPOSAL_DATE),
            extra,
            unparsed,
        }
    }

    /// Forget the unparsed text of `column`, once the field has been set.
    pub fn clear_unparsed(&mut self, column: &str) {
        self.unparsed.retain(|(c, _)| c != column);
    }

    fn unparsed_text(&self, column: &str) -> Option<String> {
        self.unparsed
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.clone())
    }

    /// Cells of this record keyed by persisted column name.
    #[must_use]
    pub fn to_cells(&self) -> Vec<(String, String)> {
        let mut cells: Vec<(String, String)> = columns::ALL
            .iter()
            .map(|c| (c.to_string(), self.field(c).unwrap_or_default()))
            .collect();
        cells.extend(self.extra.iter().cloned());
        cells
    }

    /// Display value of a field by persisted column name.
    #[must_use]
    pub fn field(&self, column: &str) -> Option<String> {
        if let Some(text) = self.unparsed_text(column) {
            return Some(text);
        }
        let value = match column {
            columns::ID => self.id.clone(),
            columns::LOCATION => self.location.clone(),
            columns::SHELF => self.shelf.clone(),
            columns::RACK => self.rack.clone(),
            columns::BOX_LABEL => self.box_label.clone(),
            columns::CODING => self.coding.clone(),
            columns::TAG => self.tag.clone(),
            columns::BOOK => self.book.clone(),
            columns::SEAL => self.seal.clone(),
            columns::DOCUMENT_TYPE => self.document_type.clone(),
            columns::CONTENTS => self.contents.clone(),
            columns::CATEGORY => self.category.clone(),
            columns::SUBMISSION_ORIGIN => self.submission_origin.clone(),
            columns::REQUESTER => self.requester.clone(),
            columns::PERIOD_START => format_date(self.period_start),
            columns::PERIOD_END => format_date(self.period_end),
            columns::STATUS => self.status.as_persisted().to_string(),
            columns::ARCHIVE_RESPONSIBLE => self.archive_responsible.clone(),
            columns::ARCHIVE_DATE => format_date(self.archive_date),
            columns::RETRIEVAL_RESPONSIBLE => self.retrieval_responsible.clone(),
            columns::RETRIEVAL_DATE => format_date(self.retrieval_date),
            columns::RETRIEVAL_NOTE => self.retrieval_note.clone(),
            columns::RETENTION_PERIOD => self.retention_period.clone(),
            columns::DISPOSAL_DATE => format_date(self.disposal_date),
            other => return self.extra.iter().find(|(c, _)| c == other).map(|(_, v)| v.clone()),
        };
        Some(value)
    }
}

/// Load every record of a records sheet. Rows without an id are skipped.
#[must_use]
pub fn records_from_sheet(sheet: &Sheet) -> Vec<Record> {
    (0..sheet.len())
        .map(|row| Record::from_row(sheet, row))
        .filter(|r| !r.id.is_empty())
        .collect()
}

/// Build a records sheet. The header starts from `base` (so columns of an
/// older or newer schema survive) and is extended with the known columns.
#[must_use]
pub fn records_to_sheet(records: &[Record], base: &Sheet) -> Sheet {
    let mut sheet = Sheet::with_columns(base.columns.iter().cloned());
    for column in columns::ALL {
        sheet.ensure_column(column);
    }
    for record in records {
        sheet.push_row(record.to_cells());
    }
    sheet.normalize();
    sheet
}

/// Parse a date cell. Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.f]`,
/// `YYYY-MM-DDTHH:MM:SS[.f]`, RFC 3339 and `DD/MM/YYYY[ HH:MM:SS]`.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%d/%m/%Y") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%d/%m/%Y %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|dt| dt.date())
}

/// ISO rendering of an optional date; empty when unset.
#[must_use]
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // === Status ===

    #[test]
    fn status_parses_persisted_and_english_names() {
        assert_eq!("ARQUIVADO".parse::<Status>().unwrap(), Status::Archived);
        assert_eq!(" desarquivado ".parse::<Status>().unwrap(), Status::Retrieved);
        assert_eq!("retrieved".parse::<Status>().unwrap(), Status::Retrieved);
        assert!("EMPRESTADO".parse::<Status>().is_err());
    }

    #[test]
    fn status_display_and_persisted_forms_differ() {
        assert_eq!(Status::Retrieved.to_string(), "RETRIEVED");
        assert_eq!(Status::Retrieved.as_persisted(), "DESARQUIVADO");
    }

    // === Dates ===

    #[test]
    fn parse_date_accepts_legacy_formats() {
        assert_eq!(parse_date("2025-02-10"), Some(ymd(2025, 2, 10)));
        assert_eq!(parse_date("10/02/2025"), Some(ymd(2025, 2, 10)));
        assert_eq!(parse_date("2025-02-10 14:30:00"), Some(ymd(2025, 2, 10)));
        assert_eq!(parse_date("2025-02-10 14:30:00.123456"), Some(ymd(2025, 2, 10)));
        assert_eq!(parse_date("2025-02-10T14:30:00Z"), Some(ymd(2025, 2, 10)));
        assert_eq!(parse_date("10/02/2025 08:00:00"), Some(ymd(2025, 2, 10)));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("ontem"), None);
    }

    // === Row mapping ===

    #[test]
    fn row_mapping_preserves_unknown_columns() {
        let mut sheet = Sheet::with_columns(["ID", "Status", "Etiqueta Antiga"]);
        sheet.push_row([
            ("ID", "rhct00a"),
            ("Status", "DESARQUIVADO"),
            ("Etiqueta Antiga", "E-17"),
        ]);

        let records = records_from_sheet(&sheet);
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "RHCT00A");
        assert_eq!(record.status, Status::Retrieved);
        assert_eq!(record.extra, vec![("Etiqueta Antiga".to_string(), "E-17".to_string())]);

        let written = records_to_sheet(&records, &sheet);
        assert_eq!(written.columns[..3], ["ID", "Status", "Etiqueta Antiga"]);
        assert_eq!(written.cell(0, "Etiqueta Antiga"), "E-17");
        assert_eq!(written.cell(0, columns::STATUS), "DESARQUIVADO");
    }

    #[test]
    fn unreadable_status_and_dates_are_written_back_as_read() {
        let mut sheet = Sheet::with_columns([columns::ID, columns::STATUS, columns::DISPOSAL_DATE]);
        sheet.push_row([
            (columns::ID, "RHCT00A"),
            (columns::STATUS, "EMPRESTADO"),
            (columns::DISPOSAL_DATE, "indeterminado"),
        ]);

        let records = records_from_sheet(&sheet);
        assert_eq!(records[0].status, Status::Archived);
        assert_eq!(records[0].disposal_date, None);

        let written = records_to_sheet(&records, &sheet);
        assert_eq!(written.cell(0, columns::STATUS), "EMPRESTADO");
        assert_eq!(written.cell(0, columns::DISPOSAL_DATE), "indeterminado");
    }

    #[test]
    fn cleared_unparsed_text_gives_way_to_the_field() {
        let mut sheet = Sheet::with_columns([columns::ID, columns::STATUS]);
        sheet.push_row([(columns::ID, "RHCT00A"), (columns::STATUS, "EMPRESTADO")]);
        let mut record = Record::from_row(&sheet, 0);

        record.status = Status::Retrieved;
        record.clear_unparsed(columns::STATUS);
        assert_eq!(record.field(columns::STATUS).as_deref(), Some("DESARQUIVADO"));
    }

    #[test]
    fn rows_without_id_are_skipped() {
        let mut sheet = Sheet::with_columns(["ID", "Caixa"]);
        sheet.push_row([("ID", ""), ("Caixa", "12")]);
        assert!(records_from_sheet(&sheet).is_empty());
    }

    #[test]
    fn field_lookup_covers_dates_and_extras() {
        let record = Record {
            id: "RHCT00A".to_string(),
            archive_date: Some(ymd(2025, 2, 10)),
            extra: vec![("Etiqueta".to_string(), "E-1".to_string())],
            ..Record::default()
        };
        assert_eq!(record.field(columns::ARCHIVE_DATE).as_deref(), Some("2025-02-10"));
        assert_eq!(record.field(columns::RETRIEVAL_DATE).as_deref(), Some(""));
        assert_eq!(record.field("Etiqueta").as_deref(), Some("E-1"));
        assert_eq!(record.field("Inexistente"), None);
    }
}
