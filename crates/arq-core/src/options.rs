//! Read-only lookup tables: selectable values, retention policy, and storage spaces.
//!
//! These come from the `Selectboxes`, `Retenção` and `Espaços` sheets and are
//! edited wholesale by administrators, never by the record operations.

use std::collections::HashMap;

use crate::sheet::Sheet;

/// Column names used by the option sheets.
pub mod columns {
    pub const CATEGORIES: &str = "Departamentos";
    pub const DOCUMENT_TYPES: &str = "Tipos de Documento";
    pub const RESPONSIBLES: &str = "RESPONSÁVEL ARQUIVAMENTO";
    pub const CATEGORY_ABBR: &str = "Sigla Departamento";
    pub const DOCUMENT_TYPE_ABBR: &str = "Sigla Documento";

    pub const RETENTION_ORIGIN: &str = "ORIGEM DOCUMENTO SUBMISSÃO";
    pub const RETENTION_PERIOD: &str = "Retenção";

    pub const SPACE_NAME: &str = "Arquivo";
    pub const SPACE_SHELVES: &str = "Estantes";
    pub const SPACE_RACKS: &str = "Prateleiras";

    /// Header candidates for category names next to their abbreviation.
    pub const CATEGORY_NAME_CANDIDATES: &[&str] = &[
        "Departamento Origem",
        "Departamento",
        "Departamentos",
        "Depto",
        "Departamento/Submissão",
    ];

    /// Header candidates for document type names next to their abbreviation.
    pub const DOCUMENT_TYPE_NAME_CANDIDATES: &[&str] = &[
        "Tipo de Documento",
        "Tipos de Documento",
        "Tipo",
        "Documento",
    ];
}

/// Prefix used by storage spaces in location pickers ("ARQUIVO 1").
const SPACE_LABEL: &str = "ARQUIVO ";

/// Trim and upper-case a lookup key.
#[must_use]
pub fn normalize_key(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Selectable values and abbreviation tables (`Selectboxes` sheet).
#[derive(Debug, Clone, Default)]
pub struct Selectboxes {
    sheet: Sheet,
}

impl Selectboxes {
    #[must_use]
    pub fn new(sheet: Sheet) -> Self {
        Self { sheet }
    }

    #[must_use]
    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Category names, sorted.
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        sorted(self.sheet.distinct(columns::CATEGORIES))
    }

    /// Document type names, sorted.
    #[must_use]
    pub fn document_types(&self) -> Vec<String> {
        sorted(self.sheet.distinct(columns::DOCUMENT_TYPES))
    }

    /// People allowed to archive and retrieve boxes, sorted.
    #[must_use]
    pub fn responsibles(&self) -> Vec<String> {
        sorted(self.sheet.distinct(columns::RESPONSIBLES))
    }

    /// Normalized category name to upper-cased abbreviation.
    #[must_use]
    pub fn category_abbreviations(&self) -> HashMap<String, String> {
        self.abbreviations(columns::CATEGORY_NAME_CANDIDATES, columns::CATEGORY_ABBR)
    }

    /// Normalized document type name to upper-cased abbreviation.
    #[must_use]
    pub fn document_type_abbreviations(&self) -> HashMap<String, String> {
        self.abbreviations(
            columns::DOCUMENT_TYPE_NAME_CANDIDATES,
            columns::DOCUMENT_TYPE_ABBR,
        )
    }

    fn abbreviations(&self, name_candidates: &[&str], abbr_column: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        let Some(name_column) = self.sheet.find_column(name_candidates) else {
            return map;
        };
        if self.sheet.column_index(abbr_column).is_none() {
            return map;
        }
        for row in 0..self.sheet.len() {
            let name = normalize_key(self.sheet.cell(row, name_column));
            let abbr = normalize_key(self.sheet.cell(row, abbr_column));
            if !name.is_empty() && !abbr.is_empty() {
                map.insert(name, abbr);
            }
        }
        map
    }
}

/// Retention policy per submission origin (`Retenção` sheet).
#[derive(Debug, Clone, Default)]
pub struct RetentionTable {
    sheet: Sheet,
}

impl RetentionTable {
    #[must_use]
    pub fn new(sheet: Sheet) -> Self {
        Self { sheet }
    }

    #[must_use]
    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Submission origins with a policy, sorted.
    #[must_use]
    pub fn origins(&self) -> Vec<String> {
        sorted(self.sheet.distinct(columns::RETENTION_ORIGIN))
    }

    /// Retention text for an origin (first matching row), e.g. `"5 anos"`.
    #[must_use]
    pub fn period_for(&self, origin: &str) -> Option<String> {
        let key = normalize_key(origin);
        (0..self.sheet.len())
            .find(|&row| normalize_key(self.sheet.cell(row, columns::RETENTION_ORIGIN)) == key)
            .map(|row| self.sheet.cell(row, columns::RETENTION_PERIOD).trim().to_string())
            .filter(|period| !period.is_empty())
    }
}

/// Shelf and rack counts of one storage space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceLayout {
    pub shelves: u32,
    pub racks: u32,
}

/// Storage spaces and their capacity (`Espaços` sheet).
#[derive(Debug, Clone, Default)]
pub struct SpacesTable {
    sheet: Sheet,
}

impl SpacesTable {
    #[must_use]
    pub fn new(sheet: Sheet) -> Self {
        Self { sheet }
    }

    #[must_use]
    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    /// Location names, sorted.
    #[must_use]
    pub fn locations(&self) -> Vec<String> {
        sorted(self.sheet.distinct(columns::SPACE_NAME))
    }

    /// Layout of a location. Accepts both the bare name (`"1"`) and the
    /// labelled form (`"ARQUIVO 1"`). Rows with non-numeric counts are skipped.
    #[must_use]
    pub fn layout(&self, location: &str) -> Option<SpaceLayout> {
        let wanted = normalize_key(location);
        let bare = wanted.strip_prefix(SPACE_LABEL).unwrap_or(&wanted).trim();
        (0..self.sheet.len()).find_map(|row| {
            let name = normalize_key(self.sheet.cell(row, columns::SPACE_NAME));
            if name.is_empty() || name != bare {
                return None;
            }
            Some(SpaceLayout {
                shelves: self.sheet.cell(row, columns::SPACE_SHELVES).trim().parse().ok()?,
                racks: self.sheet.cell(row, columns::SPACE_RACKS).trim().parse().ok()?,
            })
        })
    }
}

/// All option tables loaded together.
#[derive(Debug, Clone, Default)]
pub struct OptionTables {
    pub selectboxes: Selectboxes,
    pub retention: RetentionTable,
    pub spaces: SpacesTable,
}

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selectboxes() -> Selectboxes {
        let mut sheet = Sheet::with_columns([
            columns::CATEGORIES,
            columns::DOCUMENT_TYPES,
            columns::CATEGORY_ABBR,
            columns::DOCUMENT_TYPE_ABBR,
            columns::RESPONSIBLES,
        ]);
        sheet.push_row([
            (columns::CATEGORIES, "RH"),
            (columns::DOCUMENT_TYPES, "Contrato"),
            (columns::CATEGORY_ABBR, "rh"),
            (columns::DOCUMENT_TYPE_ABBR, "ct"),
            (columns::RESPONSIBLES, "Maria"),
        ]);
        sheet.push_row([
            (columns::CATEGORIES, "Qualidade"),
            (columns::DOCUMENT_TYPES, "Relatório"),
            (columns::CATEGORY_ABBR, "GQ"),
            (columns::DOCUMENT_TYPE_ABBR, ""),
            (columns::RESPONSIBLES, "Ana"),
        ]);
        Selectboxes::new(sheet)
    }

    #[test]
    fn abbreviations_are_normalized_and_skip_blanks() {
        let sb = selectboxes();
        let categories = sb.category_abbreviations();
        assert_eq!(categories.get("RH").map(String::as_str), Some("RH"));
        assert_eq!(categories.get("QUALIDADE").map(String::as_str), Some("GQ"));

        let types = sb.document_type_abbreviations();
        assert_eq!(types.get("CONTRATO").map(String::as_str), Some("CT"));
        assert!(!types.contains_key("RELATÓRIO"));
    }

    #[test]
    fn abbreviations_empty_without_abbreviation_column() {
        let mut sheet = Sheet::with_columns([columns::CATEGORIES]);
        sheet.push_row([(columns::CATEGORIES, "RH")]);
        assert!(Selectboxes::new(sheet).category_abbreviations().is_empty());
    }

    #[test]
    fn responsibles_are_sorted() {
        assert_eq!(selectboxes().responsibles(), vec!["Ana", "Maria"]);
    }

    #[test]
    fn retention_lookup_ignores_case_and_padding() {
        let mut sheet = Sheet::with_columns([columns::RETENTION_ORIGIN, columns::RETENTION_PERIOD]);
        sheet.push_row([
            (columns::RETENTION_ORIGIN, "Recursos Humanos"),
            (columns::RETENTION_PERIOD, " 5 anos "),
        ]);
        let table = RetentionTable::new(sheet);
        assert_eq!(table.period_for("recursos humanos ").as_deref(), Some("5 anos"));
        assert_eq!(table.period_for("Financeiro"), None);
    }

    #[test]
    fn space_layout_accepts_labelled_and_bare_names() {
        let mut sheet = Sheet::with_columns([
            columns::SPACE_NAME,
            columns::SPACE_SHELVES,
            columns::SPACE_RACKS,
        ]);
        sheet.push_row([
            (columns::SPACE_NAME, "1"),
            (columns::SPACE_SHELVES, "12"),
            (columns::SPACE_RACKS, "5"),
        ]);
        sheet.push_row([
            (columns::SPACE_NAME, "Galpão"),
            (columns::SPACE_SHELVES, "muitas"),
            (columns::SPACE_RACKS, "5"),
        ]);
        let spaces = SpacesTable::new(sheet);
        let expected = Some(SpaceLayout {
            shelves: 12,
            racks: 5,
        });
        assert_eq!(spaces.layout("1"), expected);
        assert_eq!(spaces.layout("arquivo 1"), expected);
        assert_eq!(spaces.layout("Galpão"), None);
        assert_eq!(spaces.layout("2"), None);
    }
}
