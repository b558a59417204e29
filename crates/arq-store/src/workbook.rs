//! Workbook: the named sheets stored as one remote object.
//!
//! The object is JSON (`{"sheets": [{"name", "columns", "rows"}]}`). Sheet
//! names follow spreadsheet rules: `[]:*?/\` become spaces and names are cut
//! to 31 characters.

use arq_core::Sheet;
use serde::{Deserialize, Serialize};

/// Maximum sheet name length.
pub const MAX_SHEET_NAME: usize = 31;

/// Well-known sheet names. The first entry of each alias list is the name
/// written on save.
pub mod sheets {
    pub const RECORDS: &[&str] = &["Arquivos"];
    pub const SELECTBOXES: &[&str] = &["Selectboxes"];
    pub const RETENTION: &[&str] = &["Retenção", "Retencao"];
    pub const SPACES: &[&str] = &["Espaços", "Espacos"];
    pub const HISTORY: &[&str] = &["Histórico", "Historico"];

    /// Alias list for a user-supplied option sheet name, if it is one.
    #[must_use]
    pub fn option_aliases(name: &str) -> Option<&'static [&'static str]> {
        [SELECTBOXES, RETENTION, SPACES]
            .into_iter()
            .find(|aliases| aliases.iter().any(|a| a.eq_ignore_ascii_case(name.trim())))
    }
}

/// Replace characters not allowed in sheet names and truncate.
#[must_use]
pub fn sanitize_sheet_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\') { ' ' } else { c })
        .take(MAX_SHEET_NAME)
        .collect()
}

fn with_primary<'a>(name: &'a str, aliases: &[&'a str]) -> Vec<&'a str> {
    let mut all = vec![name];
    all.extend_from_slice(aliases);
    all
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct NamedSheet {
    name: String,
    #[serde(flatten)]
    sheet: Sheet,
}

/// Ordered collection of named sheets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    #[serde(default)]
    sheets: Vec<NamedSheet>,
}

impl Workbook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a workbook. Empty input is an empty workbook.
    ///
    /// # Errors
    ///
    /// Returns the JSON error for malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }

    /// Encode as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    #[must_use]
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    fn position(&self, aliases: &[&str]) -> Option<usize> {
        let wanted: Vec<String> = aliases.iter().map(|a| sanitize_sheet_name(a)).collect();
        wanted
            .iter()
            .find_map(|w| self.sheets.iter().position(|s| s.name == *w))
            .or_else(|| {
                wanted.iter().find_map(|w| {
                    self.sheets
                        .iter()
                        .position(|s| s.name.to_lowercase() == w.to_lowercase())
                })
            })
    }

    /// First sheet matching any alias, exact spelling preferred.
    #[must_use]
    pub fn sheet(&self, aliases: &[&str]) -> Option<&Sheet> {
        self.position(aliases).map(|i| &self.sheets[i].sheet)
    }

    /// Sheet matching any alias, or an empty one.
    #[must_use]
    pub fn sheet_or_empty(&self, aliases: &[&str]) -> Sheet {
        self.sheet(aliases).cloned().unwrap_or_default()
    }

    /// Replace the sheet found under any alias, or add it as `name`.
    pub fn put(&mut self, name: &str, aliases: &[&str], sheet: Sheet) {
        let name = sanitize_sheet_name(name);
        let found = self.position(&with_primary(&name, aliases));
        match found {
            Some(i) => self.sheets[i] = NamedSheet { name, sheet },
            None => self.sheets.push(NamedSheet { name, sheet }),
        }
    }

    /// Append rows to the sheet found under any alias, or add it as `name`.
    pub fn append(&mut self, name: &str, aliases: &[&str], sheet: &Sheet) {
        let name = sanitize_sheet_name(name);
        let found = self.position(&with_primary(&name, aliases));
        match found {
            Some(i) => self.sheets[i].sheet.append(sheet),
            None => self.sheets.push(NamedSheet {
                name,
                sheet: sheet.clone(),
            }),
        }
    }
}
