//! Prefix resolution: the 4-character category code at the head of every id.
//!
//! Two strategies exist in deployed versions and both are supported:
//!
//! - [`PrefixStrategy::Department`]: category abbreviation + document type
//!   abbreviation (`"RH"` + `"CT"` = `"RHCT"`).
//! - [`PrefixStrategy::RandomPair`]: document type abbreviation + two random
//!   letters drawn once per data-entry session ([`RandomPairSession`]).

use std::cell::OnceCell;
use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::options::{normalize_key, Selectboxes};

/// Filler used to pad short abbreviations.
pub const FILLER: char = 'X';

const ABBR_LEN: usize = 2;

/// How the 4-character prefix is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrefixStrategy {
    #[default]
    Department,
    RandomPair,
}

#[derive(Debug, Default)]
struct AbbreviationMaps {
    categories: HashMap<String, String>,
    document_types: HashMap<String, String>,
}

/// Resolves category and document type names to abbreviations.
///
/// The lookup maps are built from the options sheet on first use and kept
/// for the lifetime of the resolver.
#[derive(Debug)]
pub struct PrefixResolver {
    selectboxes: Selectboxes,
    maps: OnceCell<AbbreviationMaps>,
}

impl PrefixResolver {
    #[must_use]
    pub fn new(selectboxes: Selectboxes) -> Self {
        Self {
            selectboxes,
            maps: OnceCell::new(),
        }
    }

    fn maps(&self) -> &AbbreviationMaps {
        self.maps.get_or_init(|| AbbreviationMaps {
            categories: self.selectboxes.category_abbreviations(),
            document_types: self.selectboxes.document_type_abbreviations(),
        })
    }

    /// Two-character abbreviation for a category.
    #[must_use]
    pub fn abbreviate_category(&self, name: &str) -> String {
        abbreviate(&self.maps().categories, name)
    }

    /// Two-character abbreviation for a document type.
    #[must_use]
    pub fn abbreviate_document_type(&self, name: &str) -> String {
        abbreviate(&self.maps().document_types, name)
    }

    /// Department strategy prefix: category abbreviation, then document type.
    #[must_use]
    pub fn resolve_prefix(&self, category: &str, document_type: &str) -> String {
        format!(
            "{}{}",
            self.abbreviate_category(category),
            self.abbreviate_document_type(document_type)
        )
    }

    /// Random-pair strategy prefix: document type abbreviation, then the
    /// session's pair for that type.
    #[must_use]
    pub fn resolve_random_prefix<R: Rng>(
        &self,
        document_type: &str,
        session: &mut RandomPairSession,
        rng: &mut R,
    ) -> String {
        let pair = session.pair_with(document_type, rng).to_string();
        format!("{}{pair}", self.abbreviate_document_type(document_type))
    }

    /// Resolve with the configured strategy.
    #[must_use]
    pub fn resolve<R: Rng>(
        &self,
        strategy: PrefixStrategy,
        category: &str,
        document_type: &str,
        session: &mut RandomPairSession,
        rng: &mut R,
    ) -> String {
        match strategy {
            PrefixStrategy::Department => self.resolve_prefix(category, document_type),
            PrefixStrategy::RandomPair => self.resolve_random_prefix(document_type, session, rng),
        }
    }
}

/// Abbreviation from a lookup map, falling back to the name's first two
/// alphanumeric characters.
fn abbreviate(map: &HashMap<String, String>, name: &str) -> String {
    let key = normalize_key(name);
    if key.is_empty() {
        return fallback_abbreviation("");
    }
    match map.get(&key) {
        Some(abbr) if !abbr.is_empty() => fallback_abbreviation(abbr),
        _ => fallback_abbreviation(&key),
    }
}

/// First two `[A-Z0-9]` characters of the upper-cased name, padded with
/// [`FILLER`]. Accented letters are dropped, not transliterated.
#[must_use]
pub fn fallback_abbreviation(name: &str) -> String {
    let mut abbr: String = name
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .take(ABBR_LEN)
        .collect();
    while abbr.len() < ABBR_LEN {
        abbr.push(FILLER);
    }
    abbr
}

/// Random letter pairs drawn for one data-entry session.
///
/// A pair stays fixed per document type until the session is cleared, which
/// callers do after a successful submission or on cancel.
#[derive(Debug, Clone, Default)]
pub struct RandomPairSession {
    pairs: HashMap<String, String>,
}

impl RandomPairSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair for a document type, drawing one from `rng` on first request.
    pub fn pair_with<R: Rng>(&mut self, document_type: &str, rng: &mut R) -> &str {
        self.pairs
            .entry(normalize_key(document_type))
            .or_insert_with(|| {
                (0..ABBR_LEN)
                    .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
                    .collect()
            })
    }

    /// Pair for a document type using the thread-local generator.
    pub fn pair(&mut self, document_type: &str) -> &str {
        self.pair_with(document_type, &mut rand::thread_rng())
    }

    /// Current pair for a document type, if one was drawn.
    #[must_use]
    pub fn peek(&self, document_type: &str) -> Option<&str> {
        self.pairs.get(&normalize_key(document_type)).map(String::as_str)
    }

    /// Forget all drawn pairs so the next record gets a fresh draw.
    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}
