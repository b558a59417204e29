//! Identifier codec: maps a compact `digits + letter` suffix to a sequence index.
//!
//! A record id is `PPPP` + suffix, where the suffix is `D` zero-padded digits
//! followed by one uppercase letter (`00A`, `00B`, ..., `99Z` for `D = 2`).
//! Index `i` encodes as `zero_pad(i / 26, D)` + `'A' + i % 26`, so the
//! namespace of one prefix holds `10^D * 26` identifiers.

use serde::{Deserialize, Serialize};

use crate::error::IdError;

/// Length of the category prefix in every record id.
pub const PREFIX_LEN: usize = 4;

const LETTERS: u32 = 26;
const MAX_DIGITS: u32 = 6;

/// Bidirectional suffix codec for a fixed digit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCodec {
    digits: u32,
}

impl Default for IdCodec {
    /// Two digits, as deployed: `00A..99Z`, 2600 ids per prefix.
    fn default() -> Self {
        Self { digits: 2 }
    }
}

impl IdCodec {
    /// Create a codec for the given digit width.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::UnsupportedWidth`] unless `1 <= digits <= 6`.
    pub fn new(digits: u32) -> Result<Self, IdError> {
        if digits == 0 || digits > MAX_DIGITS {
            return Err(IdError::UnsupportedWidth(digits));
        }
        Ok(Self { digits })
    }

    #[must_use]
    pub fn digits(&self) -> u32 {
        self.digits
    }

    /// Number of distinct suffixes available per prefix (`10^D * 26`).
    #[must_use]
    pub fn capacity(&self) -> u32 {
        10u32.pow(self.digits) * LETTERS
    }

    /// Length of an encoded suffix.
    #[must_use]
    pub fn suffix_len(&self) -> usize {
        self.digits as usize + 1
    }

    /// Encode an index into its suffix.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::CapacityExhausted`] if `index >= capacity`. The
    /// prefix in the error is empty; [`IdCodec::format_id`] fills it in.
    pub fn encode(&self, index: u32) -> Result<String, IdError> {
        self.encode_for("", index)
    }

    fn encode_for(&self, prefix: &str, index: u32) -> Result<String, IdError> {
        if index >= self.capacity() {
            return Err(IdError::CapacityExhausted {
                prefix: prefix.to_string(),
                capacity: self.capacity(),
            });
        }
        let number = index / LETTERS;
        // index % 26 < 26, always a valid ASCII offset
        let letter = char::from(b'A' + (index % LETTERS) as u8);
        Ok(format!(
            "{number:0width$}{letter}",
            width = self.digits as usize
        ))
    }

    /// Decode a suffix back into its index.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidSuffix`] unless the input is exactly `D`
    /// ASCII digits followed by one uppercase ASCII letter.
    pub fn decode(&self, suffix: &str) -> Result<u32, IdError> {
        let invalid = || IdError::InvalidSuffix {
            suffix: suffix.to_string(),
            digits: self.digits,
        };

        let bytes = suffix.as_bytes();
        if bytes.len() != self.suffix_len() {
            return Err(invalid());
        }
        let (digits, letter) = bytes.split_at(self.digits as usize);
        if !digits.iter().all(u8::is_ascii_digit) || !letter[0].is_ascii_uppercase() {
            return Err(invalid());
        }

        let number = digits
            .iter()
            .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
        Ok(number * LETTERS + u32::from(letter[0] - b'A'))
    }

    /// Build a full id from a prefix and an index.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::CapacityExhausted`] naming `prefix` if the index is
    /// outside the namespace.
    pub fn format_id(&self, prefix: &str, index: u32) -> Result<String, IdError> {
        Ok(format!("{prefix}{}", self.encode_for(prefix, index)?))
    }

    /// Split a full id into `(prefix, index)`.
    ///
    /// The id is trimmed and upper-cased first. Anything that is not four
    /// ASCII alphanumerics followed by a valid suffix yields `None`, so that
    /// hand-entered or legacy ids never break allocation.
    #[must_use]
    pub fn split_id(&self, id: &str) -> Option<(String, u32)> {
        let id = id.trim().to_uppercase();
        if !id.is_ascii() || id.len() != PREFIX_LEN + self.suffix_len() {
            return None;
        }
        let (prefix, suffix) = id.split_at(PREFIX_LEN);
        if !prefix.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        let index = self.decode(suffix).ok()?;
        Some((prefix.to_string(), index))
    }
}
