//! Retention policy and disposal date computation.
//!
//! Retention periods are free text from the options sheet (`"5 anos"`,
//! `"10 anos após encerramento"`). Only a leading integer year count is
//! understood; anything else leaves the disposal date unset.

use chrono::{Months, NaiveDate};

/// Retention period resolved for a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Text copied into the record as-is.
    pub period: String,
    /// Leading year count, when the text starts with one.
    pub years: Option<u32>,
}

impl RetentionPolicy {
    /// Parse a retention text. Never fails; unparseable text yields
    /// `years: None`.
    #[must_use]
    pub fn parse(period: &str) -> Self {
        let period = period.trim().to_string();
        let years = period
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<u32>().ok());
        Self { period, years }
    }

    /// Disposal date for a record archived on `archived_on`.
    ///
    /// Adds whole calendar years; Feb 29 maps to Feb 28 in non-leap years.
    #[must_use]
    pub fn disposal_date(&self, archived_on: NaiveDate) -> Option<NaiveDate> {
        let years = self.years?;
        archived_on.checked_add_months(Months::new(years.checked_mul(12)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_leading_year_count() {
        let policy = RetentionPolicy::parse(" 5 anos ");
        assert_eq!(policy.period, "5 anos");
        assert_eq!(policy.years, Some(5));
        assert_eq!(policy.disposal_date(ymd(2025, 2, 10)), Some(ymd(2030, 2, 10)));
    }

    #[test]
    fn bare_number_is_years() {
        assert_eq!(RetentionPolicy::parse("20").years, Some(20));
    }

    #[test]
    fn unparseable_text_leaves_disposal_unset() {
        for text in ["Permanente", "", "cinco anos", "5anos"] {
            let policy = RetentionPolicy::parse(text);
            assert_eq!(policy.years, None, "{text:?}");
            assert_eq!(policy.disposal_date(ymd(2025, 1, 1)), None);
        }
    }

    #[test]
    fn leap_day_clamps_to_end_of_february() {
        let policy = RetentionPolicy::parse("1 ano");
        assert_eq!(policy.disposal_date(ymd(2024, 2, 29)), Some(ymd(2025, 2, 28)));
    }

    #[test]
    fn absurd_year_counts_do_not_panic() {
        let policy = RetentionPolicy::parse("4000000000 anos");
        assert_eq!(policy.disposal_date(ymd(2025, 1, 1)), None);
    }
}
