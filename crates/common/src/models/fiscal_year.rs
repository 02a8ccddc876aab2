//! Fiscal year labels
//!
//! Fiscal years run April to March and are labelled `FY##-##` using the
//! two-digit suffixes of the calendar years they span.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Month in which a fiscal year starts (April)
pub const FISCAL_YEAR_START_MONTH: u32 = 4;

/// A canonical fiscal year label such as `FY24-25`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiscalYear {
    start: u8,
    end: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid fiscal year label '{label}', expected FY##-##")]
pub struct FiscalYearParseError {
    pub label: String,
}

impl FiscalYear {
    /// Build from two-digit halves; both must be below 100
    pub fn new(start: u8, end: u8) -> Option<Self> {
        (start < 100 && end < 100).then_some(Self { start, end })
    }

    /// The fiscal year that begins in April of `year`
    pub fn from_start_year(year: i32) -> Self {
        Self {
            start: year.rem_euclid(100) as u8,
            end: (year + 1).rem_euclid(100) as u8,
        }
    }

    /// The fiscal year a calendar date falls in
    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= FISCAL_YEAR_START_MONTH {
            Self::from_start_year(date.year())
        } else {
            Self::from_start_year(date.year() - 1)
        }
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    /// The following fiscal year (`FY24-25` -> `FY25-26`)
    pub fn next(&self) -> Self {
        Self {
            start: self.end,
            end: (self.end + 1) % 100,
        }
    }

    /// Two labels are adjacent when one ends where the other starts
    pub fn is_adjacent(&self, other: &FiscalYear) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// Lenient parse for labels coming from the data store.
    ///
    /// Accepts `FY24-25`, `FY2024-25`, `2024-25` and `2024-2025`
    /// (case-insensitive, surrounding whitespace ignored).
    pub fn normalize(label: &str) -> Option<Self> {
        let upper = label.trim().to_ascii_uppercase();
        let body = upper.strip_prefix("FY").unwrap_or(&upper).trim_start();
        let (start, end) = body.split_once('-')?;

        Self::new(two_digit_suffix(start)?, two_digit_suffix(end)?)
    }
}

fn two_digit_suffix(part: &str) -> Option<u8> {
    if !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    match part.len() {
        2 | 4 => part[part.len() - 2..].parse().ok(),
        _ => None,
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY{:02}-{:02}", self.start, self.end)
    }
}

impl FromStr for FiscalYear {
    type Err = FiscalYearParseError;

    /// Strict parse of the canonical `FY##-##` form
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let err = || FiscalYearParseError {
            label: label.to_string(),
        };

        let bytes = label.as_bytes();
        if bytes.len() != 7 || !label.starts_with("FY") || bytes[4] != b'-' {
            return Err(err());
        }

        let digits = [bytes[2], bytes[3], bytes[5], bytes[6]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(err());
        }

        let start = (digits[0] - b'0') * 10 + (digits[1] - b'0');
        let end = (digits[2] - b'0') * 10 + (digits[3] - b'0');
        Ok(Self { start, end })
    }
}

impl Serialize for FiscalYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FiscalYear {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        FiscalYear::normalize(&label)
            .ok_or_else(|| serde::de::Error::custom(FiscalYearParseError { label }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_round_trip() {
        for start in 0..100u8 {
            for end in [0u8, 9, 10, 25, 99] {
                let label = format!("FY{:02}-{:02}", start, end);
                let parsed: FiscalYear = label.parse().unwrap();
                assert_eq!(parsed.to_string(), label);
            }
        }
    }

    #[test]
    fn test_strict_parse_rejects_variants() {
        for label in ["FY2024-25", "2024-25", "fy24-25", "FY24/25", "FY2-25", "FY24-25 "] {
            assert!(label.parse::<FiscalYear>().is_err(), "{label} should be rejected");
        }
    }

    #[test]
    fn test_normalize_store_labels() {
        let expected = FiscalYear::new(24, 25).unwrap();
        for label in ["FY24-25", "fy24-25", "FY2024-25", "2024-25", "2024-2025", " FY 24-25 "] {
            assert_eq!(FiscalYear::normalize(label), Some(expected), "{label}");
        }
        assert_eq!(FiscalYear::normalize("2024"), None);
        assert_eq!(FiscalYear::normalize("FY245-25"), None);
    }

    #[test]
    fn test_containing_follows_april_boundary() {
        let march = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let april = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert_eq!(FiscalYear::containing(march).to_string(), "FY24-25");
        assert_eq!(FiscalYear::containing(april).to_string(), "FY25-26");
    }

    #[test]
    fn test_century_wrap() {
        assert_eq!(FiscalYear::from_start_year(2099).to_string(), "FY99-00");
        assert_eq!(FiscalYear::from_start_year(2099).next().to_string(), "FY00-01");
    }

    #[test]
    fn test_adjacency() {
        let a: FiscalYear = "FY23-24".parse().unwrap();
        let b: FiscalYear = "FY24-25".parse().unwrap();
        let c: FiscalYear = "FY25-26".parse().unwrap();
        assert!(a.is_adjacent(&b));
        assert!(b.is_adjacent(&a));
        assert!(!a.is_adjacent(&c));
        assert_eq!(a.next(), b);
    }

    #[test]
    fn test_serde_uses_label() {
        let fy: FiscalYear = "FY24-25".parse().unwrap();
        assert_eq!(serde_json::to_string(&fy).unwrap(), "\"FY24-25\"");
        let back: FiscalYear = serde_json::from_str("\"2024-25\"").unwrap();
        assert_eq!(back, fy);
    }
}
