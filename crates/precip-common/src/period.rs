//! Dataset period identifiers (`YYYYMM`).

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One named dataset instance: a calendar month of model output.
///
/// Ordering is chronological, so a sorted list of periods is also a
/// sorted list of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Create a period, rejecting months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, PeriodParseError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodParseError::InvalidMonth(month));
        }
        if !(1..=9999).contains(&year) {
            return Err(PeriodParseError::InvalidYear(year));
        }
        Ok(Self { year, month })
    }

    /// Const constructor for literal periods; panics on an invalid month.
    pub const fn ym(year: i32, month: u32) -> Self {
        assert!(month >= 1 && month <= 12, "month must be 1..=12");
        Self { year, month }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month.
    pub fn next(&self) -> Period {
        if self.month == 12 {
            Period {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Period {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// First calendar day of the period.
    pub fn first_day(&self) -> NaiveDate {
        // year and month are validated on construction
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or_default()
    }

    /// Number of calendar days in the period.
    pub fn days_in_month(&self) -> u32 {
        let next = self.next().first_day();
        next.signed_duration_since(self.first_day()).num_days() as u32
    }

    /// The period containing a given date.
    pub fn containing(date: NaiveDate) -> Period {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PeriodParseError::InvalidFormat(s.to_string()));
        }
        let year: i32 = s[..4]
            .parse()
            .map_err(|_| PeriodParseError::InvalidFormat(s.to_string()))?;
        let month: u32 = s[4..]
            .parse()
            .map_err(|_| PeriodParseError::InvalidFormat(s.to_string()))?;
        Period::new(year, month)
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeriodParseError {
    #[error("Invalid period format: '{0}'. Expected YYYYMM")]
    InvalidFormat(String),

    #[error("Invalid month in period: {0}")]
    InvalidMonth(u32),

    #[error("Invalid year in period: {0}")]
    InvalidYear(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let p: Period = "202508".parse().unwrap();
        assert_eq!(p.year(), 2025);
        assert_eq!(p.month(), 8);
        assert_eq!(p.to_string(), "202508");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("2025-08".parse::<Period>().is_err());
        assert!("20251".parse::<Period>().is_err());
        assert_eq!(
            "202513".parse::<Period>(),
            Err(PeriodParseError::InvalidMonth(13))
        );
        assert_eq!(
            "202500".parse::<Period>(),
            Err(PeriodParseError::InvalidMonth(0))
        );
    }

    #[test]
    fn test_next_rolls_over_year() {
        let p: Period = "202412".parse().unwrap();
        assert_eq!(p.next().to_string(), "202501");
        assert_eq!(p.next().next().to_string(), "202502");
    }

    #[test]
    fn test_ordering_is_chronological() {
        let mut periods: Vec<Period> = ["202601", "202412", "202508"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        periods.sort();
        let labels: Vec<String> = periods.iter().map(|p| p.to_string()).collect();
        assert_eq!(labels, vec!["202412", "202508", "202601"]);
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!("202402".parse::<Period>().unwrap().days_in_month(), 29);
        assert_eq!("202502".parse::<Period>().unwrap().days_in_month(), 28);
        assert_eq!("202512".parse::<Period>().unwrap().days_in_month(), 31);
    }

    #[test]
    fn test_serde_as_string() {
        let p: Period = "202601".parse().unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\"202601\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
