//! Day-month-year dates as typed by users and as stored in the ledger.

use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Layouts accepted for ledger dates, in the order they are tried.
const DAY_FIRST: &[&str] = &["%d.%m.%Y", "%d-%m-%Y"];

/// Layouts accepted for event dates, which are also commonly written year-first.
const EVENT_LAYOUTS: &[&str] = &["%d.%m.%Y", "%d-%m-%Y", "%Y-%m-%d"];

/// How a date is written into the ledger worksheet.
const STORED: &str = "%d-%m-%Y";

/// How a date is written inside a QUERY formula literal.
const QUERY: &str = "%Y-%m-%d";

/// A calendar date of a ledger row or an event.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct LedgerDate(NaiveDate);

impl LedgerDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parses a day-first date, trying the dot layout and then the dash layout.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        parse_with(s, DAY_FIRST)
    }

    /// Parses an event date, which may additionally be written as `yyyy-mm-dd`.
    pub fn parse_event(s: &str) -> anyhow::Result<Self> {
        parse_with(s, EVENT_LAYOUTS)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The canonical ledger representation, `dd-mm-yyyy`.
    pub fn stored(&self) -> String {
        self.0.format(STORED).to_string()
    }

    /// The representation used in `date '...'` literals of a QUERY formula.
    pub fn query_literal(&self) -> String {
        self.0.format(QUERY).to_string()
    }
}

fn parse_with(s: &str, layouts: &[&str]) -> anyhow::Result<LedgerDate> {
    let s = s.trim();
    for layout in layouts {
        if let Ok(date) = NaiveDate::parse_from_str(s, layout) {
            return Ok(LedgerDate(date));
        }
    }
    bail!("'{s}' is not a date in the form dd.mm.yyyy")
}

impl Display for LedgerDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.stored())
    }
}

impl FromStr for LedgerDate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LedgerDate::parse(s)
    }
}

impl Serialize for LedgerDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.stored())
    }
}

impl<'de> Deserialize<'de> for LedgerDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        LedgerDate::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// An inclusive range of dates. A range whose start is after its end is allowed and contains
/// nothing.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    start: LedgerDate,
    end: LedgerDate,
}

impl DateRange {
    pub fn new(start: LedgerDate, end: LedgerDate) -> Self {
        Self { start, end }
    }

    /// Parses `start,end`, e.g. `22.05.2025,25.07.2026`.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let mut parts = s.split(',');
        let (Some(start), Some(end)) = (parts.next(), parts.next()) else {
            bail!("A period needs two dates separated by a comma, got '{s}'");
        };
        let start = LedgerDate::parse(start).context("Invalid start of the period")?;
        let end = LedgerDate::parse(end).context("Invalid end of the period")?;
        Ok(Self::new(start, end))
    }

    pub fn start(&self) -> LedgerDate {
        self.start
    }

    pub fn end(&self) -> LedgerDate {
        self.end
    }

    pub fn contains(&self, date: LedgerDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> LedgerDate {
        LedgerDate::new(NaiveDate::from_ymd_opt(y, m, day).unwrap())
    }

    #[test]
    fn test_parse_dot_and_dash() {
        assert_eq!(LedgerDate::parse("22.05.2025").unwrap(), d(2025, 5, 22));
        assert_eq!(LedgerDate::parse("22-05-2025").unwrap(), d(2025, 5, 22));
        assert_eq!(LedgerDate::parse(" 1.6.2025 ").unwrap(), d(2025, 6, 1));
    }

    #[test]
    fn test_parse_rejects_year_first_for_ledger() {
        assert!(LedgerDate::parse("2025-05-22").is_err());
        assert!(LedgerDate::parse("31.02.2025").is_err());
        assert!(LedgerDate::parse("500").is_err());
    }

    #[test]
    fn test_parse_event_accepts_year_first() {
        assert_eq!(LedgerDate::parse_event("2025-05-22").unwrap(), d(2025, 5, 22));
        assert_eq!(LedgerDate::parse_event("22-05-2025").unwrap(), d(2025, 5, 22));
    }

    #[test]
    fn test_formats() {
        let date = d(2025, 5, 2);
        assert_eq!(date.stored(), "02-05-2025");
        assert_eq!(date.query_literal(), "2025-05-02");
        assert_eq!(date.to_string(), "02-05-2025");
    }

    #[test]
    fn test_range_parse_and_contains() {
        let range = DateRange::parse("22.05.2025,25.07.2026").unwrap();
        assert!(range.contains(d(2025, 5, 22)));
        assert!(range.contains(d(2026, 7, 25)));
        assert!(!range.contains(d(2026, 7, 26)));
        assert!(!range.contains(d(2025, 5, 21)));
    }

    #[test]
    fn test_inverted_range_contains_nothing() {
        let range = DateRange::new(d(2025, 5, 23), d(2025, 5, 22));
        assert!(!range.contains(d(2025, 5, 22)));
        assert!(!range.contains(d(2025, 5, 23)));
    }

    #[test]
    fn test_range_parse_errors() {
        assert!(DateRange::parse("22.05.2025").is_err());
        assert!(DateRange::parse("22.05.2025,soon").is_err());
    }
}
