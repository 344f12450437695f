// src/period.rs
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::ParseSettingError;

// --- Period ---

/// A calendar month. Every source row is bucketed into one of these before any join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

/// How a period is written into the store. One format per store, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodFormat {
    /// Last calendar day of the month, `2024-01-31`.
    #[default]
    AnchorDate,
    /// `01-2024`.
    MonthToken,
}

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

static YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").expect("static regex"));
static MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[-_/](\d{4})$").expect("static regex"));
static MONTH_NAME_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*[-\s](\d{2}|\d{4})$")
        .expect("static regex")
});

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && NaiveDate::from_ymd_opt(year, month, 1).is_some() {
            Some(Self { year, month })
        } else {
            None
        }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Last calendar day of the month.
    pub fn anchor_date(&self) -> NaiveDate {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|d| d.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// `MM-YYYY`.
    pub fn month_token(&self) -> String {
        format!("{:02}-{:04}", self.month, self.year)
    }

    pub fn key(&self, format: PeriodFormat) -> String {
        match format {
            PeriodFormat::AnchorDate => self.anchor_date().format("%Y-%m-%d").to_string(),
            PeriodFormat::MonthToken => self.month_token(),
        }
    }

    /// Reads a key previously produced by [`Period::key`] with the same format.
    pub fn from_key(key: &str, format: PeriodFormat) -> Option<Self> {
        match format {
            PeriodFormat::AnchorDate => NaiveDate::parse_from_str(key, "%Y-%m-%d")
                .ok()
                .map(Self::from_date),
            PeriodFormat::MonthToken => MONTH_YEAR.captures(key).and_then(|caps| {
                let month = caps[1].parse().ok()?;
                let year = caps[2].parse().ok()?;
                Self::new(year, month)
            }),
        }
    }

    /// Lenient parse of whatever the upstream spreadsheets put in a month/date column.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }

        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
                return Some(Self::from_date(date));
            }
        }
        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
                return Some(Self::from_date(dt.date()));
            }
        }

        if let Some(caps) = YEAR_MONTH.captures(value) {
            return Self::new(caps[1].parse().ok()?, caps[2].parse().ok()?);
        }
        if let Some(caps) = MONTH_YEAR.captures(value) {
            return Self::new(caps[2].parse().ok()?, caps[1].parse().ok()?);
        }
        if let Some(caps) = MONTH_NAME_YEAR.captures(value) {
            let name = caps[1].to_ascii_lowercase();
            let month = MONTH_NAMES.iter().position(|m| *m == name)? as u32 + 1;
            let year: i32 = caps[2].parse().ok()?;
            let year = if caps[2].len() == 2 { 2000 + year } else { year };
            return Self::new(year, month);
        }

        None
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ParseSettingError::new("period", s))
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Period::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised period '{}'", raw)))
    }
}

impl fmt::Display for PeriodFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PeriodFormat::AnchorDate => "anchor_date",
            PeriodFormat::MonthToken => "month_token",
        })
    }
}

impl FromStr for PeriodFormat {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "anchor_date" => Ok(PeriodFormat::AnchorDate),
            "month_token" => Ok(PeriodFormat::MonthToken),
            _ => Err(ParseSettingError::new("period format", s)),
        }
    }
}
