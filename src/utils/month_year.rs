//! Month-granularity calendar token (`MM-YYYY`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AppError, AppResult};

static MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])-\d{4}$").expect("valid month-year pattern"));

/// 校验 `MM-YYYY` 格式，不做日历归一化
pub fn is_month_year(token: &str) -> bool {
    MONTH_YEAR_RE.is_match(token)
}

/// A calendar month. Ordered by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthYear {
    year: i32,
    month: u32,
}

impl MonthYear {
    pub fn new(month: u32, year: i32) -> AppResult<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(AppError::InvalidRequest(format!(
                "month-year out of range: {month:02}-{year}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// First day of the month, the form stored in `DATE` columns.
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .unwrap_or(NaiveDate::MIN)
    }
}

impl From<NaiveDate> for MonthYear {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl FromStr for MonthYear {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_month_year(s) {
            return Err(AppError::InvalidRequest(format!(
                "date must match MM-YYYY, got {s:?}"
            )));
        }
        let (month, year) = s
            .split_once('-')
            .ok_or_else(|| AppError::InvalidRequest(format!("malformed month-year {s:?}")))?;
        let month = month
            .parse::<u32>()
            .map_err(|e| AppError::InvalidRequest(format!("bad month in {s:?}: {e}")))?;
        let year = year
            .parse::<i32>()
            .map_err(|e| AppError::InvalidRequest(format!("bad year in {s:?}: {e}")))?;
        MonthYear::new(month, year)
    }
}

impl fmt::Display for MonthYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}

impl Serialize for MonthYear {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthYear {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
