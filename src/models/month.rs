use chrono::NaiveDate;
use regex::Regex;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{LedgerError, Result};

#[allow(clippy::expect_used)]
static MONTH_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-(0[1-9]|1[0-2])$").expect("month key pattern compiles")
});

#[allow(clippy::expect_used)]
static DATE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern compiles")
});

/// A calendar month key in `YYYY-MM` form.
///
/// Keys are zero padded, so the derived lexicographic ordering is also the
/// chronological one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(String);

impl Month {
    /// Parse a `YYYY-MM` key. Anything else is rejected, never coerced.
    pub fn parse(s: &str) -> Result<Self> {
        if MONTH_KEY.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(LedgerError::InvalidMonth(s.to_string()))
        }
    }

    /// The month a `YYYY-MM-DD` transaction date falls in.
    pub fn from_date(date: &str) -> Result<Self> {
        let valid = DATE_KEY.is_match(date) && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok();
        if !valid {
            return Err(LedgerError::InvalidMonth(date.to_string()));
        }
        Self::parse(&date[..7])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Month {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToSql for Month {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for Month {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        Month::parse(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
