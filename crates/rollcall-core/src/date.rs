//! The calendar day an attendance session belongs to.
//!
//! On the wire and in every comparison the day is the canonical `DD/MM/YYYY`
//! string of the issuer's local calendar. Inside composite keys the slashes
//! are replaced by hyphens.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{Error, Result};

/// `strftime` pattern for the wire form of a session date.
pub const SESSION_DATE_FORMAT: &str = "%d/%m/%Y";

/// A calendar day, displayed and serialised as `DD/MM/YYYY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionDate(NaiveDate);

impl SessionDate {
  pub fn new(date: NaiveDate) -> Self { Self(date) }

  /// Build from day, month and year; `None` for impossible dates.
  pub fn from_dmy(day: u32, month: u32, year: i32) -> Option<Self> {
    NaiveDate::from_ymd_opt(year, month, day).map(Self)
  }

  /// Parse the canonical `DD/MM/YYYY` form.
  ///
  /// Non-canonical spellings such as `3/3/2025` are rejected: two devices
  /// only agree on a day when they produce byte-identical strings.
  pub fn parse(s: &str) -> Result<Self> {
    let date = NaiveDate::parse_from_str(s, SESSION_DATE_FORMAT)
      .map_err(|_| Error::InvalidSessionDate(s.to_owned()))?;
    let parsed = Self(date);
    if parsed.to_string() != s {
      return Err(Error::InvalidSessionDate(s.to_owned()));
    }
    Ok(parsed)
  }

  /// The hyphenated form used inside composite keys, e.g. `03-03-2025`.
  pub fn key_segment(&self) -> String { self.to_string().replace('/', "-") }
}

impl fmt::Display for SessionDate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.format(SESSION_DATE_FORMAT))
  }
}

impl FromStr for SessionDate {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::parse(s) }
}

impl From<NaiveDate> for SessionDate {
  fn from(date: NaiveDate) -> Self { Self(date) }
}

impl Serialize for SessionDate {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for SessionDate {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let s = String::deserialize(deserializer)?;
    Self::parse(&s).map_err(de::Error::custom)
  }
}
