//! Candidate meeting time values
//!
//! A [`Slot`] is a naive local date-time. Two slots are the same slot exactly
//! when their canonical ISO-8601 representation (`YYYY-MM-DDTHH:MM:SS`) is
//! equal; there is no fuzzy time matching.

use crate::error::StudySyncError;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical slot format written to the store and used for equality
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Accepted input formats, tried in order
const INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A proposed or confirmed meeting time
///
/// # Examples
///
/// ```
/// use studysync::slot::Slot;
///
/// let a: Slot = "2025-05-01T18:00".parse().unwrap();
/// let b: Slot = "2025-05-01 18:00:00".parse().unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "2025-05-01T18:00:00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slot(NaiveDateTime);

impl Slot {
    /// Wraps a date-time, truncating it to whole seconds
    pub fn new(value: NaiveDateTime) -> Self {
        Self(value.with_nanosecond(0).unwrap_or(value))
    }

    /// The underlying date-time
    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Canonical ISO-8601 form
    pub fn canonical(&self) -> String {
        self.0.format(CANONICAL_FORMAT).to_string()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl FromStr for Slot {
    type Err = StudySyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        INPUT_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .map(Slot::new)
            .ok_or_else(|| StudySyncError::InvalidProposal(format!("malformed slot '{}'", s)))
    }
}

impl TryFrom<String> for Slot {
    type Error = StudySyncError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.canonical()
    }
}

/// Parses a list of raw slot strings, failing on the first malformed entry
pub fn parse_slots<S: AsRef<str>>(raw: &[S]) -> std::result::Result<Vec<Slot>, StudySyncError> {
    raw.iter().map(|s| s.as_ref().parse()).collect()
}
