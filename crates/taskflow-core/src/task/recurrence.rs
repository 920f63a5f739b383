//! Recurrence patterns for repeating tasks.
//!
//! The backend creates the next instance when a recurring task is
//! completed; the client only needs to name the pattern and preview the
//! next due date.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    /// Thirty days, not a calendar month.
    Monthly,
}

impl RecurrencePattern {
    /// Recognise a pattern anywhere in free text ("every weekly standup").
    pub fn detect(raw: &str) -> Option<Self> {
        let lower = raw.to_lowercase();
        if lower.contains("daily") {
            Some(RecurrencePattern::Daily)
        } else if lower.contains("weekly") {
            Some(RecurrencePattern::Weekly)
        } else if lower.contains("monthly") {
            Some(RecurrencePattern::Monthly)
        } else {
            None
        }
    }

    pub fn interval(&self) -> Duration {
        match self {
            RecurrencePattern::Daily => Duration::days(1),
            RecurrencePattern::Weekly => Duration::weeks(1),
            RecurrencePattern::Monthly => Duration::days(30),
        }
    }

    pub fn next_after(&self, due: DateTime<Utc>) -> DateTime<Utc> {
        due + self.interval()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrencePattern::Daily => "daily",
            RecurrencePattern::Weekly => "weekly",
            RecurrencePattern::Monthly => "monthly",
        }
    }
}

impl fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
