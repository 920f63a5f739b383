//! Task types shared by the cache, the dashboard and the reminder engine.
//!
//! The backend owns every task; the client only ever holds a cached,
//! possibly stale copy. Category and priority travel as free-form strings
//! so that values the assistant invents survive a round trip, with
//! [`TaskCategory`] and [`TaskPriority`] as the known vocabulary.

pub mod cache;
pub mod query;
pub mod recurrence;

pub use cache::{TaskBackend, TaskCache};
pub use query::{SortField, SortOption, SortOrder, TaskQuery};
pub use recurrence::RecurrencePattern;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Category of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    General,
    Work,
    Personal,
    Shopping,
    Health,
}

impl TaskCategory {
    pub const ALL: [TaskCategory; 5] = [
        TaskCategory::General,
        TaskCategory::Work,
        TaskCategory::Personal,
        TaskCategory::Shopping,
        TaskCategory::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::General => "General",
            TaskCategory::Work => "Work",
            TaskCategory::Personal => "Personal",
            TaskCategory::Shopping => "Shopping",
            TaskCategory::Health => "Health",
        }
    }
}

impl Default for TaskCategory {
    fn default() -> Self {
        TaskCategory::General
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "category".into(),
                message: format!("unknown category '{s}'"),
            })
    }
}

/// Priority of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::High, TaskPriority::Medium, TaskPriority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::High => "High",
            TaskPriority::Medium => "Medium",
            TaskPriority::Low => "Low",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskPriority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "priority".into(),
                message: format!("unknown priority '{s}'"),
            })
    }
}

/// A task as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    #[serde(deserialize_with = "crate::wire::id_string")]
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    pub category: String,
    pub priority: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub created_at: String,
    pub updated_at: String,
    /// Due timestamp, RFC 3339 or naive local `YYYY-MM-DDTHH:MM[:SS]`
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_pattern: Option<String>,
    #[serde(default)]
    pub next_occurrence: Option<String>,
    /// Set by the backend once it has pushed a notification for this task
    #[serde(default)]
    pub notification_sent: bool,
}

impl Task {
    /// Build the placeholder shown while a create request is in flight.
    pub fn placeholder(data: &TaskCreate, now: DateTime<Utc>) -> Self {
        let stamp = now.to_rfc3339();
        Task {
            id: format!("temp-{}", uuid::Uuid::new_v4()),
            description: data.description.clone(),
            completed: false,
            category: data
                .category
                .clone()
                .unwrap_or_else(|| TaskCategory::General.to_string()),
            priority: data
                .priority
                .clone()
                .unwrap_or_else(|| TaskPriority::Medium.to_string()),
            tags: Some(data.tags.clone().unwrap_or_default()),
            created_at: stamp.clone(),
            updated_at: stamp,
            due_date: data.due_date.clone(),
            is_recurring: data.is_recurring.unwrap_or(false),
            recurrence_pattern: data.recurrence_pattern.clone(),
            next_occurrence: None,
            notification_sent: false,
        }
    }

    /// True for tasks that only exist locally until the create call returns.
    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with("temp-")
    }

    /// Parsed due time; `None` when absent or malformed.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_date.as_deref().and_then(parse_due)
    }

    pub fn priority_level(&self) -> Option<TaskPriority> {
        self.priority.parse().ok()
    }

    pub fn recurrence(&self) -> Option<RecurrencePattern> {
        if !self.is_recurring {
            return None;
        }
        self.recurrence_pattern.as_deref().and_then(RecurrencePattern::detect)
    }

    /// Overdue means the due time has passed and the task is still open.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_at().is_some_and(|due| due < now)
    }

    /// Merge an update into this task the way the backend will.
    pub fn apply_update(&mut self, update: &TaskUpdate) {
        if let Some(ref d) = update.description {
            self.description = d.clone();
        }
        if let Some(c) = update.completed {
            self.completed = c;
        }
        if let Some(ref c) = update.category {
            self.category = c.clone();
        }
        if let Some(ref p) = update.priority {
            self.priority = p.clone();
        }
        if let Some(ref t) = update.tags {
            self.tags = Some(t.clone());
        }
        if let Some(ref d) = update.due_date {
            self.due_date = d.clone();
        }
        if let Some(r) = update.is_recurring {
            self.is_recurring = r;
        }
        if let Some(ref p) = update.recurrence_pattern {
            self.recurrence_pattern = p.clone();
        }
    }
}

/// Parse a due-date string as sent by the backend or typed by the user.
///
/// Naive timestamps are read in the local time zone.
pub fn parse_due(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(raw, fmt)
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .map(|local| local.with_timezone(&Utc))
    })
}

/// Payload for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskCreate {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<String>,
}

impl TaskCreate {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Normalise form input: trimmed description, blank tags dropped,
    /// recurring tasks without a pattern repeat daily.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        self.description = self.description.trim().to_string();
        if self.description.is_empty() {
            return Err(ValidationError::EmptyDescription);
        }
        if let Some(ref due) = self.due_date {
            if parse_due(due).is_none() {
                return Err(ValidationError::InvalidValue {
                    field: "due_date".into(),
                    message: format!("cannot parse '{due}'"),
                });
            }
        }
        if let Some(tags) = self.tags.take() {
            self.tags = Some(tags.into_iter().map(|t| t.trim().to_string()).filter(|t| !t.is_empty()).collect());
        }
        if self.is_recurring == Some(true) {
            if self.recurrence_pattern.is_none() {
                self.recurrence_pattern = Some(RecurrencePattern::Daily.to_string());
            }
        } else {
            self.recurrence_pattern = None;
        }
        Ok(self)
    }
}

/// Partial update. `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<Option<String>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }
}

/// Split a comma-separated tag list, dropping blanks.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn task(id: &str, description: &str) -> Task {
        Task {
            id: id.into(),
            description: description.into(),
            completed: false,
            category: "General".into(),
            priority: "Medium".into(),
            tags: None,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
            due_date: None,
            is_recurring: false,
            recurrence_pattern: None,
            next_occurrence: None,
            notification_sent: false,
        }
    }

    pub fn due_task(id: &str, due: DateTime<Utc>) -> Task {
        Task {
            due_date: Some(due.to_rfc3339()),
            ..task(id, &format!("task {id}"))
        }
    }
}
