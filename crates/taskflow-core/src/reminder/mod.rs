//! Due-date reminders.
//!
//! Two sources feed the same deduplicated alert path:
//! - a local scan of the cached task list, every second;
//! - the backend notification feed, polled every few seconds while the
//!   dashboard is visible.
//!
//! The timing windows live here as pure functions so they can be checked
//! in isolation. [`engine::ReminderEngine`] applies them to tasks and owns
//! the notified set; [`service`] drives it from an async loop.

pub mod alert;
pub mod engine;
pub mod service;

pub use alert::{AlertSink, DesktopAlerts};
pub use engine::ReminderEngine;
pub use service::{spawn, Clock, ReminderCommand, ReminderHandle, ReminderInputs, ServiceSettings};

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ApiError;
use crate::task::Task;

/// Overdue by more than this and the task is never announced.
pub const STALE_AFTER: ChronoDuration = ChronoDuration::minutes(2);

/// Local alerts fire up to this far ahead of the due time.
pub const LOCAL_LEAD: ChronoDuration = ChronoDuration::seconds(5);

/// Feed alerts further out than this are scheduled instead of shown.
pub const DEFER_THRESHOLD: ChronoDuration = ChronoDuration::seconds(1);

pub const LOCAL_SCAN_INTERVAL: Duration = Duration::from_secs(1);
pub const FEED_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const FEED_LIMIT: u32 = 10;

/// The in-app toast. At most one is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub task_id: String,
}

impl ReminderNotification {
    /// Toast for a task whose due time was reached locally.
    pub fn local(task: &Task, due: DateTime<Utc>) -> Self {
        Self {
            id: format!("local-{}", task.id),
            title: format!("TaskFlow: {}", task.description),
            body: format!("Due at {}", due.with_timezone(&Local).format("%-I:%M:%S %p")),
            task_id: task.id.clone(),
        }
    }
}

/// One entry of `GET /api/events/notifications`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedNotification {
    #[serde(deserialize_with = "crate::wire::id_string")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(deserialize_with = "crate::wire::id_string")]
    pub task_id: String,
}

impl From<FeedNotification> for ReminderNotification {
    fn from(n: FeedNotification) -> Self {
        Self {
            id: n.id,
            title: n.title,
            body: n.body,
            task_id: n.task_id,
        }
    }
}

/// Source of backend-produced reminders.
#[async_trait]
pub trait NotificationFeed: Send + Sync {
    async fn pending_notifications(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<FeedNotification>, ApiError>;
}

/// What the local scan does with a task, given `due - now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalDecision {
    /// Too late to announce; suppress for good.
    Stale,
    Fire,
    /// Not yet due.
    Wait,
}

pub fn classify_local(diff: ChronoDuration) -> LocalDecision {
    if diff < -STALE_AFTER {
        LocalDecision::Stale
    } else if diff <= LOCAL_LEAD {
        LocalDecision::Fire
    } else {
        LocalDecision::Wait
    }
}

/// What the feed path does with a notification, given `due - now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedDecision {
    Stale,
    /// Show once `diff` has elapsed.
    Defer(ChronoDuration),
    FireNow,
}

pub fn classify_feed(diff: ChronoDuration) -> FeedDecision {
    if diff < -STALE_AFTER {
        FeedDecision::Stale
    } else if diff > DEFER_THRESHOLD {
        FeedDecision::Defer(diff)
    } else {
        FeedDecision::FireNow
    }
}
