//! Dashboard summary and bulk actions.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::error::ApiError;
use crate::task::{Task, TaskBackend, TaskCache, TaskPriority};

/// Counters shown above the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub high_priority_pending: usize,
    /// Percent, rounded
    pub completion_rate: u32,
}

impl Summary {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        let high_priority_pending = tasks
            .iter()
            .filter(|t| !t.completed && t.priority_level() == Some(TaskPriority::High))
            .count();
        let completion_rate = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        };
        Self {
            total,
            completed,
            pending: total - completed,
            high_priority_pending,
            completion_rate,
        }
    }
}

/// Outcome of a bulk action. Items that failed were rolled back.
#[derive(Debug, Default)]
pub struct BulkResult {
    pub succeeded: usize,
    pub failed: Vec<(String, ApiError)>,
}

/// Complete every open task in `tasks`.
pub async fn mark_all_complete<B: TaskBackend>(cache: &mut TaskCache<B>, tasks: &[Task]) -> BulkResult {
    let ids: Vec<String> = tasks.iter().filter(|t| !t.completed).map(|t| t.id.clone()).collect();
    let mut result = BulkResult::default();
    for id in ids {
        match cache.toggle(&id, true).await {
            Ok(_) => result.succeeded += 1,
            Err(e) => result.failed.push((id, e)),
        }
    }
    result
}

/// Delete every completed task in `tasks`.
pub async fn clear_completed<B: TaskBackend>(cache: &mut TaskCache<B>, tasks: &[Task]) -> BulkResult {
    let ids: Vec<String> = tasks.iter().filter(|t| t.completed).map(|t| t.id.clone()).collect();
    let mut result = BulkResult::default();
    for id in ids {
        match cache.delete(&id).await {
            Ok(()) => result.succeeded += 1,
            Err(e) => result.failed.push((id, e)),
        }
    }
    result
}

/// Short due label in local time, with an overdue marker.
pub fn due_label(task: &Task, now: DateTime<Utc>) -> Option<String> {
    let due = task.due_at()?;
    let local = due.with_timezone(&Local).format("%b %-d, %-I:%M %p");
    if task.is_overdue(now) {
        Some(format!("{local} (overdue)"))
    } else {
        Some(local.to_string())
    }
}

/// Recurrence label such as "repeats weekly, next Mar 8, 9:00 AM".
pub fn recurrence_label(task: &Task) -> Option<String> {
    let pattern = task.recurrence()?;
    let next = task
        .next_occurrence
        .as_deref()
        .and_then(crate::task::parse_due)
        .or_else(|| task.due_at().map(|due| pattern.next_after(due)));
    Some(match next {
        Some(next) => format!(
            "repeats {pattern}, next {}",
            next.with_timezone(&Local).format("%b %-d, %-I:%M %p")
        ),
        None => format!("repeats {pattern}"),
    })
}

/// One line of the task list.
pub fn task_line(task: &Task, now: DateTime<Utc>) -> String {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let mut line = format!("{mark} {:>4}  {}  ({}, {})", task.id, task.description, task.category, task.priority);
    if let Some(tags) = task.tags.as_ref().filter(|t| !t.is_empty()) {
        line.push_str(&format!("  #{}", tags.join(" #")));
    }
    if let Some(due) = due_label(task, now) {
        line.push_str(&format!("  due {due}"));
    }
    if let Some(recur) = recurrence_label(task) {
        line.push_str(&format!("  {recur}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::fixtures::{due_task, task};
    use chrono::Duration;

    fn with(id: &str, completed: bool, priority: &str) -> Task {
        Task {
            completed,
            priority: priority.into(),
            ..task(id, "t")
        }
    }

    #[test]
    fn summary_counts() {
        let tasks = vec![
            with("1", true, "High"),
            with("2", false, "High"),
            with("3", false, "Low"),
        ];
        let s = Summary::from_tasks(&tasks);
        assert_eq!(
            s,
            Summary {
                total: 3,
                completed: 1,
                pending: 2,
                high_priority_pending: 1,
                completion_rate: 33,
            }
        );
    }

    #[test]
    fn empty_list_has_zero_rate() {
        assert_eq!(Summary::from_tasks(&[]).completion_rate, 0);
    }

    #[test]
    fn rate_rounds_half_up() {
        let tasks = vec![with("1", true, "Low"), with("2", true, "Low"), with("3", false, "Low")];
        assert_eq!(Summary::from_tasks(&tasks).completion_rate, 67);
    }

    #[test]
    fn overdue_label_only_for_open_tasks() {
        let now = Utc::now();
        let mut t = due_task("1", now - Duration::hours(1));
        assert!(due_label(&t, now).unwrap().ends_with("(overdue)"));
        t.completed = true;
        assert!(!due_label(&t, now).unwrap().contains("overdue"));
        assert!(due_label(&task("2", "x"), now).is_none());
    }

    #[test]
    fn recurring_line_mentions_pattern() {
        let now = Utc::now();
        let mut t = due_task("5", now + Duration::days(1));
        t.is_recurring = true;
        t.recurrence_pattern = Some("weekly".into());
        let line = task_line(&t, now);
        assert!(line.contains("repeats weekly, next"));
        assert!(line.starts_with("[ ]"));
    }
}
