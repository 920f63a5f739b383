//! Deduplicating reminder state machine.
//!
//! Every method takes `now` explicitly and runs to completion without
//! awaiting, so a check and the mark that follows it can never interleave
//! with another path.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::{classify_feed, classify_local, FeedDecision, FeedNotification, LocalDecision, ReminderNotification};
use crate::storage::{DismissedLedger, KeyValueStore};
use crate::task::Task;

#[derive(Debug, Clone)]
struct Deferred {
    at: DateTime<Utc>,
    notification: ReminderNotification,
}

pub struct ReminderEngine<S> {
    ledger: DismissedLedger<S>,
    notified: HashSet<String>,
    active: Option<ReminderNotification>,
    deferred: Vec<Deferred>,
}

impl<S: KeyValueStore> ReminderEngine<S> {
    /// Seed the notified set from the ledger.
    pub fn new(ledger: DismissedLedger<S>, now: DateTime<Utc>) -> Self {
        let notified = ledger.load(now);
        tracing::debug!(seeded = notified.len(), "reminder engine ready");
        Self {
            ledger,
            notified,
            active: None,
            deferred: Vec::new(),
        }
    }

    pub fn is_notified(&self, task_id: &str) -> bool {
        self.notified.contains(task_id)
    }

    pub fn active(&self) -> Option<&ReminderNotification> {
        self.active.as_ref()
    }

    fn mark(&mut self, task_id: &str, now: DateTime<Utc>) {
        if self.notified.insert(task_id.to_string()) {
            self.ledger.record(task_id, now);
        }
    }

    fn fire(&mut self, notification: ReminderNotification, fired: &mut Vec<ReminderNotification>) {
        tracing::info!(task_id = %notification.task_id, title = %notification.title, "reminder");
        self.active = Some(notification.clone());
        fired.push(notification);
    }

    /// Check the cached task list against the local window.
    ///
    /// Returns the alerts that fired, oldest first; the last one is now the
    /// active toast.
    pub fn scan_local(&mut self, tasks: &[Task], now: DateTime<Utc>) -> Vec<ReminderNotification> {
        let mut fired = Vec::new();
        for task in tasks {
            if task.completed || self.is_notified(&task.id) {
                continue;
            }
            let Some(due) = task.due_at() else {
                continue;
            };
            match classify_local(due - now) {
                LocalDecision::Stale => self.mark(&task.id, now),
                LocalDecision::Fire if !task.notification_sent => {
                    self.fire(ReminderNotification::local(task, due), &mut fired);
                    self.mark(&task.id, now);
                }
                LocalDecision::Fire | LocalDecision::Wait => {}
            }
        }
        fired
    }

    /// Apply one poll of the backend feed.
    ///
    /// Notifications due later are queued and their task ids marked in
    /// memory right away. The ledger is written when the alert fires.
    pub fn ingest_feed(
        &mut self,
        feed: Vec<FeedNotification>,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> Vec<ReminderNotification> {
        let mut fired = Vec::new();
        for n in feed {
            if self.is_notified(&n.task_id) {
                continue;
            }
            let Some(due) = tasks
                .iter()
                .find(|t| t.id == n.task_id)
                .and_then(Task::due_at)
            else {
                continue;
            };
            match classify_feed(due - now) {
                FeedDecision::Stale => {
                    tracing::debug!(task_id = %n.task_id, "skipping old notification");
                    self.mark(&n.task_id, now);
                }
                FeedDecision::Defer(delay) => {
                    tracing::debug!(task_id = %n.task_id, delay_ms = delay.num_milliseconds(), "deferring notification");
                    self.notified.insert(n.task_id.clone());
                    self.deferred.push(Deferred {
                        at: now + delay,
                        notification: n.into(),
                    });
                }
                FeedDecision::FireNow => {
                    let task_id = n.task_id.clone();
                    self.fire(n.into(), &mut fired);
                    self.mark(&task_id, now);
                }
            }
        }
        fired
    }

    /// Fire every deferred alert whose deadline has passed.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> Vec<ReminderNotification> {
        let mut due: Vec<Deferred> = Vec::new();
        self.deferred.retain(|d| {
            if d.at <= now {
                due.push(d.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|d| d.at);

        let mut fired = Vec::new();
        for d in due {
            let task_id = d.notification.task_id.clone();
            self.fire(d.notification, &mut fired);
            self.ledger.record(&task_id, now);
        }
        fired
    }

    /// Earliest deferred deadline, if any alert is queued.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.deferred.iter().map(|d| d.at).min()
    }

    pub fn pending(&self) -> usize {
        self.deferred.len()
    }

    /// Drop every queued alert. Their ids stay marked for this session only.
    pub fn cancel_pending(&mut self) {
        if !self.deferred.is_empty() {
            tracing::debug!(cancelled = self.deferred.len(), "cancelled deferred reminders");
        }
        self.deferred.clear();
    }

    /// Clear the toast and suppress its task for the ledger window.
    pub fn dismiss(&mut self, now: DateTime<Utc>) -> Option<ReminderNotification> {
        let dismissed = self.active.take()?;
        self.notified.insert(dismissed.task_id.clone());
        self.ledger.record(&dismissed.task_id, now);
        Some(dismissed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::ledger::LEDGER_KEY;
    use crate::storage::MemoryStore;
    use crate::task::fixtures::{due_task, task};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn engine(now: DateTime<Utc>) -> ReminderEngine<Arc<MemoryStore>> {
        ReminderEngine::new(DismissedLedger::new(Arc::new(MemoryStore::new())), now)
    }

    fn feed(id: u32, task_id: &str) -> FeedNotification {
        FeedNotification {
            id: id.to_string(),
            title: "Task Reminder".into(),
            body: format!("task {task_id} is due"),
            task_id: task_id.into(),
        }
    }

    #[test]
    fn stale_task_is_suppressed_without_toast() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![due_task("1", now - Duration::minutes(3))];

        assert!(e.scan_local(&tasks, now).is_empty());
        assert!(e.is_notified("1"));
        assert!(e.active().is_none());
    }

    #[test]
    fn task_due_soon_fires_exactly_once() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![due_task("1", now + Duration::seconds(3))];

        let fired = e.scan_local(&tasks, now);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, "local-1");
        assert_eq!(e.active().map(|n| n.task_id.as_str()), Some("1"));

        assert!(e.scan_local(&tasks, now + Duration::seconds(1)).is_empty());
        assert!(e.scan_local(&tasks, now + Duration::seconds(4)).is_empty());
    }

    #[test]
    fn task_due_later_waits_for_its_window() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![due_task("1", now + Duration::seconds(30))];

        assert!(e.scan_local(&tasks, now).is_empty());
        assert!(!e.is_notified("1"));
        assert_eq!(e.scan_local(&tasks, now + Duration::seconds(26)).len(), 1);
    }

    #[test]
    fn completed_and_undated_tasks_are_ignored() {
        let now = Utc::now();
        let mut e = engine(now);
        let mut done = due_task("1", now);
        done.completed = true;
        let undated = task("2", "no date");
        let mut garbled = task("3", "bad date");
        garbled.due_date = Some("soon".into());

        assert!(e.scan_local(&[done, undated, garbled], now).is_empty());
        assert!(!e.is_notified("1"));
    }

    #[test]
    fn backend_sent_tasks_are_left_to_the_feed() {
        let now = Utc::now();
        let mut e = engine(now);
        let mut t = due_task("1", now);
        t.notification_sent = true;

        assert!(e.scan_local(&[t.clone()], now).is_empty());
        assert!(!e.is_notified("1"));

        let fired = e.ingest_feed(vec![feed(5, "1")], &[t], now);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, "5");
    }

    #[test]
    fn feed_skips_ids_notified_locally() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![due_task("1", now)];
        assert_eq!(e.scan_local(&tasks, now).len(), 1);

        assert!(e.ingest_feed(vec![feed(1, "1")], &tasks, now).is_empty());
    }

    #[test]
    fn feed_skips_unknown_and_undated_tasks() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![task("2", "no date")];

        assert!(e
            .ingest_feed(vec![feed(1, "missing"), feed(2, "2")], &tasks, now)
            .is_empty());
        assert!(!e.is_notified("missing"));
        assert!(!e.is_notified("2"));
    }

    #[test]
    fn feed_defers_future_alerts_and_fires_at_deadline() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![due_task("1", now + Duration::seconds(10))];

        assert!(e.ingest_feed(vec![feed(1, "1")], &tasks, now).is_empty());
        assert!(e.is_notified("1"));
        assert_eq!(e.next_deadline(), Some(now + Duration::seconds(10)));

        // A second poll must not queue it again.
        assert!(e.ingest_feed(vec![feed(1, "1")], &tasks, now + Duration::seconds(5)).is_empty());
        assert_eq!(e.pending(), 1);

        assert!(e.fire_due(now + Duration::seconds(9)).is_empty());
        let fired = e.fire_due(now + Duration::seconds(10));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].task_id, "1");
        assert_eq!(e.pending(), 0);
        assert!(e.fire_due(now + Duration::seconds(20)).is_empty());
    }

    #[test]
    fn stale_feed_entry_is_marked_silently() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![due_task("1", now - Duration::minutes(5))];

        assert!(e.ingest_feed(vec![feed(1, "1")], &tasks, now).is_empty());
        assert!(e.is_notified("1"));
    }

    #[test]
    fn cancel_pending_drops_queue_but_keeps_marks() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![due_task("1", now + Duration::seconds(10))];
        e.ingest_feed(vec![feed(1, "1")], &tasks, now);

        e.cancel_pending();
        assert!(e.next_deadline().is_none());
        assert!(e.fire_due(now + Duration::minutes(1)).is_empty());
        assert!(e.is_notified("1"));
    }

    #[test]
    fn newer_alert_replaces_active_toast() {
        let now = Utc::now();
        let mut e = engine(now);
        let tasks = vec![due_task("1", now), due_task("2", now)];

        let fired = e.scan_local(&tasks, now);
        assert_eq!(fired.len(), 2);
        assert_eq!(e.active().map(|n| n.task_id.as_str()), Some("2"));
    }

    #[test]
    fn dismissal_persists_across_restart() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let mut e = ReminderEngine::new(DismissedLedger::new(store.clone()), now);
        e.scan_local(&[due_task("1", now)], now);

        let dismissed = e.dismiss(now).unwrap();
        assert_eq!(dismissed.task_id, "1");
        assert!(e.active().is_none());
        assert!(e.dismiss(now).is_none());

        let later = now + Duration::hours(2);
        let mut reloaded = ReminderEngine::new(DismissedLedger::new(store.clone()), later);
        assert!(reloaded.is_notified("1"));
        assert!(reloaded.scan_local(&[due_task("1", later)], later).is_empty());

        let next_day = now + Duration::hours(25);
        let fresh = ReminderEngine::new(DismissedLedger::new(store.clone()), next_day);
        assert!(!fresh.is_notified("1"));
        assert!(store.get(LEDGER_KEY).unwrap().is_some());
    }

    #[test]
    fn deferred_alert_survives_restart_before_deadline() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let tasks = vec![due_task("1", now + Duration::seconds(10))];
        let mut e = ReminderEngine::new(DismissedLedger::new(store.clone()), now);
        assert!(e.ingest_feed(vec![feed(1, "1")], &tasks, now).is_empty());
        assert!(e.is_notified("1"));
        drop(e);

        let restarted_at = now + Duration::seconds(3);
        let mut restarted = ReminderEngine::new(DismissedLedger::new(store.clone()), restarted_at);
        assert!(!restarted.is_notified("1"));
        assert!(restarted.scan_local(&tasks, restarted_at).is_empty());
        let fired = restarted.scan_local(&tasks, now + Duration::seconds(10));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].task_id, "1");
    }

    #[test]
    fn fired_deferred_alert_is_persisted() {
        let now = Utc::now();
        let store = Arc::new(MemoryStore::new());
        let tasks = vec![due_task("1", now + Duration::seconds(10))];
        let mut e = ReminderEngine::new(DismissedLedger::new(store.clone()), now);
        e.ingest_feed(vec![feed(1, "1")], &tasks, now);
        assert_eq!(e.fire_due(now + Duration::seconds(10)).len(), 1);

        let later = now + Duration::minutes(1);
        let reloaded = ReminderEngine::new(DismissedLedger::new(store.clone()), later);
        assert!(reloaded.is_notified("1"));
    }

    /// Memory store that counts writes.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value)
        }
    }

    #[test]
    fn dismiss_writes_ledger_once() {
        let now = Utc::now();
        let store = Arc::new(CountingStore::default());
        let tasks = vec![due_task("1", now + Duration::seconds(10))];
        let mut e = ReminderEngine::new(DismissedLedger::new(store.clone()), now);
        e.ingest_feed(vec![feed(1, "1")], &tasks, now);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);

        e.fire_due(now + Duration::seconds(10));
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);

        let dismissed_at = now + Duration::seconds(12);
        assert!(e.dismiss(dismissed_at).is_some());
        assert_eq!(store.writes.load(Ordering::SeqCst), 2);
        let stored: std::collections::BTreeMap<String, i64> =
            serde_json::from_str(&store.get(LEDGER_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.get("1"), Some(&dismissed_at.timestamp_millis()));
    }
}
