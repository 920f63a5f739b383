//! Persisted record of task ids that must not alert again.
//!
//! Stored under one key as a JSON object of task id to the millisecond
//! timestamp it was recorded at. Entries expire after 24 hours.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

use super::KeyValueStore;

pub const LEDGER_KEY: &str = "taskflow_dismissed_notifications";

/// Entries at least this old are dropped on load.
pub const LEDGER_TTL_MS: i64 = 24 * 60 * 60 * 1000;

pub struct DismissedLedger<S> {
    store: S,
}

impl<S: KeyValueStore> DismissedLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// `None` when the stored value cannot be read or parsed. Callers must
    /// not write back in that case or the existing entries are lost.
    fn read(&self) -> Option<BTreeMap<String, i64>> {
        let raw = match self.store.get(LEDGER_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Some(BTreeMap::new()),
            Err(e) => {
                tracing::warn!(error = %e, "could not read dismissed notifications");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Some(entries),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed dismissed notifications");
                None
            }
        }
    }

    fn write(&self, entries: &BTreeMap<String, i64>) {
        let result = serde_json::to_string(entries)
            .map_err(|e| e.to_string())
            .and_then(|json| self.store.set(LEDGER_KEY, &json).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::warn!(error = %e, "could not write dismissed notifications");
        }
    }

    /// Ids recorded within the last 24 hours. Expired entries are pruned
    /// and the trimmed ledger written back.
    pub fn load(&self, now: DateTime<Utc>) -> HashSet<String> {
        let now_ms = now.timestamp_millis();
        let Some(mut entries) = self.read() else {
            return HashSet::new();
        };
        let before = entries.len();
        entries.retain(|_, recorded| now_ms - *recorded < LEDGER_TTL_MS);
        if entries.len() != before {
            tracing::debug!(pruned = before - entries.len(), "pruned expired ledger entries");
            self.write(&entries);
        }
        entries.into_keys().collect()
    }

    /// Record `task_id` as handled at `now`. Skipped when the current
    /// ledger cannot be read.
    pub fn record(&self, task_id: &str, now: DateTime<Utc>) {
        let Some(mut entries) = self.read() else {
            return;
        };
        entries.insert(task_id.to_string(), now.timestamp_millis());
        self.write(&entries);
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
