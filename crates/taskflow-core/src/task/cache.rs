//! Query cache over the remote task API with optimistic mutations.
//!
//! Every list the caller has asked for is kept under its [`TaskQuery`].
//! A mutation edits all cached lists up front, calls the backend, puts the
//! snapshot back if the call fails, and finally refetches every list so the
//! backend stays the source of truth.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{Task, TaskCreate, TaskQuery, TaskUpdate};
use crate::error::ApiError;

/// How long a fetched list is served without going back to the backend.
pub const STALE_TIME: Duration = Duration::from_secs(10);

/// Remote task operations the cache sits in front of.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<Task>, ApiError>;
    async fn create_task(&self, data: &TaskCreate) -> Result<Task, ApiError>;
    async fn update_task(&self, id: &str, data: &TaskUpdate) -> Result<Task, ApiError>;
    async fn toggle_task(&self, id: &str, completed: bool) -> Result<Task, ApiError>;
    async fn delete_task(&self, id: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    tasks: Vec<Task>,
    fetched_at: Instant,
    invalidated: bool,
}

impl CacheEntry {
    fn fresh(tasks: Vec<Task>) -> Self {
        Self {
            tasks,
            fetched_at: Instant::now(),
            invalidated: false,
        }
    }

    fn is_stale(&self) -> bool {
        self.invalidated || self.fetched_at.elapsed() >= STALE_TIME
    }
}

type Snapshot = HashMap<TaskQuery, CacheEntry>;

pub struct TaskCache<B> {
    backend: B,
    entries: HashMap<TaskQuery, CacheEntry>,
}

impl<B: TaskBackend> TaskCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Return the list for `query`, fetching it when missing or stale.
    ///
    /// # Errors
    /// Returns the backend error when a fetch is needed and fails.
    pub async fn list(&mut self, query: &TaskQuery) -> Result<Vec<Task>, ApiError> {
        if let Some(entry) = self.entries.get(query) {
            if !entry.is_stale() {
                return Ok(entry.tasks.clone());
            }
        }
        let tasks = self.backend.list_tasks(query).await?;
        self.entries.insert(query.clone(), CacheEntry::fresh(tasks.clone()));
        Ok(tasks)
    }

    /// Cached list for `query` without touching the backend.
    pub fn cached(&self, query: &TaskQuery) -> Option<&[Task]> {
        self.entries.get(query).map(|e| e.tasks.as_slice())
    }

    /// Look a task up across every cached list.
    pub fn find(&self, id: &str) -> Option<&Task> {
        self.entries
            .values()
            .flat_map(|e| e.tasks.iter())
            .find(|t| t.id == id)
    }

    /// Mark every list stale; the next `list` call refetches.
    pub fn invalidate(&mut self) {
        for entry in self.entries.values_mut() {
            entry.invalidated = true;
        }
    }

    pub async fn create(&mut self, data: TaskCreate) -> Result<Task, ApiError> {
        let placeholder = Task::placeholder(&data, Utc::now());
        let snapshot = self.optimistic(|tasks| tasks.insert(0, placeholder.clone()));
        let result = self.backend.create_task(&data).await;
        self.settle(snapshot, result, "create").await
    }

    pub async fn update(&mut self, id: &str, data: TaskUpdate) -> Result<Task, ApiError> {
        let snapshot = self.optimistic(|tasks| {
            tasks
                .iter_mut()
                .filter(|t| t.id == id)
                .for_each(|t| t.apply_update(&data))
        });
        let result = self.backend.update_task(id, &data).await;
        self.settle(snapshot, result, "update").await
    }

    pub async fn toggle(&mut self, id: &str, completed: bool) -> Result<Task, ApiError> {
        let snapshot = self.optimistic(|tasks| {
            tasks
                .iter_mut()
                .filter(|t| t.id == id)
                .for_each(|t| t.completed = completed)
        });
        let result = self.backend.toggle_task(id, completed).await;
        self.settle(snapshot, result, "toggle").await
    }

    pub async fn delete(&mut self, id: &str) -> Result<(), ApiError> {
        let snapshot = self.optimistic(|tasks| tasks.retain(|t| t.id != id));
        let result = self.backend.delete_task(id).await;
        self.settle(snapshot, result, "delete").await
    }

    fn optimistic(&mut self, mut edit: impl FnMut(&mut Vec<Task>)) -> Snapshot {
        let snapshot = self.entries.clone();
        for entry in self.entries.values_mut() {
            edit(&mut entry.tasks);
        }
        snapshot
    }

    async fn settle<T>(
        &mut self,
        snapshot: Snapshot,
        result: Result<T, ApiError>,
        op: &str,
    ) -> Result<T, ApiError> {
        if let Err(ref e) = result {
            tracing::warn!(op, error = %e, "task mutation failed, rolling back");
            self.entries = snapshot;
        }
        self.invalidate();
        self.refetch_all().await;
        result
    }

    /// Refetch every cached list. Failures leave the entry stale with its
    /// current contents.
    async fn refetch_all(&mut self) {
        let queries: Vec<TaskQuery> = self.entries.keys().cloned().collect();
        for query in queries {
            match self.backend.list_tasks(&query).await {
                Ok(tasks) => {
                    self.entries.insert(query, CacheEntry::fresh(tasks));
                }
                Err(e) => tracing::debug!(error = %e, "refetch after mutation failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::fixtures::task;
    use std::sync::Mutex;

    /// In-memory backend; `fail_mutations`/`fail_lists` force errors.
    #[derive(Default)]
    struct FakeBackend {
        tasks: Mutex<Vec<Task>>,
        fail_mutations: bool,
        fail_lists: Mutex<bool>,
        list_calls: Mutex<usize>,
    }

    impl FakeBackend {
        fn with(tasks: Vec<Task>) -> Self {
            Self {
                tasks: Mutex::new(tasks),
                ..Self::default()
            }
        }

        fn refuse() -> ApiError {
            ApiError::Status {
                status: 500,
                body: "boom".into(),
            }
        }
    }

    #[async_trait]
    impl TaskBackend for FakeBackend {
        async fn list_tasks(&self, _query: &TaskQuery) -> Result<Vec<Task>, ApiError> {
            *self.list_calls.lock().unwrap() += 1;
            if *self.fail_lists.lock().unwrap() {
                return Err(Self::refuse());
            }
            Ok(self.tasks.lock().unwrap().clone())
        }

        async fn create_task(&self, data: &TaskCreate) -> Result<Task, ApiError> {
            if self.fail_mutations {
                return Err(Self::refuse());
            }
            let mut created = task("srv-1", &data.description);
            created.category = data.category.clone().unwrap_or_else(|| "General".into());
            self.tasks.lock().unwrap().insert(0, created.clone());
            Ok(created)
        }

        async fn update_task(&self, id: &str, data: &TaskUpdate) -> Result<Task, ApiError> {
            if self.fail_mutations {
                return Err(Self::refuse());
            }
            let mut tasks = self.tasks.lock().unwrap();
            let t = tasks.iter_mut().find(|t| t.id == id).ok_or(ApiError::Status {
                status: 404,
                body: "missing".into(),
            })?;
            t.apply_update(data);
            Ok(t.clone())
        }

        async fn toggle_task(&self, id: &str, completed: bool) -> Result<Task, ApiError> {
            self.update_task(
                id,
                &TaskUpdate {
                    completed: Some(completed),
                    ..TaskUpdate::default()
                },
            )
            .await
        }

        async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
            if self.fail_mutations {
                return Err(Self::refuse());
            }
            self.tasks.lock().unwrap().retain(|t| t.id != id);
            Ok(())
        }
    }

    fn seeded() -> Vec<Task> {
        vec![task("1", "write report"), task("2", "call mum")]
    }

    #[tokio::test]
    async fn list_serves_fresh_entries_from_cache() {
        let mut cache = TaskCache::new(FakeBackend::with(seeded()));
        let q = TaskQuery::default();

        cache.list(&q).await.unwrap();
        cache.list(&q).await.unwrap();
        assert_eq!(*cache.backend().list_calls.lock().unwrap(), 1);

        cache.invalidate();
        cache.list(&q).await.unwrap();
        assert_eq!(*cache.backend().list_calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_create_restores_prior_list_exactly() {
        let backend = FakeBackend {
            fail_mutations: true,
            ..FakeBackend::with(seeded())
        };
        let mut cache = TaskCache::new(backend);
        let q = TaskQuery::default();
        let before = cache.list(&q).await.unwrap();

        // Keep the refetch from masking the rollback.
        *cache.backend().fail_lists.lock().unwrap() = true;
        let err = cache.create(TaskCreate::new("buy milk")).await;

        assert!(err.is_err());
        assert_eq!(cache.cached(&q).unwrap(), before.as_slice());
        assert!(cache.cached(&q).unwrap().iter().all(|t| !t.is_placeholder()));
    }

    #[tokio::test]
    async fn successful_create_is_replaced_by_server_copy() {
        let mut cache = TaskCache::new(FakeBackend::with(seeded()));
        let q = TaskQuery::default();
        cache.list(&q).await.unwrap();

        let created = cache.create(TaskCreate::new("buy milk")).await.unwrap();

        assert_eq!(created.id, "srv-1");
        let listed = cache.cached(&q).unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[0].id, "srv-1");
        assert!(listed.iter().all(|t| !t.is_placeholder()));
    }

    #[tokio::test]
    async fn placeholder_is_visible_when_refetch_fails() {
        let mut cache = TaskCache::new(FakeBackend::with(seeded()));
        let q = TaskQuery::default();
        cache.list(&q).await.unwrap();
        *cache.backend().fail_lists.lock().unwrap() = true;

        cache.create(TaskCreate::new("buy milk")).await.unwrap();

        let listed = cache.cached(&q).unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed[0].is_placeholder());
        assert_eq!(listed[0].description, "buy milk");
    }

    #[tokio::test]
    async fn failed_toggle_and_delete_roll_back() {
        let backend = FakeBackend {
            fail_mutations: true,
            ..FakeBackend::with(seeded())
        };
        let mut cache = TaskCache::new(backend);
        let q = TaskQuery::default();
        let before = cache.list(&q).await.unwrap();
        *cache.backend().fail_lists.lock().unwrap() = true;

        assert!(cache.toggle("1", true).await.is_err());
        assert_eq!(cache.cached(&q).unwrap(), before.as_slice());

        assert!(cache.delete("2").await.is_err());
        assert_eq!(cache.cached(&q).unwrap(), before.as_slice());
    }

    #[tokio::test]
    async fn optimistic_edits_reach_every_cached_query() {
        let mut cache = TaskCache::new(FakeBackend::with(seeded()));
        let newest = TaskQuery::default();
        let work = TaskQuery::default().category("Work");
        cache.list(&newest).await.unwrap();
        cache.list(&work).await.unwrap();
        *cache.backend().fail_lists.lock().unwrap() = true;

        cache.delete("1").await.unwrap();

        assert!(cache.cached(&newest).unwrap().iter().all(|t| t.id != "1"));
        assert!(cache.cached(&work).unwrap().iter().all(|t| t.id != "1"));
    }

    #[tokio::test]
    async fn update_merges_fields_and_refetches() {
        let mut cache = TaskCache::new(FakeBackend::with(seeded()));
        let q = TaskQuery::default();
        cache.list(&q).await.unwrap();

        let updated = cache
            .update(
                "2",
                TaskUpdate {
                    priority: Some("High".into()),
                    ..TaskUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.priority, "High");
        assert_eq!(cache.find("2").unwrap().priority, "High");
        assert_eq!(*cache.backend().list_calls.lock().unwrap(), 2);
    }
}
