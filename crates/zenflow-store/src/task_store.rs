use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use zenflow_core::{Quality, Task, TaskId};

use crate::{
    error::{Result, StoreError},
    kv::KvStore,
};

/// Key the serialised task list lives under.
pub const TASKS_KEY: &str = "zenflow_todos";

/// Counts shown alongside the task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub active: usize,
    pub completed: usize,
    /// Completed tasks rated [`Quality::Perfect`].
    pub perfect: usize,
}

/// Ordered task list (newest first), shared through a key-value backend.
///
/// Every public method is one atomic section. Reads first pick up whatever
/// another process last wrote. Mutations re-read, apply and write back inside
/// one backend transaction while holding the lock, so neither a poll tick and
/// a user action in this process nor two processes over one database file can
/// lose each other's changes.
pub struct TaskStore {
    inner: Mutex<Inner>,
}

struct Inner {
    tasks: Vec<Task>,
    kv: Box<dyn KvStore>,
    /// Last write-back failed; memory is ahead of the backend and stays
    /// authoritative until a write succeeds.
    dirty: bool,
}

impl TaskStore {
    /// Load the task list from `kv`.
    ///
    /// A missing, unreadable or corrupt document yields an empty list: losing
    /// the list is preferred over refusing to start.
    pub fn load(kv: Box<dyn KvStore>) -> Self {
        let tasks = match kv.get(TASKS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Task>>(&raw) {
                Ok(tasks) => tasks,
                Err(e) => {
                    warn!("stored task list is corrupt, starting empty: {e}");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("task list read failed, starting empty: {e}");
                Vec::new()
            }
        };
        info!(count = tasks.len(), "task store loaded");
        Self {
            inner: Mutex::new(Inner {
                tasks,
                kv,
                dirty: false,
            }),
        }
    }

    /// Snapshot of every task in list order.
    pub fn all(&self) -> Vec<Task> {
        self.synced().tasks.clone()
    }

    pub fn get(&self, id: &TaskId) -> Option<Task> {
        self.synced().tasks.iter().find(|t| &t.id == id).cloned()
    }

    /// Resolve a full id or a unique id prefix.
    pub fn find(&self, prefix: &str) -> Result<Task> {
        let inner = self.synced();
        if let Some(exact) = inner.tasks.iter().find(|t| t.id.as_str() == prefix) {
            return Ok(exact.clone());
        }
        let mut matches = inner
            .tasks
            .iter()
            .filter(|t| !prefix.is_empty() && t.id.as_str().starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(task), None) => Ok(task.clone()),
            (Some(_), Some(_)) => Err(StoreError::AmbiguousId {
                prefix: prefix.to_string(),
            }),
            (None, _) => Err(StoreError::TaskNotFound {
                id: prefix.to_string(),
            }),
        }
    }

    /// Apply `f` to the current list as one atomic batch.
    ///
    /// The stored list is re-read, handed to `f` and written back in a single
    /// backend transaction. `f` reports whether it changed anything; nothing
    /// is written when it did not (unless an earlier write is still pending).
    /// Returns that same flag.
    ///
    /// When the backend cannot be reached `f` is applied to the in-memory
    /// list alone and the store turns dirty.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut Vec<Task>) -> bool,
    {
        let mut guard = self.lock();
        let Inner { tasks, kv, dirty } = &mut *guard;
        let pending = *dirty;
        let mut f = Some(f);
        let mut changed = false;

        let result = kv.transact(
            TASKS_KEY,
            &mut |stored: Option<String>| -> Result<Option<String>> {
                if !pending {
                    adopt_stored(tasks, stored);
                }
                if let Some(f) = f.take() {
                    changed = f(tasks);
                }
                if changed || pending {
                    Ok(Some(serde_json::to_string(&*tasks)?))
                } else {
                    Ok(None)
                }
            },
        );

        match result {
            Ok(()) if changed || pending => {
                *dirty = false;
                debug!(count = tasks.len(), "task list persisted");
            }
            Ok(()) => {}
            Err(e) => {
                if let Some(f) = f.take() {
                    changed = f(tasks);
                }
                if changed || pending {
                    *dirty = true;
                    warn!("task list write failed, keeping in-memory state: {e}");
                } else {
                    debug!("task list sync failed: {e}");
                }
            }
        }
        changed
    }

    /// Create a task at the front of the list.
    pub fn add(
        &self,
        text: impl Into<String>,
        due_date: Option<DateTime<Utc>>,
        alarm_enabled: bool,
    ) -> Task {
        let task = Task::new(text, due_date, alarm_enabled);
        let created = task.clone();
        self.update(move |tasks| {
            tasks.insert(0, task);
            true
        });
        info!(task_id = %created.id, due = ?created.due_date, alarm = created.alarm_enabled, "task added");
        created
    }

    /// Flip `completed`. Due date and reminder flag are left alone.
    pub fn toggle(&self, id: &TaskId) -> Result<Task> {
        self.modify(id, |t| t.completed = !t.completed)
    }

    pub fn set_quality(&self, id: &TaskId, quality: Quality) -> Result<Task> {
        self.modify(id, |t| t.quality = quality)
    }

    pub fn remove(&self, id: &TaskId) -> Result<Task> {
        let mut removed = None;
        self.update(|tasks| {
            let pos = tasks.iter().position(|t| &t.id == id);
            removed = pos.map(|i| tasks.remove(i));
            removed.is_some()
        });
        match removed {
            Some(task) => {
                info!(task_id = %id, "task removed");
                Ok(task)
            }
            None => Err(StoreError::TaskNotFound { id: id.to_string() }),
        }
    }

    /// Apply `f` to the task with `id` and return its new state.
    pub fn modify<F>(&self, id: &TaskId, f: F) -> Result<Task>
    where
        F: FnOnce(&mut Task),
    {
        let mut updated = None;
        self.update(|tasks| match tasks.iter_mut().find(|t| &t.id == id) {
            Some(task) => {
                f(task);
                updated = Some(task.clone());
                true
            }
            None => false,
        });
        updated.ok_or_else(|| StoreError::TaskNotFound { id: id.to_string() })
    }

    /// First `limit` open tasks that carry a due date, in list order.
    pub fn upcoming(&self, limit: usize) -> Vec<Task> {
        self.synced()
            .tasks
            .iter()
            .filter(|t| !t.completed && t.due_date.is_some())
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn stats(&self) -> TaskStats {
        let inner = self.synced();
        let mut stats = TaskStats::default();
        for task in &inner.tasks {
            if task.completed {
                stats.completed += 1;
                if task.quality == Quality::Perfect {
                    stats.perfect += 1;
                }
            } else {
                stats.active += 1;
            }
        }
        stats
    }

    /// True when the last write-back failed and has not been retried since.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Retry a failed write-back. No-op when the backend is current.
    pub fn flush(&self) -> bool {
        let mut inner = self.lock();
        if inner.dirty {
            inner.persist();
        }
        !inner.dirty
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock and pick up the latest stored list.
    fn synced(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.lock();
        inner.refresh();
        inner
    }
}

/// Replace `tasks` with the stored document. A corrupt document is ignored
/// and the in-memory copy kept.
fn adopt_stored(tasks: &mut Vec<Task>, stored: Option<String>) {
    match stored.map(|raw| serde_json::from_str::<Vec<Task>>(&raw)) {
        Some(Ok(fresh)) => *tasks = fresh,
        Some(Err(e)) => debug!("stored task list is corrupt, keeping in-memory copy: {e}"),
        None => tasks.clear(),
    }
}

impl Inner {
    fn refresh(&mut self) {
        if self.dirty {
            return;
        }
        match self.kv.get(TASKS_KEY) {
            Ok(stored) => adopt_stored(&mut self.tasks, stored),
            Err(e) => debug!("task list re-read failed, serving in-memory copy: {e}"),
        }
    }

    /// Overwrite the stored list with memory. Failures keep the store dirty;
    /// the next mutation writes the whole list again.
    fn persist(&mut self) {
        let result = serde_json::to_string(&self.tasks)
            .map_err(StoreError::from)
            .and_then(|json| self.kv.put(TASKS_KEY, &json));
        match result {
            Ok(()) => {
                self.dirty = false;
                debug!(count = self.tasks.len(), "task list persisted");
            }
            Err(e) => {
                self.dirty = true;
                warn!("task list write failed, keeping in-memory state: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryKv, SqliteKv};
    use chrono::Duration;

    fn store_with(kv: &MemoryKv) -> TaskStore {
        TaskStore::load(Box::new(kv.clone()))
    }

    fn memory_store() -> TaskStore {
        TaskStore::load(Box::new(MemoryKv::new()))
    }

    #[test]
    fn add_inserts_newest_first_and_persists() {
        let kv = MemoryKv::new();
        let store = store_with(&kv);
        let first = store.add("first", None, false);
        let second = store.add("second", None, true);

        let all = store.all();
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
        assert!(!second.completed);
        assert!(!second.reminder_sent);

        let reloaded = store_with(&kv);
        assert_eq!(reloaded.all(), all);
    }

    #[test]
    fn missing_document_starts_empty() {
        let store = memory_store();
        assert!(store.all().is_empty());
    }

    #[test]
    fn corrupt_document_starts_empty() {
        let kv = MemoryKv::new().with_entry(TASKS_KEY, "{not json");
        let store = store_with(&kv);
        assert!(store.all().is_empty());
    }

    #[test]
    fn toggle_keeps_schedule_fields() {
        let store = memory_store();
        let due = Utc::now();
        let task = store.add("x", Some(due), true);

        let toggled = store.toggle(&task.id).unwrap();
        assert!(toggled.completed);
        assert_eq!(toggled.due_date, Some(due));
        assert!(!toggled.reminder_sent);

        let back = store.toggle(&task.id).unwrap();
        assert!(!back.completed);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = memory_store();
        let err = store.toggle(&TaskId::from("nope")).unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound { .. }));
        assert!(store.remove(&TaskId::from("nope")).is_err());
    }

    #[test]
    fn set_quality_and_stats() {
        let store = memory_store();
        let a = store.add("a", None, false);
        let b = store.add("b", None, false);
        store.add("c", None, false);

        store.toggle(&a.id).unwrap();
        store.toggle(&b.id).unwrap();
        store.set_quality(&b.id, Quality::Fair).unwrap();

        assert_eq!(
            store.stats(),
            TaskStats {
                active: 1,
                completed: 2,
                perfect: 1
            }
        );
    }

    #[test]
    fn remove_drops_task() {
        let store = memory_store();
        let task = store.add("gone", None, false);
        store.remove(&task.id).unwrap();
        assert!(store.get(&task.id).is_none());
    }

    #[test]
    fn find_by_unique_prefix() {
        let store = memory_store();
        store.update(|tasks| {
            *tasks = vec![
                Task {
                    id: TaskId::from("abc-1"),
                    ..Task::new("one", None, false)
                },
                Task {
                    id: TaskId::from("abd-2"),
                    ..Task::new("two", None, false)
                },
            ];
            true
        });

        assert_eq!(store.find("abc").unwrap().text, "one");
        assert_eq!(store.find("abd-2").unwrap().text, "two");
        assert!(matches!(store.find("ab"), Err(StoreError::AmbiguousId { .. })));
        assert!(matches!(store.find("zz"), Err(StoreError::TaskNotFound { .. })));
        assert!(store.find("").is_err());
    }

    #[test]
    fn upcoming_skips_completed_and_unscheduled() {
        let store = memory_store();
        let now = Utc::now();
        let done = store.add("done", Some(now), false);
        store.toggle(&done.id).unwrap();
        store.add("no date", None, false);
        for i in 0..4 {
            store.add(format!("due {i}"), Some(now + Duration::minutes(i)), false);
        }

        let upcoming = store.upcoming(3);
        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].text, "due 3");
        assert!(upcoming.iter().all(|t| !t.completed && t.due_date.is_some()));
    }

    #[test]
    fn unchanged_update_does_not_write() {
        let kv = MemoryKv::new();
        let store = store_with(&kv);
        assert!(!store.update(|_| false));
        assert_eq!(kv.raw(TASKS_KEY), None);
    }

    #[test]
    fn write_failure_keeps_memory_and_retries_later() {
        let kv = MemoryKv::new();
        let store = store_with(&kv);
        kv.set_fail_writes(true);

        let task = store.add("kept", None, false);
        assert!(store.is_dirty());
        assert_eq!(store.get(&task.id).unwrap().text, "kept");
        assert_eq!(kv.raw(TASKS_KEY), None);

        kv.set_fail_writes(false);
        store.add("next", None, false);
        assert!(!store.is_dirty());

        let reloaded = store_with(&kv);
        assert_eq!(reloaded.all().len(), 2);
    }

    #[test]
    fn flush_retries_failed_write() {
        let kv = MemoryKv::new();
        let store = store_with(&kv);
        kv.set_fail_writes(true);
        store.add("kept", None, false);
        assert!(!store.flush());

        kv.set_fail_writes(false);
        assert!(store.flush());
        assert_eq!(store_with(&kv).all().len(), 1);
    }

    #[test]
    fn stores_sharing_a_file_keep_each_others_tasks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("zenflow.db");
        let path = path.to_str().unwrap();
        let open = || TaskStore::load(Box::new(SqliteKv::open(path).unwrap()));

        let daemon = open();
        let mine = daemon.add("from daemon", None, false);
        let cli = open();
        let theirs = cli.add("from cli", None, false);

        // The daemon sees the other writer's task and its own write keeps it.
        assert_eq!(daemon.get(&theirs.id).unwrap().text, "from cli");
        daemon.toggle(&mine.id).unwrap();

        let reloaded = open();
        assert_eq!(reloaded.all().len(), 2);
        assert!(reloaded.get(&mine.id).unwrap().completed);
        assert!(reloaded.get(&theirs.id).is_some());
    }

    #[test]
    fn shared_memory_backend_is_reread_before_update() {
        let kv = MemoryKv::new();
        let first = store_with(&kv);
        let second = store_with(&kv);

        let a = first.add("a", None, false);
        let b = second.add("b", None, false);
        assert!(second.get(&a.id).is_some());

        first.remove(&a.id).unwrap();
        let ids: Vec<TaskId> = store_with(&kv).all().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![b.id]);
    }

    #[test]
    fn dirty_store_does_not_adopt_backend_copy() {
        let kv = MemoryKv::new();
        let store = store_with(&kv);
        kv.set_fail_writes(true);
        let kept = store.add("unsaved", None, false);

        assert_eq!(store.all().len(), 1);
        assert!(store.get(&kept.id).is_some());
    }

    #[test]
    fn persisted_document_is_a_flat_record_list() {
        let kv = MemoryKv::new();
        let store = store_with(&kv);
        store.add("x", None, true);

        let raw = kv.raw(TASKS_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let record = &value.as_array().unwrap()[0];
        assert_eq!(record["text"], "x");
        assert_eq!(record["alarmEnabled"], true);
        assert_eq!(record["reminderSent"], false);
    }
}
