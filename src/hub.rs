//! Process-wide owner of the task collection.
//!
//! Every page reads from and writes through one `TaskHub`. Mutations are
//! read-modify-write under a single lock, persisted before they become
//! visible, and broadcast to subscribers as full snapshots.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::extractor::ExtractionResult;
use crate::store::{CorruptStorePolicy, StoreError, TaskStore};
use crate::task::{Task, TaskId};
use crate::task_list;

struct HubInner {
    store: TaskStore,
    tasks: Vec<Task>,
    subscribers: Vec<async_channel::Sender<Vec<Task>>>,
}

/// Cheaply cloneable handle to the shared task collection.
#[derive(Clone)]
pub struct TaskHub {
    inner: Arc<Mutex<HubInner>>,
}

impl TaskHub {
    /// Load the collection once for the whole process.
    pub fn open(store: TaskStore, policy: CorruptStorePolicy) -> Result<Self, StoreError> {
        let tasks = store.load_with_policy(policy)?;
        log::info!("Task hub opened with {} task(s)", tasks.len());
        Ok(Self {
            inner: Arc::new(Mutex::new(HubInner {
                store,
                tasks,
                subscribers: Vec::new(),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current collection.
    pub fn snapshot(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Receive a snapshot after every effective change.
    ///
    /// The receiver is primed with the current collection.
    pub fn subscribe(&self) -> async_channel::Receiver<Vec<Task>> {
        let (tx, rx) = async_channel::unbounded();
        let mut inner = self.lock();
        let _ = tx.try_send(inner.tasks.clone());
        inner.subscribers.push(tx);
        rx
    }

    pub fn add_task(&self, text: &str) -> Result<Option<TaskId>, StoreError> {
        self.mutate(|tasks| {
            let id = task_list::add_task(tasks, text);
            let changed = id.is_some();
            (id, changed)
        })
    }

    pub fn delete_task(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|tasks| {
            let removed = task_list::delete_task(tasks, id);
            (removed, removed)
        })
    }

    pub fn toggle_completion(&self, id: &str) -> Result<bool, StoreError> {
        self.mutate(|tasks| {
            let found = task_list::toggle_completion(tasks, id);
            (found, found)
        })
    }

    /// Append the tasks of an extraction result.
    pub fn append_extracted(&self, result: &ExtractionResult) -> Result<Vec<TaskId>, StoreError> {
        self.mutate(|tasks| {
            let ids = task_list::append_extracted(tasks, result);
            let changed = !ids.is_empty();
            (ids, changed)
        })
    }

    /// Re-read the store, replacing the in-memory collection.
    pub fn reload(&self, policy: CorruptStorePolicy) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.tasks = inner.store.load_with_policy(policy)?;
        notify(&mut inner);
        Ok(())
    }

    /// Apply `f` to a working copy; persist and publish it only if `f`
    /// reports a change and the save succeeds.
    fn mutate<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Task>) -> (T, bool),
    {
        let mut inner = self.lock();
        let mut working = inner.tasks.clone();
        let (out, changed) = f(&mut working);
        if changed {
            inner.store.save(&working)?;
            inner.tasks = working;
            notify(&mut inner);
        }
        Ok(out)
    }
}

fn notify(inner: &mut HubInner) {
    let snapshot = inner.tasks.clone();
    inner
        .subscribers
        .retain(|tx| tx.try_send(snapshot.clone()).is_ok());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStorage, MemoryStorage, StorageError};
    use crate::store::DEFAULT_STORAGE_KEY;

    fn hub() -> (Arc<MemoryStorage>, TaskHub) {
        let storage = Arc::new(MemoryStorage::new());
        let store = TaskStore::new(storage.clone(), DEFAULT_STORAGE_KEY);
        (storage, TaskHub::open(store, CorruptStorePolicy::Reset).unwrap())
    }

    #[test]
    fn subscribers_see_initial_and_changed_state() {
        let (_, hub) = hub();
        let rx = hub.subscribe();
        assert!(rx.try_recv().unwrap().is_empty());

        hub.add_task("a").unwrap();
        let snapshot = rx.try_recv().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text, "a");
    }

    #[test]
    fn noops_neither_write_nor_notify() {
        let (storage, hub) = hub();
        let rx = hub.subscribe();
        let _ = rx.try_recv();

        hub.add_task("  ").unwrap();
        hub.delete_task("missing").unwrap();
        hub.toggle_completion("missing").unwrap();

        assert_eq!(storage.write_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let (_, hub) = hub();
        drop(hub.subscribe());
        hub.add_task("a").unwrap();
        assert!(hub.lock().subscribers.is_empty());
    }

    struct FailingStorage;

    impl KeyValueStorage for FailingStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::other("disk full"),
            })
        }
    }

    #[test]
    fn failed_save_leaves_state_untouched() {
        let store = TaskStore::new(Arc::new(FailingStorage), DEFAULT_STORAGE_KEY);
        let hub = TaskHub::open(store, CorruptStorePolicy::Reset).unwrap();
        assert!(hub.add_task("a").is_err());
        assert!(hub.snapshot().is_empty());
    }

    #[test]
    fn reload_picks_up_external_writes() {
        let (storage, hub) = hub();
        let other = TaskStore::new(storage.clone(), DEFAULT_STORAGE_KEY);
        other.save(&[Task::new("from elsewhere")]).unwrap();

        hub.reload(CorruptStorePolicy::Reset).unwrap();
        assert_eq!(hub.snapshot().len(), 1);
    }
}
