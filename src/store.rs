use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::storage::{KeyValueStorage, StorageError};
use crate::task::Task;

/// Default storage key shared by every task consumer.
pub const DEFAULT_STORAGE_KEY: &str = "tasks";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("stored task list under `{key}` is unreadable: {reason}")]
    Corrupt { key: String, reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What to do when the persisted value cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptStorePolicy {
    /// Back the bad value up under `<key>.corrupt` and start empty.
    #[default]
    Reset,
    /// Surface the error to the caller.
    FailFast,
}

/// The task collection persisted as one JSON array under one key.
pub struct TaskStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
}

impl Clone for TaskStore {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            key: self.key.clone(),
        }
    }
}

impl TaskStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the collection. A missing key is an empty collection.
    pub fn load(&self) -> Result<Vec<Task>, StoreError> {
        let raw = match self.storage.get_item(&self.key) {
            Ok(raw) => raw,
            Err(StorageError::NotText { key }) => {
                return Err(StoreError::Corrupt {
                    key,
                    reason: "not valid UTF-8".into(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        match raw {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str::<Vec<Task>>(&raw).map_err(|e| StoreError::Corrupt {
                key: self.key.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Read the collection, resolving corruption according to `policy`.
    pub fn load_with_policy(&self, policy: CorruptStorePolicy) -> Result<Vec<Task>, StoreError> {
        match self.load() {
            Err(StoreError::Corrupt { key, reason }) if policy == CorruptStorePolicy::Reset => {
                log::warn!("Task store `{key}` is corrupt ({reason}); starting with an empty list");
                self.back_up_corrupt_value();
                Ok(Vec::new())
            }
            other => other,
        }
    }

    /// Overwrite the stored collection. Last writer wins.
    pub fn save(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let data = serde_json::to_string(tasks).map_err(|e| StoreError::Corrupt {
            key: self.key.clone(),
            reason: e.to_string(),
        })?;
        self.storage.set_item(&self.key, &data)?;
        log::debug!("Saved {} task(s) under `{}`", tasks.len(), self.key);
        Ok(())
    }

    fn back_up_corrupt_value(&self) {
        let backup_key = format!("{}.corrupt", self.key);
        match self.storage.copy_item(&self.key, &backup_key) {
            Ok(true) => log::info!("Corrupt task store backed up under `{backup_key}`"),
            Ok(false) => {}
            Err(e) => log::warn!("Failed to back up corrupt task store: {e}"),
        }
    }
}
