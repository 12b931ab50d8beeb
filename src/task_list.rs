//! Task list reducers and the per-screen, independently persisted list.

use crate::extractor::ExtractionResult;
use crate::store::{CorruptStorePolicy, StoreError, TaskStore};
use crate::task::{Task, TaskId};

/// Append a new open task unless `text` is blank. Returns the new id.
pub fn add_task(tasks: &mut Vec<Task>, text: &str) -> Option<TaskId> {
    if text.trim().is_empty() {
        return None;
    }
    let task = Task::new(text);
    let id = task.id.clone();
    tasks.push(task);
    Some(id)
}

/// Remove the task with `id`. Returns whether anything was removed.
pub fn delete_task(tasks: &mut Vec<Task>, id: &str) -> bool {
    match tasks.iter().position(|t| t.id == id) {
        Some(index) => {
            tasks.remove(index);
            true
        }
        None => false,
    }
}

/// Flip `completed` on the task with `id`. Returns whether it was found.
pub fn toggle_completion(tasks: &mut [Task], id: &str) -> bool {
    match tasks.iter_mut().find(|t| t.id == id) {
        Some(task) => {
            task.completed = !task.completed;
            true
        }
        None => false,
    }
}

/// Append one open task per extracted entry. Returns the new ids.
pub fn append_extracted(tasks: &mut Vec<Task>, result: &ExtractionResult) -> Vec<TaskId> {
    result
        .add_tasks
        .iter()
        .map(|entry| {
            let task = Task::new(entry.task.clone());
            let id = task.id.clone();
            tasks.push(task);
            id
        })
        .collect()
}

/// A screen's private copy of the task collection, written through to the
/// store on every effective mutation.
///
/// Two instances over the same store do not see each other's changes until
/// `reload()`, and the later `save` overwrites the earlier one. `TaskHub`
/// is the shared alternative.
pub struct ScreenTaskList {
    store: TaskStore,
    policy: CorruptStorePolicy,
    tasks: Vec<Task>,
}

impl ScreenTaskList {
    /// Load the collection for a newly mounted screen.
    pub fn load(store: TaskStore, policy: CorruptStorePolicy) -> Result<Self, StoreError> {
        let tasks = store.load_with_policy(policy)?;
        Ok(Self {
            store,
            policy,
            tasks,
        })
    }

    /// Re-read the store, e.g. when the screen regains focus.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        self.tasks = self.store.load_with_policy(self.policy)?;
        Ok(())
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn add_task(&mut self, text: &str) -> Result<Option<TaskId>, StoreError> {
        let id = add_task(&mut self.tasks, text);
        if id.is_some() {
            self.store.save(&self.tasks)?;
        }
        Ok(id)
    }

    pub fn delete_task(&mut self, id: &str) -> Result<bool, StoreError> {
        let removed = delete_task(&mut self.tasks, id);
        if removed {
            self.store.save(&self.tasks)?;
        }
        Ok(removed)
    }

    pub fn toggle_completion(&mut self, id: &str) -> Result<bool, StoreError> {
        let found = toggle_completion(&mut self.tasks, id);
        if found {
            self.store.save(&self.tasks)?;
        }
        Ok(found)
    }

    pub fn append_extracted(&mut self, result: &ExtractionResult) -> Result<Vec<TaskId>, StoreError> {
        let ids = append_extracted(&mut self.tasks, result);
        if !ids.is_empty() {
            self.store.save(&self.tasks)?;
        }
        Ok(ids)
    }
}
