use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier, unique within a collection.
pub type TaskId = String;

/// A single to-do entry as persisted under the tasks storage key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
}

impl Task {
    /// Create an open task with a freshly generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: new_task_id(),
            text: text.into(),
            completed: false,
        }
    }
}

/// Generate a fresh task id.
pub fn new_task_id() -> TaskId {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_task_starts_open() {
        let task = Task::new("water plants");
        assert_eq!(task.text, "water plants");
        assert!(!task.completed);
        assert!(!task.id.is_empty());
    }

    #[test]
    fn ids_do_not_repeat() {
        let ids: HashSet<_> = (0..500).map(|_| new_task_id()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn serializes_with_plain_field_names() {
        let task = Task {
            id: "1".into(),
            text: "call mom".into(),
            completed: true,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": "1", "text": "call mom", "completed": true })
        );
    }
}
