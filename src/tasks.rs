//! The study planner's task list.

use crate::persistence::{self, keys, Store, StoreError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

/// Tasks in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Planner {
    tasks: Vec<Task>,
}

impl Planner {
    pub fn load(store: &dyn Store) -> Self {
        persistence::load_or(store, keys::TASKS, Self::default)
    }

    pub fn save(&self, store: &dyn Store) -> Result<(), StoreError> {
        persistence::save(store, keys::TASKS, self)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn add(&mut self, text: impl Into<String>) -> &Task {
        self.tasks.push(Task {
            id: Uuid::new_v4().simple().to_string(),
            text: text.into(),
            completed: false,
        });
        &self.tasks[self.tasks.len() - 1]
    }

    /// Flips completion of the task with `id`, returning its new state.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.completed = !task.completed;
        Some(task.completed)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    /// Share of tasks completed, 0 to 100. An empty planner is at 0.
    pub fn progress_percent(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        self.completed_count() as f64 / self.tasks.len() as f64 * 100.0
    }
}
