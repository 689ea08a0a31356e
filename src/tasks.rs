// Task store: per-user task records
//
// Lookups by task id do not check ownership. Callers that act on behalf of a
// user must check `Task::user_id` themselves.

use crate::models::Task;
use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

/// Handle for task records, borrowed from a [`Store`](crate::Store)
pub struct Tasks<'a> {
    db: &'a Connection,
}

impl<'a> Tasks<'a> {
    pub(crate) fn new(db: &'a Connection) -> Self {
        Self { db }
    }

    /// Add a pending task for `user_id`. Inserts exactly one row.
    pub fn add(&self, user_id: i64, text: &str) -> Result<Task> {
        if text.trim().is_empty() {
            return Err(eyre!("Task text cannot be empty or whitespace-only"));
        }

        self.db
            .execute(
                "INSERT INTO tasks (user_id, task, done) VALUES (?1, ?2, ?3)",
                params![user_id, text, false],
            )
            .context("Failed to insert task")?;

        let task = Task {
            id: self.db.last_insert_rowid(),
            user_id,
            task: text.to_string(),
            done: false,
        };
        info!(user_id, task_id = task.id, "Added task");
        Ok(task)
    }

    /// Get a task by ID
    pub fn get(&self, task_id: i64) -> Result<Option<Task>> {
        let task = self
            .db
            .query_row(
                "SELECT id, user_id, task, done FROM tasks WHERE id = ?1",
                [task_id],
                Task::from_row,
            )
            .optional()?;
        Ok(task)
    }

    /// All tasks owned by `user_id`, in storage order
    pub fn list(&self, user_id: i64) -> Result<Vec<Task>> {
        let mut stmt = self
            .db
            .prepare("SELECT id, user_id, task, done FROM tasks WHERE user_id = ?1 ORDER BY id")?;

        let rows = stmt.query_map([user_id], Task::from_row)?;

        let mut results = Vec::new();
        for row_result in rows {
            results.push(row_result.context("Failed to read task row")?);
        }
        debug!(user_id, count = results.len(), "Listed tasks");
        Ok(results)
    }

    /// Set the completion flag. Returns false if no task has that id.
    pub fn set_done(&self, task_id: i64, done: bool) -> Result<bool> {
        let changed = self
            .db
            .execute("UPDATE tasks SET done = ?1 WHERE id = ?2", params![done, task_id])
            .context("Failed to update task")?;
        debug!(task_id, done, changed, "set_done");
        Ok(changed > 0)
    }

    /// Delete a task. Returns false if no task has that id.
    pub fn delete(&self, task_id: i64) -> Result<bool> {
        let removed = self
            .db
            .execute("DELETE FROM tasks WHERE id = ?1", [task_id])
            .context("Failed to delete task")?;
        debug!(task_id, removed, "delete");
        Ok(removed > 0)
    }

    /// Delete every task owned by `user_id`.
    /// Returns the number of tasks deleted.
    pub fn clear(&self, user_id: i64) -> Result<usize> {
        let removed = self
            .db
            .execute("DELETE FROM tasks WHERE user_id = ?1", [user_id])
            .context("Failed to clear tasks")?;
        info!(user_id, removed, "Cleared tasks");
        Ok(removed)
    }
}
