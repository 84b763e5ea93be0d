//! Task manager: selection-based concurrency control
//!
//! Tracks which text region of which document is being corrected. A new
//! task whose range overlaps an active task of the same document is refused
//! until the earlier one completes or fails.

use prosefix_core::TextRange;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identifier of an in-flight correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// An in-flight correction request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTask {
    pub id: TaskId,
    pub document_id: String,
    pub range: TextRange,
    pub prompt_name: String,
    pub started_at: Instant,
}

impl ActiveTask {
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// A requested range intersects an active task
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Range {requested} of '{document_id}' overlaps {active_task} on {active}, which is still being corrected")]
pub struct OverlapError {
    pub document_id: String,
    pub requested: TextRange,
    pub active: TextRange,
    pub active_task: TaskId,
}

#[derive(Debug, Default)]
struct TaskTable {
    next_id: u64,
    tasks: BTreeMap<TaskId, ActiveTask>,
}

/// Active task table
///
/// Shared by concurrent correction futures. The lock is only held for table
/// updates, never across an `.await`.
#[derive(Debug, Default)]
pub struct TaskManager {
    table: Mutex<TaskTable>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, TaskTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a task for `range` of `document_id`
    pub fn start_task(
        &self,
        document_id: &str,
        range: TextRange,
        prompt_name: &str,
    ) -> Result<TaskId, OverlapError> {
        let mut table = self.table();

        if let Some(existing) = table
            .tasks
            .values()
            .find(|t| t.document_id == document_id && t.range.overlaps(&range))
        {
            debug!(
                document = document_id,
                requested = %range,
                active = %existing.range,
                "task refused: overlapping range"
            );
            return Err(OverlapError {
                document_id: document_id.to_string(),
                requested: range,
                active: existing.range,
                active_task: existing.id,
            });
        }

        table.next_id += 1;
        let id = TaskId(table.next_id);
        table.tasks.insert(
            id,
            ActiveTask {
                id,
                document_id: document_id.to_string(),
                range,
                prompt_name: prompt_name.to_string(),
                started_at: Instant::now(),
            },
        );
        debug!(task = %id, document = document_id, range = %range, "task started");
        Ok(id)
    }

    /// Release a task that finished successfully. Returns false for unknown ids.
    pub fn complete_task(&self, id: TaskId) -> bool {
        self.release(id, "completed")
    }

    /// Release a task that failed. Returns false for unknown ids.
    pub fn fail_task(&self, id: TaskId) -> bool {
        self.release(id, "failed")
    }

    fn release(&self, id: TaskId, outcome: &'static str) -> bool {
        match self.table().tasks.remove(&id) {
            Some(task) => {
                debug!(
                    task = %id,
                    outcome,
                    elapsed_ms = task.elapsed().as_millis() as u64,
                    "task released"
                );
                true
            }
            None => false,
        }
    }

    /// Start a task and wrap it in a guard that always releases it
    pub fn acquire(
        &self,
        document_id: &str,
        range: TextRange,
        prompt_name: &str,
    ) -> Result<TaskGuard<'_>, OverlapError> {
        let id = self.start_task(document_id, range, prompt_name)?;
        Ok(TaskGuard {
            manager: self,
            id,
            released: false,
        })
    }

    /// Snapshot of the active tasks, oldest first
    pub fn active_tasks(&self) -> Vec<ActiveTask> {
        self.table().tasks.values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.table().tasks.len()
    }

    /// Whether starting a task on `range` would be refused
    pub fn is_busy(&self, document_id: &str, range: TextRange) -> bool {
        self.table()
            .tasks
            .values()
            .any(|t| t.document_id == document_id && t.range.overlaps(&range))
    }

    /// Drop every task, returning how many were active
    pub fn clear(&self) -> usize {
        let mut table = self.table();
        let count = table.tasks.len();
        table.tasks.clear();
        count
    }
}

/// Releases its task when consumed or dropped
///
/// Dropping the guard without `complete()` counts as a failure.
#[derive(Debug)]
pub struct TaskGuard<'a> {
    manager: &'a TaskManager,
    id: TaskId,
    released: bool,
}

impl TaskGuard<'_> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn complete(mut self) {
        self.released = true;
        self.manager.complete_task(self.id);
    }

    pub fn fail(mut self) {
        self.released = true;
        self.manager.fail_task(self.id);
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            warn!(task = %self.id, "task guard dropped without completion");
            self.manager.fail_task(self.id);
        }
    }
}
