//! File-backed task store.
//!
//! Two JSON collections (pending, completed) are read fully on startup and
//! rewritten fully on every mutation. Corrupt storage is reset to empty with
//! a fresh write; it is never fatal.

use crate::error::{AssistantError, Result};
use crate::tasks::{Priority, Task};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::warn;

const PENDING_FILE: &str = "tasks.json";
const COMPLETED_FILE: &str = "completed_tasks.json";

/// Match criteria for remove/complete/restore lookups.
///
/// `None` filters are wildcards. The name is always required and compared
/// case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    /// Task name (case-insensitive exact match).
    pub name: String,
    /// Due date filter.
    pub due_date: Option<String>,
    /// Priority filter.
    pub priority: Option<Priority>,
    /// Creation date filter.
    pub created_at: Option<NaiveDate>,
}

impl TaskQuery {
    /// Query by name only, all other filters wildcarded.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Query matching one exact task record.
    pub fn exact(task: &Task) -> Self {
        Self {
            name: task.name.clone(),
            due_date: task.due_date.clone(),
            priority: Some(task.priority),
            created_at: Some(task.created_at),
        }
    }

    fn refines(&self, task: &Task) -> bool {
        self.due_date
            .as_ref()
            .is_none_or(|d| task.due_date.as_ref() == Some(d))
            && self.priority.is_none_or(|p| task.priority == p)
            && self.created_at.is_none_or(|c| task.created_at == c)
    }
}

/// Durable collection of pending and completed tasks.
///
/// Ownership of task records is exclusive to the store; lookups hand out
/// matched copies, never long-lived references.
pub struct TaskStore {
    pending: Vec<Task>,
    completed: Vec<Task>,
    pending_path: PathBuf,
    completed_path: PathBuf,
}

impl TaskStore {
    /// Open the store under `data_dir`, loading both collections.
    ///
    /// # Errors
    ///
    /// Returns an error only when the directory or files cannot be created;
    /// unreadable content is reset to empty instead.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let pending_path = data_dir.join(PENDING_FILE);
        let completed_path = data_dir.join(COMPLETED_FILE);
        let pending = load_collection(&pending_path)?;
        let completed = load_collection(&completed_path)?;
        Ok(Self {
            pending,
            completed,
            pending_path,
            completed_path,
        })
    }

    /// Pending tasks, oldest first.
    pub fn pending(&self) -> &[Task] {
        &self.pending
    }

    /// Completed tasks, oldest first.
    pub fn completed(&self) -> &[Task] {
        &self.completed
    }

    /// Find pending tasks matching the query.
    ///
    /// Filters by case-insensitive name first. A single name hit wins
    /// outright regardless of the other filters; multiple hits are refined
    /// by due date / priority / creation date where specified.
    pub fn find_pending(&self, query: &TaskQuery) -> Vec<Task> {
        match_in(&self.pending, query)
    }

    /// Same matching rule against the completed collection.
    pub fn find_completed(&self, query: &TaskQuery) -> Vec<Task> {
        match_in(&self.completed, query)
    }

    /// Insert a pending task unless an identical one already exists.
    ///
    /// Returns `false` for a duplicate `(name, due_date, priority,
    /// created_at)` identity; the duplicate insert is an idempotent no-op.
    pub fn add(&mut self, task: Task) -> Result<bool> {
        if self.pending.iter().any(|t| t.same_identity(&task)) {
            return Ok(false);
        }
        self.pending.push(task);
        self.persist_pending()?;
        Ok(true)
    }

    /// Remove matching pending tasks, returning snapshots of what was
    /// removed (empty when nothing matched).
    pub fn remove(&mut self, query: &TaskQuery) -> Result<Vec<Task>> {
        let matched = self.find_pending(query);
        if matched.is_empty() {
            return Ok(Vec::new());
        }
        self.pending.retain(|t| !matched.iter().any(|m| m == t));
        self.persist_pending()?;
        Ok(matched)
    }

    /// Move matching pending tasks to the completed collection, stamping
    /// today's completion date. Returns the stamped snapshots.
    pub fn complete(&mut self, query: &TaskQuery) -> Result<Vec<Task>> {
        let matched = self.find_pending(query);
        if matched.is_empty() {
            return Ok(Vec::new());
        }
        let today = chrono::Local::now().date_naive();
        self.pending.retain(|t| !matched.iter().any(|m| m == t));
        let mut stamped = Vec::with_capacity(matched.len());
        for mut task in matched {
            task.completed_at = Some(today);
            self.completed.push(task.clone());
            stamped.push(task);
        }
        self.persist_pending()?;
        self.persist_completed()?;
        Ok(stamped)
    }

    /// Move matching completed tasks back to pending, clearing the
    /// completion stamp. Returns the restored snapshots.
    pub fn restore_pending(&mut self, query: &TaskQuery) -> Result<Vec<Task>> {
        let matched = self.find_completed(query);
        if matched.is_empty() {
            return Ok(Vec::new());
        }
        self.completed.retain(|t| !matched.iter().any(|m| m == t));
        let mut restored = Vec::with_capacity(matched.len());
        for mut task in matched {
            task.completed_at = None;
            self.pending.push(task.clone());
            restored.push(task);
        }
        self.persist_pending()?;
        self.persist_completed()?;
        Ok(restored)
    }

    /// Modify the first pending task whose name matches `current_name`
    /// (case-insensitive exact, no multi-match refinement). Only the fields
    /// present are applied. Returns the pre-change snapshot, or `None` when
    /// no task matched.
    pub fn modify(
        &mut self,
        current_name: &str,
        new_name: Option<&str>,
        new_due_date: Option<&str>,
        new_priority: Option<Priority>,
    ) -> Result<Option<Task>> {
        let Some(task) = self.pending.iter_mut().find(|t| t.name_matches(current_name)) else {
            return Ok(None);
        };
        let before = task.clone();
        if let Some(name) = new_name {
            task.name = name.to_owned();
        }
        if let Some(due) = new_due_date {
            task.due_date = Some(due.to_owned());
        }
        if let Some(priority) = new_priority {
            task.priority = priority;
        }
        self.persist_pending()?;
        Ok(Some(before))
    }

    /// Overwrite the name, due date and priority of the first pending task
    /// matching `current_name` with the snapshot's values, keeping the
    /// creation date. Used to revert a modify. Returns `false` when no task
    /// matched.
    pub fn apply_snapshot_fields(&mut self, current_name: &str, snapshot: &Task) -> Result<bool> {
        let Some(task) = self.pending.iter_mut().find(|t| t.name_matches(current_name)) else {
            return Ok(false);
        };
        task.name = snapshot.name.clone();
        task.due_date = snapshot.due_date.clone();
        task.priority = snapshot.priority;
        self.persist_pending()?;
        Ok(true)
    }

    /// Plain-text listing of pending tasks for console display.
    pub fn format_pending(&self) -> String {
        if self.pending.is_empty() {
            return "No pending tasks.".to_owned();
        }
        self.pending
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {} (priority: {:?})", i + 1, t.name, t.priority))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain-text listing of completed tasks for console display.
    pub fn format_completed(&self) -> String {
        if self.completed.is_empty() {
            return "No completed tasks.".to_owned();
        }
        self.completed
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let stamp = t
                    .completed_at
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "?".to_owned());
                format!("{}. {} (completed {stamp})", i + 1, t.name)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Both collections as a JSON context object for the generation prompt.
    pub fn context_json(&self) -> serde_json::Value {
        serde_json::json!({
            "pending_tasks": self.pending,
            "completed_tasks": self.completed,
        })
    }

    fn persist_pending(&self) -> Result<()> {
        write_collection(&self.pending_path, &self.pending)
    }

    fn persist_completed(&self) -> Result<()> {
        write_collection(&self.completed_path, &self.completed)
    }
}

fn match_in(tasks: &[Task], query: &TaskQuery) -> Vec<Task> {
    let by_name: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.name_matches(&query.name))
        .collect();
    if by_name.len() <= 1 {
        return by_name.into_iter().cloned().collect();
    }
    by_name
        .into_iter()
        .filter(|t| query.refines(t))
        .cloned()
        .collect()
}

fn load_collection(path: &Path) -> Result<Vec<Task>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            write_collection(path, &[])?;
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(AssistantError::Store(format!(
                "failed to read task collection {}: {e}",
                path.display()
            )));
        }
    };

    match serde_json::from_slice::<Vec<Task>>(&bytes) {
        Ok(tasks) => Ok(tasks),
        Err(e) => {
            warn!(
                "resetting corrupt task collection at {}: {e}",
                path.display()
            );
            write_collection(path, &[])?;
            Ok(Vec::new())
        }
    }
}

fn write_collection(path: &Path, tasks: &[Task]) -> Result<()> {
    let content = serde_json::to_string_pretty(tasks)
        .map_err(|e| AssistantError::Store(format!("failed to serialize tasks: {e}")))?;
    std::fs::write(path, content)
        .map_err(|e| AssistantError::Store(format!("failed to write {}: {e}", path.display())))
}
