//! Task domain: records, structured action requests, store and engine.

pub mod engine;
pub mod store;

pub use engine::{TaskActionEngine, UNDO_HISTORY_CAP};
pub use store::TaskStore;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Priority of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// A single task record.
///
/// `due_date` stays a raw string: the generator promises `YYYY-MM-DD` but a
/// malformed date is tolerated and carried through uninterpreted rather than
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task name as spoken by the user.
    pub name: String,
    /// Date the task was created.
    pub created_at: NaiveDate,
    /// Optional due date (`YYYY-MM-DD` by convention).
    #[serde(default)]
    pub due_date: Option<String>,
    /// Task priority.
    #[serde(default)]
    pub priority: Priority,
    /// Completion date. Present only for tasks in the completed collection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDate>,
}

impl Task {
    /// Create a pending task dated today.
    pub fn new(name: impl Into<String>, due_date: Option<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            created_at: chrono::Local::now().date_naive(),
            due_date,
            priority,
            completed_at: None,
        }
    }

    /// Case-insensitive name comparison.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    /// Exact identity used by the pending-uniqueness invariant:
    /// `(casefolded name, due_date, priority, created_at)`.
    pub fn same_identity(&self, other: &Task) -> bool {
        self.name_matches(&other.name)
            && self.due_date == other.due_date
            && self.priority == other.priority
            && self.created_at == other.created_at
    }
}

/// The kind of a structured task action.
///
/// `Unknown` absorbs any unrecognized verb at the serde boundary; the
/// validator rejects it and the engine skips it, so a bad verb never aborts
/// a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Add,
    Remove,
    Complete,
    Modify,
    Undo,
    Query,
    #[serde(other)]
    Unknown,
}

/// A single structured task operation extracted from generated text.
///
/// Transient: produced per turn by the generation service, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// The operation to perform.
    pub action: ActionKind,
    /// Task name. Required for add/remove/complete/modify.
    #[serde(default, deserialize_with = "de_opt_string")]
    pub task: Option<String>,
    /// Replacement name (modify only).
    #[serde(default, deserialize_with = "de_opt_string")]
    pub new_task: Option<String>,
    /// Due date filter or value, `YYYY-MM-DD` by convention.
    #[serde(default, deserialize_with = "de_opt_string")]
    pub due_date: Option<String>,
    /// Priority filter or value.
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl ActionRequest {
    /// A bare request with only the action kind set.
    pub fn of(action: ActionKind) -> Self {
        Self {
            action,
            task: None,
            new_task: None,
            due_date: None,
            priority: None,
        }
    }

    /// Set the task name.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Set the due date.
    pub fn with_due_date(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

/// The generator sometimes emits the literal string `"Null"` for absent
/// fields. Normalize it (and empty strings) to `None` at the boundary so
/// downstream code never re-inspects it.
fn de_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null")))
}
