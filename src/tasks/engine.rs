//! Task-action engine: applies structured action batches against the store
//! and keeps a bounded single-step undo history.

use crate::error::Result;
use crate::tasks::store::TaskQuery;
use crate::tasks::{ActionKind, ActionRequest, Task, TaskStore};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Maximum number of undo entries retained. Oldest entries are evicted when
/// the ring is full.
pub const UNDO_HISTORY_CAP: usize = 10;

/// Status message when the undo history is empty.
pub const NO_UNDO_HISTORY_MSG: &str = "There is no recent action to undo.";
/// Status message rejecting a second consecutive undo.
pub const UNDO_OF_UNDO_MSG: &str = "Cannot undo an already-reverted action.";
/// Status message after a successful undo.
pub const UNDO_OK_MSG: &str = "The last action has been reverted.";

/// The inverse operation plus the data needed to revert one applied action.
///
/// Created alongside each successful mutation, consumed by undo, never
/// persisted across restarts.
#[derive(Debug, Clone)]
enum UndoEntry {
    /// Inverse of `add`: remove the exact inserted task.
    RemoveInserted(Task),
    /// Inverse of `remove`: re-insert the removed snapshot.
    ReAdd(Task),
    /// Inverse of `complete`: restore the completed snapshot to pending.
    RestorePending(Task),
    /// Inverse of `modify`: overwrite the changed fields with the
    /// pre-change snapshot, keyed by the post-change name.
    RevertModify {
        current_name: String,
        previous: Task,
    },
}

/// Interprets generator action batches against the task store.
pub struct TaskActionEngine {
    store: TaskStore,
    history: VecDeque<UndoEntry>,
    last_was_undo: bool,
}

impl TaskActionEngine {
    /// Wrap a task store with an empty undo history.
    pub fn new(store: TaskStore) -> Self {
        Self {
            store,
            history: VecDeque::with_capacity(UNDO_HISTORY_CAP),
            last_was_undo: false,
        }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Apply a batch of action requests in list order and build the final
    /// reply text.
    ///
    /// Per-item failures (missing required fields, unknown kinds, zero
    /// matches) skip that item and continue the batch. An `undo` request
    /// short-circuits: its status message is returned immediately and any
    /// remaining requests are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error only when the store cannot persist a mutation.
    pub fn apply(&mut self, base_response: &str, requests: &[ActionRequest]) -> Result<String> {
        let mut mentions: Vec<String> = Vec::new();

        for request in requests {
            match request.action {
                ActionKind::Add => self.apply_add(request)?,
                ActionKind::Remove => self.apply_remove(request)?,
                ActionKind::Complete => self.apply_complete(request)?,
                ActionKind::Modify => self.apply_modify(request)?,
                ActionKind::Undo => return self.apply_undo(),
                ActionKind::Query => {
                    if let Some(name) = &request.task {
                        let lower = name.to_lowercase();
                        let already_mentioned = base_response.to_lowercase().contains(&lower)
                            || mentions.iter().any(|m| m.to_lowercase() == lower);
                        if !already_mentioned {
                            mentions.push(name.clone());
                        }
                    }
                }
                ActionKind::Unknown => {
                    warn!("skipping unknown task action kind");
                }
            }
        }

        if mentions.is_empty() {
            Ok(base_response.to_owned())
        } else {
            Ok(format!("{base_response} {}", mentions.join(", ")))
        }
    }

    /// Revert the most recent mutation, consuming its undo entry.
    ///
    /// A second consecutive undo is rejected with a fixed message rather
    /// than walking further back: recovery is bounded to a single level.
    pub fn apply_undo(&mut self) -> Result<String> {
        if self.last_was_undo {
            return Ok(UNDO_OF_UNDO_MSG.to_owned());
        }
        let Some(entry) = self.history.pop_back() else {
            return Ok(NO_UNDO_HISTORY_MSG.to_owned());
        };

        match entry {
            UndoEntry::RemoveInserted(task) => {
                self.store.remove(&TaskQuery::exact(&task))?;
            }
            UndoEntry::ReAdd(task) => {
                self.store.add(task)?;
            }
            UndoEntry::RestorePending(task) => {
                self.store.restore_pending(&TaskQuery::exact(&task))?;
            }
            UndoEntry::RevertModify {
                current_name,
                previous,
            } => {
                self.store.apply_snapshot_fields(&current_name, &previous)?;
            }
        }

        self.last_was_undo = true;
        Ok(UNDO_OK_MSG.to_owned())
    }

    fn apply_add(&mut self, request: &ActionRequest) -> Result<()> {
        let Some(name) = &request.task else {
            warn!("'task' field is required for add, skipping");
            return Ok(());
        };
        let task = Task::new(
            name.clone(),
            request.due_date.clone(),
            request.priority.unwrap_or_default(),
        );
        if self.store.add(task.clone())? {
            self.record(UndoEntry::RemoveInserted(task));
        } else {
            debug!(task = %name, "duplicate task, add is a no-op");
        }
        Ok(())
    }

    fn apply_remove(&mut self, request: &ActionRequest) -> Result<()> {
        let Some(query) = query_from(request) else {
            warn!("'task' field is required for remove, skipping");
            return Ok(());
        };
        for removed in self.store.remove(&query)? {
            self.record(UndoEntry::ReAdd(removed));
        }
        Ok(())
    }

    fn apply_complete(&mut self, request: &ActionRequest) -> Result<()> {
        let Some(query) = query_from(request) else {
            warn!("'task' field is required for complete, skipping");
            return Ok(());
        };
        for completed in self.store.complete(&query)? {
            self.record(UndoEntry::RestorePending(completed));
        }
        Ok(())
    }

    fn apply_modify(&mut self, request: &ActionRequest) -> Result<()> {
        let Some(name) = &request.task else {
            warn!("'task' field is required for modify, skipping");
            return Ok(());
        };
        let previous = self.store.modify(
            name,
            request.new_task.as_deref(),
            request.due_date.as_deref(),
            request.priority,
        )?;
        if let Some(previous) = previous {
            let current_name = request
                .new_task
                .clone()
                .unwrap_or_else(|| previous.name.clone());
            self.record(UndoEntry::RevertModify {
                current_name,
                previous,
            });
        }
        Ok(())
    }

    fn record(&mut self, entry: UndoEntry) {
        if self.history.len() >= UNDO_HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(entry);
        self.last_was_undo = false;
    }
}

fn query_from(request: &ActionRequest) -> Option<TaskQuery> {
    let name = request.task.clone()?;
    Some(TaskQuery {
        name,
        due_date: request.due_date.clone(),
        priority: request.priority,
        created_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Priority;

    fn engine() -> (tempfile::TempDir, TaskActionEngine) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = TaskStore::open(dir.path()).expect("open store");
        (dir, TaskActionEngine::new(store))
    }

    fn add(name: &str) -> ActionRequest {
        ActionRequest::of(ActionKind::Add).with_task(name)
    }

    #[test]
    fn add_then_undo_restores_pre_action_state() {
        let (_dir, mut engine) = engine();
        engine.apply("ok", &[add("comprar pan")]).expect("apply add");
        assert_eq!(engine.store().pending().len(), 1);

        let msg = engine
            .apply("ok", &[ActionRequest::of(ActionKind::Undo)])
            .expect("apply undo");
        assert_eq!(msg, UNDO_OK_MSG);
        assert!(engine.store().pending().is_empty());
    }

    #[test]
    fn remove_then_undo_reinserts_snapshot() {
        let (_dir, mut engine) = engine();
        engine
            .apply(
                "ok",
                &[add("water plants").with_due_date("2026-09-01").with_priority(Priority::High)],
            )
            .expect("apply add");

        engine
            .apply("ok", &[ActionRequest::of(ActionKind::Remove).with_task("water plants")])
            .expect("apply remove");
        assert!(engine.store().pending().is_empty());

        engine.apply_undo().expect("undo");
        let restored = &engine.store().pending()[0];
        assert_eq!(restored.name, "water plants");
        assert_eq!(restored.due_date.as_deref(), Some("2026-09-01"));
        assert_eq!(restored.priority, Priority::High);
    }

    #[test]
    fn complete_then_undo_moves_back_to_pending() {
        let (_dir, mut engine) = engine();
        engine.apply("ok", &[add("file taxes")]).expect("apply add");
        engine
            .apply("ok", &[ActionRequest::of(ActionKind::Complete).with_task("file taxes")])
            .expect("apply complete");
        assert_eq!(engine.store().completed().len(), 1);

        engine.apply_undo().expect("undo");
        assert!(engine.store().completed().is_empty());
        assert_eq!(engine.store().pending().len(), 1);
        assert!(engine.store().pending()[0].completed_at.is_none());
    }

    #[test]
    fn modify_then_undo_restores_exact_fields() {
        let (_dir, mut engine) = engine();
        engine.apply("ok", &[add("call mum")]).expect("apply add");
        let before = engine.store().pending()[0].clone();

        let modify = ActionRequest {
            action: ActionKind::Modify,
            task: Some("call mum".to_owned()),
            new_task: Some("call parents".to_owned()),
            due_date: Some("2026-09-05".to_owned()),
            priority: Some(Priority::Urgent),
        };
        engine.apply("ok", &[modify]).expect("apply modify");
        assert_eq!(engine.store().pending()[0].name, "call parents");

        engine.apply_undo().expect("undo");
        assert_eq!(engine.store().pending()[0], before);
    }

    #[test]
    fn undo_after_undo_is_rejected_and_leaves_state_unchanged() {
        let (_dir, mut engine) = engine();
        engine.apply("ok", &[add("a"), add("b")]).expect("apply adds");

        assert_eq!(engine.apply_undo().expect("first undo"), UNDO_OK_MSG);
        let snapshot: Vec<_> = engine.store().pending().to_vec();

        assert_eq!(engine.apply_undo().expect("second undo"), UNDO_OF_UNDO_MSG);
        assert_eq!(engine.store().pending(), snapshot.as_slice());
    }

    #[test]
    fn undo_with_empty_history_reports_nothing_to_revert() {
        let (_dir, mut engine) = engine();
        assert_eq!(engine.apply_undo().expect("undo"), NO_UNDO_HISTORY_MSG);
    }

    #[test]
    fn undo_short_circuits_the_rest_of_the_batch() {
        let (_dir, mut engine) = engine();
        engine.apply("ok", &[add("first")]).expect("apply add");

        let msg = engine
            .apply("ok", &[ActionRequest::of(ActionKind::Undo), add("second")])
            .expect("apply batch");
        assert_eq!(msg, UNDO_OK_MSG);
        // The queued add after the undo never ran.
        assert!(engine.store().pending().is_empty());
    }

    #[test]
    fn duplicate_add_records_no_undo_entry() {
        let (_dir, mut engine) = engine();
        engine.apply("ok", &[add("once")]).expect("first add");
        engine.apply("ok", &[add("once")]).expect("duplicate add");
        assert_eq!(engine.store().pending().len(), 1);

        // The only undo entry is the original insert.
        engine.apply_undo().expect("undo");
        assert!(engine.store().pending().is_empty());
    }

    #[test]
    fn missing_task_field_skips_item_but_continues_batch() {
        let (_dir, mut engine) = engine();
        let batch = [ActionRequest::of(ActionKind::Add), add("kept")];
        engine.apply("ok", &batch).expect("apply batch");
        assert_eq!(engine.store().pending().len(), 1);
        assert_eq!(engine.store().pending()[0].name, "kept");
    }

    #[test]
    fn unknown_action_kind_is_skipped_without_aborting() {
        let (_dir, mut engine) = engine();
        let batch = [ActionRequest::of(ActionKind::Unknown), add("survivor")];
        engine.apply("ok", &batch).expect("apply batch");
        assert_eq!(engine.store().pending().len(), 1);
    }

    #[test]
    fn history_is_capped_at_ten_entries() {
        let (_dir, mut engine) = engine();
        for i in 0..UNDO_HISTORY_CAP + 2 {
            engine.apply("ok", &[add(&format!("task {i}"))]).expect("apply add");
        }
        // Only the ten most recent inserts can be unwound.
        for _ in 0..UNDO_HISTORY_CAP {
            engine.last_was_undo = false;
            assert_eq!(engine.apply_undo().expect("undo"), UNDO_OK_MSG);
        }
        engine.last_was_undo = false;
        assert_eq!(engine.apply_undo().expect("exhausted undo"), NO_UNDO_HISTORY_MSG);
        assert_eq!(engine.store().pending().len(), 2);
    }

    #[test]
    fn query_mentions_append_unless_already_in_reply() {
        let (_dir, mut engine) = engine();
        let batch = [
            ActionRequest::of(ActionKind::Query).with_task("Comprar pan"),
            ActionRequest::of(ActionKind::Query).with_task("buy milk"),
            // Duplicate mention, differing only by case.
            ActionRequest::of(ActionKind::Query).with_task("BUY MILK"),
        ];
        let reply = engine
            .apply("Your pending tasks include comprar pan.", &batch)
            .expect("apply batch");
        // "comprar pan" already appears in the base reply; "buy milk" is
        // appended exactly once.
        assert_eq!(reply, "Your pending tasks include comprar pan. buy milk");
    }

    #[test]
    fn query_dedupe_is_case_insensitive_beyond_ascii() {
        let (_dir, mut engine) = engine();
        let batch = [
            ActionRequest::of(ActionKind::Query).with_task("Añadir leche"),
            // Same mention, upper-cased through a multibyte character.
            ActionRequest::of(ActionKind::Query).with_task("AÑADIR LECHE"),
        ];
        let reply = engine.apply("Pending:", &batch).expect("apply batch");
        assert_eq!(reply, "Pending: Añadir leche");
    }

    #[test]
    fn removing_two_namesakes_pushes_two_entries_and_undo_restores_last() {
        let (_dir, mut engine) = engine();
        engine
            .apply(
                "ok",
                &[
                    add("Comprar pan").with_due_date("2026-09-01"),
                    add("Comprar pan").with_due_date("2026-09-02"),
                ],
            )
            .expect("apply adds");

        engine
            .apply("ok", &[ActionRequest::of(ActionKind::Remove).with_task("comprar pan")])
            .expect("apply remove");
        assert!(engine.store().pending().is_empty());

        engine.apply_undo().expect("undo");
        let pending = engine.store().pending();
        assert_eq!(pending.len(), 1);
        // Only the most recently removed one comes back.
        assert_eq!(pending[0].due_date.as_deref(), Some("2026-09-02"));
    }
}
