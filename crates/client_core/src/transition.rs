//! Status changes driven by drag-and-drop between board columns.

use std::{collections::HashSet, sync::Arc};

use shared::domain::{Task, TaskId, TaskStatus};
use tracing::debug;

use crate::{
    error::BoardError,
    store::{BoardStore, TaskUpdate},
};

/// A finished drag gesture. Columns are identified by the status they show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragEnd {
    pub task_id: TaskId,
    pub source: TaskStatus,
    /// `None` when the task was released outside every column.
    pub destination: Option<TaskStatus>,
}

impl DragEnd {
    pub fn new(task_id: TaskId, source: TaskStatus, destination: Option<TaskStatus>) -> Self {
        Self {
            task_id,
            source,
            destination,
        }
    }

    /// Builds a gesture from the string ids a drag-and-drop layer reports.
    pub fn parse(
        draggable_id: &str,
        source_column: &str,
        destination_column: Option<&str>,
    ) -> Result<Self, BoardError> {
        let task_id = draggable_id.parse::<TaskId>().map_err(|_| {
            BoardError::Validation(Some(format!("invalid draggable id '{draggable_id}'")))
        })?;
        let source = parse_column(source_column)?;
        let destination = destination_column.map(parse_column).transpose()?;
        Ok(Self::new(task_id, source, destination))
    }
}

fn parse_column(column: &str) -> Result<TaskStatus, BoardError> {
    column
        .parse::<TaskStatus>()
        .map_err(|err| BoardError::Validation(Some(err.to_string())))
}

pub trait TransitionPolicy: Send + Sync {
    fn allows(&self, from: TaskStatus, to: TaskStatus) -> bool;
}

/// Any status may move to any other status.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeTransitions;

impl TransitionPolicy for FreeTransitions {
    fn allows(&self, _from: TaskStatus, _to: TaskStatus) -> bool {
        true
    }
}

/// An explicit list of allowed moves, checked before any update is sent.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    allowed: HashSet<(TaskStatus, TaskStatus)>,
}

impl TransitionTable {
    pub fn new(allowed: impl IntoIterator<Item = (TaskStatus, TaskStatus)>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Forward-only workflow: To Do -> In Progress -> Completed, plus reopening.
    pub fn sequential() -> Self {
        Self::new([
            (TaskStatus::Todo, TaskStatus::InProgress),
            (TaskStatus::InProgress, TaskStatus::Completed),
            (TaskStatus::InProgress, TaskStatus::Todo),
            (TaskStatus::Completed, TaskStatus::Todo),
        ])
    }
}

impl TransitionPolicy for TransitionTable {
    fn allows(&self, from: TaskStatus, to: TaskStatus) -> bool {
        self.allowed.contains(&(from, to))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Released outside any column.
    Dropped,
    /// Released in its own column; order inside a column is not stored.
    Unchanged,
    Moved(Task),
    /// The server accepted the move, but a later-issued change of the same
    /// task is what the board keeps.
    Superseded(Task),
}

pub struct TransitionEngine {
    store: Arc<BoardStore>,
    policy: Box<dyn TransitionPolicy>,
}

impl TransitionEngine {
    pub fn new(store: Arc<BoardStore>) -> Self {
        Self::with_policy(store, FreeTransitions)
    }

    pub fn with_policy(store: Arc<BoardStore>, policy: impl TransitionPolicy + 'static) -> Self {
        Self {
            store,
            policy: Box::new(policy),
        }
    }

    /// Applies a drag gesture against the selected board.
    ///
    /// The task is not moved locally until the store has the server's
    /// confirmation, so a failed call leaves the task in its source column.
    pub async fn on_drag_end(&self, drag: DragEnd) -> Result<TransitionOutcome, BoardError> {
        let Some(destination) = drag.destination else {
            return Ok(TransitionOutcome::Dropped);
        };
        if destination == drag.source {
            return Ok(TransitionOutcome::Unchanged);
        }

        let board = self
            .store
            .selected_board()
            .await
            .ok_or_else(|| BoardError::not_found("no board is selected"))?;
        let task = board.task(drag.task_id).ok_or_else(|| {
            BoardError::not_found(format!("task {} is not on board {}", drag.task_id, board.id))
        })?;
        if task.status == destination {
            return Ok(TransitionOutcome::Unchanged);
        }

        if !self.policy.allows(task.status, destination) {
            return Err(BoardError::TransitionRejected {
                from: task.status,
                to: destination,
            });
        }

        debug!(
            board_id = board.id.0,
            task_id = task.id.0,
            from = %task.status,
            to = %destination,
            "transition: moving task"
        );
        let outcome = match self
            .store
            .update_task(board.id, task.with_status(destination))
            .await?
        {
            TaskUpdate::Applied(updated) => TransitionOutcome::Moved(updated),
            TaskUpdate::Superseded { confirmed, .. } => TransitionOutcome::Superseded(confirmed),
        };
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "tests/transition_tests.rs"]
mod tests;
