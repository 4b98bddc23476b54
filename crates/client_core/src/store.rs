//! Client-side cache of boards and the current board selection.
//!
//! Local state only changes after the remote call it depends on has been
//! confirmed. A failed call leaves boards and selection untouched; only board
//! list loads record failure in `sync_status` / `last_error`.

use std::{collections::HashMap, sync::Arc};

use futures::{Stream, StreamExt};
use shared::domain::{Board, BoardId, Task, TaskDraft, TaskId};
use tokio::sync::{broadcast, Mutex};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, error, info, warn};

use crate::{api::BoardApi, error::BoardError};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    SyncStatusChanged(SyncStatus),
    BoardsLoaded {
        count: usize,
    },
    BoardAdded(Board),
    TaskAdded {
        board_id: BoardId,
        task: Task,
    },
    TaskUpdated {
        board_id: BoardId,
        task: Task,
    },
    SelectionChanged(Option<BoardId>),
    /// A response that lost to a later-issued mutation of the same task.
    StaleResponseDiscarded {
        board_id: BoardId,
        task_id: TaskId,
    },
    ConsistencyFault {
        board_id: BoardId,
        task_id: Option<TaskId>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub boards: Vec<Board>,
    pub selected_board: Option<Board>,
    pub sync_status: SyncStatus,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedDraft {
    /// Position of the draft in the submitted list.
    pub index: usize,
    pub draft: TaskDraft,
    pub error: BoardError,
}

/// Outcome of creating a board together with its initial tasks.
///
/// The board exists as soon as phase one succeeds. Drafts are then submitted
/// one at a time and submission stops at the first failure, so `created`,
/// `failed` and `unsubmitted` partition the original draft list in order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardCreation {
    pub board: Board,
    pub created: Vec<Task>,
    pub failed: Option<FailedDraft>,
    pub unsubmitted: Vec<TaskDraft>,
}

impl BoardCreation {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none() && self.unsubmitted.is_empty()
    }

    /// Drafts that still need to be submitted, in their original order.
    pub fn pending_drafts(&self) -> Vec<TaskDraft> {
        self.failed
            .iter()
            .map(|failed| failed.draft.clone())
            .chain(self.unsubmitted.iter().cloned())
            .collect()
    }

    /// Collapses a partial result into the task failure that stopped it.
    pub fn into_result(self) -> Result<Board, BoardError> {
        match self.failed {
            Some(failed) => Err(failed.error),
            None => Ok(self.board),
        }
    }
}

/// What [`BoardStore::update_task`] did with a confirmed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskUpdate {
    Applied(Task),
    /// The server accepted the update, but a later-issued mutation of the
    /// same task had already been applied and is what the store keeps.
    Superseded { confirmed: Task, kept: Option<Task> },
}

impl TaskUpdate {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The task as the server confirmed it for this call.
    pub fn confirmed(&self) -> &Task {
        match self {
            Self::Applied(task) => task,
            Self::Superseded { confirmed, .. } => confirmed,
        }
    }
}

#[derive(Default)]
struct DraftSubmission {
    created: Vec<Task>,
    failed: Option<FailedDraft>,
    unsubmitted: Vec<TaskDraft>,
}

#[derive(Default)]
struct StoreState {
    boards: Vec<Board>,
    selected: Option<BoardId>,
    sync_status: SyncStatus,
    last_error: Option<String>,
    next_seq: u64,
    last_applied_load: u64,
    /// Issue seq of the newest confirmed add/update applied per task. Kept
    /// across loads; dropped once the task is no longer in `boards`.
    confirmed_writes: HashMap<(BoardId, TaskId), u64>,
}

impl StoreState {
    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn board(&self, board_id: BoardId) -> Option<&Board> {
        self.boards.iter().find(|board| board.id == board_id)
    }

    fn board_mut(&mut self, board_id: BoardId) -> Option<&mut Board> {
        self.boards.iter_mut().find(|board| board.id == board_id)
    }

    fn record_write(&mut self, board_id: BoardId, task_id: TaskId, seq: u64) {
        let written = self.confirmed_writes.entry((board_id, task_id)).or_insert(seq);
        *written = (*written).max(seq);
    }

    fn superseded(&self, board_id: BoardId, task_id: TaskId, seq: u64) -> bool {
        self.confirmed_writes
            .get(&(board_id, task_id))
            .is_some_and(|written| *written > seq)
    }

    /// Carries writes confirmed after load `seq` was issued into its fetched
    /// collection, which may predate them.
    fn carry_newer_writes(&self, fetched: &mut [Board], seq: u64) {
        let mut newer: Vec<(u64, BoardId, TaskId)> = self
            .confirmed_writes
            .iter()
            .filter(|(_, written)| **written > seq)
            .map(|(&(board_id, task_id), &written)| (written, board_id, task_id))
            .collect();
        newer.sort_unstable();

        for (_, board_id, task_id) in newer {
            let Some(local) = self.board(board_id).and_then(|board| board.task(task_id)) else {
                continue;
            };
            if !fetched.iter().any(|board| board.id == board_id) {
                continue;
            }
            for board in fetched.iter_mut() {
                if board.id != board_id {
                    board.tasks.retain(|task| task.id != task_id);
                    continue;
                }
                match board.tasks.iter_mut().find(|task| task.id == task_id) {
                    Some(existing) => *existing = local.clone(),
                    None => board.tasks.push(local.clone()),
                }
            }
        }
    }

    fn forget_departed_tasks(&mut self) {
        let boards = &self.boards;
        self.confirmed_writes.retain(|(board_id, task_id), _| {
            boards
                .iter()
                .any(|board| board.id == *board_id && board.contains_task(*task_id))
        });
    }

    fn selected_board(&self) -> Option<&Board> {
        self.selected.and_then(|board_id| self.board(board_id))
    }

    /// Removes `task_id` from every board except `keep`.
    fn detach_task_elsewhere(&mut self, keep: BoardId, task_id: TaskId) {
        for board in self.boards.iter_mut().filter(|board| board.id != keep) {
            board.tasks.retain(|task| task.id != task_id);
        }
    }

    /// Inserts or replaces a confirmed task. `Some(false)` means the task was
    /// not present in the board and has been appended; `None` means the board
    /// itself is unknown.
    fn put_task(&mut self, board_id: BoardId, task: Task) -> Option<bool> {
        self.board(board_id)?;
        self.detach_task_elsewhere(board_id, task.id);
        let board = self.board_mut(board_id)?;
        match board.tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) => {
                *existing = task;
                Some(true)
            }
            None => {
                board.tasks.push(task);
                Some(false)
            }
        }
    }
}

pub struct BoardStore {
    api: Arc<dyn BoardApi>,
    inner: Mutex<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl BoardStore {
    pub fn new(api: Arc<dyn BoardApi>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            inner: Mutex::new(StoreState::default()),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Store events as a stream. Events missed by a slow reader are skipped.
    pub fn events(&self) -> impl Stream<Item = StoreEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "store: event reader lagged");
                    None
                }
            }
        })
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event);
    }

    pub async fn boards(&self) -> Vec<Board> {
        self.inner.lock().await.boards.clone()
    }

    pub async fn board(&self, board_id: BoardId) -> Option<Board> {
        self.inner.lock().await.board(board_id).cloned()
    }

    /// The focused board, always read through the board collection.
    pub async fn selected_board(&self) -> Option<Board> {
        self.inner.lock().await.selected_board().cloned()
    }

    pub async fn sync_status(&self) -> SyncStatus {
        self.inner.lock().await.sync_status
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let guard = self.inner.lock().await;
        StoreSnapshot {
            boards: guard.boards.clone(),
            selected_board: guard.selected_board().cloned(),
            sync_status: guard.sync_status,
            last_error: guard.last_error.clone(),
        }
    }

    /// Authoritative refresh: the fetched collection replaces `boards`.
    pub async fn load_boards(&self) -> Result<(), BoardError> {
        let seq = {
            let mut guard = self.inner.lock().await;
            guard.sync_status = SyncStatus::Loading;
            guard.issue_seq()
        };
        self.emit(StoreEvent::SyncStatusChanged(SyncStatus::Loading));

        let result = self.api.list_boards().await;

        let mut guard = self.inner.lock().await;
        if seq < guard.last_applied_load {
            debug!(seq, "store: discarding board list superseded by a later load");
            return result.map(|_| ());
        }

        match result {
            Ok(mut boards) => {
                guard.last_applied_load = seq;
                guard.carry_newer_writes(&mut boards, seq);
                guard.boards = boards;
                guard.forget_departed_tasks();
                guard.sync_status = SyncStatus::Succeeded;
                guard.last_error = None;
                let count = guard.boards.len();

                let selected = guard.selected;
                let selection_dropped = match selected {
                    Some(board_id) if guard.board(board_id).is_none() => {
                        warn!(board_id = board_id.0, "store: selected board vanished on reload");
                        guard.selected = None;
                        true
                    }
                    _ => false,
                };
                drop(guard);

                info!(count, "store: boards loaded");
                self.emit(StoreEvent::BoardsLoaded { count });
                self.emit(StoreEvent::SyncStatusChanged(SyncStatus::Succeeded));
                if selection_dropped {
                    self.emit(StoreEvent::SelectionChanged(None));
                }
                Ok(())
            }
            Err(err) => {
                guard.sync_status = SyncStatus::Failed;
                guard.last_error = Some(err.to_string());
                drop(guard);

                warn!(error = %err, "store: loading boards failed");
                self.emit(StoreEvent::SyncStatusChanged(SyncStatus::Failed));
                Err(err)
            }
        }
    }

    /// Creates a board, then submits `drafts` against it one by one.
    ///
    /// Only a failure of the board itself is an `Err`. Task failures are
    /// reported in the returned [`BoardCreation`]; the board and any tasks
    /// created before the failure are already in `boards`.
    pub async fn create_board(
        &self,
        name: &str,
        description: &str,
        drafts: Vec<TaskDraft>,
    ) -> Result<BoardCreation, BoardError> {
        let board = self.api.create_board(name, description).await?;
        let board_id = board.id;
        {
            let mut guard = self.inner.lock().await;
            match guard.board_mut(board_id) {
                Some(existing) => *existing = board.clone(),
                None => guard.boards.push(board.clone()),
            }
        }
        info!(board_id = board_id.0, name, "store: board created");
        self.emit(StoreEvent::BoardAdded(board.clone()));

        let submission = self.submit_drafts(board_id, drafts).await;
        Ok(self.creation_outcome(board, submission).await)
    }

    /// Submits the drafts a previous [`BoardCreation`] left pending.
    pub async fn resume_board_tasks(
        &self,
        board_id: BoardId,
        drafts: Vec<TaskDraft>,
    ) -> Result<BoardCreation, BoardError> {
        let board = self
            .board(board_id)
            .await
            .ok_or_else(|| BoardError::not_found(format!("board {board_id} is not loaded")))?;
        let submission = self.submit_drafts(board_id, drafts).await;
        Ok(self.creation_outcome(board, submission).await)
    }

    async fn submit_drafts(&self, board_id: BoardId, drafts: Vec<TaskDraft>) -> DraftSubmission {
        let mut submission = DraftSubmission::default();
        let mut remaining = drafts.into_iter().enumerate();

        for (index, draft) in remaining.by_ref() {
            match self.add_task(board_id, &draft).await {
                Ok(task) => submission.created.push(task),
                Err(err) => {
                    warn!(
                        board_id = board_id.0,
                        index,
                        error = %err,
                        "store: initial task submission failed"
                    );
                    submission.failed = Some(FailedDraft {
                        index,
                        draft,
                        error: err,
                    });
                    break;
                }
            }
        }

        submission.unsubmitted = remaining.map(|(_, draft)| draft).collect();
        submission
    }

    async fn creation_outcome(&self, board: Board, submission: DraftSubmission) -> BoardCreation {
        let board = match self.board(board.id).await {
            Some(current) => current,
            None => {
                let mut fallback = board;
                fallback.tasks.extend(submission.created.iter().cloned());
                fallback
            }
        };
        BoardCreation {
            board,
            created: submission.created,
            failed: submission.failed,
            unsubmitted: submission.unsubmitted,
        }
    }

    pub async fn add_task(&self, board_id: BoardId, draft: &TaskDraft) -> Result<Task, BoardError> {
        let seq = self.inner.lock().await.issue_seq();
        let task = self.api.add_task(board_id, draft).await?;

        let mut guard = self.inner.lock().await;
        let placed = guard.put_task(board_id, task.clone());
        if placed.is_some() {
            guard.record_write(board_id, task.id, seq);
        }
        drop(guard);
        match placed {
            Some(_) => {
                debug!(board_id = board_id.0, task_id = task.id.0, "store: task added");
                self.emit(StoreEvent::TaskAdded {
                    board_id,
                    task: task.clone(),
                });
                Ok(task)
            }
            None => Err(self.report_fault(board_id, Some(task.id))),
        }
    }

    /// Replaces a task with the full `task` payload once the server confirms it.
    ///
    /// Responses are ordered by issue time per task: a response that resolves
    /// after a later-issued mutation of the same task has been applied leaves
    /// local state alone and comes back as [`TaskUpdate::Superseded`].
    pub async fn update_task(&self, board_id: BoardId, task: Task) -> Result<TaskUpdate, BoardError> {
        let seq = self.inner.lock().await.issue_seq();
        let confirmed = self.api.update_task(board_id, &task).await?;

        let mut guard = self.inner.lock().await;
        if guard.superseded(board_id, confirmed.id, seq) {
            let kept = guard
                .board(board_id)
                .and_then(|board| board.task(confirmed.id))
                .cloned();
            drop(guard);
            warn!(
                board_id = board_id.0,
                task_id = confirmed.id.0,
                seq,
                "store: discarding stale task update response"
            );
            self.emit(StoreEvent::StaleResponseDiscarded {
                board_id,
                task_id: confirmed.id,
            });
            return Ok(TaskUpdate::Superseded { confirmed, kept });
        }
        guard.record_write(board_id, confirmed.id, seq);

        match guard.put_task(board_id, confirmed.clone()) {
            Some(true) => {
                drop(guard);
                debug!(board_id = board_id.0, task_id = confirmed.id.0, "store: task updated");
                self.emit(StoreEvent::TaskUpdated {
                    board_id,
                    task: confirmed.clone(),
                });
                Ok(TaskUpdate::Applied(confirmed))
            }
            Some(false) | None => {
                drop(guard);
                Err(self.report_fault(board_id, Some(confirmed.id)))
            }
        }
    }

    /// A confirmed mutation could not be matched against local state. The
    /// confirmed task has already been kept where possible.
    fn report_fault(&self, board_id: BoardId, task_id: Option<TaskId>) -> BoardError {
        error!(
            board_id = board_id.0,
            task_id = task_id.map(|id| id.0),
            "store: consistency fault, local cache diverged from server"
        );
        self.emit(StoreEvent::ConsistencyFault { board_id, task_id });
        BoardError::ConsistencyFault { board_id, task_id }
    }

    /// Focuses a board. No network call; the board must already be loaded.
    pub async fn select_board(&self, board_id: BoardId) -> Result<Board, BoardError> {
        let board = {
            let mut guard = self.inner.lock().await;
            let board = guard
                .board(board_id)
                .cloned()
                .ok_or_else(|| BoardError::not_found(format!("board {board_id} is not loaded")))?;
            guard.selected = Some(board_id);
            board
        };
        self.emit(StoreEvent::SelectionChanged(Some(board_id)));
        Ok(board)
    }

    pub async fn deselect_board(&self) {
        let previous = self.inner.lock().await.selected.take();
        if previous.is_some() {
            self.emit(StoreEvent::SelectionChanged(None));
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
