use shared::{
    domain::{BoardId, TaskId, TaskStatus},
    error::{ApiError, ErrorCode},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("unauthorized: {}", .0.as_deref().unwrap_or("missing or rejected credential"))]
    Unauthorized(Option<String>),
    #[error("validation failed: {}", .0.as_deref().unwrap_or("input rejected by server"))]
    Validation(Option<String>),
    #[error("not found: {}", .0.as_deref().unwrap_or("unknown board or task"))]
    NotFound(Option<String>),
    #[error("network error: {0}")]
    Network(String),
    #[error("server error {status}: {}", .message.as_deref().unwrap_or("no details"))]
    Server { status: u16, message: Option<String> },
    #[error("invalid server response: {0}")]
    InvalidResponse(String),
    #[error("confirmed update for board {board_id} task {} is missing from local state", display_task(.task_id))]
    ConsistencyFault {
        board_id: BoardId,
        task_id: Option<TaskId>,
    },
    #[error("transition {from} -> {to} is not allowed")]
    TransitionRejected { from: TaskStatus, to: TaskStatus },
}

fn display_task(task_id: &Option<TaskId>) -> String {
    task_id.map_or_else(|| "<unknown>".to_string(), |id| id.to_string())
}

impl BoardError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(Some(message.into()))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<ApiError> for BoardError {
    fn from(value: ApiError) -> Self {
        match value.code {
            ErrorCode::Unauthorized => Self::Unauthorized(value.message),
            ErrorCode::Validation => Self::Validation(value.message),
            ErrorCode::NotFound => Self::NotFound(value.message),
            ErrorCode::Internal => Self::Server {
                status: value.status,
                message: value.message,
            },
        }
    }
}

impl From<reqwest::Error> for BoardError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::InvalidResponse(value.to_string())
        } else {
            Self::Network(value.to_string())
        }
    }
}
