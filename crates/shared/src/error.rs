use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Validation,
    NotFound,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            400 | 422 => Self::Validation,
            404 => Self::NotFound,
            _ => Self::Internal,
        }
    }
}

/// A non-2xx response as reported by the board server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub status: u16,
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self {
            code: ErrorCode::from_status(status),
            status,
            message,
        }
    }

    pub fn from_response_body(status: u16, body: &str) -> Self {
        Self::new(status, server_message(body))
    }
}

/// Extracts a human readable message from an error body.
///
/// Understands `{"detail": "..."}` and field-error maps such as
/// `{"name": ["This field may not be blank."]}`; anything that is not JSON is
/// returned as trimmed text.
pub fn server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };

    match value {
        Value::Object(map) => {
            if let Some(Value::String(detail)) = map.get("detail") {
                return Some(detail.clone());
            }
            let fields: Vec<String> = map
                .iter()
                .map(|(field, errors)| format!("{field}: {}", flatten_messages(errors)))
                .collect();
            if fields.is_empty() {
                None
            } else {
                Some(fields.join("; "))
            }
        }
        Value::String(text) if !text.is_empty() => Some(text),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn flatten_messages(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_messages)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}
