//! Remote board API client.
//!
//! Every call is a single request/response against the workboard REST
//! surface. Failures come back typed; nothing here retries.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Board, BoardId, Task, TaskDraft},
    error::ApiError,
    protocol::CreateBoardRequest,
};
use tracing::debug;
use url::Url;

use crate::{
    error::BoardError,
    session::{endpoint, SessionGate},
};

#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn list_boards(&self) -> Result<Vec<Board>, BoardError>;
    async fn create_board(&self, name: &str, description: &str) -> Result<Board, BoardError>;
    async fn add_task(&self, board_id: BoardId, draft: &TaskDraft) -> Result<Task, BoardError>;
    /// Replaces every mutable field of `task`; this is not a patch.
    async fn update_task(&self, board_id: BoardId, task: &Task) -> Result<Task, BoardError>;
}

pub struct HttpBoardApi {
    http: Client,
    base_url: Url,
    session: Arc<dyn SessionGate>,
}

impl HttpBoardApi {
    pub fn new(http: Client, base_url: Url, session: Arc<dyn SessionGate>) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, BoardError> {
        let token = self
            .session
            .bearer_token()
            .filter(|token| !token.trim().is_empty())
            .ok_or(BoardError::Unauthorized(None))?;
        let url = endpoint(&self.base_url, path)?;
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, BoardError> {
        let response = request.send().await?;
        debug!(%method, path, status = response.status().as_u16(), "api: response");
        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn list_boards(&self) -> Result<Vec<Board>, BoardError> {
        let path = "api/workboards/";
        let request = self.authorized(Method::GET, path)?;
        self.execute(Method::GET, path, request).await
    }

    async fn create_board(&self, name: &str, description: &str) -> Result<Board, BoardError> {
        let path = "api/workboards/";
        let request = self
            .authorized(Method::POST, path)?
            .json(&CreateBoardRequest {
                name: name.to_string(),
                description: description.to_string(),
            });
        self.execute(Method::POST, path, request).await
    }

    async fn add_task(&self, board_id: BoardId, draft: &TaskDraft) -> Result<Task, BoardError> {
        let path = format!("api/workboards/{board_id}/add_task/");
        let request = self.authorized(Method::POST, &path)?.json(draft);
        self.execute(Method::POST, &path, request).await
    }

    async fn update_task(&self, board_id: BoardId, task: &Task) -> Result<Task, BoardError> {
        let path = format!("api/workboards/{board_id}/update_task/");
        let request = self.authorized(Method::PUT, &path)?.json(task);
        self.execute(Method::PUT, &path, request).await
    }
}

pub(crate) async fn failure_from_response(response: Response) -> BoardError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ApiError::from_response_body(status, &body).into()
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
