//! Session gate: where the bearer credential for board calls comes from, plus
//! the sign-up / sign-in endpoints that mint it.

use std::sync::RwLock;

use reqwest::Client;
use shared::protocol::{Credentials, SignInResponse, SignUpResponse};
use tracing::{debug, info};
use url::Url;

use crate::{api::failure_from_response, error::BoardError};

pub trait SessionGate: Send + Sync {
    /// `None` means "not authenticated"; board calls then fail `Unauthorized`.
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed credential, e.g. one passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl SessionGate for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone)]
struct IssuedTokens {
    access: String,
    refresh: String,
}

/// In-memory session populated by a successful sign-in and dropped on logout.
#[derive(Debug, Default)]
pub struct SessionTokens {
    inner: RwLock<Option<IssuedTokens>>,
}

impl SessionTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn establish(&self, response: &SignInResponse) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(IssuedTokens {
            access: response.access.clone(),
            refresh: response.refresh.clone(),
        });
    }

    /// Logout. Subsequent board calls fail without reaching the network.
    pub fn clear(&self) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer_token().is_some()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .map(|tokens| tokens.refresh.clone())
    }
}

impl SessionGate for SessionTokens {
    fn bearer_token(&self) -> Option<String> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .map(|tokens| tokens.access.clone())
    }
}

pub struct AuthClient {
    http: Client,
    base_url: Url,
}

impl AuthClient {
    pub fn new(http: Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpResponse, BoardError> {
        let url = endpoint(&self.base_url, "api/signup/")?;
        debug!(username = %credentials.username, "auth: sign up");
        let response = self.http.post(url).json(credentials).send().await?;
        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(SignUpResponse::default());
        }
        serde_json::from_str(&body).map_err(|err| BoardError::InvalidResponse(err.to_string()))
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<SignInResponse, BoardError> {
        let url = endpoint(&self.base_url, "api/signin/")?;
        let response = self.http.post(url).json(credentials).send().await?;
        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }
        let body: SignInResponse = response.json().await?;
        info!(username = %credentials.username, "auth: signed in");
        Ok(body)
    }

    /// Signs in and installs the issued tokens into `session`.
    pub async fn sign_in_into(
        &self,
        credentials: &Credentials,
        session: &SessionTokens,
    ) -> Result<(), BoardError> {
        let response = self.sign_in(credentials).await?;
        session.establish(&response);
        Ok(())
    }
}

pub(crate) fn endpoint(base_url: &Url, path: &str) -> Result<Url, BoardError> {
    base_url
        .join(path)
        .map_err(|err| BoardError::Network(format!("invalid endpoint {path}: {err}")))
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
