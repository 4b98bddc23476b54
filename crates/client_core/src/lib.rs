use std::sync::Arc;

use anyhow::Result;

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod transition;

pub use api::{BoardApi, HttpBoardApi};
pub use config::{load_settings, ClientSettings};
pub use error::BoardError;
pub use session::{AuthClient, SessionGate, SessionTokens, StaticToken};
pub use store::{
    BoardCreation, BoardStore, FailedDraft, StoreEvent, StoreSnapshot, SyncStatus, TaskUpdate,
};
pub use transition::{
    DragEnd, FreeTransitions, TransitionEngine, TransitionOutcome, TransitionPolicy,
    TransitionTable,
};

/// The store, the drag-and-drop engine and the auth endpoints wired against
/// one server.
pub struct BoardClient {
    pub store: Arc<BoardStore>,
    pub transitions: TransitionEngine,
    pub auth: AuthClient,
}

impl BoardClient {
    pub fn connect(settings: &ClientSettings, session: Arc<dyn SessionGate>) -> Result<Self> {
        let http = settings.http_client()?;
        let base_url = settings.base_url()?;
        let api = Arc::new(HttpBoardApi::new(http.clone(), base_url.clone(), session));
        Ok(Self::from_parts(api, AuthClient::new(http, base_url)))
    }

    pub fn from_parts(api: Arc<dyn BoardApi>, auth: AuthClient) -> Self {
        let store = BoardStore::new(api);
        Self {
            transitions: TransitionEngine::new(Arc::clone(&store)),
            store,
            auth,
        }
    }
}

#[cfg(test)]
#[path = "tests/fake_api.rs"]
mod fake_api;

#[cfg(test)]
#[path = "tests/mock_server.rs"]
mod mock_server;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
