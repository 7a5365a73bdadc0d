//! Client side of the notes service: a session guard that owns the bearer
//! token, an HTTP client that attaches it, and a reactive note cache.

pub mod api;
pub mod cache;
pub mod session;
pub mod token_store;

use thiserror::Error;

pub use api::NotesClient;
pub use cache::{CachedNote, NoteCache, Notice, NoticeLevel};
pub use session::{Route, SessionGuard, SessionState};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};

#[derive(Debug, Error)]
pub enum ClientError {
    /// No token; the request was never sent.
    #[error("not signed in")]
    Unauthenticated,
    /// The server refused the token; the session has been cleared.
    #[error("session expired or invalid")]
    SessionRejected,
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("server unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Local(#[from] anyhow::Error),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Api { status: 404, .. })
    }
}
