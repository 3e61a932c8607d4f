//! Library manager backends (Sonarr for series, Radarr for movies).
//!
//! Both managers expose the same v3 API shape, so a single `ArrClient`
//! implements `MediaBackend` for either kind. `Backends` holds the two
//! configured instances and maps a `MediaKind` to the right one.

mod arr;
mod types;

pub use arr::ArrClient;
pub use types::*;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to a library manager.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network, authentication or server-side failure. Transient.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The title is already in the library (lost a race with another add).
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The backend refused the request (validation error). Never retried.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Client not configured (missing API key, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl BackendError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Unavailable(format!("request timed out: {}", e))
        } else if e.is_connect() {
            BackendError::Unavailable(format!("connection failed: {}", e))
        } else if e.is_decode() {
            BackendError::Unavailable(format!("invalid response: {}", e))
        } else {
            BackendError::Unavailable(e.to_string())
        }
    }
}

/// A library manager for one media kind.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Name used in logs and metrics ("sonarr", "radarr").
    fn name(&self) -> &str;

    /// The kind of media this backend manages.
    fn kind(&self) -> MediaKind;

    /// Verify the backend is reachable and the API key is accepted.
    async fn test_connection(&self) -> Result<(), BackendError>;

    /// Search titles, in the backend's relevance order.
    async fn search(&self, title: &str) -> Result<Vec<Candidate>, BackendError>;

    /// External ids of every title already in the library.
    async fn list_existing(&self) -> Result<HashSet<u64>, BackendError>;

    /// Whether one title is already in the library.
    async fn exists(&self, external_id: u64) -> Result<bool, BackendError> {
        Ok(self.list_existing().await?.contains(&external_id))
    }

    /// Add a title with the given quality profile and root folder.
    async fn add(&self, request: &AddRequest) -> Result<AddedTitle, BackendError>;
}

/// The two configured backends, selected by kind.
#[derive(Clone)]
pub struct Backends {
    series: Arc<dyn MediaBackend>,
    movie: Arc<dyn MediaBackend>,
}

impl Backends {
    /// Panics in debug builds if a backend is wired to the wrong kind.
    pub fn new(series: Arc<dyn MediaBackend>, movie: Arc<dyn MediaBackend>) -> Self {
        debug_assert_eq!(series.kind(), MediaKind::Series);
        debug_assert_eq!(movie.kind(), MediaKind::Movie);
        Self { series, movie }
    }

    /// The backend responsible for `kind`.
    pub fn for_kind(&self, kind: MediaKind) -> &Arc<dyn MediaBackend> {
        match kind {
            MediaKind::Series => &self.series,
            MediaKind::Movie => &self.movie,
        }
    }

    /// Both backends, series first.
    pub fn all(&self) -> [&Arc<dyn MediaBackend>; 2] {
        [&self.series, &self.movie]
    }
}
