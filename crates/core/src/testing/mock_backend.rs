//! Mock library manager backend for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::backend::{
    AddRequest, AddedTitle, BackendError, Candidate, MediaBackend, MediaKind,
};

/// Backend operations that can be recorded or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    TestConnection,
    Search,
    ListExisting,
    Add,
}

/// A recorded backend call for test assertions.
#[derive(Debug, Clone)]
pub enum RecordedCall {
    TestConnection,
    Search { title: String },
    ListExisting,
    Add(AddRequest),
}

impl RecordedCall {
    pub fn operation(&self) -> BackendOperation {
        match self {
            RecordedCall::TestConnection => BackendOperation::TestConnection,
            RecordedCall::Search { .. } => BackendOperation::Search,
            RecordedCall::ListExisting => BackendOperation::ListExisting,
            RecordedCall::Add(_) => BackendOperation::Add,
        }
    }
}

/// Mock implementation of the MediaBackend trait.
///
/// Provides controllable behavior for testing:
/// - Searchable catalog of candidates (case-insensitive substring match)
/// - In-memory library that grows on successful adds
/// - Queued per-operation failures and a permanent "down" switch
/// - Optional search delay for interleaving tests
///
/// `exists` is not overridden, so it goes through `list_existing` like the
/// trait default.
///
/// # Example
///
/// ```rust,ignore
/// use mediarequest_core::testing::{fixtures, BackendOperation, MockBackend};
///
/// let sonarr = MockBackend::new(MediaKind::Series);
/// sonarr.set_results(vec![fixtures::series("The Office", 2005, 73244)]).await;
/// sonarr.fail_next(BackendOperation::Add, BackendError::Unavailable("502".into())).await;
/// ```
pub struct MockBackend {
    kind: MediaKind,
    /// Catalog returned by search.
    results: Arc<RwLock<Vec<Candidate>>>,
    /// External ids currently in the library.
    library: Arc<RwLock<HashSet<u64>>>,
    /// Every call, in order.
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    /// Errors returned by the next calls of each operation.
    errors: Arc<RwLock<HashMap<BackendOperation, VecDeque<BackendError>>>>,
    /// When set, every call fails with `Unavailable`.
    down: Arc<RwLock<bool>>,
    /// Delay applied to each search.
    search_delay: Arc<RwLock<Duration>>,
    next_library_id: Arc<RwLock<u64>>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("kind", &self.kind)
            .field("results", &"<results>")
            .field("library", &"<library>")
            .finish()
    }
}

impl MockBackend {
    /// Create a new mock backend for one kind with an empty catalog.
    pub fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            results: Arc::new(RwLock::new(Vec::new())),
            library: Arc::new(RwLock::new(HashSet::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            down: Arc::new(RwLock::new(false)),
            search_delay: Arc::new(RwLock::new(Duration::ZERO)),
            next_library_id: Arc::new(RwLock::new(1)),
        }
    }

    /// Set the catalog searched by subsequent searches.
    pub async fn set_results(&self, results: Vec<Candidate>) {
        *self.results.write().await = results;
    }

    /// Put a title in the library.
    pub async fn add_to_library(&self, external_id: u64) {
        self.library.write().await.insert(external_id);
    }

    /// Whether a title is in the library.
    pub async fn in_library(&self, external_id: u64) -> bool {
        self.library.read().await.contains(&external_id)
    }

    /// Queue an error for the next call of `operation`.
    pub async fn fail_next(&self, operation: BackendOperation, error: BackendError) {
        self.errors
            .write()
            .await
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Make every call fail with `Unavailable` until switched back.
    pub async fn set_down(&self, down: bool) {
        *self.down.write().await = down;
    }

    /// Delay each search by `delay`.
    pub async fn set_search_delay(&self, delay: Duration) {
        *self.search_delay.write().await = delay;
    }

    /// All recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Total number of calls.
    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Number of calls of one operation.
    pub async fn count(&self, operation: BackendOperation) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Add requests received, in order.
    pub async fn add_requests(&self) -> Vec<AddRequest> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Add(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded calls.
    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, call: RecordedCall) -> Result<(), BackendError> {
        let operation = call.operation();
        self.calls.write().await.push(call);

        if *self.down.read().await {
            return Err(BackendError::Unavailable(format!(
                "mock {} is down",
                self.name()
            )));
        }

        let mut errors = self.errors.write().await;
        match errors.get_mut(&operation).and_then(|q| q.pop_front()) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MediaBackend for MockBackend {
    fn name(&self) -> &str {
        match self.kind {
            MediaKind::Series => "mock-sonarr",
            MediaKind::Movie => "mock-radarr",
        }
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn test_connection(&self) -> Result<(), BackendError> {
        self.record(RecordedCall::TestConnection).await
    }

    async fn search(&self, title: &str) -> Result<Vec<Candidate>, BackendError> {
        self.record(RecordedCall::Search {
            title: title.to_string(),
        })
        .await?;

        let delay = *self.search_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let wanted = title.to_lowercase();
        Ok(self
            .results
            .read()
            .await
            .iter()
            .filter(|c| c.title.to_lowercase().contains(&wanted))
            .cloned()
            .collect())
    }

    async fn list_existing(&self) -> Result<HashSet<u64>, BackendError> {
        self.record(RecordedCall::ListExisting).await?;
        Ok(self.library.read().await.clone())
    }

    async fn add(&self, request: &AddRequest) -> Result<AddedTitle, BackendError> {
        self.record(RecordedCall::Add(request.clone())).await?;

        let mut library = self.library.write().await;
        if !library.insert(request.candidate.external_id) {
            return Err(BackendError::AlreadyExists(format!(
                "{} already added",
                request.candidate.title
            )));
        }

        let mut next = self.next_library_id.write().await;
        let library_id = *next;
        *next += 1;

        Ok(AddedTitle {
            library_id,
            title: request.candidate.title.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_search_filters_by_title() {
        let backend = MockBackend::new(MediaKind::Movie);
        backend
            .set_results(vec![
                fixtures::movie("Heat", 1995, 949),
                fixtures::movie("Inception", 2010, 27205),
            ])
            .await;

        let results = backend.search("heat").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].external_id, 949);
        assert_eq!(backend.count(BackendOperation::Search).await, 1);
    }

    #[tokio::test]
    async fn test_add_grows_library() {
        let backend = MockBackend::new(MediaKind::Movie);
        let request = AddRequest {
            candidate: fixtures::movie("Heat", 1995, 949),
            quality_profile_id: 4,
            root_folder: "/movies".to_string(),
        };

        let added = backend.add(&request).await.unwrap();
        assert_eq!(added.library_id, 1);
        assert!(backend.in_library(949).await);

        let again = backend.add(&request).await;
        assert!(matches!(again, Err(BackendError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_queued_errors_are_consumed_in_order() {
        let backend = MockBackend::new(MediaKind::Series);
        backend
            .fail_next(BackendOperation::TestConnection, BackendError::Unavailable("a".into()))
            .await;

        assert!(backend.test_connection().await.is_err());
        assert!(backend.test_connection().await.is_ok());
    }

    #[tokio::test]
    async fn test_down_fails_everything() {
        let backend = MockBackend::new(MediaKind::Series);
        backend.set_down(true).await;
        assert!(backend.search("x").await.is_err());
        assert!(backend.list_existing().await.is_err());

        backend.set_down(false).await;
        assert!(backend.search("x").await.is_ok());
    }
}
