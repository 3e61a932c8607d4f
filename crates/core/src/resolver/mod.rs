//! Request resolution.
//!
//! `RequestResolver` is stateless: it classifies free text into a `Query`,
//! searches the single backend responsible for the query's kind, ranks the
//! candidates, and issues add operations with the configured defaults.
//! Conversation state lives in `crate::conversation`.

mod classify;
mod types;

pub use classify::classify;
pub use types::*;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::{AddRequest, BackendError, Backends, Candidate, MediaBackend};
use crate::metrics::{record_backend_call, ADD_ATTEMPTS};

/// Maximum add calls per confirmation (the first attempt plus one retry).
pub const MAX_ADD_ATTEMPTS: u32 = 2;

/// Pause before the automatic add retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(750);

/// Errors from resolving a request.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The search returned nothing.
    #[error("No results for '{0}'")]
    NoResults(String),

    /// The query has no kind; the user must pick one before searching.
    #[error("Query kind is ambiguous")]
    AmbiguousKind,

    /// The backend failed (unavailable or rejected the request).
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub struct RequestResolver {
    backends: Backends,
    defaults: Defaults,
    max_candidates: usize,
    retry_delay: Duration,
}

impl RequestResolver {
    pub fn new(backends: Backends, defaults: Defaults, max_candidates: usize) -> Self {
        Self {
            backends,
            defaults,
            max_candidates,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Override the pause before the automatic add retry.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Classify free text into a query.
    pub fn classify(&self, text: &str) -> Query {
        classify(text)
    }

    /// Search the backend for the query's kind.
    ///
    /// Only the backend matching `query.kind()` is called. Candidates come
    /// back in backend relevance order with exact title matches first, capped
    /// at `max_candidates`, and stamped with `already_in_library` on a
    /// best-effort basis.
    pub async fn search(&self, query: &Query) -> Result<Vec<Candidate>, ResolveError> {
        let kind = query.kind().ok_or(ResolveError::AmbiguousKind)?;
        let backend = self.backends.for_kind(kind);

        let start = Instant::now();
        let result = backend.search(query.title()).await;
        record_backend_call(
            backend.name(),
            "search",
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );

        let mut candidates = result?;
        candidates.retain(|c| c.kind == kind);
        debug!(
            backend = backend.name(),
            "Search '{}' returned {} candidates",
            query.title(),
            candidates.len()
        );

        if candidates.is_empty() {
            return Err(ResolveError::NoResults(query.title().to_string()));
        }

        let mut ranked = rank_candidates(query.title(), candidates);
        ranked.truncate(self.max_candidates);
        stamp_existing(backend, &mut ranked).await;

        Ok(ranked)
    }

    /// Build the add request for a candidate using the defaults for its kind.
    pub fn add_request(&self, candidate: &Candidate) -> AddRequest {
        let defaults = self.defaults.for_kind(candidate.kind);
        AddRequest {
            candidate: candidate.clone(),
            quality_profile_id: defaults.quality_profile_id,
            root_folder: defaults.root_folder.clone(),
        }
    }

    /// Add a confirmed candidate to its library.
    ///
    /// Skips the add when the candidate is already known to be in the
    /// library, re-checks existence (best effort), then calls `add` with one
    /// automatic retry on a transient failure. `AlreadyExists` from the
    /// backend is reported as `Resolution::AlreadyInLibrary`.
    pub async fn resolve(&self, candidate: &Candidate) -> Result<Resolution, ResolveError> {
        if candidate.already_in_library {
            return Ok(Resolution::AlreadyInLibrary);
        }

        let backend = self.backends.for_kind(candidate.kind);

        let start = Instant::now();
        let exists = backend.exists(candidate.external_id).await;
        record_backend_call(
            backend.name(),
            "exists",
            exists.is_ok(),
            start.elapsed().as_secs_f64(),
        );
        match exists {
            Ok(true) => {
                info!(
                    backend = backend.name(),
                    "'{}' already in library, skipping add", candidate.title
                );
                return Ok(Resolution::AlreadyInLibrary);
            }
            Ok(false) => {}
            Err(e) => warn!(
                backend = backend.name(),
                "Existence check failed, proceeding with add: {}", e
            ),
        }

        let request = self.add_request(candidate);
        let kind = candidate.kind.as_str();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let start = Instant::now();
            let result = backend.add(&request).await;
            record_backend_call(
                backend.name(),
                "add",
                result.is_ok(),
                start.elapsed().as_secs_f64(),
            );

            match result {
                Ok(added) => {
                    ADD_ATTEMPTS.with_label_values(&[kind, "added"]).inc();
                    info!(
                        backend = backend.name(),
                        library_id = added.library_id,
                        "Added '{}' after {} attempt(s)",
                        added.title,
                        attempts
                    );
                    return Ok(Resolution::Added { added, attempts });
                }
                Err(BackendError::AlreadyExists(_)) => {
                    ADD_ATTEMPTS
                        .with_label_values(&[kind, "already_exists"])
                        .inc();
                    return Ok(Resolution::AlreadyInLibrary);
                }
                Err(e) if e.is_transient() && attempts < MAX_ADD_ATTEMPTS => {
                    ADD_ATTEMPTS.with_label_values(&[kind, "unavailable"]).inc();
                    warn!(
                        backend = backend.name(),
                        "Add attempt {} failed, retrying: {}", attempts, e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    let label = if e.is_transient() {
                        "unavailable"
                    } else {
                        "rejected"
                    };
                    ADD_ATTEMPTS.with_label_values(&[kind, label]).inc();
                    warn!(
                        backend = backend.name(),
                        "Add failed after {} attempt(s): {}", attempts, e
                    );
                    return Err(e.into());
                }
            }
        }
    }
}

/// Move exact case-insensitive title matches to the front, keeping backend
/// order otherwise.
pub fn rank_candidates(title: &str, mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    let wanted = title.trim().to_lowercase();
    candidates.sort_by_key(|c| c.title.trim().to_lowercase() != wanted);
    candidates
}

/// Mark candidates already in the library. Failures leave the flags as-is.
async fn stamp_existing(backend: &Arc<dyn MediaBackend>, candidates: &mut [Candidate]) {
    let start = Instant::now();
    let existing = backend.list_existing().await;
    record_backend_call(
        backend.name(),
        "list_existing",
        existing.is_ok(),
        start.elapsed().as_secs_f64(),
    );

    match existing {
        Ok(ids) => {
            for candidate in candidates.iter_mut() {
                if ids.contains(&candidate.external_id) {
                    candidate.already_in_library = true;
                }
            }
        }
        Err(e) => warn!(
            backend = backend.name(),
            "Library listing failed, presenting candidates without library state: {}", e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MediaKind;
    use crate::testing::{fixtures, BackendOperation, MockBackend};

    struct Harness {
        series: Arc<MockBackend>,
        movie: Arc<MockBackend>,
        resolver: RequestResolver,
    }

    fn harness() -> Harness {
        let series = Arc::new(MockBackend::new(MediaKind::Series));
        let movie = Arc::new(MockBackend::new(MediaKind::Movie));
        let resolver = RequestResolver::new(
            Backends::new(series.clone(), movie.clone()),
            fixtures::defaults(),
            10,
        )
        .with_retry_delay(Duration::ZERO);
        Harness {
            series,
            movie,
            resolver,
        }
    }

    #[test]
    fn test_rank_exact_match_first_stable() {
        let ranked = rank_candidates(
            "the office",
            vec![
                fixtures::series("The Office (US)", 2005, 1),
                fixtures::series("The Office", 2001, 2),
                fixtures::series("Office Space", 1999, 3),
                fixtures::series("THE OFFICE", 2019, 4),
            ],
        );
        let ids: Vec<u64> = ranked.iter().map(|c| c.external_id).collect();
        assert_eq!(ids, vec![2, 4, 1, 3]);
    }

    #[tokio::test]
    async fn test_search_only_calls_backend_for_kind() {
        let h = harness();
        h.series
            .set_results(vec![fixtures::series("The Office", 2005, 73244)])
            .await;

        let query = Query::new("show The Office", "The Office", Some(MediaKind::Series));
        let candidates = h.resolver.search(&query).await.unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(h.series.count(BackendOperation::Search).await, 1);
        assert_eq!(h.movie.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_search_ambiguous_kind_is_rejected() {
        let h = harness();
        let query = Query::new("Fargo", "Fargo", None);
        let result = h.resolver.search(&query).await;
        assert!(matches!(result, Err(ResolveError::AmbiguousKind)));
        assert_eq!(h.series.call_count().await, 0);
        assert_eq!(h.movie.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_search_no_results() {
        let h = harness();
        let query = Query::new("movie Nope", "Nope", Some(MediaKind::Movie));
        let result = h.resolver.search(&query).await;
        assert!(matches!(result, Err(ResolveError::NoResults(_))));
    }

    #[tokio::test]
    async fn test_search_unavailable() {
        let h = harness();
        h.movie
            .fail_next(
                BackendOperation::Search,
                BackendError::Unavailable("connection refused".into()),
            )
            .await;
        let query = Query::new("movie Heat", "Heat", Some(MediaKind::Movie));
        let result = h.resolver.search(&query).await;
        assert!(matches!(
            result,
            Err(ResolveError::Backend(BackendError::Unavailable(_)))
        ));
    }

    #[tokio::test]
    async fn test_search_stamps_library_state() {
        let h = harness();
        h.movie
            .set_results(vec![
                fixtures::movie("Heat", 1995, 949),
                fixtures::movie("Heat", 1986, 10000),
            ])
            .await;
        h.movie.add_to_library(949).await;

        let query = Query::new("movie Heat", "Heat", Some(MediaKind::Movie));
        let candidates = h.resolver.search(&query).await.unwrap();
        assert!(candidates[0].already_in_library);
        assert!(!candidates[1].already_in_library);
    }

    #[tokio::test]
    async fn test_search_survives_library_listing_failure() {
        let h = harness();
        h.movie
            .set_results(vec![fixtures::movie("Heat", 1995, 949)])
            .await;
        h.movie.add_to_library(949).await;
        h.movie
            .fail_next(
                BackendOperation::ListExisting,
                BackendError::Unavailable("timeout".into()),
            )
            .await;

        let query = Query::new("movie Heat", "Heat", Some(MediaKind::Movie));
        let candidates = h.resolver.search(&query).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(!candidates[0].already_in_library);
    }

    #[tokio::test]
    async fn test_search_truncates_to_max_candidates() {
        let series = Arc::new(MockBackend::new(MediaKind::Series));
        let movie = Arc::new(MockBackend::new(MediaKind::Movie));
        let resolver = RequestResolver::new(
            Backends::new(series.clone(), movie),
            fixtures::defaults(),
            3,
        );
        series
            .set_results((1..=8).map(|i| fixtures::series("Star Trek", 1960 + i as u32, i)).collect())
            .await;

        let query = Query::new("tv Star Trek", "Star Trek", Some(MediaKind::Series));
        let candidates = resolver.search(&query).await.unwrap();
        assert_eq!(candidates.len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_uses_defaults_for_kind() {
        let h = harness();
        let candidate = fixtures::movie("Inception", 2010, 27205);

        let resolution = h.resolver.resolve(&candidate).await.unwrap();
        assert!(matches!(resolution, Resolution::Added { attempts: 1, .. }));

        let adds = h.movie.add_requests().await;
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].quality_profile_id, 4);
        assert_eq!(adds[0].root_folder, "/movies");
        assert_eq!(h.series.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_resolve_skips_add_when_flagged() {
        let h = harness();
        let mut candidate = fixtures::series("The Office", 2005, 73244);
        candidate.already_in_library = true;

        let resolution = h.resolver.resolve(&candidate).await.unwrap();
        assert_eq!(resolution, Resolution::AlreadyInLibrary);
        assert_eq!(h.series.count(BackendOperation::Add).await, 0);
    }

    #[tokio::test]
    async fn test_resolve_skips_add_when_exists_check_finds_title() {
        let h = harness();
        h.series.add_to_library(73244).await;
        let candidate = fixtures::series("The Office", 2005, 73244);

        let resolution = h.resolver.resolve(&candidate).await.unwrap();
        assert_eq!(resolution, Resolution::AlreadyInLibrary);
        assert_eq!(h.series.count(BackendOperation::Add).await, 0);
    }

    #[tokio::test]
    async fn test_resolve_adds_when_exists_check_fails() {
        let h = harness();
        h.movie
            .fail_next(
                BackendOperation::ListExisting,
                BackendError::Unavailable("connection reset".into()),
            )
            .await;
        let candidate = fixtures::movie("Heat", 1995, 949);

        let resolution = h.resolver.resolve(&candidate).await.unwrap();
        assert!(matches!(resolution, Resolution::Added { attempts: 1, .. }));
        assert_eq!(h.movie.count(BackendOperation::ListExisting).await, 1);
        assert_eq!(h.movie.count(BackendOperation::Add).await, 1);
        assert!(h.movie.in_library(949).await);
    }

    #[tokio::test]
    async fn test_resolve_retries_once_on_unavailable() {
        let h = harness();
        h.movie
            .fail_next(BackendOperation::Add, BackendError::Unavailable("502".into()))
            .await;
        let candidate = fixtures::movie("Heat", 1995, 949);

        let resolution = h.resolver.resolve(&candidate).await.unwrap();
        assert!(matches!(resolution, Resolution::Added { attempts: 2, .. }));
        assert_eq!(h.movie.count(BackendOperation::Add).await, 2);
    }

    #[tokio::test]
    async fn test_resolve_gives_up_after_two_attempts() {
        let h = harness();
        for _ in 0..3 {
            h.movie
                .fail_next(BackendOperation::Add, BackendError::Unavailable("502".into()))
                .await;
        }
        let candidate = fixtures::movie("Heat", 1995, 949);

        let result = h.resolver.resolve(&candidate).await;
        assert!(matches!(
            result,
            Err(ResolveError::Backend(BackendError::Unavailable(_)))
        ));
        assert_eq!(h.movie.count(BackendOperation::Add).await, MAX_ADD_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_resolve_already_exists_is_not_retried() {
        let h = harness();
        h.series
            .fail_next(
                BackendOperation::Add,
                BackendError::AlreadyExists("SeriesExistsValidator".into()),
            )
            .await;
        let candidate = fixtures::series("Dark", 2017, 334824);

        let resolution = h.resolver.resolve(&candidate).await.unwrap();
        assert_eq!(resolution, Resolution::AlreadyInLibrary);
        assert_eq!(h.series.count(BackendOperation::Add).await, 1);
    }

    #[tokio::test]
    async fn test_resolve_rejected_is_not_retried() {
        let h = harness();
        h.series
            .fail_next(
                BackendOperation::Add,
                BackendError::Rejected("root folder missing".into()),
            )
            .await;
        let candidate = fixtures::series("Dark", 2017, 334824);

        let result = h.resolver.resolve(&candidate).await;
        assert!(matches!(
            result,
            Err(ResolveError::Backend(BackendError::Rejected(_)))
        ));
        assert_eq!(h.series.count(BackendOperation::Add).await, 1);
    }
}
