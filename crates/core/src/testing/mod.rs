//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the backend and speech
//! traits, allowing conversation tests without Sonarr, Radarr or a speech
//! service.
//!
//! # Example
//!
//! ```rust,ignore
//! use mediarequest_core::testing::{fixtures, MockBackend, MockTranscriber};
//!
//! let sonarr = Arc::new(MockBackend::new(MediaKind::Series));
//! let radarr = Arc::new(MockBackend::new(MediaKind::Movie));
//! sonarr.set_results(vec![fixtures::series("The Office", 2005, 73244)]).await;
//!
//! let engine = fixtures::engine(sonarr.clone(), radarr.clone(), VoiceBridge::unavailable("off"));
//! ```

mod mock_backend;
mod mock_transcriber;

pub use mock_backend::{BackendOperation, MockBackend, RecordedCall};
pub use mock_transcriber::MockTranscriber;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::backend::{Backends, Candidate, MediaKind};
    use crate::conversation::ConversationEngine;
    use crate::resolver::{Defaults, MediaDefaults, RequestResolver};
    use crate::voice::VoiceBridge;

    use super::MockBackend;

    fn candidate(kind: MediaKind, title: &str, year: u32, external_id: u64) -> Candidate {
        Candidate {
            title: title.to_string(),
            external_id,
            year: Some(year),
            kind,
            already_in_library: false,
            overview: Some(format!("About {}.", title)),
            lookup: serde_json::Value::Null,
        }
    }

    /// Create a series candidate.
    pub fn series(title: &str, year: u32, tvdb_id: u64) -> Candidate {
        candidate(MediaKind::Series, title, year, tvdb_id)
    }

    /// Create a movie candidate.
    pub fn movie(title: &str, year: u32, tmdb_id: u64) -> Candidate {
        candidate(MediaKind::Movie, title, year, tmdb_id)
    }

    /// Add defaults: profile 1 into /tv for series, profile 4 into /movies.
    pub fn defaults() -> Defaults {
        Defaults::new(
            MediaDefaults {
                quality_profile_id: 1,
                root_folder: "/tv".to_string(),
            },
            MediaDefaults {
                quality_profile_id: 4,
                root_folder: "/movies".to_string(),
            },
        )
    }

    /// Resolver over two mock backends with no retry delay.
    pub fn resolver(series: Arc<MockBackend>, movie: Arc<MockBackend>) -> RequestResolver {
        RequestResolver::new(Backends::new(series, movie), defaults(), 10)
            .with_retry_delay(Duration::ZERO)
    }

    /// Engine over two mock backends with a five minute idle timeout.
    pub fn engine(
        series: Arc<MockBackend>,
        movie: Arc<MockBackend>,
        voice: VoiceBridge,
    ) -> ConversationEngine {
        ConversationEngine::new(resolver(series, movie), voice, Duration::from_secs(300))
    }
}
