//! Per-chat conversation state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{Candidate, MediaKind};
use crate::resolver::Query;

use super::ConversationError;

/// Chat identifier assigned by the chat frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a session is in the request flow.
///
/// There is no `Idle` or `Done` variant: a chat without a session is idle,
/// and a finished session is removed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the user to say whether the title is a show or a movie.
    AwaitingKind,
    /// Candidates were shown; waiting for a number.
    AwaitingSelection { candidates: Vec<Candidate> },
    /// One candidate was picked; waiting for yes/no (or /retry after a
    /// failed add).
    AwaitingConfirmation {
        candidate: Candidate,
        failed_attempts: u32,
    },
}

/// Flat state name for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateName {
    Idle,
    AwaitingKind,
    AwaitingSelection,
    AwaitingConfirmation,
}

impl StateName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateName::Idle => "idle",
            StateName::AwaitingKind => "awaiting_kind",
            StateName::AwaitingSelection => "awaiting_selection",
            StateName::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

impl SessionState {
    pub fn name(&self) -> StateName {
        match self {
            SessionState::AwaitingKind => StateName::AwaitingKind,
            SessionState::AwaitingSelection { .. } => StateName::AwaitingSelection,
            SessionState::AwaitingConfirmation { .. } => StateName::AwaitingConfirmation,
        }
    }
}

/// An in-progress request for one chat.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: Uuid,
    query: Query,
    #[serde(flatten)]
    state: SessionState,
    created_at: DateTime<Utc>,
}

impl Session {
    /// A session waiting for the user to pick a kind.
    pub fn awaiting_kind(query: Query, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            query,
            state: SessionState::AwaitingKind,
            created_at,
        }
    }

    /// A session presenting candidates.
    ///
    /// Every candidate must match the query's kind.
    pub fn awaiting_selection(
        query: Query,
        candidates: Vec<Candidate>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ConversationError> {
        let kind = query
            .kind()
            .ok_or_else(|| ConversationError::Invariant("selection without a kind".into()))?;
        check_kind(kind, &candidates)?;
        Ok(Self {
            id: Uuid::new_v4(),
            query,
            state: SessionState::AwaitingSelection { candidates },
            created_at,
        })
    }

    /// Replace the query (after a kind choice) and present candidates,
    /// keeping the session id and creation time.
    pub fn present(
        &mut self,
        query: Query,
        candidates: Vec<Candidate>,
    ) -> Result<(), ConversationError> {
        let kind = query
            .kind()
            .ok_or_else(|| ConversationError::Invariant("selection without a kind".into()))?;
        check_kind(kind, &candidates)?;
        self.query = query;
        self.state = SessionState::AwaitingSelection { candidates };
        Ok(())
    }

    /// Narrow the session to one candidate awaiting confirmation.
    pub fn select(&mut self, candidate: Candidate) -> Result<(), ConversationError> {
        if Some(candidate.kind) != self.query.kind() {
            return Err(ConversationError::Invariant(format!(
                "selected {} candidate in a {:?} session",
                candidate.kind,
                self.query.kind()
            )));
        }
        self.state = SessionState::AwaitingConfirmation {
            candidate,
            failed_attempts: 0,
        };
        Ok(())
    }

    /// Record a failed add while awaiting confirmation and return the
    /// number of failed confirmations so far.
    pub fn record_failed_add(&mut self) -> u32 {
        match &mut self.state {
            SessionState::AwaitingConfirmation {
                failed_attempts, ..
            } => {
                *failed_attempts += 1;
                *failed_attempts
            }
            _ => 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The kind of every candidate in this session, if decided.
    pub fn kind(&self) -> Option<MediaKind> {
        self.query.kind()
    }

    /// Candidates currently held (empty while awaiting a kind).
    pub fn candidates(&self) -> &[Candidate] {
        match &self.state {
            SessionState::AwaitingKind => &[],
            SessionState::AwaitingSelection { candidates } => candidates,
            SessionState::AwaitingConfirmation { candidate, .. } => std::slice::from_ref(candidate),
        }
    }

    /// Whether the session is older than `timeout` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.created_at >= timeout
    }
}

fn check_kind(kind: MediaKind, candidates: &[Candidate]) -> Result<(), ConversationError> {
    match candidates.iter().find(|c| c.kind != kind) {
        Some(stray) => Err(ConversationError::Invariant(format!(
            "{} candidate '{}' in a {} session",
            stray.kind, stray.title, kind
        ))),
        None => Ok(()),
    }
}
