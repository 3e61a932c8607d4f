//! Chat conversation state machine.
//!
//! Each chat has at most one `Session`. A chat without a session is idle.
//!
//! ```text
//! idle --ambiguous title--> awaiting_kind --kind--> awaiting_selection
//! idle --title with kind--> awaiting_selection --number--> awaiting_confirmation
//! awaiting_confirmation --yes--> done (session removed)
//! ```
//!
//! A new query in any state replaces the session. `/cancel` drops it, and
//! sessions older than the idle timeout are dropped lazily on the next
//! message or by the background sweeper.

mod engine;
mod input;
mod reply;
mod session;
mod table;

pub use engine::ConversationEngine;
pub use input::{interpret, parse_command, parse_kind_choice, parse_selection, Action, Command};
pub use reply::{BackendStatus, Reply};
pub use session::{ChatId, Session, SessionState, StateName};
pub use table::{ChatSlot, ExpiredSession, SessionSlot, SessionTable};

use thiserror::Error;

use crate::resolver::ResolveError;
use crate::voice::AudioPayload;

/// One inbound chat message.
#[derive(Debug, Clone)]
pub enum Inbound {
    Text(String),
    Voice(AudioPayload),
}

/// Unexpected failures while handling a message.
///
/// Expected outcomes (no results, unavailable backend, rejected add) are
/// replies, not errors.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Session invariant violated: {0}")]
    Invariant(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl ConversationError {
    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            ConversationError::Invariant(_) => "invariant",
            ConversationError::Resolve(_) => "resolve",
        }
    }
}
