//! Session storage keyed by chat.
//!
//! Each chat owns a slot guarded by its own async mutex. The engine holds
//! the slot lock for the whole of a message, so messages from one chat are
//! processed one at a time in arrival order while other chats proceed
//! independently. The map lock is only held to look up or insert a slot.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};

use super::{ChatId, Session, SessionState};

/// A session dropped by the sweeper, kept until the chat speaks again so
/// that a late answer can be told the request expired.
#[derive(Debug, Clone)]
pub struct ExpiredSession {
    pub state: SessionState,
    pub expired_at: DateTime<Utc>,
}

/// Per-chat state: the live session, or the marker of one that expired.
#[derive(Debug, Clone, Default)]
pub struct ChatSlot {
    pub session: Option<Session>,
    pub expired: Option<ExpiredSession>,
}

impl ChatSlot {
    fn is_empty(&self) -> bool {
        self.session.is_none() && self.expired.is_none()
    }
}

pub type SessionSlot = Arc<Mutex<ChatSlot>>;

#[derive(Debug, Default)]
pub struct SessionTable {
    slots: RwLock<HashMap<ChatId, SessionSlot>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for a chat, created empty on first use.
    pub async fn slot(&self, chat: ChatId) -> SessionSlot {
        if let Some(slot) = self.slots.read().await.get(&chat) {
            return slot.clone();
        }
        self.slots.write().await.entry(chat).or_default().clone()
    }

    /// Copy of the chat's session, waiting for any message in flight.
    pub async fn get(&self, chat: ChatId) -> Option<Session> {
        let slot = self.slots.read().await.get(&chat).cloned()?;
        let guard = slot.lock().await;
        guard.session.clone()
    }

    /// Number of chats with a session. Chats busy with a message count as
    /// active.
    pub async fn active_count(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| match slot.try_lock() {
                Ok(guard) => guard.session.is_some(),
                Err(_) => true,
            })
            .count()
    }

    /// Drop sessions older than `timeout` and forget empty slots.
    ///
    /// An expired session leaves a marker behind, itself forgotten once it
    /// is older than `timeout`. Slots locked by a message in flight are
    /// skipped; the engine checks expiry itself when it processes the
    /// message. Returns the number of sessions dropped.
    pub async fn sweep(&self, now: DateTime<Utc>, timeout: Duration) -> usize {
        let mut expired = 0;
        self.slots.write().await.retain(|_, slot| {
            let keep = match slot.try_lock() {
                Ok(mut guard) => {
                    if let Some(session) = guard
                        .session
                        .take_if(|session| session.is_expired(now, timeout))
                    {
                        guard.expired = Some(ExpiredSession {
                            state: session.state().clone(),
                            expired_at: now,
                        });
                        expired += 1;
                    }
                    if guard
                        .expired
                        .as_ref()
                        .is_some_and(|marker| now - marker.expired_at >= timeout)
                    {
                        guard.expired = None;
                    }
                    !guard.is_empty()
                }
                Err(_) => true,
            };
            // A handle held elsewhere means a message is about to lock it.
            keep || Arc::strong_count(slot) > 1
        });
        expired
    }
}
