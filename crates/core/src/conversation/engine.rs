//! The conversation engine: one state machine step per inbound message.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendError, MediaKind};
use crate::metrics::{MESSAGES_HANDLED, MESSAGE_FAILURES, SESSION_OUTCOMES, TRANSCRIPTIONS};
use crate::resolver::{Query, RequestResolver, ResolveError, Resolution};
use crate::voice::{AudioPayload, VoiceBridge, VoiceError};

use super::input::{interpret, is_cancel, parse_command, Action, Command};
use super::{
    BackendStatus, ChatId, ConversationError, Inbound, Reply, Session, SessionState, SessionTable,
    StateName,
};

pub struct ConversationEngine {
    resolver: RequestResolver,
    voice: VoiceBridge,
    sessions: SessionTable,
    idle_timeout: chrono::Duration,
}

impl ConversationEngine {
    pub fn new(resolver: RequestResolver, voice: VoiceBridge, idle_timeout: Duration) -> Self {
        let idle_timeout =
            chrono::Duration::from_std(idle_timeout).unwrap_or_else(|_| chrono::Duration::days(1));
        Self {
            resolver,
            voice,
            sessions: SessionTable::new(),
            idle_timeout,
        }
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice.is_available()
    }

    /// Handle one inbound message and produce exactly one reply.
    ///
    /// Unexpected errors are logged and answered with a generic failure; the
    /// chat's session is left as it was before the message.
    pub async fn handle(&self, chat: ChatId, inbound: Inbound) -> Reply {
        match self.process(chat, inbound).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(chat_id = %chat, "Failed to handle message: {}", e);
                MESSAGE_FAILURES.with_label_values(&[e.reason()]).inc();
                Reply::InternalError
            }
        }
    }

    pub async fn handle_text(&self, chat: ChatId, text: &str) -> Reply {
        self.handle(chat, Inbound::Text(text.to_string())).await
    }

    pub async fn handle_voice(&self, chat: ChatId, audio: AudioPayload) -> Reply {
        self.handle(chat, Inbound::Voice(audio)).await
    }

    /// Drop the chat's session, as `/cancel` would.
    pub async fn cancel(&self, chat: ChatId) -> Reply {
        self.handle_text(chat, "/cancel").await
    }

    /// Current session of a chat, if any.
    pub async fn session(&self, chat: ChatId) -> Option<Session> {
        self.sessions.get(chat).await
    }

    /// Current state of a chat.
    pub async fn state(&self, chat: ChatId) -> StateName {
        self.session(chat)
            .await
            .map(|s| s.state().name())
            .unwrap_or(StateName::Idle)
    }

    pub async fn active_sessions(&self) -> usize {
        self.sessions.active_count().await
    }

    /// Drop sessions that outlived the idle timeout.
    pub async fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Utc::now()).await
    }

    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> usize {
        let expired = self.sessions.sweep(now, self.idle_timeout).await;
        if expired > 0 {
            SESSION_OUTCOMES
                .with_label_values(&["expired"])
                .inc_by(expired as u64);
            info!("Expired {} idle session(s)", expired);
        }
        expired
    }

    /// Run `sweep_expired` every `interval` until shutdown.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        engine.sweep_expired().await;
                    }
                    _ = shutdown.recv() => {
                        debug!("Session sweeper stopping");
                        break;
                    }
                }
            }
        })
    }

    async fn process(&self, chat: ChatId, inbound: Inbound) -> Result<Reply, ConversationError> {
        let handle = self.sessions.slot(chat).await;
        let mut slot = handle.lock().await;

        let (text, heard) = match inbound {
            Inbound::Text(text) => {
                let input = if text.trim_start().starts_with('/') {
                    "command"
                } else {
                    "text"
                };
                MESSAGES_HANDLED.with_label_values(&[input]).inc();
                (text, None)
            }
            Inbound::Voice(audio) => {
                MESSAGES_HANDLED.with_label_values(&["voice"]).inc();
                match self.voice.transcribe(&audio).await {
                    Ok(text) => {
                        TRANSCRIPTIONS.with_label_values(&["success"]).inc();
                        debug!(chat_id = %chat, "Transcribed voice message: {}", text);
                        (text.clone(), Some(text))
                    }
                    Err(VoiceError::Disabled(reason)) => {
                        TRANSCRIPTIONS.with_label_values(&["disabled"]).inc();
                        debug!(chat_id = %chat, "Voice message ignored: {}", reason);
                        return Ok(Reply::VoiceDisabled);
                    }
                    Err(VoiceError::TranscriptionFailed(reason)) => {
                        TRANSCRIPTIONS.with_label_values(&["failed"]).inc();
                        warn!(chat_id = %chat, "Transcription failed: {}", reason);
                        return Ok(Reply::TranscriptionFailed);
                    }
                }
            }
        };

        // Work on a copy so an error leaves the stored session untouched.
        let mut working = slot.session.clone();
        let swept = slot.expired.as_ref().map(|marker| marker.state.clone());
        let reply = self
            .step(chat, &mut working, swept, &text, Utc::now())
            .await?;
        slot.session = working;
        slot.expired = None;

        Ok(match heard {
            Some(text) => Reply::Transcribed {
                text,
                reply: Box::new(reply),
            },
            None => reply,
        })
    }

    /// `swept` is the state of a session the sweeper dropped since the
    /// chat's last message.
    async fn step(
        &self,
        chat: ChatId,
        session: &mut Option<Session>,
        mut swept: Option<SessionState>,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, ConversationError> {
        let text = text.trim();

        if let Some(expired) = session.take_if(|s| s.is_expired(now, self.idle_timeout)) {
            SESSION_OUTCOMES.with_label_values(&["expired"]).inc();
            info!(
                chat_id = %chat,
                session_id = %expired.id(),
                "Session expired in state {}",
                expired.state().name().as_str()
            );
            swept = Some(expired.state().clone());
        }

        // Answers meant for an expired session are told so, not taken as a
        // new request.
        if let Some(state) = swept {
            let bound = match parse_command(text) {
                Some(Command::Retry) | Some(Command::Cancel) => true,
                Some(_) => false,
                None => is_cancel(text) || interpret(text, &state).is_session_bound(),
            };
            if bound {
                debug!(chat_id = %chat, "Input '{}' arrived after expiry", text);
                return Ok(Reply::SessionExpired);
            }
        }

        if let Some(command) = parse_command(text) {
            return self.run_command(chat, session, command, text, now).await;
        }

        if text.is_empty() {
            return Ok(Reply::MissingTitle(None));
        }

        if is_cancel(text) {
            return Ok(cancel(chat, session));
        }

        let action = match session.as_ref() {
            Some(s) => interpret(text, s.state()),
            None => Action::NewQuery,
        };

        match action {
            Action::NewQuery => {
                let query = self.resolver.classify(text);
                self.new_query(chat, session, query, now).await
            }
            Action::ChooseKind(kind) => self.choose_kind(chat, session, kind).await,
            Action::Select(n) => select(chat, session, n, text),
            Action::Confirm => self.confirm(chat, session).await,
            Action::Decline => Ok(cancel(chat, session)),
        }
    }

    async fn run_command(
        &self,
        chat: ChatId,
        session: &mut Option<Session>,
        command: Command,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Reply, ConversationError> {
        match command {
            Command::Help => Ok(Reply::Help {
                voice_enabled: self.voice_enabled(),
            }),
            Command::Status => Ok(self.status(session.as_ref()).await),
            Command::Cancel => Ok(cancel(chat, session)),
            Command::Retry => match session.as_ref().map(|s| s.state()) {
                Some(SessionState::AwaitingConfirmation { .. }) => {
                    self.confirm(chat, session).await
                }
                _ => Ok(Reply::NothingToRetry),
            },
            Command::Request { kind, title } => {
                let query = Query::new(text, title, Some(kind));
                self.new_query(chat, session, query, now).await
            }
            Command::MissingTitle(kind) => Ok(Reply::MissingTitle(Some(kind))),
            Command::Unknown(name) => Ok(Reply::UnknownCommand(name)),
        }
    }

    async fn status(&self, session: Option<&Session>) -> Reply {
        let backends = self.resolver.backends().all();
        let probes = join_all(backends.iter().map(|b| b.test_connection())).await;
        let backends: Vec<BackendStatus> = backends
            .iter()
            .zip(probes)
            .map(|(backend, result)| BackendStatus {
                name: backend.name().to_string(),
                kind: backend.kind(),
                error: result.err().map(|e| e.to_string()),
            })
            .collect();

        Reply::Status {
            backends,
            voice_enabled: self.voice_enabled(),
            active_request: session.map(|s| {
                format!(
                    "\"{}\" ({})",
                    s.query().title(),
                    s.state().name().as_str()
                )
            }),
        }
    }

    /// Start a new request, replacing any session in progress.
    async fn new_query(
        &self,
        chat: ChatId,
        session: &mut Option<Session>,
        query: Query,
        now: DateTime<Utc>,
    ) -> Result<Reply, ConversationError> {
        if query.title().is_empty() {
            return Ok(Reply::MissingTitle(query.kind()));
        }

        if let Some(old) = session.take() {
            SESSION_OUTCOMES.with_label_values(&["replaced"]).inc();
            info!(
                chat_id = %chat,
                session_id = %old.id(),
                "New query '{}' replaces session in state {}",
                query.title(),
                old.state().name().as_str()
            );
        }

        let kind = match query.kind() {
            Some(kind) => kind,
            None => {
                debug!(chat_id = %chat, "Asking for kind of '{}'", query.title());
                let title = query.title().to_string();
                *session = Some(Session::awaiting_kind(query, now));
                return Ok(Reply::KindPrompt { title });
            }
        };

        match self.resolver.search(&query).await {
            Ok(candidates) => {
                let reply = Reply::Candidates {
                    title: query.title().to_string(),
                    kind,
                    candidates: candidates.clone(),
                };
                let created = Session::awaiting_selection(query, candidates, now)?;
                info!(
                    chat_id = %chat,
                    session_id = %created.id(),
                    "Presenting {} {} candidate(s)",
                    created.candidates().len(),
                    kind
                );
                *session = Some(created);
                Ok(reply)
            }
            Err(e) => self.search_failed(chat, &query, kind, e),
        }
    }

    /// Re-run the pending query scoped to the kind the user picked.
    async fn choose_kind(
        &self,
        chat: ChatId,
        session: &mut Option<Session>,
        kind: MediaKind,
    ) -> Result<Reply, ConversationError> {
        let current = session
            .as_mut()
            .ok_or_else(|| ConversationError::Invariant("kind choice without a session".into()))?;
        let query = current.query().with_kind(kind);

        match self.resolver.search(&query).await {
            Ok(candidates) => {
                let reply = Reply::Candidates {
                    title: query.title().to_string(),
                    kind,
                    candidates: candidates.clone(),
                };
                current.present(query, candidates)?;
                Ok(reply)
            }
            Err(e) => {
                *session = None;
                self.search_failed(chat, &query, kind, e)
            }
        }
    }

    fn search_failed(
        &self,
        chat: ChatId,
        query: &Query,
        kind: MediaKind,
        error: ResolveError,
    ) -> Result<Reply, ConversationError> {
        match error {
            ResolveError::NoResults(_) => {
                SESSION_OUTCOMES.with_label_values(&["no_results"]).inc();
                info!(chat_id = %chat, "No {} results for '{}'", kind, query.title());
                Ok(Reply::NoResults {
                    title: query.title().to_string(),
                    kind,
                })
            }
            ResolveError::Backend(e) => {
                SESSION_OUTCOMES.with_label_values(&["failed"]).inc();
                warn!(chat_id = %chat, "Search for '{}' failed: {}", query.title(), e);
                Ok(Reply::BackendUnavailable { kind })
            }
            other => Err(other.into()),
        }
    }

    /// Add the candidate awaiting confirmation.
    async fn confirm(
        &self,
        chat: ChatId,
        session: &mut Option<Session>,
    ) -> Result<Reply, ConversationError> {
        let candidate = match session.as_ref().map(|s| s.state()) {
            Some(SessionState::AwaitingConfirmation { candidate, .. }) => candidate.clone(),
            _ => {
                return Err(ConversationError::Invariant(
                    "confirmation without a selected candidate".into(),
                ))
            }
        };

        match self.resolver.resolve(&candidate).await {
            Ok(Resolution::Added { added, .. }) => {
                *session = None;
                SESSION_OUTCOMES.with_label_values(&["done"]).inc();
                Ok(Reply::Added {
                    title: added.title,
                    kind: candidate.kind,
                })
            }
            Ok(Resolution::AlreadyInLibrary) => {
                *session = None;
                SESSION_OUTCOMES.with_label_values(&["done"]).inc();
                Ok(Reply::AlreadyInLibrary(candidate))
            }
            Err(ResolveError::Backend(e @ BackendError::Unavailable(_))) => {
                let failed_attempts = session
                    .as_mut()
                    .map(|s| s.record_failed_add())
                    .unwrap_or(1);
                warn!(
                    chat_id = %chat,
                    "Add of '{}' failed ({} time(s)), keeping session: {}",
                    candidate.title,
                    failed_attempts,
                    e
                );
                Ok(Reply::AddFailed {
                    candidate,
                    reason: "the library manager is unavailable".to_string(),
                    failed_attempts,
                })
            }
            Err(ResolveError::Backend(e)) => {
                *session = None;
                SESSION_OUTCOMES.with_label_values(&["failed"]).inc();
                warn!(chat_id = %chat, "Add of '{}' rejected: {}", candidate.title, e);
                Ok(Reply::AddRejected {
                    candidate,
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Pick candidate `n` (1-based) from the presented list.
fn select(
    chat: ChatId,
    session: &mut Option<Session>,
    n: usize,
    input: &str,
) -> Result<Reply, ConversationError> {
    let current = session
        .as_mut()
        .ok_or_else(|| ConversationError::Invariant("selection without a session".into()))?;
    let candidates = current.candidates();

    if n == 0 || n > candidates.len() {
        debug!(chat_id = %chat, "Selection {} out of range 1..={}", n, candidates.len());
        return Ok(Reply::InvalidSelection {
            input: input.to_string(),
            max: candidates.len(),
        });
    }

    let candidate = candidates[n - 1].clone();
    if candidate.already_in_library {
        *session = None;
        SESSION_OUTCOMES.with_label_values(&["done"]).inc();
        info!(chat_id = %chat, "'{}' already in library, no add", candidate.title);
        return Ok(Reply::AlreadyInLibrary(candidate));
    }

    current.select(candidate.clone())?;
    Ok(Reply::ConfirmPrompt(candidate))
}

fn cancel(chat: ChatId, session: &mut Option<Session>) -> Reply {
    match session.take() {
        Some(old) => {
            SESSION_OUTCOMES.with_label_values(&["cancelled"]).inc();
            info!(chat_id = %chat, session_id = %old.id(), "Session cancelled");
            Reply::Cancelled
        }
        None => Reply::NothingToCancel,
    }
}
