//! Chat API handlers.
//!
//! Each inbound message runs in its own task so that a panic while handling
//! one chat is answered with the generic failure reply instead of dropping
//! the connection.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use mediarequest_core::{
    metrics::MESSAGE_FAILURES, AudioPayload, Candidate, ChatId, Inbound, MediaKind, Reply,
    StateName,
};

use super::ErrorResponse;
use crate::metrics::CHAT_REPLIES_TOTAL;
use crate::state::AppState;

/// Longest accepted text message, in characters.
const MAX_TEXT_CHARS: usize = 4096;

/// MIME type assumed when the upload does not name one.
const DEFAULT_AUDIO_MIME: &str = "audio/ogg";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a text message
#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub text: String,
}

/// The bot's answer to one message
#[derive(Debug, Serialize)]
pub struct ChatReplyResponse {
    pub chat_id: ChatId,
    /// Rendered reply text
    pub reply: String,
    /// Stable reply identifier, e.g. "candidates" or "added"
    pub reply_kind: String,
    /// Chat state after the message
    pub state: StateName,
}

/// Pending query in a session snapshot
#[derive(Debug, Serialize)]
pub struct QueryView {
    pub text: String,
    pub title: String,
    pub kind: Option<MediaKind>,
}

/// Current session of a chat
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub chat_id: ChatId,
    pub state: StateName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryView>,
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle a text message
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    Json(body): Json<MessageBody>,
) -> Result<Json<ChatReplyResponse>, impl IntoResponse> {
    if body.text.chars().count() > MAX_TEXT_CHARS {
        return Err((
            StatusCode::PAYLOAD_TOO_LARGE,
            Json(ErrorResponse {
                error: format!("Message exceeds {} characters", MAX_TEXT_CHARS),
            }),
        ));
    }

    let chat = ChatId(chat_id);
    let reply = dispatch(&state, chat, Inbound::Text(body.text)).await;
    Ok(Json(respond(&state, chat, reply).await))
}

/// Handle a voice message (multipart field `audio`, optional field `mime`)
pub async fn post_voice(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<ChatReplyResponse>, impl IntoResponse> {
    let mut audio: Option<Vec<u8>> = None;
    let mut mime: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "audio" => {
                if mime.is_none() {
                    mime = field.content_type().map(|s| s.to_string());
                }
                match field.bytes().await {
                    Ok(bytes) => audio = Some(bytes.to_vec()),
                    Err(e) => {
                        return Err((
                            StatusCode::BAD_REQUEST,
                            Json(ErrorResponse {
                                error: format!("Failed to read audio: {}", e),
                            }),
                        ))
                    }
                }
            }
            "mime" => {
                if let Ok(text) = field.text().await {
                    if !text.trim().is_empty() {
                        mime = Some(text.trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }

    let audio = match audio {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "No audio provided".to_string(),
                }),
            ))
        }
    };

    let chat = ChatId(chat_id);
    let payload = AudioPayload::new(audio, mime.unwrap_or_else(|| DEFAULT_AUDIO_MIME.to_string()));
    let reply = dispatch(&state, chat, Inbound::Voice(payload)).await;
    Ok(Json(respond(&state, chat, reply).await))
}

/// Get the current session of a chat
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
) -> Json<SessionResponse> {
    let chat = ChatId(chat_id);
    let response = match state.engine().session(chat).await {
        Some(session) => SessionResponse {
            chat_id: chat,
            state: session.state().name(),
            session_id: Some(session.id().to_string()),
            query: Some(QueryView {
                text: session.query().text().to_string(),
                title: session.query().title().to_string(),
                kind: session.query().kind(),
            }),
            candidates: session.candidates().to_vec(),
            created_at: Some(session.created_at().to_rfc3339()),
        },
        None => SessionResponse {
            chat_id: chat,
            state: StateName::Idle,
            session_id: None,
            query: None,
            candidates: Vec::new(),
            created_at: None,
        },
    };
    Json(response)
}

/// Cancel the current session of a chat
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
) -> Json<ChatReplyResponse> {
    let chat = ChatId(chat_id);
    let reply = state.engine().cancel(chat).await;
    Json(respond(&state, chat, reply).await)
}

// ============================================================================
// Helpers
// ============================================================================

/// Run one message through the engine on its own task.
async fn dispatch(state: &AppState, chat: ChatId, inbound: Inbound) -> Reply {
    let engine = Arc::clone(state.engine());
    match tokio::spawn(async move { engine.handle(chat, inbound).await }).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(chat_id = %chat, "Message task failed: {}", e);
            MESSAGE_FAILURES.with_label_values(&["panic"]).inc();
            Reply::InternalError
        }
    }
}

async fn respond(state: &AppState, chat: ChatId, reply: Reply) -> ChatReplyResponse {
    CHAT_REPLIES_TOTAL.with_label_values(&[reply.kind()]).inc();
    ChatReplyResponse {
        chat_id: chat,
        reply: reply.render(),
        reply_kind: reply.kind().to_string(),
        state: state.engine().state(chat).await,
    }
}
