//! Outbound replies and their chat rendering.

use std::fmt::Write;

use crate::backend::{Candidate, MediaKind};

/// Reachability of one backend, for `/status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub name: String,
    pub kind: MediaKind,
    /// `None` when reachable, otherwise the failure.
    pub error: Option<String>,
}

/// Everything the bot can say.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Help {
        voice_enabled: bool,
    },
    Status {
        backends: Vec<BackendStatus>,
        voice_enabled: bool,
        active_request: Option<String>,
    },
    MissingTitle(Option<MediaKind>),
    UnknownCommand(String),
    KindPrompt {
        title: String,
    },
    Candidates {
        title: String,
        kind: MediaKind,
        candidates: Vec<Candidate>,
    },
    NoResults {
        title: String,
        kind: MediaKind,
    },
    InvalidSelection {
        input: String,
        max: usize,
    },
    ConfirmPrompt(Candidate),
    Added {
        title: String,
        kind: MediaKind,
    },
    AlreadyInLibrary(Candidate),
    /// Add failed after the automatic retry; the session is kept.
    AddFailed {
        candidate: Candidate,
        reason: String,
        /// Confirmations that failed so far in this session.
        failed_attempts: u32,
    },
    /// The backend refused the add; the session is discarded.
    AddRejected {
        candidate: Candidate,
        reason: String,
    },
    BackendUnavailable {
        kind: MediaKind,
    },
    Cancelled,
    NothingToCancel,
    NothingToRetry,
    SessionExpired,
    VoiceDisabled,
    TranscriptionFailed,
    /// Reply to a voice message, echoing what was understood.
    Transcribed {
        text: String,
        reply: Box<Reply>,
    },
    InternalError,
}

impl Reply {
    /// Stable identifier for API clients and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Help { .. } => "help",
            Reply::Status { .. } => "status",
            Reply::MissingTitle(_) => "missing_title",
            Reply::UnknownCommand(_) => "unknown_command",
            Reply::KindPrompt { .. } => "kind_prompt",
            Reply::Candidates { .. } => "candidates",
            Reply::NoResults { .. } => "no_results",
            Reply::InvalidSelection { .. } => "invalid_selection",
            Reply::ConfirmPrompt(_) => "confirm_prompt",
            Reply::Added { .. } => "added",
            Reply::AlreadyInLibrary(_) => "already_in_library",
            Reply::AddFailed { .. } => "add_failed",
            Reply::AddRejected { .. } => "add_rejected",
            Reply::BackendUnavailable { .. } => "backend_unavailable",
            Reply::Cancelled => "cancelled",
            Reply::NothingToCancel => "nothing_to_cancel",
            Reply::NothingToRetry => "nothing_to_retry",
            Reply::SessionExpired => "session_expired",
            Reply::VoiceDisabled => "voice_disabled",
            Reply::TranscriptionFailed => "transcription_failed",
            Reply::Transcribed { reply, .. } => reply.kind(),
            Reply::InternalError => "internal_error",
        }
    }

    /// Text sent to the chat.
    pub fn render(&self) -> String {
        match self {
            Reply::Help { voice_enabled } => {
                let mut text = String::from(
                    "Send me the name of a TV show or movie and I'll add it to the library.\n\n\
                     Examples:\n  show The Office\n  movie Inception\n  /tv Breaking Bad\n  /movie Heat\n\n\
                     Commands:\n  /tv <title> - request a TV show\n  /movie <title> - request a movie\n  \
                     /cancel - drop the current request\n  /retry - retry a failed add\n  \
                     /status - check the library managers",
                );
                if *voice_enabled {
                    text.push_str("\n\nYou can also send a voice message.");
                }
                text
            }
            Reply::Status {
                backends,
                voice_enabled,
                active_request,
            } => {
                let mut text = String::new();
                for backend in backends {
                    let _ = match &backend.error {
                        None => writeln!(text, "{} ({}s): online", backend.name, backend.kind.label()),
                        Some(e) => writeln!(
                            text,
                            "{} ({}s): unreachable ({})",
                            backend.name,
                            backend.kind.label(),
                            e
                        ),
                    };
                }
                let _ = write!(
                    text,
                    "Voice: {}",
                    if *voice_enabled { "enabled" } else { "disabled" }
                );
                if let Some(request) = active_request {
                    let _ = write!(text, "\nCurrent request: {}", request);
                }
                text
            }
            Reply::MissingTitle(Some(kind)) => {
                format!("Which {}? Add the title after the command.", kind.label())
            }
            Reply::MissingTitle(None) => {
                "Please tell me which TV show or movie you are looking for.".to_string()
            }
            Reply::UnknownCommand(command) => {
                format!("Unknown command {}. Send /help for usage.", command)
            }
            Reply::KindPrompt { title } => format!(
                "Is \"{}\" a TV show or a movie?\n1. TV show\n2. Movie",
                title
            ),
            Reply::Candidates {
                title,
                kind,
                candidates,
            } => {
                let mut text = format!("Found {} {}s for \"{}\":\n", candidates.len(), kind.label(), title);
                for (i, candidate) in candidates.iter().enumerate() {
                    let _ = write!(text, "\n{}. {}", i + 1, candidate.display_name());
                    if candidate.already_in_library {
                        text.push_str(" (already in library)");
                    }
                }
                text.push_str("\n\nReply with a number to choose, or /cancel.");
                text
            }
            Reply::NoResults { title, kind } => {
                format!("No {}s found for \"{}\".", kind.label(), title)
            }
            Reply::InvalidSelection { input, max } => format!(
                "\"{}\" is not on the list. Reply with a number between 1 and {}, or /cancel.",
                input, max
            ),
            Reply::ConfirmPrompt(candidate) => format!(
                "Add {} to the {} library? Reply yes to confirm or no to cancel.",
                candidate.display_name(),
                candidate.kind.label()
            ),
            Reply::Added { title, kind } => format!(
                "Added {} to the {} library. It will be downloaded when available.",
                title,
                kind.label()
            ),
            Reply::AlreadyInLibrary(candidate) => format!(
                "{} is already in the library. Nothing to add.",
                candidate.display_name()
            ),
            Reply::AddFailed {
                candidate,
                reason,
                failed_attempts,
            } => {
                let tries = if *failed_attempts > 1 {
                    format!(" (failed {} times)", failed_attempts)
                } else {
                    String::new()
                };
                format!(
                    "Could not add {}: {}{}.\nReply /retry to try again, or /cancel.",
                    candidate.display_name(),
                    reason,
                    tries
                )
            }
            Reply::AddRejected { candidate, reason } => format!(
                "The library manager refused to add {}: {}",
                candidate.display_name(),
                reason
            ),
            Reply::BackendUnavailable { kind } => format!(
                "The {} library is unavailable right now. Please try again later.",
                kind.label()
            ),
            Reply::Cancelled => "Request cancelled.".to_string(),
            Reply::NothingToCancel => "There is nothing to cancel.".to_string(),
            Reply::NothingToRetry => "There is no pending request to retry.".to_string(),
            Reply::SessionExpired => {
                "That request has expired. Please send the title again.".to_string()
            }
            Reply::VoiceDisabled => {
                "Voice messages are not enabled. Please type the title instead.".to_string()
            }
            Reply::TranscriptionFailed => {
                "Sorry, I couldn't understand that voice message. Please try again or type the title."
                    .to_string()
            }
            Reply::Transcribed { text, reply } => {
                format!("I heard: \"{}\"\n\n{}", text, reply.render())
            }
            Reply::InternalError => {
                "Something went wrong while handling your message. Please try again.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_candidates_are_enumerated() {
        let mut owned = fixtures::series("The Office", 2001, 78107);
        owned.already_in_library = true;
        let reply = Reply::Candidates {
            title: "The Office".to_string(),
            kind: MediaKind::Series,
            candidates: vec![fixtures::series("The Office", 2005, 73244), owned],
        };

        let text = reply.render();
        assert!(text.starts_with("Found 2 TV shows for \"The Office\""));
        assert!(text.contains("\n1. The Office (2005)"));
        assert!(text.contains("\n2. The Office (2001) (already in library)"));
    }

    #[test]
    fn test_add_failed_counts_repeated_failures() {
        let first = Reply::AddFailed {
            candidate: fixtures::series("Dark", 2017, 334824),
            reason: "the library manager is unavailable".to_string(),
            failed_attempts: 1,
        };
        let text = first.render();
        assert!(text.starts_with("Could not add Dark (2017): the library manager is unavailable."));
        assert!(!text.contains("times"));

        let third = Reply::AddFailed {
            candidate: fixtures::series("Dark", 2017, 334824),
            reason: "the library manager is unavailable".to_string(),
            failed_attempts: 3,
        };
        assert!(third.render().contains("unavailable (failed 3 times)."));
    }

    #[test]
    fn test_transcribed_wraps_inner_reply() {
        let reply = Reply::Transcribed {
            text: "movie heat".to_string(),
            reply: Box::new(Reply::NoResults {
                title: "heat".to_string(),
                kind: MediaKind::Movie,
            }),
        };
        assert_eq!(reply.kind(), "no_results");
        let text = reply.render();
        assert!(text.starts_with("I heard: \"movie heat\""));
        assert!(text.ends_with("No movies found for \"heat\"."));
    }

    #[test]
    fn test_status_lists_backends() {
        let reply = Reply::Status {
            backends: vec![
                BackendStatus {
                    name: "sonarr".to_string(),
                    kind: MediaKind::Series,
                    error: None,
                },
                BackendStatus {
                    name: "radarr".to_string(),
                    kind: MediaKind::Movie,
                    error: Some("connection refused".to_string()),
                },
            ],
            voice_enabled: false,
            active_request: None,
        };
        let text = reply.render();
        assert!(text.contains("sonarr (TV shows): online"));
        assert!(text.contains("radarr (movies): unreachable (connection refused)"));
        assert!(text.ends_with("Voice: disabled"));
    }

    #[test]
    fn test_help_mentions_voice_only_when_enabled() {
        assert!(Reply::Help { voice_enabled: true }.render().contains("voice"));
        assert!(!Reply::Help { voice_enabled: false }.render().contains("voice"));
    }
}
