//! Interpretation of inbound text: commands, kind choices, selections and
//! confirmations.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::backend::MediaKind;

use super::SessionState;

/// An explicit slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Cancel,
    Retry,
    /// `/tv <title>` or `/movie <title>`: a query with the kind given.
    Request { kind: MediaKind, title: String },
    /// `/tv` or `/movie` without a title.
    MissingTitle(MediaKind),
    Unknown(String),
}

/// What a non-command message means in the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NewQuery,
    ChooseKind(MediaKind),
    Select(usize),
    Confirm,
    Decline,
}

impl Action {
    /// Whether the message only makes sense inside an existing session.
    pub fn is_session_bound(&self) -> bool {
        !matches!(self, Action::NewQuery)
    }
}

static COMMAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-Za-z_]+)(?:@\S+)?(?:\s+(.*))?$").unwrap());

static SELECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:#|no\.?\s*|number\s+)?(\d{1,4})\.?$").unwrap());

/// Parse a slash command. Returns `None` for plain text.
pub fn parse_command(text: &str) -> Option<Command> {
    let caps = COMMAND.captures(text.trim())?;
    let name = caps.get(1)?.as_str().to_lowercase();
    let arg = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

    let command = match name.as_str() {
        "start" | "help" => Command::Help,
        "status" => Command::Status,
        "cancel" | "stop" => Command::Cancel,
        "retry" => Command::Retry,
        "tv" | "show" | "series" => request(MediaKind::Series, arg),
        "movie" | "film" => request(MediaKind::Movie, arg),
        _ => Command::Unknown(format!("/{}", name)),
    };
    Some(command)
}

fn request(kind: MediaKind, title: &str) -> Command {
    if title.is_empty() {
        Command::MissingTitle(kind)
    } else {
        Command::Request {
            kind,
            title: title.to_string(),
        }
    }
}

/// Plain-word cancellation, valid in any state.
pub fn is_cancel(text: &str) -> bool {
    matches!(
        normalize(text).as_str(),
        "cancel" | "stop" | "abort" | "never mind" | "nevermind" | "forget it"
    )
}

/// Interpret a non-command message against the current state.
pub fn interpret(text: &str, state: &SessionState) -> Action {
    match state {
        SessionState::AwaitingKind => match parse_kind_choice(text) {
            Some(kind) => Action::ChooseKind(kind),
            None => Action::NewQuery,
        },
        SessionState::AwaitingSelection { .. } => match parse_selection(text) {
            Some(n) => Action::Select(n),
            None => Action::NewQuery,
        },
        SessionState::AwaitingConfirmation { .. } => {
            if is_confirmation(text) {
                Action::Confirm
            } else if is_decline(text) {
                Action::Decline
            } else {
                Action::NewQuery
            }
        }
    }
}

/// "1"/"tv"/"show" for series, "2"/"movie"/"film" for movies.
pub fn parse_kind_choice(text: &str) -> Option<MediaKind> {
    match normalize(text).as_str() {
        "1" | "tv" | "show" | "series" | "tv show" | "tv series" | "a show" | "a series"
        | "a tv show" | "the show" => Some(MediaKind::Series),
        "2" | "movie" | "film" | "a movie" | "a film" | "the movie" => Some(MediaKind::Movie),
        _ => None,
    }
}

/// A 1-based candidate number ("2", "#2", "number 2").
pub fn parse_selection(text: &str) -> Option<usize> {
    let caps = SELECTION.captures(text.trim())?;
    caps.get(1)?.as_str().parse().ok()
}

fn is_confirmation(text: &str) -> bool {
    matches!(
        normalize(text).as_str(),
        "yes" | "y" | "yeah" | "yep" | "yup" | "sure" | "ok" | "okay" | "confirm" | "add"
            | "add it" | "do it" | "go" | "please"
    )
}

fn is_decline(text: &str) -> bool {
    matches!(normalize(text).as_str(), "no" | "n" | "nope" | "nah")
}

fn normalize(text: &str) -> String {
    text.trim()
        .trim_end_matches(['!', '.', '?'])
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
