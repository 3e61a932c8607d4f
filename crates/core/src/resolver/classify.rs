//! Lexical kind classification of free-text requests.
//!
//! Cues are only recognised at the edges of the request:
//! - a leading cue in lowercase ("movie Inception", "the show The Office"),
//!   or capitalised when followed by ":" or "called"/"named"
//!   ("Movie: Heat"), so "Show Me a Hero" and "Movie 43" stay intact; never
//!   when followed by "of" ("A Series of Unfortunate Events");
//! - a trailing cue in lowercase only ("the office show"), so capitalised
//!   titles such as "The Truman Show" stay intact.
//!
//! Conflicting cues leave the kind unknown.

use once_cell::sync::Lazy;
use regex_lite::Regex;

use crate::backend::MediaKind;

use super::Query;

/// Politeness and request verbs in front of the title.
static LEADING_FILLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?:please|pls|hey|hi|ok|okay)[,!\s]+)*(?:(?:can|could|would) you\s+)?(?:please\s+)?(?:i(?:'d| would)? (?:like|love)(?: to)?\s+|i want(?: to)?\s+)?(?:add|download|request|grab|search for)\s+(?:me\s+)?",
    )
    .unwrap()
});

/// Politeness after the title.
static TRAILING_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[,\s]+(?:please|pls|thanks|thank you)$").unwrap());

static LEADING_CUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:the\s+|a\s+)?(tv\s+show|tv\s+series|show|series|tv|movie|film)(\s*:\s*|\s+called\s+|\s+named\s+|\s+)",
    )
    .unwrap()
});

static TRAILING_CUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+(?:the\s+)?(tv show|tv series|show|series|tv|movie|film)$").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Classify a request into a title and an optional kind.
pub fn classify(text: &str) -> Query {
    let normalized = WHITESPACE.replace_all(text.trim(), " ").to_string();
    let mut rest = strip_punctuation(&normalized).to_string();

    if let Some(m) = LEADING_FILLER.find(&rest) {
        if m.end() < rest.len() {
            rest = rest[m.end()..].to_string();
        }
    }

    if let Some(m) = TRAILING_FILLER.find(&rest) {
        if m.start() > 0 {
            rest.truncate(m.start());
        }
    }

    let mut leading = None;
    if let Some(caps) = LEADING_CUE.captures(&rest) {
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        let remainder = &rest[end..];
        let is_of_phrase = remainder.to_lowercase().starts_with("of ");
        let cue = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let explicit = caps
            .get(2)
            .is_some_and(|m| !m.as_str().trim().is_empty());
        let capitalised = cue.starts_with(|c: char| c.is_uppercase());
        if !remainder.is_empty() && !is_of_phrase && (explicit || !capitalised) {
            leading = Some(cue_kind(cue));
            rest = remainder.to_string();
        }
    }

    let mut trailing = None;
    if let Some(caps) = TRAILING_CUE.captures(&rest) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or(rest.len());
        if start > 0 {
            trailing = caps.get(1).map(|m| cue_kind(m.as_str()));
            rest.truncate(start);
        }
    }

    let kind = match (leading, trailing) {
        (Some(a), Some(b)) if a != b => None,
        (Some(a), _) => Some(a),
        (None, b) => b,
    };

    Query::new(normalized, rest.trim().to_string(), kind)
}

fn cue_kind(cue: &str) -> MediaKind {
    let cue = cue.to_lowercase();
    if cue == "movie" || cue == "film" {
        MediaKind::Movie
    } else {
        MediaKind::Series
    }
}

fn strip_punctuation(text: &str) -> &str {
    text.trim_end_matches(['?', '!', '.', ','])
}
