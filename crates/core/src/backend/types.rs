//! Types shared by all library manager backends.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Media category of a query or candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Series,
    Movie,
}

impl MediaKind {
    /// Stable identifier used in logs, metrics and API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Series => "series",
            MediaKind::Movie => "movie",
        }
    }

    /// Human label used in chat replies.
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Series => "TV show",
            MediaKind::Movie => "movie",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One search result offered to the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    /// Display title.
    pub title: String,
    /// External identifier (TVDB id for series, TMDB id for movies).
    pub external_id: u64,
    /// Release year (first air year for series).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    /// Kind of the backend that produced this candidate.
    pub kind: MediaKind,
    /// Whether the backend already lists this title.
    #[serde(default)]
    pub already_in_library: bool,
    /// Short synopsis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    /// Raw lookup payload, echoed back to the backend on add.
    #[serde(default, skip_serializing)]
    pub lookup: serde_json::Value,
}

impl Candidate {
    /// Title with year, e.g. "The Office (2005)".
    pub fn display_name(&self) -> String {
        match self.year {
            Some(year) if year > 0 => format!("{} ({})", self.title, year),
            _ => self.title.clone(),
        }
    }
}

/// A fully resolved add operation: candidate plus the defaults for its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct AddRequest {
    pub candidate: Candidate,
    pub quality_profile_id: u32,
    pub root_folder: String,
}

/// Result of a successful add.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddedTitle {
    /// Identifier assigned by the library manager.
    pub library_id: u64,
    pub title: String,
}
