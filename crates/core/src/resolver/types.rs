//! Resolver data types.

use serde::{Deserialize, Serialize};

use crate::backend::{AddedTitle, MediaKind};
use crate::config::{BackendConfig, Config};

/// A user's request: the original text, the extracted title and the
/// inferred kind (`None` when the text carries no usable cue).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    text: String,
    title: String,
    kind: Option<MediaKind>,
}

impl Query {
    pub fn new(text: impl Into<String>, title: impl Into<String>, kind: Option<MediaKind>) -> Self {
        Self {
            text: text.into(),
            title: title.into(),
            kind,
        }
    }

    /// The same request with the kind chosen by the user.
    pub fn with_kind(&self, kind: MediaKind) -> Self {
        Self {
            text: self.text.clone(),
            title: self.title.clone(),
            kind: Some(kind),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn kind(&self) -> Option<MediaKind> {
        self.kind
    }

    pub fn is_ambiguous(&self) -> bool {
        self.kind.is_none()
    }
}

/// Quality profile and root folder applied to every add of one kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaDefaults {
    pub quality_profile_id: u32,
    pub root_folder: String,
}

impl From<&BackendConfig> for MediaDefaults {
    fn from(config: &BackendConfig) -> Self {
        Self {
            quality_profile_id: config.quality_profile_id,
            root_folder: config.root_folder.clone(),
        }
    }
}

/// Per-kind add defaults, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Defaults {
    series: MediaDefaults,
    movie: MediaDefaults,
}

impl Defaults {
    pub fn new(series: MediaDefaults, movie: MediaDefaults) -> Self {
        Self { series, movie }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            series: MediaDefaults::from(&config.sonarr),
            movie: MediaDefaults::from(&config.radarr),
        }
    }

    pub fn for_kind(&self, kind: MediaKind) -> &MediaDefaults {
        match kind {
            MediaKind::Series => &self.series,
            MediaKind::Movie => &self.movie,
        }
    }
}

/// What happened when a confirmed candidate was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The title was added to the library.
    Added { added: AddedTitle, attempts: u32 },
    /// The title was already there; no add was issued (or the add raced).
    AlreadyInLibrary,
}
