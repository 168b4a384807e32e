//! Uniform navigation model
//!
//! Providers answer a [`NavigationRequest`] with a [`NavigationNode`].
//! Every option inside a node carries the request to send for the next
//! step, so callers never build provider parameters themselves.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Catalog item being looked up, as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentIdentifier {
    pub imdb_id: Option<String>,
    pub kinopoisk_id: Option<u64>,
    pub title: String,
    pub original_title: String,
    pub year: i32,
    pub is_series: bool,
    pub original_language: String,
}

impl ContentIdentifier {
    /// Imdb id, if present and non-blank
    #[must_use]
    pub fn imdb(&self) -> Option<&str> {
        self.imdb_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    /// Kinopoisk id, if present and positive
    #[must_use]
    pub fn kinopoisk(&self) -> Option<u64> {
        self.kinopoisk_id.filter(|id| *id > 0)
    }

    /// Whether at least one external id is available
    #[must_use]
    pub fn has_external_id(&self) -> bool {
        self.imdb().is_some() || self.kinopoisk().is_some()
    }

    /// Whether a lookup can be attempted at all
    #[must_use]
    pub fn is_searchable(&self) -> bool {
        self.has_external_id() || (!self.title.trim().is_empty() && self.year != 0)
    }

    /// Title to display: `title`, falling back to `original_title`
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.original_title
        } else {
            &self.title
        }
    }
}

/// The end client a navigation call is made for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: IpAddr,
    /// ISO 3166 alpha-2 country, when the caller knows it
    pub country: Option<String>,
}

impl ClientInfo {
    #[must_use]
    pub const fn new(ip: IpAddr) -> Self {
        Self { ip, country: None }
    }

    #[must_use]
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Country, if present and non-blank
    #[must_use]
    pub fn country(&self) -> Option<&str> {
        self.country.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

impl From<IpAddr> for ClientInfo {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

/// What the caller wants back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedOutput {
    #[default]
    Navigation,
    Stream,
}

/// One navigation call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationRequest {
    pub content: ContentIdentifier,
    pub translation: Option<String>,
    pub season: Option<String>,
    pub episode: Option<String>,
    pub output: RequestedOutput,
}

impl NavigationRequest {
    #[must_use]
    pub fn new(content: ContentIdentifier) -> Self {
        Self {
            content,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    #[must_use]
    pub fn season(mut self, season: impl Into<String>) -> Self {
        self.season = Some(season.into());
        self
    }

    #[must_use]
    pub fn episode(mut self, episode: impl Into<String>) -> Self {
        self.episode = Some(episode.into());
        self
    }

    #[must_use]
    pub const fn output(mut self, output: RequestedOutput) -> Self {
        self.output = output;
        self
    }

    /// Selected season, if any
    #[must_use]
    pub fn selected_season(&self) -> Option<&str> {
        self.season.as_deref().filter(|s| !s.is_empty())
    }

    /// Selected episode, if any
    #[must_use]
    pub fn selected_episode(&self) -> Option<&str> {
        self.episode.as_deref().filter(|e| !e.is_empty())
    }

    /// Selected translation, if any
    #[must_use]
    pub fn selected_translation(&self) -> Option<&str> {
        self.translation.as_deref().filter(|t| !t.is_empty())
    }
}

/// An audio/dub variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: String,
    pub display_name: String,
}

/// A selectable option inside a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationItem {
    pub title: String,
    /// Secondary label, e.g. the quality of a movie translation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Title for the player when this item is a stream leaf
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_title: Option<String>,
    /// Request for the next step; a `stream` output marks a leaf
    pub next: NavigationRequest,
}

impl NavigationItem {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.next.output == RequestedOutput::Stream
    }
}

/// A translation button of an episode list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationOption {
    pub translation: Translation,
    pub active: bool,
    pub next: NavigationRequest,
}

/// Subtitle track of a resolved stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    pub label: String,
    pub url: String,
}

/// Resolved, playable stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamManifest {
    pub m3u8_url: String,
    pub subtitles: Vec<Subtitle>,
}

/// Provider answer to a [`NavigationRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NavigationNode {
    /// Seasons of a series, newest first
    SeasonList { items: Vec<NavigationItem> },
    /// Episodes of one season for the active translation, newest first
    EpisodeList {
        season: String,
        translations: Vec<TranslationOption>,
        items: Vec<NavigationItem>,
    },
    /// Translations of a movie; every item is a stream leaf
    TranslationList { items: Vec<NavigationItem> },
    /// Resolved stream, links already rewritten for the player
    StreamLeaf {
        title: String,
        manifest: StreamManifest,
    },
}

impl NavigationNode {
    /// Selectable items of this node (empty for a stream leaf)
    #[must_use]
    pub fn items(&self) -> &[NavigationItem] {
        match self {
            Self::SeasonList { items }
            | Self::EpisodeList { items, .. }
            | Self::TranslationList { items } => items,
            Self::StreamLeaf { .. } => &[],
        }
    }
}
