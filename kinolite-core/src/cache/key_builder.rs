//! Unified response-cache key builder
//!
//! Every key encodes the provider, the operation kind and every parameter
//! that changes the upstream answer. The cache itself never inspects keys.
//!
//! # Design Principles
//!
//! - All keys use a configurable prefix (default: "kinolite")
//! - Empty optional parameters are rendered as empty segments so that
//!   `a::b` and `a:b:` never collide with a present value
//! - IP-bound results include the IP as the last segment

use std::net::IpAddr;

/// Unified cache key builder
#[derive(Debug)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Create a new `KeyBuilder` with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    // ==================== Provider Search ====================

    /// Search by external identifiers (kinopoisk id and/or imdb id)
    ///
    /// Value: provider search result, or a cached "no result"
    #[must_use]
    pub fn search_by_id(&self, provider: &str, kinopoisk_id: Option<u64>, imdb_id: Option<&str>) -> String {
        format!(
            "{}:{}:view:{}:{}",
            self.prefix,
            provider,
            kinopoisk_id.map(|id| id.to_string()).unwrap_or_default(),
            imdb_id.unwrap_or_default()
        )
    }

    /// Search by title, year and series flag
    #[must_use]
    pub fn search_by_title(
        &self,
        provider: &str,
        title: &str,
        is_series: bool,
        original_language: &str,
        year: i32,
    ) -> String {
        format!(
            "{}:{}:viewsearch:{}:{}:{}:{}",
            self.prefix,
            provider,
            title.to_lowercase(),
            u8::from(is_series),
            original_language,
            year
        )
    }

    // ==================== Stream Resolution ====================

    /// Resolved stream manifest
    ///
    /// Upstream manifest URLs are bound to the IP they were requested for.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn stream(
        &self,
        provider: &str,
        imdb_id: Option<&str>,
        kinopoisk_id: Option<u64>,
        translation: &str,
        season: Option<&str>,
        episode: Option<&str>,
        ip: IpAddr,
    ) -> String {
        format!(
            "{}:{}:view:stream:{}:{}:{}:{}:{}:{}",
            self.prefix,
            provider,
            imdb_id.unwrap_or_default(),
            kinopoisk_id.map(|id| id.to_string()).unwrap_or_default(),
            translation,
            season.unwrap_or_default(),
            episode.unwrap_or_default(),
            ip
        )
    }

    // ==================== Server ====================

    /// This server's public IP as seen by the outside world
    #[must_use]
    pub fn public_ip(&self) -> String {
        format!("{}:myip", self.prefix)
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("kinolite")
    }
}
