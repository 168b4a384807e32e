//! Alloha HTTP client
//!
//! Talks to the search API (`apihost`) and the stream resolution endpoint
//! (`linkhost`). Each call picks its proxy from the provider pool; no call is
//! retried here. A transport-class failure puts the proxy that call went
//! through on cooldown.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use kinolite_core::config::AllohaSettings;
use kinolite_core::{ProxyDescriptor, ProxyRotation, RequestOptions, Transport};
use regex::Regex;
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::types::{Content, Envelope};
use super::NAME;
use crate::error::ProviderError;
use crate::navigation::{StreamManifest, Subtitle};

const SUCCESS_MARKER: &str = "\"status\":\"success\"";
const SUBTITLE_EXTENSIONS: [&str; 2] = [".vtt", ".srt"];
const DEFAULT_SUBTITLE_LABEL: &str = "По умолчанию";

/// Parameters of one stream resolution
#[derive(Debug, Clone)]
pub struct StreamQuery {
    pub imdb_id: Option<String>,
    pub kinopoisk_id: Option<u64>,
    pub translation: String,
    pub season: Option<String>,
    pub episode: Option<String>,
    /// IP the manifest will be bound to
    pub ip: IpAddr,
}

/// Patterns applied to the stream endpoint's body after backslashes are
/// stripped
#[derive(Debug)]
struct StreamPatterns {
    nested_manifest: Regex,
    bare_manifest: Regex,
    subtitle: Regex,
}

impl StreamPatterns {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            nested_manifest: Regex::new(r#""playlist_file":"\{[^\}]+\}(https?://[^;"]+\.m3u8)"#)?,
            bare_manifest: Regex::new(r#""playlist_file":"(https?://[^;"]+\.m3u8)"#)?,
            subtitle: Regex::new(r#""subtitle":"(https?://[^;" ]+)"#)?,
        })
    }
}

/// Alloha HTTP client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AllohaClient {
    settings: Arc<AllohaSettings>,
    transport: Arc<Transport>,
    rotation: Arc<ProxyRotation>,
    patterns: Arc<StreamPatterns>,
}

impl AllohaClient {
    pub fn new(
        settings: Arc<AllohaSettings>,
        transport: Arc<Transport>,
        rotation: Arc<ProxyRotation>,
    ) -> kinolite_core::Result<Self> {
        let patterns = StreamPatterns::new().map_err(|source| kinolite_core::Error::InvalidPattern {
            pattern: "alloha stream patterns".to_string(),
            source,
        })?;

        Ok(Self {
            settings,
            transport,
            rotation,
            patterns: Arc::new(patterns),
        })
    }

    fn request_options(&self, proxy: Option<&ProxyDescriptor>) -> RequestOptions {
        RequestOptions::new()
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .proxy(proxy.cloned())
    }

    fn proxy(&self) -> Option<ProxyDescriptor> {
        if self.settings.use_proxy {
            self.rotation.select(NAME)
        } else {
            None
        }
    }

    /// Report `proxy` as blocked when `err` points at the egress path
    fn report(&self, proxy: Option<&ProxyDescriptor>, err: ProviderError) -> ProviderError {
        if let Some(proxy) = proxy.filter(|_| err.should_rotate_proxy()) {
            self.rotation.report_failure(NAME, proxy);
        }
        err
    }

    fn api_url(&self, params: &[(&str, String)]) -> Result<Url, ProviderError> {
        let base = format!("{}/", self.settings.apihost.trim_end_matches('/'));
        Url::parse_with_params(&base, params)
            .map_err(|e| ProviderError::Transport(format!("invalid apihost: {e}")))
    }

    async fn fetch_envelope(&self, url: &Url) -> Result<Value, ProviderError> {
        let proxy = self.proxy();
        let envelope: Option<Envelope<Value>> = self
            .transport
            .get_json(url.as_str(), &self.request_options(proxy.as_ref()))
            .await;

        let Some(envelope) = envelope else {
            let err = ProviderError::Transport("search request failed".to_string());
            return Err(self.report(proxy.as_ref(), err));
        };

        envelope.data.ok_or_else(|| {
            let err = ProviderError::Transport("search response without data".to_string());
            self.report(proxy.as_ref(), err)
        })
    }

    /// Search by kinopoisk and/or imdb id
    pub async fn search_by_id(
        &self,
        kinopoisk_id: Option<u64>,
        imdb_id: Option<&str>,
    ) -> Result<Content, ProviderError> {
        let mut params = vec![("token", self.settings.token.clone())];
        if let Some(kp) = kinopoisk_id {
            params.push(("kp", kp.to_string()));
        }
        if let Some(imdb) = imdb_id {
            params.push(("imdb", imdb.to_string()));
        }

        let url = self.api_url(&params)?;
        let data = self.fetch_envelope(&url).await?;

        serde_json::from_value(data).map_err(|e| ProviderError::Parse(format!("search data: {e}")))
    }

    /// Search by title within movies or series. Malformed candidates are
    /// skipped.
    pub async fn search_by_title(&self, title: &str, is_series: bool) -> Result<Vec<Content>, ProviderError> {
        let list = if is_series { "serial" } else { "movie" };
        let url = self.api_url(&[
            ("token", self.settings.token.clone()),
            ("name", title.to_string()),
            ("list", list.to_string()),
        ])?;

        let Value::Array(items) = self.fetch_envelope(&url).await? else {
            return Err(ProviderError::Parse("title search data is not a list".to_string()));
        };

        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Content>(item) {
                Ok(content) => Some(content),
                Err(e) => {
                    debug!(error = %e, "Skipping malformed search candidate");
                    None
                }
            })
            .collect())
    }

    /// Resolve the manifest (and subtitle, if any) for one translation
    pub async fn resolve_stream(&self, query: &StreamQuery) -> Result<StreamManifest, ProviderError> {
        let base = format!("{}/link_file.php", self.settings.linkhost.trim_end_matches('/'));
        let mut params = vec![("secret_token", self.settings.secret_token.clone())];
        if let Some(imdb) = &query.imdb_id {
            params.push(("imdb", imdb.clone()));
        }
        if let Some(kp) = query.kinopoisk_id {
            params.push(("kp", kp.to_string()));
        }
        params.push(("ip", query.ip.to_string()));
        params.push(("translation", query.translation.clone()));
        if let Some(season) = &query.season {
            params.push(("season", season.clone()));
        }
        if let Some(episode) = &query.episode {
            params.push(("episode", episode.clone()));
        }

        let url = Url::parse_with_params(&base, &params)
            .map_err(|e| ProviderError::Transport(format!("invalid linkhost: {e}")))?;

        let proxy = self.proxy();
        let Some(body) = self
            .transport
            .get(url.as_str(), &self.request_options(proxy.as_ref()))
            .await
        else {
            let err = ProviderError::Transport("stream request failed".to_string());
            return Err(self.report(proxy.as_ref(), err));
        };

        self.parse_stream(&body)
    }

    fn parse_stream(&self, body: &str) -> Result<StreamManifest, ProviderError> {
        if !body.contains(SUCCESS_MARKER) {
            return Err(ProviderError::Parse("stream status is not success".to_string()));
        }

        let body = body.replace('\\', "");
        let m3u8_url = self
            .extract_manifest(&body)
            .ok_or_else(|| ProviderError::Parse("no m3u8 in stream response".to_string()))?;

        let subtitles = self
            .extract_subtitle(&body)
            .map(|url| Subtitle {
                label: DEFAULT_SUBTITLE_LABEL.to_string(),
                url,
            })
            .into_iter()
            .collect();

        Ok(StreamManifest { m3u8_url, subtitles })
    }

    /// Manifest URL: nested inside an inline `{...}` marker first, bare
    /// otherwise
    fn extract_manifest(&self, body: &str) -> Option<String> {
        [&self.patterns.nested_manifest, &self.patterns.bare_manifest]
            .into_iter()
            .find_map(|pattern| pattern.captures(body))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn extract_subtitle(&self, body: &str) -> Option<String> {
        let url = self.patterns.subtitle.captures(body)?.get(1)?.as_str();
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();

        SUBTITLE_EXTENSIONS
            .iter()
            .any(|ext| path.ends_with(ext))
            .then(|| url.to_string())
    }
}
