//! Alloha navigation state machine
//!
//! search → classify → movie translations | seasons | episodes+translations
//! → stream leaf. Searches and stream resolutions go through their own
//! response caches with separate TTLs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kinolite_core::cache::CacheError;
use kinolite_core::config::AllohaSettings;
use kinolite_core::{KeyBuilder, ResponseCache};
use kinolite_proxy::{LinkContext, StreamRewriter};
use tracing::{debug, info, warn};
use url::Url;

use super::client::{AllohaClient, StreamQuery};
use super::types::{Category, Content, Season};
use super::NAME;
use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::navigation::{
    ClientInfo, ContentIdentifier, NavigationItem, NavigationNode, NavigationRequest, RequestedOutput,
    StreamManifest, Subtitle, Translation, TranslationOption,
};
use crate::public_ip::PublicIpResolver;
use crate::traits::OnlineProvider;

/// Display names containing this marker are subtitle-only variants
const SUBTITLE_ONLY_MARKER: &str = "субтитры";
const RUSSIAN: &str = "ru";
const RUSSIA: &str = "россия";

/// Cached search outcome; `None` is a confirmed "no matching title"
type SearchOutcome = Option<Arc<Content>>;

enum SearchQuery {
    ById {
        kinopoisk_id: Option<u64>,
        imdb_id: Option<String>,
    },
    ByTitle {
        title: String,
        is_series: bool,
        original_language: String,
        year: i32,
    },
}

/// Alloha provider adapter
pub struct AllohaProvider {
    settings: Arc<AllohaSettings>,
    client: AllohaClient,
    keys: Arc<KeyBuilder>,
    public_ip: Arc<PublicIpResolver>,
    rewriter: StreamRewriter,
    search_cache: ResponseCache<SearchOutcome, ProviderError>,
    stream_cache: ResponseCache<StreamManifest, ProviderError>,
}

impl AllohaProvider {
    pub fn new(settings: AllohaSettings, ctx: &ProviderContext) -> kinolite_core::Result<Self> {
        if settings.enable {
            for (field, host) in [("apihost", &settings.apihost), ("linkhost", &settings.linkhost)] {
                Url::parse(host).map_err(|e| {
                    kinolite_core::Error::InvalidInput(format!("providers.alloha.{field} {host:?}: {e}"))
                })?;
            }
        }

        let settings = Arc::new(settings);
        let client = AllohaClient::new(settings.clone(), ctx.transport.clone(), ctx.rotation.clone())?;

        Ok(Self {
            settings,
            client,
            keys: ctx.keys.clone(),
            public_ip: ctx.public_ip.clone(),
            rewriter: ctx.rewriter.clone(),
            search_cache: ResponseCache::new(ctx.cache_capacity),
            stream_cache: ResponseCache::new(ctx.cache_capacity),
        })
    }

    fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.search_ttl_secs)
    }

    fn stream_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.stream_ttl_secs)
    }

    /// Find the title, by external id when available, else by title+year
    async fn search(&self, content: &ContentIdentifier) -> Result<Arc<Content>, ProviderError> {
        let (key, query) = if content.has_external_id() {
            (
                self.keys.search_by_id(NAME, content.kinopoisk(), content.imdb()),
                SearchQuery::ById {
                    kinopoisk_id: content.kinopoisk(),
                    imdb_id: content.imdb().map(str::to_string),
                },
            )
        } else {
            if content.title.trim().is_empty() || content.year == 0 {
                return Err(ProviderError::NoMatch);
            }
            (
                self.keys.search_by_title(
                    NAME,
                    &content.title,
                    content.is_series,
                    &content.original_language,
                    content.year,
                ),
                SearchQuery::ByTitle {
                    title: content.title.clone(),
                    is_series: content.is_series,
                    original_language: content.original_language.clone(),
                    year: content.year,
                },
            )
        };

        let client = self.client.clone();
        let outcome = self
            .search_cache
            .get_or_compute(&key, self.search_ttl(), move || run_search(client, query))
            .await;

        match flatten(outcome)? {
            Some(found) => Ok(found),
            None => Err(ProviderError::NoMatch),
        }
    }

    fn movie_node(request: &NavigationRequest, found: &Content) -> NavigationNode {
        let items = found
            .translation_iframe
            .iter()
            .map(|(id, translation)| NavigationItem {
                title: translation.name.clone(),
                details: Some(translation.quality.clone()).filter(|q| !q.is_empty()),
                display_title: Some(request.content.display_title().to_string()),
                next: leaf_request(request, id, None, None),
            })
            .collect();

        NavigationNode::TranslationList { items }
    }

    fn season_node(request: &NavigationRequest, found: &Content) -> NavigationNode {
        let items = found
            .seasons
            .keys()
            .rev()
            .map(|season| NavigationItem {
                title: format!("{season} сезон"),
                details: None,
                display_title: None,
                next: NavigationRequest::new(request.content.clone()).season(season.clone()),
            })
            .collect();

        NavigationNode::SeasonList { items }
    }

    fn episode_node(
        request: &NavigationRequest,
        season_key: &str,
        season: &Season,
    ) -> NavigationNode {
        let translations = season_translations(season);
        let active = request
            .selected_translation()
            .map(str::to_string)
            .or_else(|| translations.first().map(|t| t.id.clone()));

        let translation_options = translations
            .into_iter()
            .map(|translation| TranslationOption {
                active: active.as_deref() == Some(translation.id.as_str()),
                next: NavigationRequest::new(request.content.clone())
                    .season(season_key)
                    .translation(translation.id.clone()),
                translation,
            })
            .collect();

        let items = season
            .episodes
            .iter()
            .rev()
            .filter(|(_, episode)| {
                active
                    .as_deref()
                    .is_none_or(|t| episode.translation.contains_key(t))
            })
            .map(|(episode_key, _)| NavigationItem {
                title: format!("{episode_key} серия"),
                details: None,
                display_title: Some(format!(
                    "{} ({episode_key} серия)",
                    request.content.display_title()
                )),
                next: leaf_request(
                    request,
                    active.as_deref().unwrap_or_default(),
                    Some(season_key),
                    Some(episode_key),
                ),
            })
            .collect();

        NavigationNode::EpisodeList {
            season: season_key.to_string(),
            translations: translation_options,
            items,
        }
    }

    async fn browse(&self, request: &NavigationRequest) -> Result<NavigationNode, ProviderError> {
        if !request.content.is_searchable() {
            return Err(ProviderError::NoMatch);
        }

        let found = self.search(&request.content).await?;
        let category = found
            .category()
            .ok_or_else(|| ProviderError::Parse("search result without category".to_string()))?;

        match (category, request.selected_season()) {
            (Category::Movie, _) => Ok(Self::movie_node(request, &found)),
            (Category::Series, None) => Ok(Self::season_node(request, &found)),
            (Category::Series, Some(season_key)) => {
                let season = found
                    .seasons
                    .get(season_key)
                    .ok_or_else(|| ProviderError::Parse(format!("season {season_key} not in result")))?;
                Ok(Self::episode_node(request, season_key, season))
            }
        }
    }

    /// Resolve the playable manifest and rewrite it for the player
    async fn stream(&self, request: &NavigationRequest, client: &ClientInfo) -> Result<NavigationNode, ProviderError> {
        let content = &request.content;
        let ip = if self.settings.requires_public_ip(client.country()) {
            self.public_ip.resolve().await?
        } else {
            client.ip
        };

        let query = StreamQuery {
            imdb_id: content.imdb().map(str::to_string),
            kinopoisk_id: content.kinopoisk(),
            translation: request.selected_translation().unwrap_or_default().to_string(),
            season: request.selected_season().map(str::to_string),
            episode: request.selected_episode().map(str::to_string),
            ip,
        };

        let key = self.keys.stream(
            NAME,
            query.imdb_id.as_deref(),
            query.kinopoisk_id,
            &query.translation,
            query.season.as_deref(),
            query.episode.as_deref(),
            ip,
        );

        let api = self.client.clone();
        let manifest = flatten(
            self.stream_cache
                .get_or_compute(&key, self.stream_ttl(), move || async move {
                    api.resolve_stream(&query).await
                })
                .await,
        )?;

        let title = match request.selected_episode() {
            Some(episode) => format!("{} ({episode} серия)", content.display_title()),
            None => content.display_title().to_string(),
        };

        Ok(NavigationNode::StreamLeaf {
            title,
            manifest: self.rewrite(&manifest, client),
        })
    }

    fn rewrite(&self, manifest: &StreamManifest, client: &ClientInfo) -> StreamManifest {
        let options = &self.settings.stream;
        let link = LinkContext {
            provider: NAME,
            client_ip: Some(client.ip),
            country: client.country(),
        };

        StreamManifest {
            m3u8_url: self.rewriter.rewrite(options, &manifest.m3u8_url, &link),
            subtitles: manifest
                .subtitles
                .iter()
                .map(|s| Subtitle {
                    label: s.label.clone(),
                    url: self.rewriter.rewrite(options, &s.url, &link),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl OnlineProvider for AllohaProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    fn is_enabled(&self) -> bool {
        self.settings.enable
    }

    async fn navigate(
        &self,
        request: &NavigationRequest,
        client: &ClientInfo,
    ) -> Result<NavigationNode, ProviderError> {
        if !self.settings.enable {
            return Err(ProviderError::Disabled);
        }

        let result = match request.output {
            RequestedOutput::Navigation => self.browse(request).await,
            RequestedOutput::Stream => self.stream(request, client).await,
        };

        if let Err(e) = &result {
            if e.should_rotate_proxy() {
                warn!(provider = NAME, error = %e, "Upstream failure, next request picks a fresh proxy");
            } else {
                info!(provider = NAME, reason = %e.reason(), error = %e, "Content unavailable");
            }
        }

        result
    }
}

impl std::fmt::Debug for AllohaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllohaProvider")
            .field("enabled", &self.settings.enable)
            .field("search_entries", &self.search_cache.entry_count())
            .field("stream_entries", &self.stream_cache.entry_count())
            .finish()
    }
}

async fn run_search(client: AllohaClient, query: SearchQuery) -> Result<SearchOutcome, ProviderError> {
    match query {
        SearchQuery::ById {
            kinopoisk_id,
            imdb_id,
        } => {
            let found = client.search_by_id(kinopoisk_id, imdb_id.as_deref()).await?;
            Ok(Some(Arc::new(found)))
        }
        SearchQuery::ByTitle {
            title,
            is_series,
            original_language,
            year,
        } => {
            let candidates = client.search_by_title(&title, is_series).await?;
            Ok(candidates
                .into_iter()
                .find(|c| matches_candidate(c, &title, year, &original_language))
                .map(Arc::new))
        }
    }
}

/// Title-search match rule: same name ignoring case, year within ±1 and,
/// for Russian-language queries, produced in Russia
pub(crate) fn matches_candidate(candidate: &Content, title: &str, year: i32, original_language: &str) -> bool {
    let name_matches = candidate
        .name
        .as_deref()
        .is_some_and(|name| name.trim().to_lowercase() == title.to_lowercase());
    if !name_matches {
        return false;
    }

    let Some(candidate_year) = candidate.year.filter(|y| *y > 0) else {
        return false;
    };
    if (candidate_year - i64::from(year)).abs() > 1 {
        return false;
    }

    if original_language == RUSSIAN {
        let from_russia = candidate
            .country
            .as_deref()
            .is_some_and(|country| country.to_lowercase() == RUSSIA);
        if !from_russia {
            debug!(title = %title, country = ?candidate.country, "Skipping non-Russian candidate");
            return false;
        }
    }

    true
}

/// Union of the season's translations in provider order, without
/// subtitle-only variants and without repeated display names
pub(crate) fn season_translations(season: &Season) -> Vec<Translation> {
    let mut translations: Vec<Translation> = Vec::new();

    for episode in season.episodes.values() {
        for (id, variant) in &episode.translation {
            let name = &variant.translation;
            if name.to_lowercase().contains(SUBTITLE_ONLY_MARKER)
                || translations.iter().any(|t| &t.display_name == name)
            {
                continue;
            }
            translations.push(Translation {
                id: id.clone(),
                display_name: name.clone(),
            });
        }
    }

    translations
}

fn leaf_request(
    request: &NavigationRequest,
    translation: &str,
    season: Option<&str>,
    episode: Option<&str>,
) -> NavigationRequest {
    let mut next = NavigationRequest::new(request.content.clone())
        .translation(translation)
        .output(RequestedOutput::Stream);
    next.season = season.map(str::to_string);
    next.episode = episode.map(str::to_string);
    next
}

fn flatten<V>(outcome: Result<V, CacheError<ProviderError>>) -> Result<V, ProviderError> {
    outcome.map_err(|e| match e {
        CacheError::Producer(inner) => inner,
        CacheError::Aborted => ProviderError::Transport("upstream call aborted".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinolite_core::config::Config;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate(name: &str, year: i64, country: &str) -> Content {
        Content {
            name: Some(name.to_string()),
            year: Some(year),
            country: Some(country.to_string()),
            ..Default::default()
        }
    }

    fn season(json: &str) -> Season {
        serde_json::from_str(json).unwrap()
    }

    async fn provider(server: &MockServer, tweak: impl FnOnce(&mut Config)) -> AllohaProvider {
        let mut config = Config::default();
        config.providers.alloha = AllohaSettings {
            enable: true,
            apihost: server.uri(),
            token: "tok".to_string(),
            linkhost: server.uri(),
            secret_token: "sec".to_string(),
            ..Default::default()
        };
        config.public_ip.endpoint = format!("{}/myip", server.uri());
        tweak(&mut config);

        let ctx = ProviderContext::from_config(&config).unwrap();
        AllohaProvider::new(config.providers.alloha.clone(), &ctx).unwrap()
    }

    fn by_kp(kp: u64) -> ContentIdentifier {
        ContentIdentifier {
            kinopoisk_id: Some(kp),
            title: "Foo".to_string(),
            year: 2020,
            ..Default::default()
        }
    }

    fn client() -> ClientInfo {
        ClientInfo::new("198.51.100.20".parse().unwrap())
    }

    #[test]
    fn test_title_match_within_one_year_and_russian() {
        let c = candidate("Foo", 2020, "Россия");
        assert!(matches_candidate(&c, "Foo", 2019, "ru"));
        assert!(matches_candidate(&c, "foo", 2021, "ru"));
        assert!(matches_candidate(&c, "Foo", 2020, "en"));
        assert!(!matches_candidate(&c, "Foo", 2018, "ru"));
        assert!(!matches_candidate(&c, "Foo 2", 2020, "ru"));
    }

    #[test]
    fn test_title_match_rejects_foreign_for_russian_queries() {
        let c = candidate("Foo", 2020, "USA");
        assert!(!matches_candidate(&c, "Foo", 2019, "ru"));
        assert!(matches_candidate(&c, "Foo", 2019, "en"));

        let no_year = Content {
            year: None,
            ..candidate("Foo", 0, "Россия")
        };
        assert!(!matches_candidate(&no_year, "Foo", 2020, "ru"));
    }

    #[test]
    fn test_season_translations_dedup_and_skip_subtitles() {
        let s = season(
            r#"{"episodes": {
                "1": {"translation": {"66": {"translation": "Кубик в Кубе"}, "9": {"translation": "Субтитры"}}},
                "2": {"translation": {"67": {"translation": "Кубик в Кубе"}, "10": {"translation": "LostFilm"}}}
            }}"#,
        );

        let names: Vec<_> = season_translations(&s)
            .into_iter()
            .map(|t| (t.id, t.display_name))
            .collect();
        assert_eq!(
            names,
            vec![
                ("66".to_string(), "Кубик в Кубе".to_string()),
                ("10".to_string(), "LostFilm".to_string()),
            ]
        );
    }

    #[test]
    fn test_episode_node_filters_by_active_translation() {
        let s = season(
            r#"{"episodes": {
                "1": {"translation": {"66": {"translation": "A"}}},
                "2": {"translation": {"66": {"translation": "A"}, "10": {"translation": "B"}}},
                "3": {"translation": {"10": {"translation": "B"}}}
            }}"#,
        );
        let request = NavigationRequest::new(by_kp(1)).season("1");

        let NavigationNode::EpisodeList { translations, items, .. } = AllohaProvider::episode_node(&request, "1", &s) else {
            panic!("expected episode list");
        };
        assert!(translations[0].active);
        assert!(!translations[1].active);
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["2 серия", "1 серия"]);
        assert_eq!(items[0].display_title.as_deref(), Some("Foo (2 серия)"));
        assert!(items.iter().all(NavigationItem::is_leaf));

        let chosen = request.clone().translation("10");
        let NavigationNode::EpisodeList { items, .. } = AllohaProvider::episode_node(&chosen, "1", &s) else {
            panic!("expected episode list");
        };
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["3 серия", "2 серия"]);
        assert_eq!(items[0].next.translation.as_deref(), Some("10"));
    }

    #[test]
    fn test_invalid_host_is_rejected_when_enabled() {
        let ctx = ProviderContext::from_config(&Config::default()).unwrap();
        let settings = AllohaSettings {
            enable: true,
            apihost: "not a url".to_string(),
            linkhost: "https://link.test".to_string(),
            ..Default::default()
        };
        assert!(AllohaProvider::new(settings.clone(), &ctx).is_err());

        let disabled = AllohaSettings {
            enable: false,
            ..settings
        };
        assert!(AllohaProvider::new(disabled, &ctx).is_ok());
    }

    #[tokio::test]
    async fn test_disabled_provider() {
        let server = MockServer::start().await;
        let p = provider(&server, |c| c.providers.alloha.enable = false).await;

        let err = p.navigate(&NavigationRequest::new(by_kp(1)), &client()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Disabled));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_movie_lists_translations_as_leaves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("kp", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data":{"category":1,"translation_iframe":{"66":{"name":"Дубляж","quality":"1080p"},"9":{"name":"Оригинал","quality":"720p"}}}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(&server, |_| {}).await;
        let node = p.navigate(&NavigationRequest::new(by_kp(5)), &client()).await.unwrap();

        let NavigationNode::TranslationList { items } = &node else {
            panic!("expected translation list, got {node:?}");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Дубляж");
        assert_eq!(items[0].details.as_deref(), Some("1080p"));
        assert!(items[0].is_leaf());
        assert_eq!(items[1].next.translation.as_deref(), Some("9"));

        // second call is served from the search cache
        p.navigate(&NavigationRequest::new(by_kp(5)), &client()).await.unwrap();
    }

    #[tokio::test]
    async fn test_title_search_no_match_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("name", "Foo"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data":[{"name":"Foo","year":2020,"country":"USA","category_id":1}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(&server, |_| {}).await;
        let content = ContentIdentifier {
            title: "Foo".to_string(),
            year: 2019,
            original_language: "ru".to_string(),
            ..Default::default()
        };

        for _ in 0..2 {
            let err = p.navigate(&NavigationRequest::new(content.clone()), &client()).await.unwrap_err();
            assert!(matches!(err, ProviderError::NoMatch));
            assert!(!err.should_rotate_proxy());
        }
    }

    #[tokio::test]
    async fn test_unsearchable_content_is_no_match() {
        let server = MockServer::start().await;
        let p = provider(&server, |_| {}).await;

        let content = ContentIdentifier {
            title: "Foo".to_string(),
            ..Default::default()
        };
        let err = p.navigate(&NavigationRequest::new(content), &client()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoMatch));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_rotates_proxy_and_is_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let p = provider(&server, |_| {}).await;
        for _ in 0..2 {
            let err = p.navigate(&NavigationRequest::new(by_kp(9)), &client()).await.unwrap_err();
            assert!(err.should_rotate_proxy());
            assert_eq!(err.reason().as_str(), "no-data");
        }
    }

    #[tokio::test]
    async fn test_missing_season_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"data":{"category":2,"seasons":{"1":{"episodes":{}}}}}"#,
            ))
            .mount(&server)
            .await;

        let p = provider(&server, |_| {}).await;
        let request = NavigationRequest::new(by_kp(3)).season("7");
        let err = p.navigate(&request, &client()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn test_stream_uses_public_ip_and_rewrites() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myip"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.5"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/link_file.php"))
            .and(query_param("ip", "203.0.113.5"))
            .and(query_param("translation", "66"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"success","playlist_file":"https://h.test/x.m3u8","subtitle":"https://h.test/ru.vtt"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(&server, |c| {
            c.providers.alloha.stream.streamproxy = true;
            c.stream_proxy.public_host = "http://media.test".to_string();
        })
        .await;

        let request = NavigationRequest::new(by_kp(5))
            .translation("66")
            .output(RequestedOutput::Stream);
        let node = p.navigate(&request, &client()).await.unwrap();

        let NavigationNode::StreamLeaf { title, manifest } = node else {
            panic!("expected stream leaf");
        };
        assert_eq!(title, "Foo");
        assert_eq!(manifest.m3u8_url, "http://media.test/proxy/https%3A%2F%2Fh.test%2Fx.m3u8");
        assert_eq!(manifest.subtitles[0].url, "http://media.test/proxy/https%3A%2F%2Fh.test%2Fru.vtt");
    }

    #[tokio::test]
    async fn test_stream_geo_gate_follows_client_country() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myip"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.5"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/link_file.php"))
            .and(query_param("ip", "203.0.113.5"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"success","playlist_file":"https://h.test/srv.m3u8"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/link_file.php"))
            .and(query_param("ip", "198.51.100.20"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"status":"success","playlist_file":"https://h.test/direct.m3u8"}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(&server, |c| {
            let alloha = &mut c.providers.alloha;
            alloha.stream.geostreamproxy = vec!["UA".to_string()];
            alloha.stream.useproxystream = true;
            alloha.proxy.list = vec!["http://egress.test:3128".to_string()];
            c.stream_proxy.public_host = "http://media.test".to_string();
        })
        .await;

        let request = NavigationRequest::new(by_kp(5))
            .translation("66")
            .output(RequestedOutput::Stream);

        let gated = p.navigate(&request, &client().with_country("ua")).await.unwrap();
        let NavigationNode::StreamLeaf { manifest, .. } = gated else {
            panic!("expected stream leaf");
        };
        assert_eq!(
            manifest.m3u8_url,
            "http://media.test/proxy/https%3A%2F%2Fh.test%2Fsrv.m3u8?egress=alloha"
        );

        let elsewhere = p.navigate(&request, &client().with_country("DE")).await.unwrap();
        let NavigationNode::StreamLeaf { manifest, .. } = elsewhere else {
            panic!("expected stream leaf");
        };
        assert_eq!(manifest.m3u8_url, "https://h.test/direct.m3u8");
    }

    #[tokio::test]
    async fn test_stream_ip_unresolved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/myip"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let p = provider(&server, |c| c.providers.alloha.localip = true).await;
        let request = NavigationRequest::new(by_kp(5))
            .translation("66")
            .output(RequestedOutput::Stream);

        let err = p.navigate(&request, &client()).await.unwrap_err();
        assert!(matches!(err, ProviderError::IpUnresolved));
        assert_eq!(err.reason().as_str(), "ip-unresolved");
    }

    #[tokio::test]
    async fn test_stream_without_manifest_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/link_file.php"))
            .and(query_param("ip", "198.51.100.20"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"success"}"#))
            .mount(&server)
            .await;

        let p = provider(&server, |_| {}).await;
        let request = NavigationRequest::new(by_kp(5))
            .translation("66")
            .output(RequestedOutput::Stream);

        let err = p.navigate(&request, &client()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
        assert!(!err.should_rotate_proxy());
    }
}
