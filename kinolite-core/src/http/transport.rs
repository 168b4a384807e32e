//! Outbound HTTP transport
//!
//! Every provider call goes through [`Transport`]. It picks the egress proxy
//! (explicit per call, else the first matching global rule), merges default
//! headers, enforces timeouts and a response size cap, skips certificate
//! validation, and records each exchange in the request log.
//!
//! The `fetch*` methods report failures as [`TransportError`]; the
//! `get`/`post`/`download*` wrappers used by provider adapters collapse every
//! failure to an absent result.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE,
    LOCATION, REFERER, USER_AGENT,
};
use reqwest::{redirect, Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::proxy::{GlobalProxyPool, ProxyDescriptor};
use super::request_log::{is_loopback, RequestLog};
use super::TransportError;
use crate::config::{GlobalProxyRule, HttpConfig};
use crate::Result;

const DEFAULT_ACCEPT_ENCODING: &str = "gzip, deflate";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const MAX_REDIRECTS: usize = 10;

/// Characters escaped when re-encoding a decoded redirect location:
/// everything outside the URI reserved and unreserved sets. `%` is kept so
/// escapes left over from double encoding survive as single escapes.
const URI_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// HTTP protocol version to use for a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HttpVersion {
    /// HTTP/1.1 only
    #[default]
    Http1,
    /// Negotiate HTTP/2 where the server offers it
    Http2,
}

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra headers; a `User-Agent` here replaces the default one
    pub headers: Vec<(String, String)>,
    pub cookie: Option<String>,
    pub referer: Option<String>,
    /// Falls back to `http.default_timeout_secs`
    pub timeout: Option<Duration>,
    /// Explicit proxy; overrides the global rules
    pub proxy: Option<ProxyDescriptor>,
    pub http_version: HttpVersion,
}

impl RequestOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    #[must_use]
    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: Option<ProxyDescriptor>) -> Self {
        self.proxy = proxy;
        self
    }

    #[must_use]
    pub const fn http_version(mut self, version: HttpVersion) -> Self {
        self.http_version = version;
        self
    }
}

/// Response metadata plus the body of a successful call
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// URL after redirects
    pub final_url: String,
    /// Present only for a 200 response; a blank 200 body is an
    /// [`TransportError::EmptyBody`] failure
    pub body: Option<String>,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK && self.body.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    proxy: Option<ProxyDescriptor>,
    follow_redirects: bool,
    http_version: HttpVersion,
}

/// Outbound HTTP transport shared by all providers
pub struct Transport {
    config: HttpConfig,
    global_proxy: GlobalProxyPool,
    clients: DashMap<ClientKey, Client>,
    log: Option<Arc<RequestLog>>,
}

impl Transport {
    /// Build the transport from the `http` and `global_proxy` config sections.
    /// Opens the request log when `http.log_requests` is set.
    pub fn new(config: &HttpConfig, global_proxy: &[GlobalProxyRule]) -> Result<Self> {
        let log = if config.log_requests {
            Some(Arc::new(RequestLog::new(&config.log_dir)?))
        } else {
            None
        };

        Ok(Self {
            config: config.clone(),
            global_proxy: GlobalProxyPool::new(global_proxy)?,
            clients: DashMap::new(),
            log,
        })
    }

    /// Send a request and return status, headers and (for a 200) the body.
    ///
    /// A non-200 status is not an error here: the response comes back with
    /// `body: None` so callers can still read headers such as `Location` or
    /// `Set-Cookie`.
    pub async fn fetch(
        &self,
        url: &str,
        method: Method,
        body: Option<&str>,
        opts: &RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let result = self.execute(url, method.clone(), body, opts).await;

        let summary = match &result {
            Ok(resp) => match &resp.body {
                Some(text) => format!("StatusCode: {}\n\n{text}", resp.status.as_u16()),
                None => format!("StatusCode: {}", resp.status.as_u16()),
            },
            Err(e) => e.to_string(),
        };
        self.log_exchange(&method, url, body, &summary);

        result
    }

    async fn execute(
        &self,
        url: &str,
        method: Method,
        body: Option<&str>,
        opts: &RequestOptions,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let client = self.client_for(url, opts, true)?;
        let mut headers = merge_headers(&self.config, opts)?;

        let mut request = client
            .request(method, url)
            .timeout(opts.timeout.unwrap_or_else(|| self.config.default_timeout()));

        if let Some(data) = body {
            if !headers.contains_key(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
            }
            request = request.body(data.to_string());
        }

        let response = request.headers(headers).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let final_url = response.url().to_string();

        if status != StatusCode::OK {
            debug!(url = %url, status = status.as_u16(), "Non-200 response");
            return Ok(HttpResponse {
                status,
                headers,
                final_url,
                body: None,
            });
        }

        let bytes = read_limited(response, self.config.max_response_bytes).await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if text.trim().is_empty() {
            return Err(TransportError::EmptyBody(url.to_string()));
        }

        Ok(HttpResponse {
            status,
            headers,
            final_url,
            body: Some(text),
        })
    }

    /// GET `url`, returning the body of a 200 response
    pub async fn get(&self, url: &str, opts: &RequestOptions) -> Option<String> {
        self.fetch(url, Method::GET, None, opts).await.ok()?.body
    }

    /// GET `url` and decode the body as JSON
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, opts: &RequestOptions) -> Option<T> {
        let body = self.get(url, opts).await?;
        decode_json(url, &body)
    }

    /// POST a form-encoded body, returning the body of a 200 response
    pub async fn post(&self, url: &str, data: &str, opts: &RequestOptions) -> Option<String> {
        self.fetch(url, Method::POST, Some(data), opts).await.ok()?.body
    }

    /// POST a form-encoded body and decode the response as JSON
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        data: &str,
        opts: &RequestOptions,
    ) -> Option<T> {
        let body = self.post(url, data, opts).await?;
        decode_json(url, &body)
    }

    /// Where `url` redirects to, without following the redirect.
    ///
    /// Returns the `Location` of a 301/302/307, otherwise the URL that was
    /// finally requested. The result is percent-decoded once and re-escaped
    /// to undo providers' double encoding.
    pub async fn resolve_redirect_location(&self, url: &str, opts: &RequestOptions) -> Option<String> {
        let result = async {
            let client = self.client_for(url, opts, false)?;
            let headers = merge_headers(&self.config, opts)?;
            let response = client
                .get(url)
                .headers(headers)
                .timeout(opts.timeout.unwrap_or_else(|| self.config.default_timeout()))
                .send()
                .await?;
            Ok::<_, TransportError>(redirect_target(&response))
        }
        .await;

        match result {
            Ok(location) => location
                .map(|loc| normalize_location(&loc))
                .filter(|loc| !loc.trim().is_empty()),
            Err(e) => {
                debug!(url = %url, error = %e, "Location lookup failed");
                None
            }
        }
    }

    /// Download a binary payload, following redirects
    pub async fn download_bytes(&self, url: &str, opts: &RequestOptions) -> Option<Bytes> {
        let result = async {
            let response = self.send_following(url, opts).await?;
            let bytes = read_limited(response, self.config.max_response_bytes).await?;
            if bytes.is_empty() {
                return Err(TransportError::EmptyBody(url.to_string()));
            }
            Ok(bytes)
        }
        .await;

        match result {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(url = %url, error = %e, "Download failed");
                None
            }
        }
    }

    /// Stream a download to `path`, following redirects.
    /// Returns whether the file was written completely.
    pub async fn download_to_path(&self, url: &str, path: impl AsRef<Path>, opts: &RequestOptions) -> bool {
        let path = path.as_ref();
        let result = async {
            let mut response = self.send_following(url, opts).await?;
            let mut file = tokio::fs::File::create(path).await?;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, TransportError>(())
        }
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(url = %url, path = %path.display(), error = %e, "Download to file failed");
                false
            }
        }
    }

    async fn send_following(
        &self,
        url: &str,
        opts: &RequestOptions,
    ) -> std::result::Result<Response, TransportError> {
        let client = self.client_for(url, opts, true)?;
        let headers = merge_headers(&self.config, opts)?;
        let response = client
            .get(url)
            .headers(headers)
            .timeout(opts.timeout.unwrap_or_else(|| self.config.default_timeout()))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(TransportError::Status {
                status: response.status(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Proxy that a request to `url` would use
    #[must_use]
    pub fn resolve_proxy(&self, url: &str, explicit: Option<&ProxyDescriptor>) -> Option<ProxyDescriptor> {
        explicit
            .cloned()
            .or_else(|| self.global_proxy.select_for(url))
    }

    fn client_for(
        &self,
        url: &str,
        opts: &RequestOptions,
        follow_redirects: bool,
    ) -> std::result::Result<Client, TransportError> {
        let key = ClientKey {
            proxy: self.resolve_proxy(url, opts.proxy.as_ref()),
            follow_redirects,
            http_version: opts.http_version,
        };

        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let client = build_client(&key)?;
        self.clients.insert(key, client.clone());
        Ok(client)
    }

    fn log_exchange(&self, method: &Method, url: &str, body: Option<&str>, summary: &str) {
        debug!(method = %method, url = %url, "Outbound request finished");
        if let Some(log) = &self.log {
            log.record(method, url, body, summary);
        }
    }

    #[must_use]
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("global_rules", &self.global_proxy.len())
            .field("pooled_clients", &self.clients.len())
            .field("logging", &self.log.is_some())
            .finish()
    }
}

fn build_client(key: &ClientKey) -> std::result::Result<Client, TransportError> {
    // Providers routinely serve self-signed or mismatched certificates.
    let mut builder = Client::builder()
        .danger_accept_invalid_certs(true)
        .cookie_store(false)
        .redirect(if key.follow_redirects {
            redirect::Policy::limited(MAX_REDIRECTS)
        } else {
            redirect::Policy::none()
        });

    if key.http_version == HttpVersion::Http1 {
        builder = builder.http1_only();
    }

    builder = match &key.proxy {
        Some(proxy) => builder.proxy(proxy.to_reqwest()?),
        None => builder.no_proxy(),
    };

    builder.build().map_err(TransportError::from)
}

/// Default headers merged with the caller's.
///
/// `Accept-Encoding` and `Accept-Language` are always present; caller
/// headers override same-named defaults; the default `User-Agent` is added
/// only when the caller supplied none (names compare case-insensitively).
pub fn merge_headers(
    config: &HttpConfig,
    opts: &RequestOptions,
) -> std::result::Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(DEFAULT_ACCEPT_ENCODING));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&config.accept_language)?);

    if let Some(cookie) = &opts.cookie {
        headers.insert(COOKIE, HeaderValue::from_str(cookie)?);
    }
    if let Some(referer) = &opts.referer {
        headers.insert(REFERER, HeaderValue::from_str(referer)?);
    }

    for (name, value) in &opts.headers {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        headers.insert(name, HeaderValue::from_str(value)?);
    }

    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
    }

    Ok(headers)
}

fn redirect_target(response: &Response) -> Option<String> {
    match response.status().as_u16() {
        301 | 302 | 307 => response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        _ => Some(response.url().to_string()),
    }
}

/// Percent-decode once (treating `+` as space) and re-escape.
#[must_use]
pub fn normalize_location(location: &str) -> String {
    let spaced = location.replace('+', " ");
    let decoded = percent_decode_str(&spaced).decode_utf8_lossy();
    utf8_percent_encode(&decoded, URI_ESCAPE).to_string()
}

async fn read_limited(mut response: Response, max: usize) -> std::result::Result<Bytes, TransportError> {
    if let Some(len) = response.content_length() {
        if len > max as u64 {
            return Err(TransportError::TooLarge { size: len, max });
        }
    }

    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if buf.len() + chunk.len() > max {
            return Err(TransportError::TooLarge {
                size: (buf.len() + chunk.len()) as u64,
                max,
            });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(Bytes::from(buf))
}

fn decode_json<T: DeserializeOwned>(url: &str, body: &str) -> Option<T> {
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            if !is_loopback(url) {
                debug!(url = %url, error = %e, "Response is not the expected JSON");
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport() -> Transport {
        Transport::new(&HttpConfig::default(), &[]).unwrap()
    }

    #[test]
    fn test_default_user_agent_when_caller_sets_none() {
        let config = HttpConfig::default();
        let headers = merge_headers(&config, &RequestOptions::new()).unwrap();

        assert_eq!(headers.get(USER_AGENT).unwrap(), config.user_agent.as_str());
        assert_eq!(headers.get(ACCEPT_ENCODING).unwrap(), "gzip, deflate");
        assert_eq!(headers.get(ACCEPT_LANGUAGE).unwrap(), config.accept_language.as_str());
    }

    #[test]
    fn test_caller_user_agent_suppresses_default() {
        let config = HttpConfig::default();
        let opts = RequestOptions::new().header("user-AGENT", "custom/1.0");
        let headers = merge_headers(&config, &opts).unwrap();

        let agents: Vec<_> = headers.get_all(USER_AGENT).iter().collect();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0], "custom/1.0");
    }

    #[test]
    fn test_cookie_and_referer_headers() {
        let opts = RequestOptions::new().cookie("a=1").referer("https://ref.test/");
        let headers = merge_headers(&HttpConfig::default(), &opts).unwrap();

        assert_eq!(headers.get(COOKIE).unwrap(), "a=1");
        assert_eq!(headers.get(REFERER).unwrap(), "https://ref.test/");
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let opts = RequestOptions::new().header("bad header", "x");
        assert!(merge_headers(&HttpConfig::default(), &opts).is_err());
    }

    #[test]
    fn test_normalize_location_undoes_double_encoding() {
        assert_eq!(
            normalize_location("https://cdn.test/a%2520b.m3u8"),
            "https://cdn.test/a%20b.m3u8"
        );
        assert_eq!(normalize_location("https://cdn.test/a%20b"), "https://cdn.test/a%20b");
        assert_eq!(normalize_location("https://cdn.test/a+b?x=1"), "https://cdn.test/a%20b?x=1");
    }

    #[test]
    fn test_explicit_proxy_wins_over_global_rule() {
        let rules = vec![GlobalProxyRule {
            pattern: "example".to_string(),
            list: vec!["http://global:1".to_string()],
            ..Default::default()
        }];
        let transport = Transport::new(&HttpConfig::default(), &rules).unwrap();

        let explicit = ProxyDescriptor::new("http://explicit:1");
        let chosen = transport.resolve_proxy("https://example.com/", Some(&explicit)).unwrap();
        assert_eq!(chosen.address, "http://explicit:1");

        let global = transport.resolve_proxy("https://example.com/", None).unwrap();
        assert_eq!(global.address, "http://global:1");

        assert!(transport.resolve_proxy("https://other.org/", None).is_none());
    }

    #[tokio::test]
    async fn test_get_returns_body_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .and(header_exists("user-agent"))
            .and(header("accept-language", HttpConfig::default().accept_language.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;

        let body = transport()
            .get(&format!("{}/api", server.uri()), &RequestOptions::new())
            .await;
        assert_eq!(body.as_deref(), Some("{\"ok\":true}"));
    }

    #[tokio::test]
    async fn test_non_200_keeps_metadata_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("set-cookie", "x-csrf-token=abc")
                    .set_body_string("blocked"),
            )
            .mount(&server)
            .await;

        let transport = transport();
        let url = format!("{}/api", server.uri());
        let resp = transport
            .fetch(&url, Method::GET, None, &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(resp.status, StatusCode::FORBIDDEN);
        assert!(resp.body.is_none());
        assert!(!resp.is_success());
        assert_eq!(resp.headers.get("set-cookie").unwrap(), "x-csrf-token=abc");
        assert!(transport.get(&url, &RequestOptions::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_blank_body_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("   "))
            .mount(&server)
            .await;

        let body = transport().get(&server.uri(), &RequestOptions::new()).await;
        assert!(body.is_none());

        let err = transport()
            .fetch(&server.uri(), Method::GET, None, &RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::EmptyBody(_)));
    }

    #[tokio::test]
    async fn test_timeout_collapses_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)).set_body_string("late"))
            .mount(&server)
            .await;

        let transport = transport();
        let opts = RequestOptions::new().timeout(Duration::from_millis(50));
        let err = transport
            .fetch(&server.uri(), Method::GET, None, &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(transport.get(&server.uri(), &opts).await.is_none());
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let config = HttpConfig {
            max_response_bytes: 16,
            ..HttpConfig::default()
        };
        let transport = Transport::new(&config, &[]).unwrap();
        assert!(transport.get(&server.uri(), &RequestOptions::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_post_sends_form_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", FORM_CONTENT_TYPE))
            .and(body_string("a=1&b=2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"n\":5}"))
            .mount(&server)
            .await;

        #[derive(serde::Deserialize)]
        struct Reply {
            n: u32,
        }

        let reply: Reply = transport()
            .post_json(&server.uri(), "a=1&b=2", &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(reply.n, 5);
    }

    #[tokio::test]
    async fn test_get_json_with_invalid_json_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let value: Option<serde_json::Value> = transport().get_json(&server.uri(), &RequestOptions::new()).await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_resolve_redirect_location() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/go"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", "https://cdn.test/a%2520b.m3u8"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stay"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport = transport();
        let location = transport
            .resolve_redirect_location(&format!("{}/go", server.uri()), &RequestOptions::new())
            .await;
        assert_eq!(location.as_deref(), Some("https://cdn.test/a%20b.m3u8"));

        let stay = transport
            .resolve_redirect_location(&format!("{}/stay", server.uri()), &RequestOptions::new())
            .await;
        assert_eq!(stay, Some(format!("{}/stay", server.uri())));
    }

    #[tokio::test]
    async fn test_download_bytes_follows_redirects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/new"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let transport = transport();
        let bytes = transport
            .download_bytes(&format!("{}/old", server.uri()), &RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(bytes.as_ref(), &[1, 2, 3]);

        assert!(transport
            .download_bytes(&format!("{}/missing", server.uri()), &RequestOptions::new())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_download_to_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sub.vtt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("WEBVTT"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sub.vtt");
        let transport = transport();

        assert!(transport
            .download_to_path(&format!("{}/sub.vtt", server.uri()), &target, &RequestOptions::new())
            .await);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "WEBVTT");

        assert!(!transport
            .download_to_path(&format!("{}/gone", server.uri()), dir.path().join("gone"), &RequestOptions::new())
            .await);
    }

    #[tokio::test]
    async fn test_clients_are_pooled_per_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let transport = transport();
        for _ in 0..3 {
            transport.get(&server.uri(), &RequestOptions::new()).await.unwrap();
        }
        transport
            .get(&server.uri(), &RequestOptions::new().http_version(HttpVersion::Http2))
            .await
            .unwrap();

        assert_eq!(transport.clients.len(), 2);
    }
}
