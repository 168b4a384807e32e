use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    /// Pattern-matched egress proxies applied to every outbound request
    /// that was not given an explicit proxy. Scanned in order, first match wins.
    pub global_proxy: Vec<GlobalProxyRule>,
    pub stream_proxy: StreamProxyConfig,
    pub public_ip: PublicIpConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Write daily `kinolite.YYYY-MM-DD.log` files here instead of stderr
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            dir: None,
        }
    }
}

/// Outbound HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Write every request/response pair to the daily request log
    pub log_requests: bool,
    /// Directory holding the daily `http_client.YYYY-MM-DD.log` files
    pub log_dir: String,
    pub default_timeout_secs: u64,
    /// Response bodies above this size are treated as failures
    pub max_response_bytes: usize,
    /// Sent only when the caller does not provide its own User-Agent
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            log_requests: false,
            log_dir: "cache/logs".to_string(),
            default_timeout_secs: 15,
            max_response_bytes: 10_000_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36".to_string(),
            accept_language: "ru-RU,ru;q=0.9,en-US;q=0.6,en;q=0.5".to_string(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

/// One entry of the global proxy pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalProxyRule {
    /// Case-insensitive regex tested against the full request URL
    pub pattern: String,
    pub list: Vec<String>,
    pub use_auth: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bypass_on_local: bool,
}

/// Provider-scoped proxy pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub list: Vec<String>,
    pub use_auth: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub bypass_on_local: bool,
    /// How long a proxy reported as blocked is skipped during selection
    pub cooldown_secs: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            use_auth: false,
            username: None,
            password: None,
            bypass_on_local: false,
            cooldown_secs: 60,
        }
    }
}

/// Where proxied stream links point and how they are signed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamProxyConfig {
    /// Public base URL of this server, e.g. `http://media.example.net:9118`
    pub public_host: String,
    /// When set, proxied links are bound to the requesting client's IP
    pub link_secret: Option<String>,
}

impl Default for StreamProxyConfig {
    fn default() -> Self {
        Self {
            public_host: "http://127.0.0.1:9118".to_string(),
            link_secret: None,
        }
    }
}

/// Per-provider stream routing flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    /// Route player links through this server's `/proxy/` endpoint
    pub streamproxy: bool,
    /// Proxy player links only for clients from these countries
    /// (ISO 3166 alpha-2, case-insensitive)
    pub geostreamproxy: Vec<String>,
    /// Fetch proxied streams through the provider's own egress proxies
    pub useproxystream: bool,
    /// Clients fetch streams themselves; links are never rewritten
    pub rhub: bool,
    /// Route player links through an external APN host
    pub apnstream: bool,
    pub apn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicIpConfig {
    pub endpoint: String,
    pub ttl_secs: u64,
}

impl Default for PublicIpConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.ipify.org".to_string(),
            ttl_secs: 1800,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub alloha: AllohaSettings,
}

/// Alloha provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllohaSettings {
    pub enable: bool,
    /// Search API base URL
    pub apihost: String,
    pub token: String,
    /// Stream resolution base URL
    pub linkhost: String,
    pub secret_token: String,
    /// Resolve streams for this server's public IP instead of the client's
    pub localip: bool,
    #[serde(flatten)]
    pub stream: StreamOptions,
    pub use_proxy: bool,
    pub proxy: ProxySettings,
    pub search_ttl_secs: u64,
    pub stream_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl Default for AllohaSettings {
    fn default() -> Self {
        Self {
            enable: false,
            apihost: String::new(),
            token: String::new(),
            linkhost: String::new(),
            secret_token: String::new(),
            localip: false,
            stream: StreamOptions::default(),
            use_proxy: false,
            proxy: ProxySettings::default(),
            search_ttl_secs: 40 * 60,
            stream_ttl_secs: 10 * 60,
            timeout_secs: 8,
        }
    }
}

impl StreamOptions {
    /// Whether links for a client from `country` go through `/proxy/`
    #[must_use]
    pub fn proxies_for(&self, country: Option<&str>) -> bool {
        if self.rhub {
            return false;
        }
        self.streamproxy
            || country.map(str::trim).filter(|c| !c.is_empty()).is_some_and(|country| {
                self.geostreamproxy
                    .iter()
                    .any(|listed| listed.trim().eq_ignore_ascii_case(country))
            })
    }
}

impl AllohaSettings {
    /// Whether stream resolution for a client from `country` must use this
    /// server's public IP
    #[must_use]
    pub fn requires_public_ip(&self, country: Option<&str>) -> bool {
        self.localip || self.stream.proxies_for(country)
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> crate::Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // KINOLITE_HTTP__LOG_REQUESTS=true, KINOLITE_PROVIDERS__ALLOHA__TOKEN=..., etc.
        builder = builder.add_source(
            Environment::with_prefix("KINOLITE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Load from environment variables only
    pub fn from_env() -> crate::Result<Self> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> crate::Result<Self> {
        Self::load(Some(path))
    }

    /// Collect every configuration problem instead of stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (idx, rule) in self.global_proxy.iter().enumerate() {
            if rule.pattern.is_empty() {
                errors.push(format!("global_proxy[{idx}]: pattern is empty"));
            } else if let Err(e) = regex::RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
            {
                errors.push(format!("global_proxy[{idx}]: invalid pattern: {e}"));
            }
            if rule.use_auth && rule.username.is_none() {
                errors.push(format!("global_proxy[{idx}]: use_auth without username"));
            }
        }

        let alloha = &self.providers.alloha;
        if alloha.enable {
            if alloha.apihost.is_empty() || alloha.token.is_empty() {
                errors.push("providers.alloha: apihost and token are required".to_string());
            }
            if alloha.linkhost.is_empty() || alloha.secret_token.is_empty() {
                errors.push(
                    "providers.alloha: linkhost and secret_token are required".to_string(),
                );
            }
            if alloha.use_proxy && alloha.proxy.list.is_empty() {
                errors.push("providers.alloha: use_proxy with an empty proxy list".to_string());
            }
            if alloha.stream.useproxystream && alloha.proxy.list.is_empty() {
                errors.push("providers.alloha: useproxystream with an empty proxy list".to_string());
            }
            if alloha.stream.apnstream && alloha.stream.apn.is_none() {
                errors.push("providers.alloha: apnstream without apn host".to_string());
            }
        }

        if self.stream_proxy.public_host.is_empty() {
            errors.push("stream_proxy.public_host is empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
