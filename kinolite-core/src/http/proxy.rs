//! Egress proxy selection
//!
//! Two pools feed the transport:
//! - [`GlobalProxyPool`]: configured rules matched against the request URL,
//!   first matching rule wins, one address picked at random.
//! - [`ProxyRotation`]: provider-scoped pools handed to adapters, with a
//!   failure report that cools a blocked proxy down for a while.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::seq::IndexedRandom;
use regex::{Regex, RegexBuilder};
use tracing::{debug, info};

use super::TransportError;
use crate::config::{GlobalProxyRule, ProxySettings};
use crate::{Error, Result};

/// Hosts that bypass a proxy when `bypass_on_local` is set
const LOCAL_HOSTS: &str = "localhost,127.0.0.1,::1";

/// One egress proxy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyDescriptor {
    /// `scheme://host:port`, scheme defaults to http
    pub address: String,
    pub requires_auth: bool,
    pub credentials: Option<(String, String)>,
    pub bypass_on_local: bool,
}

impl ProxyDescriptor {
    /// Unauthenticated proxy at `address`
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            requires_auth: false,
            credentials: None,
            bypass_on_local: false,
        }
    }

    fn from_pool(
        address: &str,
        use_auth: bool,
        username: Option<&String>,
        password: Option<&String>,
        bypass_on_local: bool,
    ) -> Self {
        let credentials = if use_auth {
            username.map(|user| (user.clone(), password.cloned().unwrap_or_default()))
        } else {
            None
        };

        Self {
            address: address.to_string(),
            requires_auth: use_auth,
            credentials,
            bypass_on_local,
        }
    }

    /// Build the `reqwest` proxy for this descriptor
    pub fn to_reqwest(&self) -> std::result::Result<reqwest::Proxy, TransportError> {
        let mut proxy =
            reqwest::Proxy::all(&self.address).map_err(|e| TransportError::InvalidProxy {
                address: self.address.clone(),
                reason: e.to_string(),
            })?;

        if let Some((user, pass)) = &self.credentials {
            proxy = proxy.basic_auth(user, pass);
        }

        if self.bypass_on_local {
            proxy = proxy.no_proxy(reqwest::NoProxy::from_string(LOCAL_HOSTS));
        }

        Ok(proxy)
    }
}

struct CompiledRule {
    pattern: Regex,
    rule: GlobalProxyRule,
}

/// Pattern-matched global proxy rules, compiled once
pub struct GlobalProxyPool {
    rules: Vec<CompiledRule>,
}

impl GlobalProxyPool {
    /// Compile the configured rules. Rules without a pattern or without
    /// addresses never match and are dropped.
    pub fn new(rules: &[GlobalProxyRule]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());

        for rule in rules {
            if rule.pattern.is_empty() || rule.list.is_empty() {
                continue;
            }

            let pattern = RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| Error::InvalidPattern {
                    pattern: rule.pattern.clone(),
                    source,
                })?;

            compiled.push(CompiledRule {
                pattern,
                rule: rule.clone(),
            });
        }

        Ok(Self { rules: compiled })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Proxy for `url` from the first matching rule, or `None` for a direct
    /// connection.
    #[must_use]
    pub fn select_for(&self, url: &str) -> Option<ProxyDescriptor> {
        let matched = self.rules.iter().find(|c| c.pattern.is_match(url))?;
        let rule = &matched.rule;
        let address = rule.list.choose(&mut rand::rng())?;

        debug!(url = %url, pattern = %rule.pattern, proxy = %address, "Global proxy rule matched");

        Some(ProxyDescriptor::from_pool(
            address,
            rule.use_auth,
            rule.username.as_ref(),
            rule.password.as_ref(),
            rule.bypass_on_local,
        ))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug)]
struct ProviderPool {
    proxies: Vec<ProxyDescriptor>,
    cooldown: Duration,
}

/// Provider-scoped proxy pools.
///
/// `select` picks uniformly among the provider's proxies that are not
/// cooling down; `report_failure` puts the proxy a failed request went
/// through on cooldown. If every proxy is cooling down the whole pool is
/// eligible again.
#[derive(Debug)]
pub struct ProxyRotation {
    pools: HashMap<String, ProviderPool>,
    cooling: DashMap<String, Instant>,
}

impl ProxyRotation {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
            cooling: DashMap::new(),
        }
    }

    /// Register the pool for `provider`. An empty list registers nothing,
    /// so selection for that provider yields a direct connection.
    #[must_use]
    pub fn with_provider(mut self, provider: &str, settings: &ProxySettings) -> Self {
        let proxies: Vec<ProxyDescriptor> = settings
            .list
            .iter()
            .map(|address| {
                ProxyDescriptor::from_pool(
                    address,
                    settings.use_auth,
                    settings.username.as_ref(),
                    settings.password.as_ref(),
                    settings.bypass_on_local,
                )
            })
            .collect();

        if !proxies.is_empty() {
            self.pools.insert(
                provider.to_string(),
                ProviderPool {
                    proxies,
                    cooldown: Duration::from_secs(settings.cooldown_secs),
                },
            );
        }

        self
    }

    /// Pick a proxy for the next request to `provider`
    #[must_use]
    pub fn select(&self, provider: &str) -> Option<ProxyDescriptor> {
        let pool = self.pools.get(provider)?;
        let now = Instant::now();

        let healthy: Vec<&ProxyDescriptor> = pool
            .proxies
            .iter()
            .filter(|p| {
                self.cooling
                    .get(&p.address)
                    .is_none_or(|until| *until <= now)
            })
            .collect();

        let mut rng = rand::rng();
        if healthy.is_empty() {
            pool.proxies.choose(&mut rng).cloned()
        } else {
            healthy.choose(&mut rng).map(|p| (*p).clone())
        }
    }

    /// Signal that `provider` looks like it blocked `proxy`, the proxy the
    /// failed request was sent through. Proxies outside the provider's
    /// pool are ignored.
    pub fn report_failure(&self, provider: &str, proxy: &ProxyDescriptor) {
        let Some(pool) = self.pools.get(provider) else {
            return;
        };
        if !pool.proxies.iter().any(|p| p.address == proxy.address) {
            return;
        }

        info!(
            provider = %provider,
            proxy = %proxy.address,
            cooldown_secs = pool.cooldown.as_secs(),
            "Proxy reported as blocked, cooling down"
        );
        self.cooling
            .insert(proxy.address.clone(), Instant::now() + pool.cooldown);
    }

    /// Whether `address` is currently excluded from selection
    #[must_use]
    pub fn is_cooling(&self, address: &str) -> bool {
        self.cooling
            .get(address)
            .is_some_and(|until| *until > Instant::now())
    }
}

impl Default for ProxyRotation {
    fn default() -> Self {
        Self::new()
    }
}
