//! This server's public IP, as seen from outside
//!
//! Some providers bind manifests to the IP that requested them. When the
//! stream is fetched by this server (proxied streams, or `localip`), the
//! provider must be told this server's address rather than the client's.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use kinolite_core::cache::CacheError;
use kinolite_core::config::PublicIpConfig;
use kinolite_core::{RequestOptions, ResponseCache, Transport};
use tracing::{debug, warn};

use crate::error::ProviderError;

/// Cached public IP lookup
pub struct PublicIpResolver {
    transport: Arc<Transport>,
    endpoint: String,
    ttl: Duration,
    key: String,
    cache: ResponseCache<IpAddr, ProviderError>,
}

impl PublicIpResolver {
    #[must_use]
    pub fn new(transport: Arc<Transport>, config: &PublicIpConfig, key: String) -> Self {
        Self {
            transport,
            endpoint: config.endpoint.clone(),
            ttl: Duration::from_secs(config.ttl_secs),
            key,
            cache: ResponseCache::new(1),
        }
    }

    /// Public IP of this server; looked up once per TTL
    pub async fn resolve(&self) -> Result<IpAddr, ProviderError> {
        let transport = self.transport.clone();
        let endpoint = self.endpoint.clone();

        let result = self
            .cache
            .get_or_compute(&self.key, self.ttl, move || lookup(transport, endpoint))
            .await;

        match result {
            Ok(ip) => Ok(ip),
            Err(CacheError::Producer(e)) => {
                warn!(endpoint = %self.endpoint, "Public IP lookup failed");
                Err(e)
            }
            Err(CacheError::Aborted) => Err(ProviderError::IpUnresolved),
        }
    }
}

async fn lookup(transport: Arc<Transport>, endpoint: String) -> Result<IpAddr, ProviderError> {
    let body = transport
        .get(&endpoint, &RequestOptions::new())
        .await
        .ok_or(ProviderError::IpUnresolved)?;

    body.trim().parse::<IpAddr>().map_err(|e| {
        debug!(endpoint = %endpoint, error = %e, "Public IP endpoint returned garbage");
        ProviderError::IpUnresolved
    })
}

impl std::fmt::Debug for PublicIpResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicIpResolver")
            .field("endpoint", &self.endpoint)
            .field("ttl", &self.ttl)
            .finish()
    }
}
