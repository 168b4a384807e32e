//! Shared collaborators handed to every provider

use std::sync::Arc;

use kinolite_core::config::Config;
use kinolite_core::{KeyBuilder, ProxyRotation, Transport};
use kinolite_proxy::StreamRewriter;

use crate::alloha;
use crate::public_ip::PublicIpResolver;

/// Everything a provider needs besides its own settings.
///
/// Built once from the loaded [`Config`]; clones share the same transport,
/// proxy pools and public IP cache.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub transport: Arc<Transport>,
    pub rotation: Arc<ProxyRotation>,
    pub public_ip: Arc<PublicIpResolver>,
    pub rewriter: StreamRewriter,
    pub keys: Arc<KeyBuilder>,
    /// Capacity of each provider response cache
    pub cache_capacity: u64,
}

impl ProviderContext {
    /// Wire up transport, proxy pools, public IP lookup and link rewriting
    pub fn from_config(config: &Config) -> kinolite_core::Result<Self> {
        let transport = Arc::new(Transport::new(&config.http, &config.global_proxy)?);

        let mut rotation = ProxyRotation::new();
        let alloha = &config.providers.alloha;
        // The pool also serves `/proxy/` fetches tagged with this provider.
        if alloha.use_proxy || alloha.stream.useproxystream {
            rotation = rotation.with_provider(alloha::NAME, &alloha.proxy);
        }

        let keys = Arc::new(KeyBuilder::default());
        let public_ip = Arc::new(PublicIpResolver::new(
            transport.clone(),
            &config.public_ip,
            keys.public_ip(),
        ));

        Ok(Self {
            transport,
            rotation: Arc::new(rotation),
            public_ip,
            rewriter: StreamRewriter::new(&config.stream_proxy),
            keys,
            cache_capacity: config.cache.max_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_registered_for_proxy_stream_egress() {
        let mut config = Config::default();
        config.providers.alloha.proxy.list = vec!["http://egress.test:3128".to_string()];

        let ctx = ProviderContext::from_config(&config).unwrap();
        assert!(ctx.rotation.select(alloha::NAME).is_none());

        config.providers.alloha.stream.useproxystream = true;
        let ctx = ProviderContext::from_config(&config).unwrap();
        assert_eq!(
            ctx.rotation.select(alloha::NAME).unwrap().address,
            "http://egress.test:3128"
        );
    }
}
