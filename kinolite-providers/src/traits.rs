// Online provider trait
//
// Core interface every provider adapter implements

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::navigation::{ClientInfo, NavigationNode, NavigationRequest};

/// A third-party catalog/streaming service behind the uniform navigation
/// model.
///
/// Adapters never retry internally. A failed call is reported once; the
/// caller's next request picks a fresh proxy.
#[async_trait]
pub trait OnlineProvider: Send + Sync {
    /// Provider name (e.g., "alloha"); also the proxy pool and cache key scope
    fn name(&self) -> &'static str;

    /// Whether the provider is switched on in configuration
    fn is_enabled(&self) -> bool;

    /// Answer one navigation step.
    ///
    /// `client` is the end client; IP-bound providers resolve streams for
    /// its address unless configured to use this server's own public IP,
    /// and its country drives geo-gated stream proxying.
    async fn navigate(
        &self,
        request: &NavigationRequest,
        client: &ClientInfo,
    ) -> Result<NavigationNode, ProviderError>;
}
