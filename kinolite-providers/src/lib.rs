// Kinolite online providers
//
// Each provider turns a third-party catalog/streaming API into the uniform
// navigation model: search, classify, walk seasons/episodes/translations,
// resolve a playable manifest.
//
// Architecture:
// - kinolite-core: transport, proxy rotation, response cache, config
// - kinolite-proxy: player link rewriting
// - kinolite-providers: navigation model + provider adapters (this crate)

pub mod error;
pub mod navigation;
pub mod public_ip;
pub mod traits;

// Providers
pub mod alloha;

mod context;

pub use alloha::AllohaProvider;
pub use context::ProviderContext;
pub use error::{ProviderError, UnavailableReason};
pub use navigation::{
    ClientInfo, ContentIdentifier, NavigationItem, NavigationNode, NavigationRequest, RequestedOutput,
    StreamManifest, Subtitle, Translation, TranslationOption,
};
pub use public_ip::PublicIpResolver;
pub use traits::OnlineProvider;
