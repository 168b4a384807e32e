//! Outbound HTTP for provider adapters

mod error;
mod proxy;
mod request_log;
mod transport;

pub use error::TransportError;
pub use proxy::{GlobalProxyPool, ProxyDescriptor, ProxyRotation};
pub use request_log::{is_loopback, RequestLog};
pub use transport::{
    merge_headers, normalize_location, HttpResponse, HttpVersion, RequestOptions, Transport,
};
