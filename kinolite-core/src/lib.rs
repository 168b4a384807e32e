pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;

pub use cache::{KeyBuilder, ResponseCache};
pub use config::Config;
pub use error::{Error, Result};
pub use http::{ProxyDescriptor, ProxyRotation, RequestOptions, Transport};
