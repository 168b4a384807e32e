pub mod key_builder;
pub mod response_cache;
pub mod singleflight;

pub use key_builder::KeyBuilder;
pub use response_cache::{CacheEntry, CacheError, ResponseCache};
pub use singleflight::Flights;
