//! Alloha provider
//!
//! Search API at `apihost`, IP-bound stream resolution at `linkhost`.

mod client;
mod provider;
pub mod types;

pub use client::{AllohaClient, StreamQuery};
pub use provider::AllohaProvider;

/// Provider name; scopes the proxy pool and cache keys
pub const NAME: &str = "alloha";
