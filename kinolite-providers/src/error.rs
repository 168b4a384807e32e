//! Provider error taxonomy
//!
//! Upstream detail (status codes, parse diagnostics) stays in the error
//! message for logging. Callers only ever show the [`UnavailableReason`].

use serde::Serialize;
use thiserror::Error;

/// Why a provider could not produce a result
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Provider is disabled")]
    Disabled,

    /// Transport failure or a response without the expected envelope
    #[error("Upstream request failed: {0}")]
    Transport(String),

    /// Response arrived but an expected field or pattern was missing
    #[error("Unexpected upstream response: {0}")]
    Parse(String),

    /// Search ran but no candidate satisfied the matching rules
    #[error("No matching content")]
    NoMatch,

    /// This server's public IP is required but could not be determined
    #[error("Public IP could not be resolved")]
    IpUnresolved,
}

impl ProviderError {
    /// Short reason tag shown to the end client
    #[must_use]
    pub const fn reason(&self) -> UnavailableReason {
        match self {
            Self::Disabled => UnavailableReason::Disabled,
            Self::Transport(_) | Self::Parse(_) => UnavailableReason::NoData,
            Self::NoMatch => UnavailableReason::NoMatch,
            Self::IpUnresolved => UnavailableReason::IpUnresolved,
        }
    }

    /// Whether the failure looks like a network symptom (possible block)
    /// that should move the provider off its current proxy
    #[must_use]
    pub const fn should_rotate_proxy(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// User-visible "unavailable" tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnavailableReason {
    Disabled,
    NoData,
    NoMatch,
    IpUnresolved,
}

impl UnavailableReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::NoData => "no-data",
            Self::NoMatch => "no-match",
            Self::IpUnresolved => "ip-unresolved",
        }
    }
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
