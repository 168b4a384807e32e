//! Stream URL rewriting
//!
//! Player links returned by providers are never handed out as-is when the
//! provider is configured to stream through this server. The rewriter maps
//! an upstream manifest or subtitle URL onto:
//! - this server's `/proxy/` endpoint (`streamproxy`, or a client country
//!   listed in `geostreamproxy`), optionally signed for the requesting
//!   client's IP and tagged with the provider whose egress must fetch it
//!   (`useproxystream`);
//! - an external APN host (`apnstream`);
//! - or the upstream URL unchanged (`rhub`, or no routing configured).

use std::fmt::Write;
use std::net::IpAddr;

use hmac::{Hmac, Mac};
use kinolite_core::config::{StreamOptions, StreamProxyConfig};
use kinolite_core::{ProxyDescriptor, ProxyRotation};
use percent_encoding::percent_decode_str;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Path prefix of the proxy endpoint on the public host
pub const PROXY_PATH: &str = "/proxy/";

/// Who a link is being built for
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    /// Provider that resolved the stream
    pub provider: &'a str,
    pub client_ip: Option<IpAddr>,
    /// ISO 3166 alpha-2 country of the client, when known
    pub country: Option<&'a str>,
}

/// A `/proxy/` link taken apart again by the serving side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxiedLink {
    pub upstream: String,
    /// Provider whose egress proxies must fetch the upstream
    pub egress: Option<String>,
    pub ip: Option<IpAddr>,
    pub sig: Option<String>,
}

impl ProxiedLink {
    /// Parse the path and query of a proxied link
    #[must_use]
    pub fn parse(path: &str, query: Option<&str>) -> Option<Self> {
        let encoded = path.strip_prefix(PROXY_PATH)?;
        let upstream = percent_decode_str(encoded).decode_utf8().ok()?.into_owned();
        url::Url::parse(&upstream).ok()?;

        let mut link = Self {
            upstream,
            egress: None,
            ip: None,
            sig: None,
        };

        for (name, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match name.as_ref() {
                "egress" => link.egress = Some(value.into_owned()).filter(|p| !p.is_empty()),
                "ip" => link.ip = Some(value.parse().ok()?),
                "sig" => link.sig = Some(value.into_owned()),
                _ => {}
            }
        }

        Some(link)
    }

    /// Proxy to fetch the upstream through, picked from the egress
    /// provider's pool. `None` means a direct connection.
    #[must_use]
    pub fn egress_proxy(&self, rotation: &ProxyRotation) -> Option<ProxyDescriptor> {
        rotation.select(self.egress.as_deref()?)
    }
}

/// Rewrites upstream player links for one deployment.
///
/// Stateless apart from the deployment settings: the same inputs always
/// produce the same link.
#[derive(Debug, Clone)]
pub struct StreamRewriter {
    public_host: String,
    link_secret: Option<String>,
}

impl StreamRewriter {
    #[must_use]
    pub fn new(config: &StreamProxyConfig) -> Self {
        Self {
            public_host: config.public_host.trim_end_matches('/').to_string(),
            link_secret: config.link_secret.clone().filter(|s| !s.is_empty()),
        }
    }

    /// Rewrite `upstream` according to the provider's stream routing.
    ///
    /// The client IP binds a proxied link to one client when a link secret
    /// is configured; it is ignored otherwise.
    #[must_use]
    pub fn rewrite(&self, options: &StreamOptions, upstream: &str, ctx: &LinkContext<'_>) -> String {
        if options.rhub {
            return upstream.to_string();
        }

        if options.proxies_for(ctx.country) {
            let egress = options.useproxystream.then_some(ctx.provider);
            return self.proxied(upstream, egress, ctx.client_ip);
        }

        if options.apnstream {
            if let Some(apn) = options.apn.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
                return format!("{}/{upstream}", apn.trim_end_matches('/'));
            }
        }

        upstream.to_string()
    }

    fn proxied(&self, upstream: &str, egress: Option<&str>, client_ip: Option<IpAddr>) -> String {
        let mut link = format!("{}{PROXY_PATH}{}", self.public_host, percent_encode(upstream));
        let mut query = form_urlencoded::Serializer::new(String::new());

        if let Some(provider) = egress {
            query.append_pair("egress", provider);
        }
        if let (Some(secret), Some(ip)) = (&self.link_secret, client_ip) {
            query.append_pair("ip", &ip.to_string());
            query.append_pair("sig", &sign(secret, upstream, egress, ip));
        }

        let query = query.finish();
        if !query.is_empty() {
            let _ = write!(link, "?{query}");
        }
        link
    }

    /// Check a proxied link's signature against the requesting client.
    ///
    /// Always true when no link secret is configured.
    #[must_use]
    pub fn verify_link(&self, link: &ProxiedLink, client_ip: IpAddr) -> bool {
        let Some(secret) = &self.link_secret else {
            return true;
        };

        let Some(sig) = &link.sig else {
            debug!(ip = %client_ip, "Rejected proxied link without signature");
            return false;
        };

        let expected = sign(secret, &link.upstream, link.egress.as_deref(), client_ip);
        let valid: bool = expected.as_bytes().ct_eq(sig.as_bytes()).into();
        if !valid {
            debug!(ip = %client_ip, "Rejected proxied link with bad signature");
        }
        valid
    }
}

fn sign(secret: &str, upstream: &str, egress: Option<&str>, ip: IpAddr) -> String {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(upstream.as_bytes());
    mac.update(b"|");
    mac.update(egress.unwrap_or_default().as_bytes());
    mac.update(b"|");
    mac.update(ip.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Percent-encode every byte outside the RFC 3986 unreserved set.
#[must_use]
pub fn percent_encode(input: &str) -> String {
    let mut result = String::with_capacity(input.len() * 2);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                let _ = write!(result, "%{byte:02X}");
            }
        }
    }
    result
}
