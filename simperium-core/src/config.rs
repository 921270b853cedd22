//! Service endpoints and HTTP client settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default host for the data service.
pub const DEFAULT_API_HOST: &str = "api.simperium.com";
/// Default host for the auth service.
pub const DEFAULT_AUTH_HOST: &str = "auth.simperium.com";
/// Environment variable overriding the data service host.
pub const API_HOST_ENV: &str = "SIMPERIUM_APIHOST";
/// Environment variable overriding the auth service host.
pub const AUTH_HOST_ENV: &str = "SIMPERIUM_AUTHHOST";
/// Protocol version segment of every URL.
pub const API_VERSION: &str = "1";

/// Scheme and host of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// URL scheme, `https` unless pointing at a local server.
    pub scheme: String,
    /// Host, optionally with port.
    pub host: String,
}

impl Endpoint {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// Data service endpoint, honoring `SIMPERIUM_APIHOST`.
    pub fn api() -> Self {
        Self::api_with(|key| std::env::var(key).ok())
    }

    /// Auth service endpoint, honoring `SIMPERIUM_AUTHHOST`.
    pub fn auth() -> Self {
        Self::auth_with(|key| std::env::var(key).ok())
    }

    /// Data service endpoint resolved through `lookup` instead of the process env.
    pub fn api_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::resolve(lookup, API_HOST_ENV, DEFAULT_API_HOST)
    }

    /// Auth service endpoint resolved through `lookup` instead of the process env.
    pub fn auth_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::resolve(lookup, AUTH_HOST_ENV, DEFAULT_AUTH_HOST)
    }

    fn resolve(lookup: impl Fn(&str) -> Option<String>, key: &str, fallback: &str) -> Self {
        let host = lookup(key)
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        Self::new("https", host)
    }

    /// Builds `{scheme}://{host}/1/{path}`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}://{}/{}/{}",
            self.scheme,
            self.host,
            API_VERSION,
            path.trim_start_matches('/')
        )
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::api()
    }
}

/// Settings for the underlying HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Bound on establishing a TCP/TLS connection. Not a request timeout:
    /// long-polls may legitimately stay open indefinitely.
    pub connect_timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            user_agent: format!("simperium-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
