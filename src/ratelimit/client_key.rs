//! Client key derivation from proxy-forwarded headers.

use axum::http::HeaderMap;

/// Headers consulted for the client address, highest priority first.
pub const FORWARDED_HEADERS: [&str; 3] = ["x-forwarded-for", "x-real-ip", "cf-connecting-ip"];

/// Key shared by every request that carries none of [`FORWARDED_HEADERS`].
///
/// All such requests land in one bucket. The service is expected to sit
/// behind a proxy that always sets at least one of the headers.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// The identifier a request is bucketed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey(String);

impl ClientKey {
    /// Derive the key from request headers.
    ///
    /// `x-forwarded-for` may hold a proxy chain; only the first (client)
    /// entry is used.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        FORWARDED_HEADERS
            .iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(',').next())
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(|value| Self(value.to_string()))
            .unwrap_or_else(|| Self(UNKNOWN_CLIENT.to_string()))
    }

    /// Whether this is the shared fallback bucket.
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
