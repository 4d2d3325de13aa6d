//! The response sent when a request is over its limit.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::ratelimit::RateLimitDecision;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Stamp the limit, remaining count and reset timestamp onto a response.
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
}

/// A rejected request, rendered as `429 Too Many Requests`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRejection {
    decision: RateLimitDecision,
    retry_after_secs: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectionBody {
    error: &'static str,
    retry_after: u64,
}

impl RateLimitRejection {
    /// Build a rejection for `decision`, with the retry hint measured from `now`.
    pub fn new(decision: RateLimitDecision, now: u64) -> Self {
        Self {
            decision,
            retry_after_secs: decision.retry_after_secs(now),
        }
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after_secs
    }
}

impl IntoResponse for RateLimitRejection {
    fn into_response(self) -> Response {
        let body = RejectionBody {
            error: "Too many requests. Please try again later.",
            retry_after: self.retry_after_secs,
        };

        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        let headers = response.headers_mut();
        apply_rate_limit_headers(headers, &self.decision);
        headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        response
    }
}
