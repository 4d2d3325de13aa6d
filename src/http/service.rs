//! Admission API called by storefront handlers before they do their main work.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::error::ApiError;
use super::middleware::with_rate_limit;
use super::rejection::{apply_rate_limit_headers, RateLimitRejection};
use crate::ratelimit::{ClientKey, RateLimitDecision, RateLimitPolicy, RateLimiterBackend};

/// Shared state for the admission routes.
pub struct AdmissionState<R> {
    limiter: Arc<R>,
}

impl<R> Clone for AdmissionState<R> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
        }
    }
}

/// Body of `POST /v1/check`: either a preset name or an explicit limit and window.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub key: String,
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub window_secs: Option<u64>,
}

impl CheckRequest {
    fn resolve_policy(&self) -> Result<RateLimitPolicy, ApiError> {
        if self.key.trim().is_empty() {
            return Err(ApiError::InvalidRequest("key must not be empty"));
        }

        let policy = match (&self.policy, self.limit, self.window_secs) {
            (Some(name), _, _) => lookup_policy(name)?,
            (None, Some(limit), Some(window_secs)) => RateLimitPolicy::custom(limit, window_secs),
            _ => {
                return Err(ApiError::InvalidRequest(
                    "either policy or both limit and windowSecs are required",
                ))
            }
        };

        if !policy.is_valid() {
            return Err(ApiError::InvalidRequest(
                "limit must be positive and windowSecs between 1 and one year",
            ));
        }
        Ok(policy)
    }
}

fn lookup_policy(name: &str) -> Result<RateLimitPolicy, ApiError> {
    RateLimitPolicy::preset(name).ok_or_else(|| ApiError::UnknownPolicy(name.to_string()))
}

/// Build the admission router.
pub fn router<R: RateLimiterBackend + 'static>(limiter: Arc<R>) -> Router {
    let state = AdmissionState {
        limiter: limiter.clone(),
    };

    let read_routes = with_rate_limit(
        Router::new().route("/v1/policies", get(list_policies)),
        limiter,
        RateLimitPolicy::API,
    );

    Router::new()
        .route("/health", get(health))
        .route("/v1/admission/{policy}", post(admit::<R>))
        .route("/v1/check", post(check::<R>))
        .with_state(state)
        .merge(read_routes)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn list_policies() -> Json<&'static [RateLimitPolicy]> {
    Json(RateLimitPolicy::PRESETS)
}

/// Admit or reject the client identified by the forwarded headers.
#[instrument(skip_all, fields(policy = %policy_name))]
async fn admit<R: RateLimiterBackend + 'static>(
    State(state): State<AdmissionState<R>>,
    Path(policy_name): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let policy = lookup_policy(&policy_name)?;
    let key = ClientKey::from_headers(&headers);

    if key.is_unknown() {
        debug!("No forwarded address headers, using the shared fallback bucket");
    }

    Ok(respond(state.limiter.as_ref(), key.as_str(), &policy))
}

/// Check an explicit key, for callers that derive their own identifiers.
#[instrument(skip_all, fields(key = %request.key))]
async fn check<R: RateLimiterBackend + 'static>(
    State(state): State<AdmissionState<R>>,
    Json(request): Json<CheckRequest>,
) -> Result<Response, ApiError> {
    let policy = request.resolve_policy()?;
    Ok(respond(state.limiter.as_ref(), &request.key, &policy))
}

fn respond<R: RateLimiterBackend>(limiter: &R, key: &str, policy: &RateLimitPolicy) -> Response {
    let decision: RateLimitDecision = limiter.check(key, policy);

    if !decision.allowed {
        info!(
            key = %key,
            policy = policy.name,
            "Admission denied"
        );
        return RateLimitRejection::new(decision, limiter.now_millis()).into_response();
    }

    let mut response = (StatusCode::OK, Json(decision)).into_response();
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(policy: Option<&str>, limit: Option<u32>, window_secs: Option<u64>) -> CheckRequest {
        CheckRequest {
            key: "user-42".to_string(),
            policy: policy.map(str::to_string),
            limit,
            window_secs,
        }
    }

    #[test]
    fn test_resolve_preset() {
        let policy = request(Some("promo"), None, None).resolve_policy().unwrap();
        assert_eq!(policy, RateLimitPolicy::PROMO);
    }

    #[test]
    fn test_preset_wins_over_explicit_values() {
        let policy = request(Some("checkout"), Some(1000), Some(1))
            .resolve_policy()
            .unwrap();
        assert_eq!(policy, RateLimitPolicy::CHECKOUT);
    }

    #[test]
    fn test_resolve_explicit() {
        let policy = request(None, Some(7), Some(30)).resolve_policy().unwrap();
        assert_eq!(policy, RateLimitPolicy::custom(7, 30));
    }

    #[test]
    fn test_request_body_is_camel_case() {
        let request: CheckRequest =
            serde_json::from_str(r#"{"key": "user-42", "limit": 3, "windowSecs": 90}"#).unwrap();
        assert_eq!(request.resolve_policy().unwrap(), RateLimitPolicy::custom(3, 90));
    }

    #[test]
    fn test_resolve_errors() {
        assert_eq!(
            request(Some("nope"), None, None).resolve_policy(),
            Err(ApiError::UnknownPolicy("nope".to_string()))
        );
        assert!(matches!(
            request(None, Some(5), None).resolve_policy(),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            request(None, Some(0), Some(60)).resolve_policy(),
            Err(ApiError::InvalidRequest(_))
        ));
        assert!(matches!(
            request(None, Some(1), Some(u64::MAX / 1000 + 1)).resolve_policy(),
            Err(ApiError::InvalidRequest(_))
        ));

        let mut empty_key = request(Some("api"), None, None);
        empty_key.key = "  ".to_string();
        assert!(matches!(
            empty_key.resolve_policy(),
            Err(ApiError::InvalidRequest(_))
        ));
    }
}
