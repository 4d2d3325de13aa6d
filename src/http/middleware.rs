//! Axum middleware that enforces a policy before the wrapped handler runs.

use axum::extract::{Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;
use tracing::warn;

use super::rejection::{apply_rate_limit_headers, RateLimitRejection};
use crate::ratelimit::{ClientKey, RateLimitPolicy, RateLimiterBackend};

/// The limiter and policy a route is guarded with.
pub struct RateLimitState<R> {
    limiter: Arc<R>,
    policy: RateLimitPolicy,
}

impl<R> RateLimitState<R> {
    pub fn new(limiter: Arc<R>, policy: RateLimitPolicy) -> Self {
        Self { limiter, policy }
    }
}

impl<R> Clone for RateLimitState<R> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            policy: self.policy,
        }
    }
}

/// Reject over-limit clients with 429; otherwise run the handler and add
/// `X-RateLimit-*` headers to its response.
pub async fn enforce<R: RateLimiterBackend + 'static>(
    State(state): State<RateLimitState<R>>,
    request: Request,
    next: Next,
) -> Response {
    let key = ClientKey::from_headers(request.headers());
    let decision = state.limiter.check(key.as_str(), &state.policy);

    if !decision.allowed {
        warn!(
            key = %key,
            policy = state.policy.name,
            path = %request.uri().path(),
            "Request rejected by rate limit"
        );
        return RateLimitRejection::new(decision, state.limiter.now_millis()).into_response();
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Guard every route currently in `router` with `policy`.
pub fn with_rate_limit<R, S>(
    router: Router<S>,
    limiter: Arc<R>,
    policy: RateLimitPolicy,
) -> Router<S>
where
    R: RateLimiterBackend + 'static,
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(from_fn_with_state(
        RateLimitState::new(limiter, policy),
        enforce::<R>,
    ))
}
