//! HTTP surface: rejection responses, route middleware and the admission API.

mod error;
mod middleware;
mod rejection;
mod server;
mod service;

pub use error::ApiError;
pub use middleware::{enforce, with_rate_limit, RateLimitState};
pub use rejection::{
    apply_rate_limit_headers, RateLimitRejection, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING,
    X_RATELIMIT_RESET,
};
pub use server::HttpServer;
pub use service::{router, AdmissionState, CheckRequest};
