//! Rate limiting logic and state management.

mod backend;
mod client_key;
mod clock;
mod entry;
mod limiter;
pub mod policy;

pub use backend::RateLimiterBackend;
pub use client_key::{ClientKey, FORWARDED_HEADERS, UNKNOWN_CLIENT};
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{RateLimitDecision, RateLimitEntry};
pub use limiter::RateLimiter;
pub use policy::RateLimitPolicy;
