//! Named rate limit policies per endpoint category.
//!
//! Policies are static: each endpoint category gets a fixed
//! "N requests per T seconds" budget, stricter for payment-adjacent
//! operations and looser for analytics ingestion.

use serde::Serialize;
use std::time::Duration;

/// Longest window a policy may use: one year.
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

/// A limit/window pair applied independently per client key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    /// Short symbolic name of the endpoint category
    pub name: &'static str,
    /// Maximum requests per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// Order creation and payment initiation.
    pub const CHECKOUT: Self = Self::new("checkout", 5, 60);
    /// Payment status and callback polling.
    pub const PAYMENT: Self = Self::new("payment", 10, 60);
    /// Promo and referral code validation.
    pub const PROMO: Self = Self::new("promo", 10, 60);
    /// Login, magic link and password reset.
    pub const AUTH: Self = Self::new("auth", 5, 300);
    /// Contact form and newsletter signup.
    pub const CONTACT: Self = Self::new("contact", 3, 3600);
    /// Analytics event ingestion.
    pub const ANALYTICS: Self = Self::new("analytics", 100, 60);
    /// General read APIs.
    pub const API: Self = Self::new("api", 60, 60);

    /// All built-in presets.
    pub const PRESETS: &'static [Self] = &[
        Self::CHECKOUT,
        Self::PAYMENT,
        Self::PROMO,
        Self::AUTH,
        Self::CONTACT,
        Self::ANALYTICS,
        Self::API,
    ];

    pub const fn new(name: &'static str, limit: u32, window_secs: u64) -> Self {
        Self {
            name,
            limit,
            window_secs,
        }
    }

    /// An ad-hoc policy that is not one of the presets.
    pub const fn custom(limit: u32, window_secs: u64) -> Self {
        Self::new("custom", limit, window_secs)
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        Self::PRESETS.iter().copied().find(|p| p.name == name)
    }

    /// The window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Whether the policy can be enforced: a positive limit and a window
    /// between one second and [`MAX_WINDOW_SECS`].
    pub fn is_valid(&self) -> bool {
        self.limit > 0 && (1..=MAX_WINDOW_SECS).contains(&self.window_secs)
    }
}
