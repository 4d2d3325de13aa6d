//! Storefront Guard - per-client admission control
//!
//! This crate implements the fixed-window rate limiter that protects the
//! gift card storefront's checkout, payment, promo code and analytics
//! endpoints, along with a small HTTP service the storefront calls before
//! doing its main work. Counts are kept in process memory; each instance
//! limits independently.

pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
