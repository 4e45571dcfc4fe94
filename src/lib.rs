//! Instagram Manager Library
//!
//! Graph API client for an Instagram business account, plus the webhook
//! receiver that verifies, normalizes and dispatches Meta push notifications.

pub mod auth;
pub mod config;
pub mod graph;
pub mod logging;
pub mod metrics;
pub mod webhooks;
