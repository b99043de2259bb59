//! privateurl: single-use (or limited-use) tokens bound to an action,
//! served as `/{action}/{token}` links.
//!
//! The lifecycle lives in [`service::PrivateUrls`]; [`api::router`] puts the
//! HTTP surface on top of it.

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod service;
pub mod store;
pub mod token;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub urls: service::PrivateUrls,
    pub hooks: hooks::HookRegistry,
    pub config: config::Config,
}
