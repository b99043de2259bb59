//! Success / failure hooks for the presentation path.
//!
//! Hooks are registered per action and run in registration order. The
//! first hook that returns a response wins and the rest are skipped. When
//! no hook answers, the view falls back to its default response.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::request::Parts;
use axum::response::Response;

use crate::models::private_url::PrivateUrl;

#[async_trait]
pub trait PrivateUrlHook: Send + Sync {
    /// `url` is `None` on the failure path when the token does not exist.
    async fn handle(&self, req: &Parts, url: Option<&PrivateUrl>, action: &str) -> Option<Response>;
}

#[async_trait]
impl<F> PrivateUrlHook for F
where
    F: Fn(&Parts, Option<&PrivateUrl>, &str) -> Option<Response> + Send + Sync,
{
    async fn handle(&self, req: &Parts, url: Option<&PrivateUrl>, action: &str) -> Option<Response> {
        self(req, url, action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Success,
    Failure,
}

#[derive(Clone, Default)]
pub struct HookRegistry {
    success: HashMap<String, Vec<Arc<dyn PrivateUrlHook>>>,
    failure: HashMap<String, Vec<Arc<dyn PrivateUrlHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, action: impl Into<String>, hook: impl PrivateUrlHook + 'static) -> Self {
        self.register(HookKind::Success, action, Arc::new(hook));
        self
    }

    pub fn on_failure(mut self, action: impl Into<String>, hook: impl PrivateUrlHook + 'static) -> Self {
        self.register(HookKind::Failure, action, Arc::new(hook));
        self
    }

    pub fn register(
        &mut self,
        kind: HookKind,
        action: impl Into<String>,
        hook: Arc<dyn PrivateUrlHook>,
    ) {
        let map = match kind {
            HookKind::Success => &mut self.success,
            HookKind::Failure => &mut self.failure,
        };
        map.entry(action.into()).or_default().push(hook);
    }

    /// Runs the hooks for `action` until one returns a response.
    pub async fn dispatch(
        &self,
        kind: HookKind,
        req: &Parts,
        url: Option<&PrivateUrl>,
        action: &str,
    ) -> Option<Response> {
        let map = match kind {
            HookKind::Success => &self.success,
            HookKind::Failure => &self.failure,
        };
        for hook in map.get(action).into_iter().flatten() {
            if let Some(resp) = hook.handle(req, url, action).await {
                return Some(resp);
            }
        }
        None
    }
}
