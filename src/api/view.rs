//! `GET /{action}/{token}`: the link a token holder follows.
//!
//! Unknown or unavailable tokens go to the failure hooks (default 404).
//! An available token is consumed first, then the success hooks see the
//! updated record (default 302 to the configured redirect).

use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::AppError;
use crate::hooks::HookKind;
use crate::metrics::Rejection;
use crate::models::private_url::validate_action;
use crate::AppState;

static TOKEN_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]{1,65}$").unwrap());

pub async fn private_url_view(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    req: Request,
) -> Result<Response, AppError> {
    // same as an unmatched route: no hooks
    let Ok(Path((action, token))) = path else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    if validate_action(&action).is_err() || !TOKEN_PATH_RE.is_match(&token) {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }

    let (parts, _body) = req.into_parts();

    match state.urls.find(&action, &token).await? {
        Some(mut url) if url.is_available_now() => {
            state.urls.record_usage(&mut url).await?;
            let resp = state
                .hooks
                .dispatch(HookKind::Success, &parts, Some(&url), &action)
                .await;
            Ok(resp.unwrap_or_else(|| redirect(&state.config.success_redirect)))
        }
        found => {
            let reason = if found.is_some() {
                Rejection::Unavailable
            } else {
                Rejection::NotFound
            };
            state.urls.metrics().rejected(reason);
            tracing::debug!(%action, ?reason, "private url rejected");

            let resp = state
                .hooks
                .dispatch(HookKind::Failure, &parts, found.as_ref(), &action)
                .await;
            Ok(resp.unwrap_or_else(|| StatusCode::NOT_FOUND.into_response()))
        }
    }
}

fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}
