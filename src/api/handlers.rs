use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::private_url::PrivateUrl;
use crate::service::CreatePrivateUrl;
use crate::token::TokenSize;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatePrivateUrlRequest {
    pub action: String,
    pub owner: Option<Uuid>,
    /// Absolute expiry. Mutually exclusive with `expire_in_secs`.
    pub expires_at: Option<DateTime<Utc>>,
    pub expire_in_secs: Option<i64>,
    pub payload: Option<serde_json::Value>,
    pub usage_limit: Option<u32>,
    pub auto_delete: Option<bool>,
    pub token_size: Option<TokenSize>,
    pub dash_split_each: Option<i64>,
    pub replace: Option<bool>,
}

impl CreatePrivateUrlRequest {
    fn into_create(self) -> Result<CreatePrivateUrl, AppError> {
        let mut req = CreatePrivateUrl::new(self.action);
        match (self.expires_at, self.expire_in_secs) {
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "set either expires_at or expire_in_secs, not both".into(),
                ))
            }
            (Some(at), None) => req = req.expire(at),
            (None, Some(secs)) => {
                let duration = Duration::try_seconds(secs).ok_or_else(|| {
                    AppError::BadRequest(format!("expire_in_secs out of range: {}", secs))
                })?;
                req = req.expire(duration);
            }
            (None, None) => {}
        }
        if let Some(owner) = self.owner {
            req = req.owner(owner);
        }
        if let Some(payload) = self.payload {
            req = req.payload(payload);
        }
        if let Some(limit) = self.usage_limit {
            req = req.usage_limit(limit);
        }
        if let Some(size) = self.token_size {
            req = req.token_size(size);
        }
        if let Some(dash) = self.dash_split_each {
            req = req.dash_split_each(dash);
        }
        Ok(req
            .auto_delete(self.auto_delete.unwrap_or(false))
            .replace(self.replace.unwrap_or(false)))
    }
}

#[derive(Debug, Deserialize)]
pub struct LookupParams {
    pub action: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct PrivateUrlResponse {
    #[serde(flatten)]
    pub url: PrivateUrl,
    pub path: String,
    pub available: bool,
}

impl PrivateUrlResponse {
    fn new(url: PrivateUrl, path_prefix: &str) -> Self {
        Self {
            path: url.path(path_prefix),
            available: url.is_available_now(),
            url,
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────

/// POST /api/v1/private-urls: create a new private url
pub async fn create_private_url(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreatePrivateUrlRequest>,
) -> Result<(StatusCode, Json<PrivateUrlResponse>), AppError> {
    let req = payload.into_create()?;
    let url = state.urls.create(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(PrivateUrlResponse::new(url, &state.config.path_prefix)),
    ))
}

/// GET /api/v1/private-urls?action=..&token=..: look up without consuming
pub async fn find_private_url(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LookupParams>,
) -> Result<Json<PrivateUrlResponse>, AppError> {
    let url = state
        .urls
        .find(&params.action, &params.token)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(PrivateUrlResponse::new(url, &state.config.path_prefix)))
}

/// DELETE /api/v1/private-urls/:id: revoke
pub async fn revoke_private_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.urls.revoke(id).await? {
        tracing::info!(%id, "private url revoked");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
