//! Token lifecycle: creation (with the replace policy), lookup and
//! consumption.
//!
//! Quota enforcement is best-effort. Two consumers presenting the same token
//! at the same moment can both see it as available and both succeed; callers
//! that need exactly-once semantics must serialize consumption themselves
//! (row lock, version check, single writer).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::errors::PrivateUrlError;
use crate::metrics::Metrics;
use crate::models::private_url::{validate_action, NewPrivateUrl, PrivateUrl, UsageEffect};
use crate::store::{PrivateUrlStore, StoreError};
use crate::token::{
    validate_token_size, RandomTokenGenerator, TokenGenerator, TokenSize, DEFAULT_DASH_SPLIT_EACH,
};

/// Insert attempts before creation gives up on finding a free token.
pub const MAX_CREATE_ATTEMPTS: u32 = 20;

/// Absolute or relative expiry. A relative one is resolved at creation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expiry {
    At(DateTime<Utc>),
    In(Duration),
}

impl Expiry {
    /// Fails when a relative expiry lands outside the representable range.
    pub fn resolve(self, now: DateTime<Utc>) -> Result<DateTime<Utc>, PrivateUrlError> {
        match self {
            Expiry::At(at) => Ok(at),
            Expiry::In(duration) => now.checked_add_signed(duration).ok_or_else(|| {
                PrivateUrlError::invalid(format!(
                    "expiry {}s from now is out of range",
                    duration.num_seconds()
                ))
            }),
        }
    }
}

impl From<DateTime<Utc>> for Expiry {
    fn from(at: DateTime<Utc>) -> Self {
        Expiry::At(at)
    }
}

impl From<Duration> for Expiry {
    fn from(duration: Duration) -> Self {
        Expiry::In(duration)
    }
}

/// Parameters for [`PrivateUrls::create`].
#[derive(Debug, Clone)]
pub struct CreatePrivateUrl {
    pub action: String,
    pub owner: Option<Uuid>,
    pub expire: Option<Expiry>,
    pub payload: Option<serde_json::Value>,
    /// 0 = unlimited.
    pub usage_limit: u32,
    pub auto_delete: bool,
    pub token_size: TokenSize,
    pub dash_split_each: i64,
    /// Drop the owner's existing urls for this action first. Ignored
    /// without an owner.
    pub replace: bool,
}

impl CreatePrivateUrl {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            owner: None,
            expire: None,
            payload: None,
            usage_limit: 1,
            auto_delete: false,
            token_size: TokenSize::default(),
            dash_split_each: DEFAULT_DASH_SPLIT_EACH,
            replace: false,
        }
    }

    pub fn owner(mut self, owner: Uuid) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn expire(mut self, expire: impl Into<Expiry>) -> Self {
        self.expire = Some(expire.into());
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn usage_limit(mut self, usage_limit: u32) -> Self {
        self.usage_limit = usage_limit;
        self
    }

    pub fn auto_delete(mut self, auto_delete: bool) -> Self {
        self.auto_delete = auto_delete;
        self
    }

    pub fn token_size(mut self, token_size: TokenSize) -> Self {
        self.token_size = token_size;
        self
    }

    pub fn dash_split_each(mut self, dash_split_each: i64) -> Self {
        self.dash_split_each = dash_split_each;
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }
}

/// Result of [`PrivateUrls::record_usage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// Usage fields were written (or would be, for an unsaved record).
    Recorded,
    /// The record ran out and was auto-deleted.
    Deleted,
}

#[derive(Clone)]
pub struct PrivateUrls {
    store: Arc<dyn PrivateUrlStore>,
    generator: Arc<dyn TokenGenerator>,
    metrics: Metrics,
}

impl PrivateUrls {
    pub fn new(store: Arc<dyn PrivateUrlStore>) -> Self {
        Self {
            store,
            generator: Arc::new(RandomTokenGenerator),
            metrics: Metrics::new(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Creates and stores a new private url.
    ///
    /// The replace purge and the insert attempts share one transaction, so a
    /// failure anywhere leaves the previous urls in place.
    #[tracing::instrument(skip(self, req), fields(action = %req.action, replace = req.replace))]
    pub async fn create(&self, req: CreatePrivateUrl) -> Result<PrivateUrl, PrivateUrlError> {
        validate_action(&req.action)?;
        validate_token_size(&req.token_size, req.dash_split_each)?;

        let expires_at = req.expire.map(|e| e.resolve(Utc::now())).transpose()?;

        let mut tx = self.store.begin().await?;

        if let (true, Some(owner)) = (req.replace, req.owner) {
            let purged = tx.delete_where(&req.action, owner).await?;
            if purged > 0 {
                tracing::debug!(purged, %owner, "purging previous private urls");
            }
        }

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let token = self
                .generator
                .generate(&req.token_size, req.dash_split_each)?;
            let record = NewPrivateUrl {
                owner: req.owner,
                action: req.action.clone(),
                token,
                expires_at,
                payload: req.payload.clone(),
                usage_limit: req.usage_limit,
                auto_delete: req.auto_delete,
            };

            match tx.insert_unique(record).await {
                Ok(url) => {
                    tx.commit().await?;
                    self.metrics.created();
                    tracing::info!(id = ?url.id, attempt, "private url created");
                    return Ok(url);
                }
                Err(StoreError::Conflict) => {
                    self.metrics.create_conflict();
                    tracing::debug!(attempt, "token collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            token_size = ?req.token_size,
            attempts = MAX_CREATE_ATTEMPTS,
            "could not find a free token"
        );
        Err(PrivateUrlError::ExhaustedRetries {
            action: req.action,
            attempts: MAX_CREATE_ATTEMPTS,
        })
    }

    /// Looks up `(action, token)`. `Ok(None)` when no such url exists.
    pub async fn find(
        &self,
        action: &str,
        token: &str,
    ) -> Result<Option<PrivateUrl>, PrivateUrlError> {
        Ok(self.store.find_one(action, token).await?)
    }

    /// Counts one use of `url` and persists the outcome.
    ///
    /// An unsaved record (`id == None`) is only updated in memory. When
    /// auto-delete removes the record, `url.id` is cleared.
    pub async fn record_usage(&self, url: &mut PrivateUrl) -> Result<Consumption, PrivateUrlError> {
        let outcome = match url.register_use(Utc::now()) {
            UsageEffect::Delete => {
                if let Some(id) = url.id {
                    if !self.store.delete(id).await? {
                        tracing::debug!(%id, "auto-delete: record already gone");
                    }
                    url.id = None;
                }
                Consumption::Deleted
            }
            UsageEffect::Update(update) => {
                if let Some(id) = url.id {
                    if !self.store.update_fields(id, &update).await? {
                        tracing::warn!(%id, "usage update hit a missing record");
                    }
                }
                Consumption::Recorded
            }
        };

        self.metrics.consumed(outcome);
        tracing::debug!(
            action = %url.action,
            usage_count = url.usage_count,
            ?outcome,
            "private url used"
        );
        Ok(outcome)
    }

    /// Deletes a url by id. Returns `false` when it did not exist.
    pub async fn revoke(&self, id: Uuid) -> Result<bool, PrivateUrlError> {
        Ok(self.store.delete(id).await?)
    }

    /// Removes expired urls; with `only_auto_delete`, only those flagged for
    /// auto-delete.
    pub async fn purge_expired(&self, only_auto_delete: bool) -> Result<u64, PrivateUrlError> {
        Ok(self.store.delete_expired(Utc::now(), only_auto_delete).await?)
    }
}
