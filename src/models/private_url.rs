use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PrivateUrlError;

pub const ACTION_MAX_LEN: usize = 32;

static ACTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]{1,32}$").unwrap());

/// Checks that an action name fits the `[-a-zA-Z0-9_]{1,32}` slug shape.
pub fn validate_action(action: &str) -> Result<(), PrivateUrlError> {
    if ACTION_RE.is_match(action) {
        Ok(())
    } else {
        Err(PrivateUrlError::invalid(format!(
            "action must be 1-{ACTION_MAX_LEN} chars of [-a-zA-Z0-9_] (got '{action}')"
        )))
    }
}

/// A token record bound to an action.
///
/// `id` is `None` until the record has been stored, and again after an
/// auto-delete removed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivateUrl {
    pub id: Option<Uuid>,
    pub owner: Option<Uuid>,
    pub action: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    /// 0 = unlimited.
    pub usage_limit: u32,
    pub usage_count: u32,
    pub first_used_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub auto_delete: bool,
}

/// What a single consumption requires from the store.
#[derive(Debug, Clone, PartialEq)]
pub enum UsageEffect {
    /// The record is exhausted and auto-delete is on.
    Delete,
    Update(UsageUpdate),
}

/// The fields a consumption changes. Nothing else is written.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageUpdate {
    pub usage_count: u32,
    pub last_used_at: DateTime<Utc>,
    /// Set only on the first consumption.
    pub first_used_at: Option<DateTime<Utc>>,
}

impl PrivateUrl {
    /// An unsaved, single-use record without expiry.
    pub fn new(action: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: None,
            owner: None,
            action: action.into(),
            token: token.into(),
            expires_at: None,
            payload: None,
            created_at: Utc::now(),
            usage_limit: 1,
            usage_count: 0,
            first_used_at: None,
            last_used_at: None,
            auto_delete: false,
        }
    }

    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    /// Whether the record can still be used at `as_of`. Expiry is exclusive:
    /// a record is already expired at exactly `expires_at`.
    pub fn is_available(&self, as_of: DateTime<Utc>) -> bool {
        if matches!(self.expires_at, Some(expires_at) if expires_at <= as_of) {
            return false;
        }
        if self.usage_limit != 0 && self.usage_limit <= self.usage_count {
            return false;
        }
        true
    }

    pub fn is_available_now(&self) -> bool {
        self.is_available(Utc::now())
    }

    /// Applies one consumption to the in-memory record and reports what has
    /// to be persisted.
    ///
    /// When auto-delete triggers, only the counter moves; the usage
    /// timestamps are left untouched since the record is about to go away.
    pub fn register_use(&mut self, now: DateTime<Utc>) -> UsageEffect {
        self.usage_count = self.usage_count.saturating_add(1);

        if self.auto_delete && !self.is_available(now) {
            return UsageEffect::Delete;
        }

        let first_used_at = if self.first_used_at.is_none() {
            self.first_used_at = Some(now);
            Some(now)
        } else {
            None
        };
        self.last_used_at = Some(now);

        UsageEffect::Update(UsageUpdate {
            usage_count: self.usage_count,
            last_used_at: now,
            first_used_at,
        })
    }

    /// Presentation path of the record, e.g. `/p/invite/AbC...`.
    pub fn path(&self, prefix: &str) -> String {
        format!(
            "{}/{}/{}",
            prefix.trim_end_matches('/'),
            self.action,
            self.token
        )
    }
}

/// Insert payload for [`crate::store::StoreTransaction::insert_unique`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrivateUrl {
    pub owner: Option<Uuid>,
    pub action: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub payload: Option<serde_json::Value>,
    pub usage_limit: u32,
    pub auto_delete: bool,
}

impl NewPrivateUrl {
    /// Materializes the stored record once the store has assigned identity.
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> PrivateUrl {
        PrivateUrl {
            id: Some(id),
            owner: self.owner,
            action: self.action,
            token: self.token,
            expires_at: self.expires_at,
            payload: self.payload,
            created_at,
            usage_limit: self.usage_limit,
            usage_count: 0,
            first_used_at: None,
            last_used_at: None,
            auto_delete: self.auto_delete,
        }
    }
}
