//! Persistence for private url records.
//!
//! Writes that must be grouped (replace-purge plus insert) go through a
//! [`StoreTransaction`]. A transaction dropped without [`StoreTransaction::commit`]
//! is rolled back, which is also what happens when the surrounding future
//! is cancelled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::private_url::{NewPrivateUrl, PrivateUrl, UsageUpdate};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// `(action, token)` is already taken.
    #[error("(action, token) already exists")]
    Conflict,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait PrivateUrlStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;

    /// Exact, case-sensitive match. `Ok(None)` on a miss.
    async fn find_one(&self, action: &str, token: &str) -> Result<Option<PrivateUrl>, StoreError>;

    /// Writes only the usage fields. `first_used_at` is left alone when `None`.
    /// Returns `false` when the record no longer exists.
    async fn update_fields(&self, id: Uuid, update: &UsageUpdate) -> Result<bool, StoreError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Removes records whose expiry is at or before `now`. With
    /// `only_auto_delete`, records without the auto-delete flag are kept.
    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        only_auto_delete: bool,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    /// Deletes every record for `(action, owner)`.
    async fn delete_where(&mut self, action: &str, owner: Uuid) -> Result<u64, StoreError>;

    /// Inserts a new record. On [`StoreError::Conflict`] only this insert is
    /// rolled back; the transaction stays usable.
    async fn insert_unique(&mut self, record: NewPrivateUrl) -> Result<PrivateUrl, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
