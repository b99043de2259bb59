//! In-process store for development (`serve --in-memory`) and tests.
//!
//! Transactions take the store lock for their whole lifetime and stage
//! writes on a copy, so readers never see a half-applied transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{PrivateUrlStore, StoreError, StoreTransaction};
use crate::models::private_url::{NewPrivateUrl, PrivateUrl, UsageUpdate};

type Key = (String, String);

#[derive(Clone, Default)]
struct Records {
    by_key: HashMap<Key, PrivateUrl>,
}

impl Records {
    fn find_by_id_mut(&mut self, id: Uuid) -> Option<&mut PrivateUrl> {
        self.by_key.values_mut().find(|r| r.id == Some(id))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<Mutex<Records>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record.
    pub async fn records(&self) -> Vec<PrivateUrl> {
        self.records.lock().await.by_key.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.by_key.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PrivateUrlStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let guard = self.records.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }

    async fn find_one(&self, action: &str, token: &str) -> Result<Option<PrivateUrl>, StoreError> {
        let records = self.records.lock().await;
        Ok(records
            .by_key
            .get(&(action.to_string(), token.to_string()))
            .cloned())
    }

    async fn update_fields(&self, id: Uuid, update: &UsageUpdate) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        let Some(record) = records.find_by_id_mut(id) else {
            return Ok(false);
        };
        record.usage_count = update.usage_count;
        record.last_used_at = Some(update.last_used_at);
        if let Some(first_used_at) = update.first_used_at {
            record.first_used_at = Some(first_used_at);
        }
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.by_key.len();
        records.by_key.retain(|_, r| r.id != Some(id));
        Ok(records.by_key.len() < before)
    }

    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        only_auto_delete: bool,
    ) -> Result<u64, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.by_key.len();
        records.by_key.retain(|_, r| {
            let expired = matches!(r.expires_at, Some(expires_at) if expires_at <= now);
            !(expired && (r.auto_delete || !only_auto_delete))
        });
        Ok((before - records.by_key.len()) as u64)
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Records>,
    staged: Records,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn delete_where(&mut self, action: &str, owner: Uuid) -> Result<u64, StoreError> {
        let before = self.staged.by_key.len();
        self.staged
            .by_key
            .retain(|_, r| !(r.action == action && r.owner == Some(owner)));
        Ok((before - self.staged.by_key.len()) as u64)
    }

    async fn insert_unique(&mut self, record: NewPrivateUrl) -> Result<PrivateUrl, StoreError> {
        let key = (record.action.clone(), record.token.clone());
        if self.staged.by_key.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        let stored = record.into_record(Uuid::new_v4(), Utc::now());
        self.staged.by_key.insert(key, stored.clone());
        Ok(stored)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
