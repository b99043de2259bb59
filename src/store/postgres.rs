use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{PrivateUrlStore, StoreError, StoreTransaction};
use crate::models::private_url::{NewPrivateUrl, PrivateUrl, UsageUpdate};

const COLUMNS: &str = "id, owner, action, token, expires_at, payload, created_at, \
    usage_limit, usage_count, first_used_at, last_used_at, auto_delete";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PrivateUrlStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn find_one(&self, action: &str, token: &str) -> Result<Option<PrivateUrl>, StoreError> {
        let row = sqlx::query_as::<_, PrivateUrlRow>(&format!(
            "SELECT {COLUMNS} FROM private_urls WHERE action = $1 AND token = $2"
        ))
        .bind(action)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PrivateUrl::try_from).transpose()
    }

    async fn update_fields(&self, id: Uuid, update: &UsageUpdate) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"UPDATE private_urls
               SET usage_count = $2,
                   last_used_at = $3,
                   first_used_at = COALESCE($4, first_used_at)
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(i64::from(update.usage_count))
        .bind(update.last_used_at)
        .bind(update.first_used_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM private_urls WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(
        &self,
        now: DateTime<Utc>,
        only_auto_delete: bool,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"DELETE FROM private_urls
               WHERE expires_at IS NOT NULL
                 AND expires_at <= $1
                 AND ($2 = false OR auto_delete = true)"#,
        )
        .bind(now)
        .bind(only_auto_delete)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn delete_where(&mut self, action: &str, owner: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM private_urls WHERE action = $1 AND owner = $2")
            .bind(action)
            .bind(owner)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_unique(&mut self, record: NewPrivateUrl) -> Result<PrivateUrl, StoreError> {
        // A unique violation aborts the whole PG transaction unless the
        // insert runs inside its own savepoint.
        let mut savepoint = self.tx.begin().await?;

        let inserted = sqlx::query_as::<_, PrivateUrlRow>(&format!(
            r#"INSERT INTO private_urls (owner, action, token, expires_at, payload, usage_limit, auto_delete)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {COLUMNS}"#
        ))
        .bind(record.owner)
        .bind(&record.action)
        .bind(&record.token)
        .bind(record.expires_at)
        .bind(&record.payload)
        .bind(i64::from(record.usage_limit))
        .bind(record.auto_delete)
        .fetch_one(&mut *savepoint)
        .await;

        match inserted {
            Ok(row) => {
                savepoint.commit().await?;
                PrivateUrl::try_from(row)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                savepoint.rollback().await?;
                Err(StoreError::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}

// -- Row Types --

#[derive(Debug, sqlx::FromRow)]
pub struct PrivateUrlRow {
    pub id: Uuid,
    pub owner: Option<Uuid>,
    pub action: String,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub payload: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub usage_limit: i64,
    pub usage_count: i64,
    pub first_used_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub auto_delete: bool,
}

impl TryFrom<PrivateUrlRow> for PrivateUrl {
    type Error = StoreError;

    fn try_from(row: PrivateUrlRow) -> Result<Self, Self::Error> {
        let counter = |name: &str, v: i64| {
            u32::try_from(v)
                .map_err(|_| StoreError::Corrupt(format!("{} out of range for {}: {}", name, row.id, v)))
        };
        Ok(PrivateUrl {
            id: Some(row.id),
            owner: row.owner,
            usage_limit: counter("usage_limit", row.usage_limit)?,
            usage_count: counter("usage_count", row.usage_count)?,
            action: row.action,
            token: row.token,
            expires_at: row.expires_at,
            payload: row.payload,
            created_at: row.created_at,
            first_used_at: row.first_used_at,
            last_used_at: row.last_used_at,
            auto_delete: row.auto_delete,
        })
    }
}
