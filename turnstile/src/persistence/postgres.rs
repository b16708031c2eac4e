use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::StoreError;
use crate::participant::{ParticipantId, ParticipantRecord, ParticipantStatus};
use crate::store::ParticipantStore;

const SCHEMA: &str = include_str!("../../migrations/001_participants.sql");

/// PostgreSQL-backed participant store.
///
/// Rows live in `turnstile_participants`, scoped by `queue_name` so
/// several queues can share one table. Every method is a single
/// statement except `remove_many`, which runs in one transaction.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
    queue_name: String,
}

impl PostgresStore {
    pub fn new(pool: PgPool, queue_name: impl Into<String>) -> Self {
        Self {
            pool,
            queue_name: queue_name.into(),
        }
    }

    /// Open a connection pool and wrap it.
    pub async fn connect(
        connection_string: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        queue_name: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .connect(connection_string)
            .await?;
        Ok(Self::new(pool, queue_name))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Create the participants table and index if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: &PgRow) -> Result<ParticipantRecord, StoreError> {
        let status: String = row.try_get("status")?;
        let seq: i64 = row.try_get("seq")?;
        Ok(ParticipantRecord {
            id: ParticipantId::new(row.try_get::<String, _>("id")?),
            status: status.parse::<ParticipantStatus>().map_err(StoreError::Corrupt)?,
            joined_at: row.try_get("joined_at")?,
            state_at: row.try_get("state_at")?,
            seq: u64::try_from(seq)
                .map_err(|_| StoreError::Corrupt(format!("negative seq {seq}")))?,
        })
    }
}

#[async_trait]
impl ParticipantStore for PostgresStore {
    async fn load_all(&self) -> Result<Vec<ParticipantRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, status, joined_at, state_at, seq
            FROM turnstile_participants
            WHERE queue_name = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(&self.queue_name)
        .fetch_all(&self.pool)
        .await?;

        debug!(queue = %self.queue_name, rows = rows.len(), "loaded participants");
        rows.iter().map(Self::row_to_record).collect()
    }

    async fn get(
        &self,
        id: &ParticipantId,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, joined_at, state_at, seq
            FROM turnstile_participants
            WHERE queue_name = $1 AND id = $2
            "#,
        )
        .bind(&self.queue_name)
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn upsert(&mut self, record: &ParticipantRecord) -> Result<(), StoreError> {
        let seq = i64::try_from(record.seq)
            .map_err(|_| StoreError::Corrupt(format!("seq {} out of range", record.seq)))?;

        sqlx::query(
            r#"
            INSERT INTO turnstile_participants (queue_name, id, status, joined_at, state_at, seq)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (queue_name, id) DO UPDATE
            SET status = EXCLUDED.status,
                joined_at = EXCLUDED.joined_at,
                state_at = EXCLUDED.state_at,
                seq = EXCLUDED.seq
            "#,
        )
        .bind(&self.queue_name)
        .bind(record.id.as_str())
        .bind(record.status.as_str())
        .bind(record.joined_at)
        .bind(record.state_at)
        .bind(seq)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&mut self, id: &ParticipantId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM turnstile_participants WHERE queue_name = $1 AND id = $2")
            .bind(&self.queue_name)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove_many(&mut self, ids: &[ParticipantId]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<&str> = ids.iter().map(ParticipantId::as_str).collect();

        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query(
            "DELETE FROM turnstile_participants WHERE queue_name = $1 AND id = ANY($2)",
        )
        .bind(&self.queue_name)
        .bind(&ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;

        debug!(queue = %self.queue_name, requested = ids.len(), deleted, "removed participants");
        Ok(())
    }
}
