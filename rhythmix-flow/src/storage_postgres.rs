use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
    types::Json,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::{
    error::{FlowError, Result},
    storage::{Checkpoint, CheckpointStore, Position, expiry_from},
};

const CHECKPOINT_COLUMNS: &str =
    "session_id, workflow_id, position, state, revision, created_at, expires_at";

/// Postgres-backed CheckpointStore.
///
/// Every mutating operation is a single statement, so compare-and-delete and
/// compare-and-swap are atomic without explicit transactions.
pub struct PostgresCheckpointStore {
    pool: Arc<PgPool>,
}

fn storage_error(e: sqlx::Error) -> FlowError {
    FlowError::StorageError(e.to_string())
}

fn checkpoint_from_row(row: &PgRow) -> Result<Checkpoint> {
    let position: Json<Position> = row.try_get("position").map_err(storage_error)?;
    Ok(Checkpoint {
        session_id: row.try_get("session_id").map_err(storage_error)?,
        workflow_id: row.try_get("workflow_id").map_err(storage_error)?,
        position: position.0,
        state: row.try_get("state").map_err(storage_error)?,
        revision: row.try_get("revision").map_err(storage_error)?,
        created_at: row.try_get("created_at").map_err(storage_error)?,
        expires_at: row.try_get("expires_at").map_err(storage_error)?,
    })
}

impl PostgresCheckpointStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(storage_error)?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the checkpoint table if needed
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self {
            pool: Arc::new(pool),
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS rhythmix_checkpoints (
                session_id  TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                position    JSONB NOT NULL,
                state       JSONB NOT NULL,
                revision    BIGINT NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL,
                expires_at  TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(storage_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS rhythmix_checkpoints_expires_at \
             ON rhythmix_checkpoints (expires_at)",
        )
        .execute(&*self.pool)
        .await
        .map_err(storage_error)?;

        info!("Checkpoint table ready");
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn put(
        &self,
        session_id: &str,
        workflow_id: &str,
        position: Position,
        state: Value,
        ttl: Duration,
    ) -> Result<Checkpoint> {
        let now = Utc::now();
        let expires_at = expiry_from(now, ttl)?;
        let sql = format!(
            r#"
            INSERT INTO rhythmix_checkpoints ({CHECKPOINT_COLUMNS})
            VALUES ($1, $2, $3, $4, 1, $5, $6)
            ON CONFLICT (session_id) DO UPDATE SET
                workflow_id = EXCLUDED.workflow_id,
                position    = EXCLUDED.position,
                state       = EXCLUDED.state,
                revision    = rhythmix_checkpoints.revision + 1,
                created_at  = EXCLUDED.created_at,
                expires_at  = EXCLUDED.expires_at
            RETURNING {CHECKPOINT_COLUMNS}
            "#
        );

        let row = sqlx::query(&sql)
            .bind(session_id)
            .bind(workflow_id)
            .bind(Json(&position))
            .bind(&state)
            .bind(now)
            .bind(expires_at)
            .fetch_one(&*self.pool)
            .await
            .map_err(storage_error)?;

        checkpoint_from_row(&row)
    }

    async fn get(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let sql = format!(
            "SELECT {CHECKPOINT_COLUMNS} FROM rhythmix_checkpoints \
             WHERE session_id = $1 AND expires_at > $2"
        );
        let row = sqlx::query(&sql)
            .bind(session_id)
            .bind(Utc::now())
            .fetch_optional(&*self.pool)
            .await
            .map_err(storage_error)?;

        row.as_ref().map(checkpoint_from_row).transpose()
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM rhythmix_checkpoints WHERE session_id = $1")
            .bind(session_id)
            .execute(&*self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn compare_and_delete(
        &self,
        session_id: &str,
        revision: i64,
    ) -> Result<Option<Checkpoint>> {
        let sql = format!(
            "DELETE FROM rhythmix_checkpoints \
             WHERE session_id = $1 AND revision = $2 AND expires_at > $3 \
             RETURNING {CHECKPOINT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(session_id)
            .bind(revision)
            .bind(Utc::now())
            .fetch_optional(&*self.pool)
            .await
            .map_err(storage_error)?;

        row.as_ref().map(checkpoint_from_row).transpose()
    }

    async fn compare_and_swap(
        &self,
        session_id: &str,
        revision: i64,
        position: Position,
        state: Value,
        ttl: Duration,
    ) -> Result<Option<Checkpoint>> {
        let now = Utc::now();
        let expires_at = expiry_from(now, ttl)?;
        let sql = format!(
            r#"
            UPDATE rhythmix_checkpoints SET
                position   = $3,
                state      = $4,
                revision   = revision + 1,
                created_at = $5,
                expires_at = $6
            WHERE session_id = $1 AND revision = $2 AND expires_at > $5
            RETURNING {CHECKPOINT_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(session_id)
            .bind(revision)
            .bind(Json(&position))
            .bind(&state)
            .bind(now)
            .bind(expires_at)
            .fetch_optional(&*self.pool)
            .await
            .map_err(storage_error)?;

        row.as_ref().map(checkpoint_from_row).transpose()
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rhythmix_checkpoints WHERE expires_at <= $1")
            .bind(Utc::now())
            .execute(&*self.pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected())
    }
}
