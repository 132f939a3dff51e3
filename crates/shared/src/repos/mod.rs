use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

mod settings;
mod turns;

pub use settings::{default_session_settings, merged_settings};
pub use turns::TurnOrder;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("too many knowledge files (max {0})")]
    TooManyKnowledgeFiles(usize),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let _: i32 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub async fn create_chat_session(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> Result<Uuid, StoreError> {
        if ttl_seconds <= 0 {
            return Err(StoreError::InvalidData(
                "session ttl_seconds must be > 0".to_string(),
            ));
        }

        self.purge_expired_chat_sessions(now).await?;

        let session_id: Uuid = sqlx::query_scalar(
            "INSERT INTO chat_sessions (token_hash, created_at, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(token_hash)
        .bind(now)
        .bind(now + Duration::seconds(ttl_seconds))
        .fetch_one(&self.pool)
        .await?;

        Ok(session_id)
    }

    pub async fn resolve_chat_session(
        &self,
        token_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StoreError> {
        let session_id = sqlx::query_scalar(
            "SELECT id
             FROM chat_sessions
             WHERE token_hash = $1
               AND expires_at > $2",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session_id)
    }

    async fn purge_expired_chat_sessions(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM chat_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
