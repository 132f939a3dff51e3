use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::models::{TurnRecord, TurnRole};
use crate::relay::{ConversationLog, LogAppendFuture};

use super::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOrder {
    Ascending,
    Descending,
}

impl Store {
    /// Appends the (user, model) pair of one completed exchange. Both rows are
    /// written in a single transaction so a failed second insert cannot leave
    /// half an exchange behind.
    pub async fn append_exchange(
        &self,
        session_id: Uuid,
        user_text: &str,
        model_text: &str,
    ) -> Result<(), StoreError> {
        let (user_at, model_at) = exchange_timestamps(Utc::now());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO turns (session_id, role, text, created_at)
             VALUES ($1, 'user', $2, $3)",
        )
        .bind(session_id)
        .bind(user_text)
        .bind(user_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO turns (session_id, role, text, created_at)
             VALUES ($1, 'model', $2, $3)",
        )
        .bind(session_id)
        .bind(model_text)
        .bind(model_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn list_turns(
        &self,
        session_id: Uuid,
        limit: usize,
        order: TurnOrder,
    ) -> Result<Vec<TurnRecord>, StoreError> {
        let query = match order {
            TurnOrder::Ascending => {
                "SELECT id, role, text, created_at
                 FROM turns
                 WHERE session_id = $1
                 ORDER BY created_at ASC, id ASC
                 LIMIT $2"
            }
            TurnOrder::Descending => {
                "SELECT id, role, text, created_at
                 FROM turns
                 WHERE session_id = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT $2"
            }
        };

        let rows = sqlx::query(query)
            .bind(session_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_turn).collect()
    }

    pub async fn delete_turn(&self, session_id: Uuid, turn_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM turns WHERE id = $1 AND session_id = $2")
            .bind(turn_id)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl ConversationLog for Store {
    fn append_exchange<'a>(
        &'a self,
        session_id: Uuid,
        user_text: &'a str,
        model_text: &'a str,
    ) -> LogAppendFuture<'a> {
        Box::pin(Store::append_exchange(self, session_id, user_text, model_text))
    }
}

fn row_to_turn(row: &sqlx::postgres::PgRow) -> Result<TurnRecord, StoreError> {
    let role_raw: String = row.try_get("role")?;
    Ok(TurnRecord {
        id: row.try_get("id")?,
        role: turn_role_from_db(&role_raw)?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
    })
}

fn turn_role_from_db(value: &str) -> Result<TurnRole, StoreError> {
    match value {
        "user" => Ok(TurnRole::User),
        "model" => Ok(TurnRole::Model),
        _ => Err(StoreError::InvalidData(format!(
            "unknown turn role persisted: {value}"
        ))),
    }
}

/// The model turn must sort strictly after its user turn even when both are
/// stamped within the same microsecond.
fn exchange_timestamps(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let user_at = now;
    let completed_at = Utc::now();
    let model_at = if completed_at > user_at {
        completed_at
    } else {
        user_at + Duration::microseconds(1)
    };
    (user_at, model_at)
}
