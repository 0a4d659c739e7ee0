use chrono::Utc;
use ration_core::domain::conversation::ConversationState;
use sqlx::Row;

use super::{RepositoryError, SessionStore};
use crate::DbPool;

/// Stores each session as one JSON document keyed by session id.
pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStore for SqlSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, RepositoryError> {
        let row = sqlx::query("SELECT state_json FROM conversation_sessions WHERE session_id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_json: String = row.try_get("state_json")?;
        serde_json::from_str(&state_json).map(Some).map_err(|error| {
            RepositoryError::Decode(format!("session `{session_id}` state_json: {error}"))
        })
    }

    async fn save(&self, state: &ConversationState) -> Result<(), RepositoryError> {
        let state_json = serde_json::to_string(state)
            .map_err(|error| RepositoryError::Encode(error.to_string()))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO conversation_sessions (
                session_id, phase, turn_count, state_json, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                phase = excluded.phase,
                turn_count = excluded.turn_count,
                state_json = excluded.state_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&state.session_id)
        .bind(state.phase().as_str())
        .bind(i64::from(state.turn_count))
        .bind(state_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
