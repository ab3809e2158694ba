use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use uuid::Uuid;

use ratedesk_core::{
    ChatMessage, Checks, Intake, NewMessage, Phase, RateContext, Role, Session, SessionId,
    SessionPatch,
};

use super::{RepositoryError, SessionStore};
use crate::DbPool;

/// SQLite-backed store. Sub-records are kept as JSON columns so a patch replaces them wholesale.
pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn ensure_session<'e, E>(executor: E, id: &SessionId) -> Result<(), RepositoryError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let now = Utc::now().timestamp_millis();
        sqlx::query(
            "INSERT OR IGNORE INTO conversation_session
                 (id, phase, intake_json, checks_json, rate_json, created_at, updated_at)
             VALUES (?, 'intake', '{}', '{}', '{}', ?, ?)",
        )
        .bind(id.as_str())
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, phase, intake_json, checks_json, rate_json
             FROM conversation_session WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut session = row_to_session(&row)?;

        let message_rows = sqlx::query(
            "SELECT id, role, content, timestamp_ms
             FROM conversation_message WHERE session_id = ? ORDER BY seq ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;

        session.history =
            message_rows.iter().map(row_to_message).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(session))
    }

    async fn load_existing(&self, id: &SessionId) -> Result<Session, RepositoryError> {
        self.load(id)
            .await?
            .ok_or_else(|| RepositoryError::Decode(format!("session `{id}` vanished after write")))
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_json<T>(column: &str, raw: &str) -> Result<T, RepositoryError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_str(raw).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(decode_err)
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>, RepositoryError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| RepositoryError::Decode(format!("timestamp out of range: {millis}")))
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let phase: String = row.try_get("phase").map_err(decode_err)?;
    let intake_json: String = row.try_get("intake_json").map_err(decode_err)?;
    let checks_json: String = row.try_get("checks_json").map_err(decode_err)?;
    let rate_json: String = row.try_get("rate_json").map_err(decode_err)?;

    Ok(Session {
        id: SessionId(id),
        intake: parse_json::<Intake>("intake_json", &intake_json)?,
        checks: parse_json::<Checks>("checks_json", &checks_json)?,
        rate: parse_json::<RateContext>("rate_json", &rate_json)?,
        history: Vec::new(),
        phase: phase.parse::<Phase>().map_err(RepositoryError::Decode)?,
    })
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<ChatMessage, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let role: String = row.try_get("role").map_err(decode_err)?;
    let content: String = row.try_get("content").map_err(decode_err)?;
    let timestamp_ms: i64 = row.try_get("timestamp_ms").map_err(decode_err)?;

    Ok(ChatMessage {
        id: Uuid::parse_str(&id).map_err(decode_err)?,
        role: role.parse::<Role>().map_err(RepositoryError::Decode)?,
        content,
        timestamp: millis_to_datetime(timestamp_ms)?,
    })
}

#[async_trait::async_trait]
impl SessionStore for SqlSessionStore {
    async fn get_or_create(&self, id: &SessionId) -> Result<Session, RepositoryError> {
        Self::ensure_session(&self.pool, id).await?;
        self.load_existing(id).await
    }

    async fn append_message(
        &self,
        id: &SessionId,
        message: NewMessage,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        Self::ensure_session(&mut *tx, id).await?;

        let last = sqlx::query(
            "SELECT MAX(timestamp_ms) AS last_ms, COALESCE(MAX(seq), 0) AS last_seq
             FROM conversation_message WHERE session_id = ?",
        )
        .bind(id.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let last_ms: Option<i64> = last.try_get("last_ms").map_err(decode_err)?;
        let last_seq: i64 = last.try_get("last_seq").map_err(decode_err)?;

        let not_before = last_ms.map(millis_to_datetime).transpose()?;
        let stamped = message.stamp(not_before);

        sqlx::query(
            "INSERT INTO conversation_message (id, session_id, seq, role, content, timestamp_ms)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(stamped.id.to_string())
        .bind(id.as_str())
        .bind(last_seq + 1)
        .bind(stamped.role.as_str())
        .bind(&stamped.content)
        .bind(stamped.timestamp.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversation_session SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp_millis())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        // Stored precision is milliseconds; hand back what a later read would see.
        Ok(ChatMessage {
            timestamp: millis_to_datetime(stamped.timestamp.timestamp_millis())?,
            ..stamped
        })
    }

    async fn patch(
        &self,
        id: &SessionId,
        patch: SessionPatch,
    ) -> Result<Session, RepositoryError> {
        let intake_json = patch.intake.as_ref().map(to_json).transpose()?;
        let checks_json = patch.checks.as_ref().map(to_json).transpose()?;
        let rate_json = patch.rate.as_ref().map(to_json).transpose()?;
        let phase = patch.phase.map(|phase| phase.as_str());

        let mut tx = self.pool.begin().await?;
        Self::ensure_session(&mut *tx, id).await?;

        sqlx::query(
            "UPDATE conversation_session SET
                 intake_json = COALESCE(?, intake_json),
                 checks_json = COALESCE(?, checks_json),
                 rate_json = COALESCE(?, rate_json),
                 phase = COALESCE(?, phase),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(intake_json)
        .bind(checks_json)
        .bind(rate_json)
        .bind(phase)
        .bind(Utc::now().timestamp_millis())
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.load_existing(id).await
    }

    async fn find(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        self.load(id).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        crate::connection::ping(&self.pool).await?;
        Ok(())
    }
}
