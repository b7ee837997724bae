//! Repository for conversations and their participant sets.

use chrono::{DateTime, Utc};
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use crate::entities::{Conversation, ConversationStatus};
use crate::error::{DatabaseError, DatabaseResult};

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

fn new_public_id() -> String {
    CUID.create_id()
}

#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a conversation and enrol the given users as participants.
    pub async fn create(
        &self,
        listing_ref: Option<&str>,
        participant_ids: &[i64],
    ) -> DatabaseResult<Conversation> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let public_id = new_public_id();

        sqlx::query(
            "INSERT INTO conversations (public_id, listing_ref, status, last_message_at, created_at, updated_at) \
             VALUES (?, ?, ?, NULL, ?, ?)",
        )
        .bind(&public_id)
        .bind(listing_ref)
        .bind(ConversationStatus::Active.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query("SELECT id FROM conversations WHERE public_id = ?")
            .bind(&public_id)
            .fetch_one(&mut *tx)
            .await?;
        let id: i64 = row.try_get("id")?;

        for user_id in participant_ids {
            sqlx::query(
                "INSERT INTO conversation_participants (conversation_id, user_id, joined_at) \
                 VALUES (?, ?, ?)",
            )
            .bind(id)
            .bind(user_id)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Conversation {
            id,
            public_id,
            listing_ref: listing_ref.map(str::to_owned),
            status: ConversationStatus::Active,
            last_message_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, public_id, listing_ref, status, last_message_at, created_at, updated_at \
             FROM conversations WHERE public_id = ?",
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| map_conversation(&row)).transpose()
    }

    /// Add a user to an existing conversation. Re-adding is not an error.
    pub async fn add_participant(&self, conversation_id: i64, user_id: i64) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id, joined_at) \
             VALUES (?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Authorization check consulted before a room join is honoured: is the
    /// user (by public id) a participant of the conversation (by public id)?
    pub async fn is_participant(
        &self,
        conversation_public_id: &str,
        user_public_id: &str,
    ) -> DatabaseResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversation_participants cp \
             JOIN conversations c ON c.id = cp.conversation_id \
             JOIN users u ON u.id = cp.user_id \
             WHERE c.public_id = ? AND u.public_id = ?",
        )
        .bind(conversation_public_id)
        .bind(user_public_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }
}

fn map_conversation(row: &SqliteRow) -> DatabaseResult<Conversation> {
    let status: String = row.try_get("status")?;
    let status = ConversationStatus::parse(&status)
        .ok_or_else(|| DatabaseError::Decode(format!("unknown conversation status {status}")))?;

    Ok(Conversation {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        listing_ref: row.try_get("listing_ref")?,
        status,
        last_message_at: parse_optional_timestamp(row.try_get("last_message_at")?)?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
    })
}

fn parse_timestamp(value: &str) -> DatabaseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| DatabaseError::Decode(format!("bad timestamp {value}: {err}")))
}

fn parse_optional_timestamp(value: Option<String>) -> DatabaseResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}
