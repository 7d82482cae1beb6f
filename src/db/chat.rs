use crate::models::{self, ChatRef};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: i64,
    uuid: Uuid,
    user_id: String,
    title: String,
    messages: Json<Vec<models::Message>>,
    document_id: Option<i64>,
    document_context: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ChatRow> for models::Chat {
    fn from(row: ChatRow) -> Self {
        Self {
            id: row.id,
            uuid: row.uuid,
            user_id: row.user_id,
            title: row.title,
            messages: row.messages.0,
            document_id: row.document_id,
            document_context: row.document_context,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub async fn fetch_by_user(pool: &PgPool, user_id: &str) -> Result<Vec<models::ChatSummary>, String> {
    let query_span = tracing::info_span!("Fetch chats by user id.");
    sqlx::query_as::<_, models::ChatSummary>(
        r#"
        SELECT id, uuid, title, updated_at
        FROM chat
        WHERE user_id = $1
        ORDER BY updated_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .instrument(query_span)
    .await
    .map_err(|err| {
        tracing::error!("Failed to fetch chats, error: {:?}", err);
        "Could not fetch data".to_string()
    })
}

pub async fn fetch(
    conn: &mut PgConnection,
    user_id: &str,
    chat: ChatRef,
) -> Result<Option<models::Chat>, String> {
    let query_span = tracing::info_span!("Fetch chat.", chat = %chat);
    let query = match chat {
        ChatRef::Id(id) => sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, uuid, user_id, title, messages, document_id, document_context, created_at, updated_at
            FROM chat
            WHERE id = $1 AND user_id = $2
            LIMIT 1
            "#,
        )
        .bind(id),
        ChatRef::Uuid(uuid) => sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, uuid, user_id, title, messages, document_id, document_context, created_at, updated_at
            FROM chat
            WHERE uuid = $1 AND user_id = $2
            LIMIT 1
            "#,
        )
        .bind(uuid),
    };

    query
        .bind(user_id)
        .fetch_optional(conn)
        .instrument(query_span)
        .await
        .map(|row| row.map(models::Chat::from))
        .map_err(|err| {
            tracing::error!("Failed to fetch chat, error: {:?}", err);
            "Could not fetch data".to_string()
        })
}

pub async fn insert(conn: &mut PgConnection, chat: models::Chat) -> Result<models::Chat, String> {
    let query_span = tracing::info_span!("Saving new chat into the database");
    sqlx::query_as::<_, ChatRow>(
        r#"
        INSERT INTO chat (uuid, user_id, title, messages, document_id, document_context, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
        RETURNING id, uuid, user_id, title, messages, document_id, document_context, created_at, updated_at
        "#,
    )
    .bind(chat.uuid)
    .bind(&chat.user_id)
    .bind(&chat.title)
    .bind(Json(&chat.messages))
    .bind(chat.document_id)
    .bind(&chat.document_context)
    .fetch_one(conn)
    .instrument(query_span)
    .await
    .map(models::Chat::from)
    .map_err(|err| {
        tracing::error!("Failed to insert chat: {:?}", err);
        "Failed to insert".to_string()
    })
}

/// Append messages in one statement so concurrent sends never overwrite each other.
pub async fn append_messages(
    pool: &PgPool,
    user_id: &str,
    chat_id: i64,
    messages: &[models::Message],
) -> Result<bool, String> {
    let query_span = tracing::info_span!("Append chat messages.", chat_id, count = messages.len());
    sqlx::query(
        r#"
        UPDATE chat
        SET messages = messages || $3::jsonb,
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(Json(messages))
    .execute(pool)
    .instrument(query_span)
    .await
    .map(|result| result.rows_affected() > 0)
    .map_err(|err| {
        tracing::error!("Failed to append chat messages: {:?}", err);
        "Failed to update".to_string()
    })
}

pub async fn link_document(
    conn: &mut PgConnection,
    user_id: &str,
    chat: ChatRef,
    document_id: i64,
    context: &str,
) -> Result<Option<models::Chat>, String> {
    let query_span = tracing::info_span!("Link document to chat.", chat = %chat, document_id);
    let query = match chat {
        ChatRef::Id(id) => sqlx::query_as::<_, ChatRow>(
            r#"
            UPDATE chat
            SET document_id = $3, document_context = $4, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING id, uuid, user_id, title, messages, document_id, document_context, created_at, updated_at
            "#,
        )
        .bind(id),
        ChatRef::Uuid(uuid) => sqlx::query_as::<_, ChatRow>(
            r#"
            UPDATE chat
            SET document_id = $3, document_context = $4, updated_at = NOW()
            WHERE uuid = $1 AND user_id = $2
            RETURNING id, uuid, user_id, title, messages, document_id, document_context, created_at, updated_at
            "#,
        )
        .bind(uuid),
    };

    query
        .bind(user_id)
        .bind(document_id)
        .bind(context)
        .fetch_optional(conn)
        .instrument(query_span)
        .await
        .map(|row| row.map(models::Chat::from))
        .map_err(|err| {
            tracing::error!("Failed to link document: {:?}", err);
            "Failed to update".to_string()
        })
}

pub async fn delete(pool: &PgPool, user_id: &str, chat: ChatRef) -> Result<bool, String> {
    let query_span = tracing::info_span!("Delete chat.", chat = %chat);
    let query = match chat {
        ChatRef::Id(id) => sqlx::query("DELETE FROM chat WHERE id = $1 AND user_id = $2").bind(id),
        ChatRef::Uuid(uuid) => {
            sqlx::query("DELETE FROM chat WHERE uuid = $1 AND user_id = $2").bind(uuid)
        }
    };

    query
        .bind(user_id)
        .execute(pool)
        .instrument(query_span)
        .await
        .map(|result| result.rows_affected() > 0)
        .map_err(|err| {
            tracing::error!("Failed to delete chat: {:?}", err);
            "Failed to delete".to_string()
        })
}

pub async fn delete_by_user(pool: &PgPool, user_id: &str) -> Result<u64, String> {
    let query_span = tracing::info_span!("Delete all chats of user.");
    sqlx::query("DELETE FROM chat WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .instrument(query_span)
        .await
        .map(|result| result.rows_affected())
        .map_err(|err| {
            tracing::error!("Failed to delete chats: {:?}", err);
            "Failed to delete".to_string()
        })
}
