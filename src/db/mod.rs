//! Conversation store.
//!
//! [`ChatStore`] is what the pipelines depend on. `PgChatStore` is the
//! production implementation over the `chat` and `document` tables; the
//! in-memory one backs tests and local runs without Postgres.

pub mod chat;
pub mod document;
mod memory;

pub use memory::MemoryChatStore;

use crate::models::{Chat, ChatRef, ChatSummary, Document, Message};
use sqlx::PgPool;

/// Where a freshly stored document gets attached.
#[derive(Debug, Clone)]
pub enum DocumentLink {
    /// Insert this chat with the document id filled in
    NewChat(Chat),
    /// Point an existing chat of the document's owner at it
    ExistingChat { chat: ChatRef, context: String },
}

#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    /// Caller's chats, most recently updated first.
    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, String>;

    async fn fetch_chat(&self, user_id: &str, chat: ChatRef) -> Result<Option<Chat>, String>;

    async fn insert_chat(&self, chat: Chat) -> Result<Chat, String>;

    /// `false` when the chat is gone or not owned by `user_id`.
    async fn append_messages(
        &self,
        user_id: &str,
        chat_id: i64,
        messages: &[Message],
    ) -> Result<bool, String>;

    async fn delete_chat(&self, user_id: &str, chat: ChatRef) -> Result<bool, String>;

    async fn delete_chats(&self, user_id: &str) -> Result<u64, String>;

    /// Store the document and link it in one transaction. `None` (and nothing
    /// stored) when the target chat does not exist for the document's owner.
    async fn save_document(
        &self,
        document: Document,
        link: DocumentLink,
    ) -> Result<Option<(Document, Chat)>, String>;

    async fn fetch_document(&self, user_id: &str, id: i64) -> Result<Option<Document>, String>;

    async fn ping(&self) -> Result<(), String>;
}

#[derive(Clone)]
pub struct PgChatStore {
    pool: PgPool,
}

impl PgChatStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn connection(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, String> {
        self.pool.acquire().await.map_err(|err| {
            tracing::error!("Failed to acquire connection: {:?}", err);
            "Database unavailable".to_string()
        })
    }
}

#[async_trait::async_trait]
impl ChatStore for PgChatStore {
    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, String> {
        chat::fetch_by_user(&self.pool, user_id).await
    }

    async fn fetch_chat(&self, user_id: &str, chat: ChatRef) -> Result<Option<Chat>, String> {
        let mut conn = self.connection().await?;
        chat::fetch(&mut conn, user_id, chat).await
    }

    async fn insert_chat(&self, new_chat: Chat) -> Result<Chat, String> {
        let mut conn = self.connection().await?;
        chat::insert(&mut conn, new_chat).await
    }

    async fn append_messages(
        &self,
        user_id: &str,
        chat_id: i64,
        messages: &[Message],
    ) -> Result<bool, String> {
        chat::append_messages(&self.pool, user_id, chat_id, messages).await
    }

    async fn delete_chat(&self, user_id: &str, chat: ChatRef) -> Result<bool, String> {
        chat::delete(&self.pool, user_id, chat).await
    }

    async fn delete_chats(&self, user_id: &str) -> Result<u64, String> {
        chat::delete_by_user(&self.pool, user_id).await
    }

    #[tracing::instrument(name = "Save document and link chat", skip_all)]
    async fn save_document(
        &self,
        new_document: Document,
        link: DocumentLink,
    ) -> Result<Option<(Document, Chat)>, String> {
        let mut tx = self.pool.begin().await.map_err(|err| {
            tracing::error!("Failed to begin transaction: {:?}", err);
            "Database unavailable".to_string()
        })?;

        let user_id = new_document.user_id.clone();
        let stored = document::insert(&mut tx, new_document).await?;

        let linked = match link {
            DocumentLink::NewChat(mut new_chat) => {
                new_chat.document_id = Some(stored.id);
                Some(chat::insert(&mut tx, new_chat).await?)
            }
            DocumentLink::ExistingChat { chat: target, context } => {
                chat::link_document(&mut tx, &user_id, target, stored.id, &context).await?
            }
        };

        let Some(linked) = linked else {
            // dropping the transaction rolls the document insert back
            tracing::info!("Target chat not found, document discarded");
            return Ok(None);
        };

        tx.commit().await.map_err(|err| {
            tracing::error!("Failed to commit document: {:?}", err);
            "Failed to insert".to_string()
        })?;

        Ok(Some((stored, linked)))
    }

    async fn fetch_document(&self, user_id: &str, id: i64) -> Result<Option<Document>, String> {
        let mut conn = self.connection().await?;
        document::fetch(&mut conn, user_id, id).await
    }

    async fn ping(&self) -> Result<(), String> {
        sqlx::query("SELECT 1 as health_check")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|err| format!("Database error: {}", err))
    }
}
