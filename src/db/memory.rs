use super::{ChatStore, DocumentLink};
use crate::models::{Chat, ChatRef, ChatSummary, Document, Message};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Tables {
    chats: Vec<Chat>,
    documents: Vec<Document>,
    next_chat_id: i64,
    next_document_id: i64,
}

/// Chat store kept in process memory.
///
/// Each operation takes the lock once and never across an await, so appends
/// are atomic the same way the Postgres `messages || $1` update is.
#[derive(Default)]
pub struct MemoryChatStore {
    tables: Mutex<Tables>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, String> {
        self.tables
            .lock()
            .map_err(|_| "chat store lock poisoned".to_string())
    }

    pub fn document_count(&self) -> usize {
        self.lock().map(|tables| tables.documents.len()).unwrap_or(0)
    }
}

impl Tables {
    fn insert_chat(&mut self, mut chat: Chat) -> Chat {
        self.next_chat_id += 1;
        let now = Utc::now();
        chat.id = self.next_chat_id;
        chat.created_at = now;
        chat.updated_at = now;
        self.chats.push(chat.clone());
        chat
    }

    fn find_chat(&mut self, user_id: &str, chat: ChatRef) -> Option<&mut Chat> {
        self.chats
            .iter_mut()
            .find(|stored| stored.user_id == user_id && chat.matches(stored))
    }
}

#[async_trait::async_trait]
impl ChatStore for MemoryChatStore {
    async fn list_chats(&self, user_id: &str) -> Result<Vec<ChatSummary>, String> {
        let tables = self.lock()?;
        let mut list: Vec<ChatSummary> = tables
            .chats
            .iter()
            .filter(|chat| chat.user_id == user_id)
            .map(ChatSummary::from)
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn fetch_chat(&self, user_id: &str, chat: ChatRef) -> Result<Option<Chat>, String> {
        let mut tables = self.lock()?;
        Ok(tables.find_chat(user_id, chat).map(|found| found.clone()))
    }

    async fn insert_chat(&self, chat: Chat) -> Result<Chat, String> {
        Ok(self.lock()?.insert_chat(chat))
    }

    async fn append_messages(
        &self,
        user_id: &str,
        chat_id: i64,
        messages: &[Message],
    ) -> Result<bool, String> {
        let mut tables = self.lock()?;
        match tables.find_chat(user_id, ChatRef::Id(chat_id)) {
            Some(chat) => {
                chat.messages.extend_from_slice(messages);
                chat.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_chat(&self, user_id: &str, chat: ChatRef) -> Result<bool, String> {
        let mut tables = self.lock()?;
        let before = tables.chats.len();
        tables
            .chats
            .retain(|stored| !(stored.user_id == user_id && chat.matches(stored)));
        Ok(tables.chats.len() < before)
    }

    async fn delete_chats(&self, user_id: &str) -> Result<u64, String> {
        let mut tables = self.lock()?;
        let before = tables.chats.len();
        tables.chats.retain(|stored| stored.user_id != user_id);
        Ok((before - tables.chats.len()) as u64)
    }

    async fn save_document(
        &self,
        mut document: Document,
        link: DocumentLink,
    ) -> Result<Option<(Document, Chat)>, String> {
        let mut tables = self.lock()?;
        let document_id = tables.next_document_id + 1;

        let linked = match link {
            DocumentLink::NewChat(mut chat) => {
                chat.document_id = Some(document_id);
                tables.insert_chat(chat)
            }
            DocumentLink::ExistingChat { chat, context } => {
                match tables.find_chat(&document.user_id, chat) {
                    Some(found) => {
                        found.document_id = Some(document_id);
                        found.document_context = Some(context);
                        found.updated_at = Utc::now();
                        found.clone()
                    }
                    None => return Ok(None),
                }
            }
        };

        tables.next_document_id = document_id;
        document.id = document_id;
        document.created_at = Utc::now();
        tables.documents.push(document.clone());

        Ok(Some((document, linked)))
    }

    async fn fetch_document(&self, user_id: &str, id: i64) -> Result<Option<Document>, String> {
        let tables = self.lock()?;
        Ok(tables
            .documents
            .iter()
            .find(|document| document.id == id && document.user_id == user_id)
            .cloned())
    }

    async fn ping(&self) -> Result<(), String> {
        self.lock().map(|_| ())
    }
}
