//! Turn-taking over a stored conversation.
//!
//! A send persists the user message first (the checkpoint), then asks the
//! completion endpoint for a reply and appends it. Failures after the
//! checkpoint leave the user message in place and add nothing else.

use crate::configuration::ChatSettings;
use crate::connectors::{CompletionConnector, CompletionRequest, PromptMessage};
use crate::db::ChatStore;
use crate::models::{Chat, ChatRef, ChatSummary, Message};
use crate::services::{prompts, ChatError};
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const STREAM_BUFFER: usize = 16;

/// Result of a buffered send.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub new_message: Message,
    pub ai_response: Message,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Start,
    Streaming,
    Complete,
    Error,
}

/// One line of the NDJSON reply stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    pub message_id: String,
    pub status: StreamStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StreamEvent {
    fn new(message_id: &str, status: StreamStatus) -> Self {
        Self {
            message_id: message_id.to_string(),
            status,
            content: None,
            kind: None,
            message: None,
        }
    }

    pub fn start(message_id: &str) -> Self {
        Self::new(message_id, StreamStatus::Start)
    }

    pub fn streaming(message_id: &str, fragment: String) -> Self {
        Self {
            content: Some(fragment),
            ..Self::new(message_id, StreamStatus::Streaming)
        }
    }

    pub fn complete(message_id: &str, content: String) -> Self {
        Self {
            content: Some(content),
            ..Self::new(message_id, StreamStatus::Complete)
        }
    }

    pub fn error(message_id: &str, err: &ChatError) -> Self {
        Self {
            kind: Some(err.kind().to_string()),
            message: Some(err.to_string()),
            ..Self::new(message_id, StreamStatus::Error)
        }
    }

    /// Serialized event followed by a newline.
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|err| {
            tracing::error!("Failed to serialize stream event: {:?}", err);
            format!(
                r#"{{"messageId":"{}","status":"error","kind":"internal","message":"serialization failed"}}"#,
                self.message_id
            )
        });
        line.push('\n');
        line
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    completion: Arc<dyn CompletionConnector>,
    settings: ChatSettings,
}

fn storage(err: String) -> ChatError {
    ChatError::Storage(err)
}

/// Whitespace-only content is rejected; accepted content is kept verbatim.
fn non_empty(content: &str) -> Result<String, ChatError> {
    if content.trim().is_empty() {
        return Err(ChatError::Validation(
            "Message content must not be empty".to_string(),
        ));
    }
    Ok(content.to_string())
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        completion: Arc<dyn CompletionConnector>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            completion,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<ChatSummary>, ChatError> {
        self.store.list_chats(user_id).await.map_err(storage)
    }

    pub async fn get(&self, user_id: &str, chat: ChatRef) -> Result<Chat, ChatError> {
        self.store
            .fetch_chat(user_id, chat)
            .await
            .map_err(storage)?
            .ok_or_else(ChatError::chat_not_found)
    }

    /// Create a chat; with an initial message the first turn is answered too.
    #[tracing::instrument(name = "Create chat", skip(self, initial_message))]
    pub async fn create(
        &self,
        user_id: &str,
        title: Option<String>,
        initial_message: Option<String>,
    ) -> Result<Chat, ChatError> {
        let initial_message = initial_message.as_deref().map(non_empty).transpose()?;
        let title = title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| self.settings.default_title.clone());

        let chat = self
            .store
            .insert_chat(Chat::new(user_id.to_string(), title))
            .await
            .map_err(storage)?;
        tracing::info!(chat_id = chat.id, "Chat created");

        match initial_message {
            Some(content) => {
                self.send_message(user_id, ChatRef::Id(chat.id), &content)
                    .await?;
                self.get(user_id, ChatRef::Id(chat.id)).await
            }
            None => Ok(chat),
        }
    }

    pub async fn delete(&self, user_id: &str, chat: ChatRef) -> Result<(), ChatError> {
        if self.store.delete_chat(user_id, chat).await.map_err(storage)? {
            tracing::info!(chat = %chat, "Chat deleted");
            Ok(())
        } else {
            Err(ChatError::chat_not_found())
        }
    }

    pub async fn delete_all(&self, user_id: &str) -> Result<u64, ChatError> {
        let deleted = self.store.delete_chats(user_id).await.map_err(storage)?;
        tracing::info!(deleted, "Chats deleted");
        Ok(deleted)
    }

    async fn append(&self, user_id: &str, chat_id: i64, message: &Message) -> Result<(), ChatError> {
        let appended = self
            .store
            .append_messages(user_id, chat_id, std::slice::from_ref(message))
            .await
            .map_err(storage)?;
        if appended {
            Ok(())
        } else {
            Err(ChatError::chat_not_found())
        }
    }

    /// Document context first, then the stored history in order.
    fn prompt(&self, chat: &Chat, history: &[Message]) -> Result<Vec<PromptMessage>, ChatError> {
        let mut prompt = Vec::with_capacity(history.len() + 1);
        if let Some(context) = chat.document_context.as_deref() {
            prompt.push(prompts::context_message(
                context,
                self.settings.prompt_context_chars,
            ));
        }
        for message in history {
            prompt.push(PromptMessage::try_from(message)?);
        }
        Ok(prompt)
    }

    /// Validate, load, checkpoint the user message and build the request.
    async fn begin_turn(
        &self,
        user_id: &str,
        chat: ChatRef,
        content: &str,
    ) -> Result<(Chat, Message, CompletionRequest), ChatError> {
        let content = non_empty(content)?;
        let mut chat = self.get(user_id, chat).await?;

        let user_message = Message::user(content);
        self.append(user_id, chat.id, &user_message).await?;
        chat.messages.push(user_message.clone());

        let request = CompletionRequest::chat(self.prompt(&chat, &chat.messages)?);
        Ok((chat, user_message, request))
    }

    #[tracing::instrument(name = "Send chat message", skip(self, content))]
    pub async fn send_message(
        &self,
        user_id: &str,
        chat: ChatRef,
        content: &str,
    ) -> Result<Exchange, ChatError> {
        let (chat, user_message, request) = self.begin_turn(user_id, chat, content).await?;

        let reply = self.completion.complete(request).await.map_err(|err| {
            tracing::warn!(chat_id = chat.id, "Completion failed: {}", err);
            ChatError::from(err)
        })?;
        if reply.trim().is_empty() {
            return Err(ChatError::Upstream(
                "Completion returned no content".to_string(),
            ));
        }

        let ai_response = Message::assistant(reply);
        self.append(user_id, chat.id, &ai_response).await?;

        Ok(Exchange {
            new_message: user_message,
            ai_response,
        })
    }

    /// Checkpoint synchronously, then relay the reply as a stream of events.
    ///
    /// Errors returned here happened before anything was streamed; later ones
    /// arrive as a terminal `error` event.
    #[tracing::instrument(name = "Send chat message (streaming)", skip(self, content))]
    pub async fn send_message_stream(
        &self,
        user_id: &str,
        chat: ChatRef,
        content: &str,
    ) -> Result<ReceiverStream<StreamEvent>, ChatError> {
        let (chat, _, request) = self.begin_turn(user_id, chat, content).await?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let turn = StreamTurn {
            store: self.store.clone(),
            completion: self.completion.clone(),
            user_id: user_id.to_string(),
            chat_id: chat.id,
            message_id: uuid::Uuid::new_v4().to_string(),
        };
        tokio::spawn(turn.run(request, tx));

        Ok(ReceiverStream::new(rx))
    }
}

struct StreamTurn {
    store: Arc<dyn ChatStore>,
    completion: Arc<dyn CompletionConnector>,
    user_id: String,
    chat_id: i64,
    message_id: String,
}

impl StreamTurn {
    async fn fail(&self, tx: &mpsc::Sender<StreamEvent>, err: ChatError) {
        tracing::warn!(chat_id = self.chat_id, kind = err.kind(), "Streaming turn failed: {}", err);
        let _ = tx.send(StreamEvent::error(&self.message_id, &err)).await;
    }

    async fn run(self, request: CompletionRequest, tx: mpsc::Sender<StreamEvent>) {
        if tx.send(StreamEvent::start(&self.message_id)).await.is_err() {
            return;
        }

        let mut fragments = match self.completion.complete_stream(request).await {
            Ok(fragments) => fragments,
            Err(err) => return self.fail(&tx, ChatError::from_stream(err)).await,
        };

        let mut reply = String::new();
        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    tracing::info!(chat_id = self.chat_id, "Client went away, partial reply discarded");
                    return;
                }
                next = fragments.next() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    reply.push_str(&fragment);
                    let event = StreamEvent::streaming(&self.message_id, fragment);
                    if tx.send(event).await.is_err() {
                        tracing::info!(chat_id = self.chat_id, "Client went away, partial reply discarded");
                        return;
                    }
                }
                Some(Err(err)) => return self.fail(&tx, ChatError::from_stream(err)).await,
                None => break,
            }
        }

        if reply.trim().is_empty() {
            let err = ChatError::UpstreamStream("Completion stream carried no content".to_string());
            return self.fail(&tx, err).await;
        }

        let assistant = Message::assistant_with_id(self.message_id.clone(), reply.clone());
        match self
            .store
            .append_messages(&self.user_id, self.chat_id, std::slice::from_ref(&assistant))
            .await
        {
            Ok(true) => {
                let _ = tx.send(StreamEvent::complete(&self.message_id, reply)).await;
            }
            Ok(false) => self.fail(&tx, ChatError::chat_not_found()).await,
            Err(err) => self.fail(&tx, ChatError::Storage(err)).await,
        }
    }
}
