//! PDF upload to chat context.
//!
//! Bytes go to the blob cache first and are read back for extraction, so an
//! upload whose blob expired between the two steps fails with `BlobExpired`.

use crate::configuration::ChatSettings;
use crate::connectors::{BlobCache, CompletionConnector, CompletionRequest};
use crate::db::{ChatStore, DocumentLink};
use crate::models::{Chat, ChatRef, Document, DocumentAnalysis, DocumentView, Message};
use crate::services::extractor::DocumentExtractor;
use crate::services::{prompts, ChatError, ChatService};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Checks that run on the request head, before the body is read.
#[derive(Debug, Clone, Copy)]
pub struct UploadCheck {
    pub max_bytes: usize,
}

impl UploadCheck {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn content_type(&self, content_type: Option<&str>) -> Result<(), ChatError> {
        let mime = content_type
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if mime == PDF_CONTENT_TYPE {
            Ok(())
        } else {
            Err(ChatError::UnsupportedFileType(format!(
                "Only PDF files are accepted, got '{}'",
                if mime.is_empty() { "none" } else { mime.as_str() }
            )))
        }
    }

    pub fn size(&self, len: usize) -> Result<(), ChatError> {
        if len > self.max_bytes {
            return Err(ChatError::FileTooLarge(format!(
                "File exceeds the {} byte limit",
                self.max_bytes
            )));
        }
        Ok(())
    }

    pub fn head(&self, content_type: Option<&str>, declared_len: Option<usize>) -> Result<(), ChatError> {
        self.content_type(content_type)?;
        if let Some(len) = declared_len {
            self.size(len)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    /// Attach to this chat instead of creating one
    pub target: Option<ChatRef>,
    /// Sent as a user message once the document is linked
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub chat: Chat,
    pub document: DocumentView,
    pub suggested_questions: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip)]
    pub created: bool,
}

#[derive(Clone)]
pub struct IngestionService {
    store: Arc<dyn ChatStore>,
    blob_cache: Arc<dyn BlobCache>,
    extractor: Arc<dyn DocumentExtractor>,
    completion: Arc<dyn CompletionConnector>,
    chats: ChatService,
    settings: ChatSettings,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        blob_cache: Arc<dyn BlobCache>,
        extractor: Arc<dyn DocumentExtractor>,
        completion: Arc<dyn CompletionConnector>,
        settings: ChatSettings,
    ) -> Self {
        let chats = ChatService::new(store.clone(), completion.clone(), settings.clone());
        Self {
            store,
            blob_cache,
            extractor,
            completion,
            chats,
            settings,
        }
    }

    pub fn upload_check(&self) -> UploadCheck {
        UploadCheck::new(self.settings.max_upload_bytes)
    }

    #[tracing::instrument(name = "Ingest document", skip(self, request), fields(filename = %request.filename, size = request.bytes.len()))]
    pub async fn ingest(&self, user_id: &str, request: IngestRequest) -> Result<UploadOutcome, ChatError> {
        let IngestRequest {
            filename,
            bytes,
            target,
            message,
        } = request;

        let filename = filename.trim().to_string();
        if filename.is_empty() {
            return Err(ChatError::Validation("filename is required".to_string()));
        }
        if bytes.is_empty() {
            return Err(ChatError::Validation("Uploaded file is empty".to_string()));
        }
        self.upload_check().size(bytes.len())?;

        // ownership is checked before anything is written
        if let Some(target) = target {
            self.chats.get(user_id, target).await?;
        }

        let file_key = format!("pdf:{}:{}", user_id, Uuid::new_v4());
        self.blob_cache
            .put(&file_key, bytes, self.settings.blob_ttl_secs)
            .await
            .map_err(|err| ChatError::Cache(format!("Could not cache upload: {}", err)))?;

        let bytes = self
            .blob_cache
            .get(&file_key)
            .await
            .map_err(|err| ChatError::Cache(format!("Could not read cached upload: {}", err)))?
            .ok_or_else(|| ChatError::BlobExpired(format!("Upload {} has expired", file_key)))?;

        let text = self.extractor.extract(bytes).await?;
        tracing::info!(chars = text.chars().count(), "Text extracted");

        let analysis = self.analyse(&text).await?;

        let mut warnings = vec![];
        let suggested_questions = match self.suggest_questions(&text).await {
            Ok(questions) => questions,
            Err(err) => {
                tracing::warn!("Suggested questions unavailable: {}", err);
                warnings.push(format!("Suggested questions unavailable: {}", err));
                vec![]
            }
        };

        let context = prompts::truncate_chars(&text, self.settings.stored_context_chars).to_string();
        let link = match target {
            Some(chat) => DocumentLink::ExistingChat { chat, context },
            None => DocumentLink::NewChat(document_chat(user_id, &filename, &analysis, context)),
        };

        let document = Document {
            id: 0,
            user_id: user_id.to_string(),
            filename,
            file_type: PDF_CONTENT_TYPE.to_string(),
            file_key,
            text_content: text,
            analysis: Some(analysis),
            suggested_questions: suggested_questions.clone(),
            created_at: Utc::now(),
        };

        let (document, mut chat) = self
            .store
            .save_document(document, link)
            .await
            .map_err(ChatError::Storage)?
            .ok_or_else(ChatError::chat_not_found)?;
        tracing::info!(document_id = document.id, chat_id = chat.id, "Document linked");

        if let Some(message) = message.filter(|message| !message.trim().is_empty()) {
            match self.chats.send_message(user_id, ChatRef::Id(chat.id), &message).await {
                Ok(_) => chat = self.chats.get(user_id, ChatRef::Id(chat.id)).await?,
                Err(err) => {
                    tracing::warn!("Accompanying message failed: {}", err);
                    warnings.push(format!("Accompanying message failed: {}", err));
                }
            }
        }

        Ok(UploadOutcome {
            chat,
            document: DocumentView::from(&document),
            suggested_questions,
            warnings,
            created: target.is_none(),
        })
    }

    async fn analyse(&self, text: &str) -> Result<DocumentAnalysis, ChatError> {
        let request = CompletionRequest::analysis(prompts::analysis_messages(
            text,
            self.settings.analysis_chars,
        ));
        let raw = self.completion.complete(request).await?;
        prompts::parse_analysis(&raw)
    }

    async fn suggest_questions(&self, text: &str) -> Result<Vec<String>, ChatError> {
        let request = CompletionRequest::questions(prompts::questions_messages(
            text,
            self.settings.questions_chars,
        ));
        let raw = self.completion.complete(request).await?;
        prompts::parse_questions(&raw)
    }
}

fn document_chat(
    user_id: &str,
    filename: &str,
    analysis: &DocumentAnalysis,
    context: String,
) -> Chat {
    let document_type = match analysis.document_type.trim() {
        "" => "Document",
        kind => kind,
    };
    let summary = match analysis.summary.trim() {
        "" => "No summary available",
        summary => summary,
    };
    let mut chat = Chat::new(user_id.to_string(), format!("{}: {}", document_type, filename));
    chat.document_context = Some(context);
    chat.messages.push(Message::system(format!(
        "Initial document analysis. {}",
        summary
    )));
    chat
}
