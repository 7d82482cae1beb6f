//! Chat completion connector.
//!
//! Pipelines talk to [`CompletionConnector`]; the HTTP client and the scripted
//! mock are interchangeable behind it.

mod client;
mod mock;
pub mod sse;

pub use client::OpenAiCompletionClient;
pub use mock::{MockCompletionConnector, MockReply};

use crate::connectors::ConnectorError;
use crate::models::{Message, Role};
use futures_util::Stream;
use serde::Serialize;
use std::pin::Pin;

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, ConnectorError>> + Send>>;

/// A message as sent upstream. `function` messages must be named.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PromptMessage {
    System { content: String },
    User { content: String },
    Assistant { content: String },
    Function { name: String, content: String },
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::System { content }
            | Self::User { content }
            | Self::Assistant { content }
            | Self::Function { content, .. } => content,
        }
    }
}

impl TryFrom<&Message> for PromptMessage {
    type Error = ConnectorError;

    fn try_from(message: &Message) -> Result<Self, Self::Error> {
        let content = message.content.clone();
        let prompt = match message.role {
            Role::System => Self::System { content },
            Role::User => Self::User { content },
            Role::Assistant => Self::Assistant { content },
            Role::Function => {
                let name = message
                    .name
                    .as_ref()
                    .filter(|name| !name.trim().is_empty())
                    .ok_or_else(|| {
                        ConnectorError::InvalidRole(format!(
                            "function message {} has no name",
                            message.id
                        ))
                    })?;
                Self::Function {
                    name: name.clone(),
                    content,
                }
            }
        };
        Ok(prompt)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask for a JSON object response
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Conversation turn
    pub fn chat(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            max_tokens: 3000,
            json_mode: false,
        }
    }

    /// Document analysis
    pub fn analysis(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            temperature: 0.3,
            max_tokens: 2000,
            json_mode: true,
        }
    }

    /// Suggested questions
    pub fn questions(messages: Vec<PromptMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            max_tokens: 1000,
            json_mode: true,
        }
    }
}

#[async_trait::async_trait]
pub trait CompletionConnector: Send + Sync {
    /// Wait for the whole answer.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ConnectorError>;

    /// Answer as a stream of text fragments.
    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, ConnectorError>;

    async fn ping(&self) -> Result<(), ConnectorError>;
}
