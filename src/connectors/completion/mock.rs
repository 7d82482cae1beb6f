use super::{CompletionConnector, CompletionRequest, FragmentStream, PromptMessage};
use crate::connectors::ConnectorError;
use futures_util::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Scripted answer for the next completion call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fragments(Vec<String>),
    /// Fragments with a pause before each one
    Slow(Vec<String>, Duration),
    Fail(ConnectorError),
    /// Stream these fragments, then break off
    FailAfter(Vec<String>, ConnectorError),
}

/// Completion connector answering from a queue of scripted replies.
///
/// With an empty queue it answers every buffered call with a short echo, and
/// JSON-mode calls with an object that parses both as an analysis and as a
/// question list.
#[derive(Default)]
pub struct MockCompletionConnector {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        }
    }

    pub fn push_reply(&self, reply: MockReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, request: &CompletionRequest) -> MockReply {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| MockReply::Text(default_reply(request)))
    }
}

fn default_reply(request: &CompletionRequest) -> String {
    if request.json_mode {
        return serde_json::json!({
            "summary": "Mock analysis of the uploaded document.",
            "documentType": "Document",
            "entities": [],
            "dates": [],
            "keyTerms": [],
            "questions": [
                "What is this document about?",
                "Who are the parties involved?",
                "What are the key dates?",
                "What obligations does it create?",
                "What should I review first?"
            ]
        })
        .to_string();
    }

    let last_user = request
        .messages
        .iter()
        .rev()
        .find_map(|message| match message {
            PromptMessage::User { content } => Some(content.as_str()),
            _ => None,
        })
        .unwrap_or_default();
    format!("Mock reply to: {}", last_user)
}

#[async_trait::async_trait]
impl CompletionConnector for MockCompletionConnector {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ConnectorError> {
        match self.next_reply(&request) {
            MockReply::Text(text) => Ok(text),
            MockReply::Fragments(fragments) | MockReply::Slow(fragments, _) => {
                Ok(fragments.concat())
            }
            MockReply::Fail(err) | MockReply::FailAfter(_, err) => Err(err),
        }
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, ConnectorError> {
        let stream: FragmentStream = match self.next_reply(&request) {
            MockReply::Text(text) => Box::pin(stream::iter(vec![Ok::<_, ConnectorError>(text)])),
            MockReply::Fragments(fragments) => Box::pin(stream::iter(
                fragments.into_iter().map(Ok::<_, ConnectorError>),
            )),
            MockReply::Slow(fragments, pause) => Box::pin(
                stream::iter(fragments).then(move |fragment| async move {
                    tokio::time::sleep(pause).await;
                    Ok::<_, ConnectorError>(fragment)
                }),
            ),
            MockReply::Fail(err) => return Err(err),
            MockReply::FailAfter(fragments, err) => Box::pin(
                stream::iter(fragments.into_iter().map(Ok::<_, ConnectorError>))
                    .chain(stream::once(async move { Err(err) })),
            ),
        };
        Ok(stream)
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        Ok(())
    }
}
