use super::sse::fragment_stream;
use super::{CompletionConnector, CompletionRequest, FragmentStream, PromptMessage};
use crate::connectors::config::CompletionConfig;
use crate::connectors::ConnectorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Instrument;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiCompletionClient {
    http_client: reqwest::Client,
    config: CompletionConfig,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self, ConnectorError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| ConnectorError::Internal(err.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    fn request(&self, request: &CompletionRequest, stream: bool) -> reqwest::RequestBuilder {
        let body = ChatCompletionBody {
            model: &self.config.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let mut builder = self
            .http_client
            .post(self.config.chat_completions_url())
            .json(&body);

        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        builder
    }

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ConnectorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(ConnectorError::HttpError(format!(
            "completion endpoint returned {}: {}",
            status, text
        )))
    }
}

#[async_trait::async_trait]
impl CompletionConnector for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ConnectorError> {
        let span = tracing::info_span!(
            "completion_request",
            model = %self.config.model,
            messages = request.messages.len(),
            json_mode = request.json_mode
        );

        async move {
            let response = self
                .request(&request, false)
                .timeout(Duration::from_secs(self.config.timeout_secs))
                .send()
                .await?;
            let response = Self::ensure_success(response).await?;

            let payload: ChatCompletionResponse = response.json().await.map_err(|err| {
                if err.is_timeout() {
                    ConnectorError::from(err)
                } else {
                    ConnectorError::InvalidResponse(format!("completion body: {}", err))
                }
            })?;

            payload
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message)
                .and_then(|message| message.content)
                .ok_or_else(|| {
                    ConnectorError::InvalidResponse("completion has no message content".to_string())
                })
        }
        .instrument(span)
        .await
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, ConnectorError> {
        let span = tracing::info_span!(
            "completion_stream_request",
            model = %self.config.model,
            messages = request.messages.len()
        );

        async move {
            let idle = Duration::from_secs(self.config.idle_timeout_secs);
            // headers must arrive within the idle window too
            let response = tokio::time::timeout(idle, self.request(&request, true).send())
                .await
                .map_err(|_| {
                    ConnectorError::Timeout("completion stream did not start".to_string())
                })??;
            let response = Self::ensure_success(response).await?;

            Ok(fragment_stream(response.bytes_stream(), idle))
        }
        .instrument(span)
        .await
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        let mut builder = self.http_client.get(url).timeout(PING_TIMEOUT);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        Self::ensure_success(response).await.map(|_| ())
    }
}
