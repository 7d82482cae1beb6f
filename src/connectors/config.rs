use serde::{Deserialize, Serialize};

/// Configuration for external service connectors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorConfig {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub blob_cache: BlobCacheConfig,
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL up to and including the API version (e.g., http://127.0.0.1:39281/v1)
    pub base_url: String,
    pub model: String,
    /// Bearer key (from env: OPENAI_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Timeout for a buffered completion, seconds
    pub timeout_secs: u64,
    /// Longest gap between two streamed fragments, seconds
    pub idle_timeout_secs: u64,
    /// Answer from scripted replies instead of the network
    pub mock: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:39281/v1".to_string(),
            model: "unsloth:Llama-3.2-3B-Instruct-GGUF:Llama-3.2-3B-Instruct-Q4_K_M.gguf"
                .to_string(),
            api_key: None,
            timeout_secs: 120,
            idle_timeout_secs: 60,
            mock: false,
        }
    }
}

impl CompletionConfig {
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Redis-backed cache for raw uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobCacheConfig {
    pub redis_url: String,
    /// Keep blobs in process memory (local runs, tests)
    pub in_memory: bool,
}

impl Default for BlobCacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            in_memory: false,
        }
    }
}
