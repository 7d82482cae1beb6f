//! External Service Connectors
//!
//! Adapters for the services this backend depends on but does not own: the
//! OpenAI-compatible completion endpoint and the Redis blob cache.
//!
//! ## Architecture Pattern
//!
//! 1. Define the trait in `{service}/mod.rs` → allows mocking in tests
//! 2. Implement the network client next to it
//! 3. Configuration in `config.rs` → enable/disable per environment
//! 4. Inject `web::Data<Arc<dyn Trait>>` → handlers and pipelines never see HTTP details

pub mod blob_cache;
pub mod completion;
pub mod config;
pub mod errors;

pub use blob_cache::{BlobCache, MemoryBlobCache, RedisBlobCache};
pub use completion::{
    CompletionConnector, CompletionRequest, FragmentStream, MockCompletionConnector, MockReply,
    OpenAiCompletionClient, PromptMessage,
};
pub use config::{BlobCacheConfig, CompletionConfig, ConnectorConfig};
pub use errors::ConnectorError;

use std::sync::Arc;

/// Build the configured completion connector.
pub fn init_completion(
    config: &CompletionConfig,
) -> Result<Arc<dyn CompletionConnector>, ConnectorError> {
    if config.mock {
        tracing::warn!("Completion connector answers from scripted replies");
        return Ok(Arc::new(MockCompletionConnector::new()));
    }

    tracing::info!(base_url = %config.base_url, model = %config.model, "Completion connector ready");
    Ok(Arc::new(OpenAiCompletionClient::new(config.clone())?))
}
