//! Short-lived storage for raw uploads.
//!
//! Entries expire on their own; a missing key after its TTL is the normal case,
//! not an error.

mod memory;
mod redis_cache;

pub use memory::MemoryBlobCache;
pub use redis_cache::RedisBlobCache;

use crate::connectors::config::BlobCacheConfig;
use crate::connectors::ConnectorError;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait BlobCache: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, ttl_secs: u64) -> Result<(), ConnectorError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ConnectorError>;

    async fn ping(&self) -> Result<(), ConnectorError>;
}

/// Build the configured cache: Redis unless `in_memory` is set.
pub async fn init(config: &BlobCacheConfig) -> Result<Arc<dyn BlobCache>, ConnectorError> {
    if config.in_memory {
        tracing::info!("Blob cache kept in process memory");
        return Ok(Arc::new(MemoryBlobCache::new()));
    }

    let cache = RedisBlobCache::connect(&config.redis_url).await?;
    tracing::info!("Blob cache connected to Redis");
    Ok(Arc::new(cache))
}
