use super::BlobCache;
use crate::connectors::ConnectorError;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Process-local blob cache with the same expiry semantics as Redis `SETEX`.
#[derive(Default)]
pub struct MemoryBlobCache {
    entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryBlobCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop a key as if its TTL had elapsed.
    pub fn expire(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, (Vec<u8>, Instant)>>, ConnectorError>
    {
        self.entries
            .lock()
            .map_err(|_| ConnectorError::Internal("blob cache lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl BlobCache for MemoryBlobCache {
    async fn put(&self, key: &str, bytes: Vec<u8>, ttl_secs: u64) -> Result<(), ConnectorError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (bytes, now + Duration::from_secs(ttl_secs)));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ConnectorError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((bytes, _)) => Ok(Some(bytes.clone())),
            None => Ok(None),
        }
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        self.lock().map(|_| ())
    }
}
