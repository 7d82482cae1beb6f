use super::models::{ComponentHealth, HealthCheckResponse};
use crate::connectors::{BlobCache, CompletionConnector};
use crate::db::ChatStore;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const SLOW_RESPONSE_THRESHOLD_MS: u64 = 1000;

/// Probes every backend the pipelines depend on.
pub struct HealthChecker {
    store: Arc<dyn ChatStore>,
    blob_cache: Arc<dyn BlobCache>,
    completion: Arc<dyn CompletionConnector>,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(
        store: Arc<dyn ChatStore>,
        blob_cache: Arc<dyn BlobCache>,
        completion: Arc<dyn CompletionConnector>,
    ) -> Self {
        Self {
            store,
            blob_cache,
            completion,
            start_time: Instant::now(),
        }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let version = env!("CARGO_PKG_VERSION").to_string();
        let uptime = self.start_time.elapsed().as_secs();
        let mut response = HealthCheckResponse::new(version, uptime);

        let (db_health, cache_health, completion_health) = tokio::join!(
            self.check_database(),
            self.check_blob_cache(),
            self.check_completion()
        );

        response.add_component("database", db_health);
        response.add_component("blob_cache", cache_health);
        response.add_component("completion", completion_health);

        response
    }

    #[tracing::instrument(name = "Check database health", skip(self))]
    async fn check_database(&self) -> ComponentHealth {
        probe("Database", self.store.ping()).await
    }

    #[tracing::instrument(name = "Check blob cache health", skip(self))]
    async fn check_blob_cache(&self) -> ComponentHealth {
        probe("Blob cache", async {
            self.blob_cache.ping().await.map_err(|err| err.to_string())
        })
        .await
    }

    #[tracing::instrument(name = "Check completion endpoint health", skip(self))]
    async fn check_completion(&self) -> ComponentHealth {
        probe("Completion endpoint", async {
            self.completion.ping().await.map_err(|err| err.to_string())
        })
        .await
    }
}

async fn probe<F>(component: &str, check: F) -> ComponentHealth
where
    F: Future<Output = Result<(), String>>,
{
    let start = Instant::now();

    match timeout(CHECK_TIMEOUT, check).await {
        Ok(Ok(())) => {
            let elapsed = start.elapsed().as_millis() as u64;
            if elapsed > SLOW_RESPONSE_THRESHOLD_MS {
                ComponentHealth::degraded(format!("{} responding slowly", component), elapsed)
            } else {
                ComponentHealth::healthy(elapsed)
            }
        }
        Ok(Err(e)) => {
            tracing::error!("{} health check failed: {}", component, e);
            ComponentHealth::unhealthy(format!("{} error: {}", component, e))
        }
        Err(_) => ComponentHealth::unhealthy(format!("{} check timed out", component)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{MemoryBlobCache, MockCompletionConnector};
    use crate::db::MemoryChatStore;
    use crate::health::ComponentStatus;

    #[tokio::test]
    async fn test_in_memory_backends_are_healthy() {
        let checker = HealthChecker::new(
            Arc::new(MemoryChatStore::new()),
            Arc::new(MemoryBlobCache::new()),
            Arc::new(MockCompletionConnector::new()),
        );

        let response = checker.check_all().await;

        assert!(response.is_healthy());
        assert_eq!(response.components.len(), 3);
        assert_eq!(
            response.components["blob_cache"].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_failed_probe_is_unhealthy() {
        let health = probe("Database", async { Err("connection refused".to_string()) }).await;

        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(health.message.unwrap().contains("connection refused"));
    }
}
