use super::BlobCache;
use crate::connectors::ConnectorError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[derive(Clone)]
pub struct RedisBlobCache {
    connection: ConnectionManager,
}

impl RedisBlobCache {
    pub async fn connect(redis_url: &str) -> Result<Self, ConnectorError> {
        let client = redis::Client::open(redis_url).map_err(|err| {
            ConnectorError::Internal(format!("Invalid Redis URL for blob cache: {}", err))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|err| {
            ConnectorError::ServiceUnavailable(format!("Redis unavailable: {}", err))
        })?;

        Ok(Self { connection })
    }
}

#[async_trait::async_trait]
impl BlobCache for RedisBlobCache {
    #[tracing::instrument(name = "Cache blob", skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: Vec<u8>, ttl_secs: u64) -> Result<(), ConnectorError> {
        // the manager multiplexes one connection; clones share it
        let mut conn = self.connection.clone();
        let (): () = conn.set_ex(key, bytes, ttl_secs).await?;
        Ok(())
    }

    #[tracing::instrument(name = "Read cached blob", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, ConnectorError> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(ConnectorError::InvalidResponse(format!(
                "unexpected PING reply: {}",
                pong
            )))
        }
    }
}
