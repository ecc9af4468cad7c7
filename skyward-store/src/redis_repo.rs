use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

use skyward_core::session::StoreResult;
use skyward_core::{SessionKey, SessionStore, StoreError};

/// One Redis hash per flow (`flow:{id}`), one field per session key.
///
/// Every write re-arms `EXPIRE` on the hash so the whole flow idles out
/// together.
#[derive(Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
    ttl_seconds: u64,
}

fn unavailable(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

impl RedisSessionStore {
    pub async fn new(connection_string: &str, ttl_seconds: u64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        info!("Session store using Redis with {}s idle expiry", ttl_seconds);
        Ok(Self { client, ttl_seconds })
    }

    fn flow_key(flow_id: Uuid) -> String {
        format!("flow:{}", flow_id)
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(unavailable)
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(unavailable)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, flow_id: Uuid, key: SessionKey) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.hget(Self::flow_key(flow_id), key.as_str())
            .await
            .map_err(unavailable)
    }

    async fn set(&self, flow_id: Uuid, key: SessionKey, value: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let hash = Self::flow_key(flow_id);

        redis::pipe()
            .atomic()
            .hset(&hash, key.as_str(), value)
            .ignore()
            .expire(&hash, self.ttl_seconds as i64)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(unavailable)?;

        debug!("Flow {} wrote {}", flow_id, key.as_str());
        Ok(())
    }

    async fn remove(&self, flow_id: Uuid, key: SessionKey) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.hdel(Self::flow_key(flow_id), key.as_str())
            .await
            .map_err(unavailable)
    }

    async fn clear(&self, flow_id: Uuid) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del(Self::flow_key(flow_id)).await.map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flows_map_to_separate_hashes() {
        let id = Uuid::parse_str("6f1c1d0e-52a4-4c3c-9c59-0a3c6d2a9f10").unwrap();
        assert_eq!(RedisSessionStore::flow_key(id), "flow:6f1c1d0e-52a4-4c3c-9c59-0a3c6d2a9f10");
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_unavailable() {
        let store = RedisSessionStore::new("redis://127.0.0.1:1/", 900).await.unwrap();
        let result = store.get(Uuid::new_v4(), SessionKey::BookingId).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
