use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use skyward_core::session::StoreResult;
use skyward_core::{SessionKey, SessionStore};

struct Entry {
    values: HashMap<SessionKey, String>,
    expires_at: Instant,
}

/// In-process session store for tests and single-node local runs.
///
/// Same idle semantics as the Redis store: each write pushes the deadline
/// out by `ttl`, and an expired flow reads as empty.
pub struct MemorySessionStore {
    ttl: Duration,
    flows: RwLock<HashMap<Uuid, Entry>>,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, flows: RwLock::new(HashMap::new()) }
    }

    /// Drops every expired flow; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut flows = self.flows.write().await;
        let before = flows.len();
        flows.retain(|_, entry| entry.expires_at > now);
        before - flows.len()
    }

    /// Purges expired flows every `every` until the store is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let me: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(store) = me.upgrade() else { break };
                let purged = store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!("Purged {} expired flows", purged);
                }
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, flow_id: Uuid, key: SessionKey) -> StoreResult<Option<String>> {
        let flows = self.flows.read().await;
        Ok(flows
            .get(&flow_id)
            .filter(|entry| entry.expires_at > Instant::now())
            .and_then(|entry| entry.values.get(&key).cloned()))
    }

    async fn set(&self, flow_id: Uuid, key: SessionKey, value: &str) -> StoreResult<()> {
        let now = Instant::now();
        let mut flows = self.flows.write().await;
        let entry = flows.entry(flow_id).or_insert_with(|| Entry {
            values: HashMap::new(),
            expires_at: now,
        });
        if entry.expires_at <= now {
            entry.values.clear();
        }
        entry.values.insert(key, value.to_string());
        entry.expires_at = now + self.ttl;
        Ok(())
    }

    async fn remove(&self, flow_id: Uuid, key: SessionKey) -> StoreResult<()> {
        if let Some(entry) = self.flows.write().await.get_mut(&flow_id) {
            entry.values.remove(&key);
        }
        Ok(())
    }

    async fn clear(&self, flow_id: Uuid) -> StoreResult<()> {
        self.flows.write().await.remove(&flow_id);
        Ok(())
    }
}
