use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use skyward_core::{SessionKey, SessionStore, StoreError};

use crate::error::{FlowError, FlowResult};
use crate::state::FlowState;

/// Typed view over one flow's keys in the session store.
pub struct FlowSession<'a> {
    store: &'a dyn SessionStore,
    flow_id: Uuid,
}

impl<'a> FlowSession<'a> {
    pub fn new(store: &'a dyn SessionStore, flow_id: Uuid) -> Self {
        Self { store, flow_id }
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    pub async fn get(&self, key: SessionKey) -> FlowResult<Option<String>> {
        Ok(self.store.get(self.flow_id, key).await?)
    }

    pub async fn set(&self, key: SessionKey, value: &str) -> FlowResult<()> {
        Ok(self.store.set(self.flow_id, key, value).await?)
    }

    pub async fn remove(&self, key: SessionKey) -> FlowResult<()> {
        Ok(self.store.remove(self.flow_id, key).await?)
    }

    pub async fn clear(&self) -> FlowResult<()> {
        Ok(self.store.clear(self.flow_id).await?)
    }

    /// Reads a key an earlier stage must have written.
    pub async fn require(&self, key: SessionKey) -> FlowResult<String> {
        self.get(key)
            .await?
            .ok_or_else(|| FlowError::out_of_order(key))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: SessionKey) -> FlowResult<Option<T>> {
        match self.get(key).await? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
                FlowError::Store(StoreError::Corrupt {
                    key: key.as_str(),
                    reason: e.to_string(),
                })
            }),
        }
    }

    pub async fn require_json<T: DeserializeOwned>(&self, key: SessionKey) -> FlowResult<T> {
        self.get_json(key)
            .await?
            .ok_or_else(|| FlowError::out_of_order(key))
    }

    pub async fn set_json<T: Serialize>(&self, key: SessionKey, value: &T) -> FlowResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| {
            FlowError::Store(StoreError::Corrupt {
                key: key.as_str(),
                reason: e.to_string(),
            })
        })?;
        self.set(key, &raw).await
    }

    pub async fn flag(&self, key: SessionKey) -> FlowResult<bool> {
        Ok(self.get(key).await?.as_deref() == Some("true"))
    }

    pub async fn set_flag(&self, key: SessionKey, on: bool) -> FlowResult<()> {
        if on {
            self.set(key, "true").await
        } else {
            self.remove(key).await
        }
    }

    /// Current state; a flow without one has not been started by a search.
    pub async fn state(&self) -> FlowResult<FlowState> {
        self.require_json(SessionKey::FlowState).await
    }

    /// Applies the transition guard and persists the new state.
    pub async fn advance(&self, next: FlowState) -> FlowResult<FlowState> {
        let current = self.state().await?;
        let next = current.advance(next)?;
        self.set_json(SessionKey::FlowState, &next).await?;
        tracing::info!("Flow {} moved {} -> {}", self.flow_id, current, next);
        Ok(next)
    }

    /// Writes a state without consulting the guard table.
    pub async fn reset_state(&self, state: FlowState) -> FlowResult<()> {
        self.set_json(SessionKey::FlowState, &state).await
    }
}
