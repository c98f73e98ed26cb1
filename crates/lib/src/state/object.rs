//! Object-store state store: the blob is written in a single put request,
//! which the store guarantees is atomic.

use crate::state::{AppState, StateError, StateStore};
use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::debug;

pub struct ObjectStateStore {
    store: Arc<dyn ObjectStore>,
    location: ObjectPath,
}

impl ObjectStateStore {
    pub fn new(store: Arc<dyn ObjectStore>, location: ObjectPath) -> Self {
        Self { store, location }
    }
}

#[async_trait]
impl StateStore for ObjectStateStore {
    async fn load(&self) -> Result<AppState, StateError> {
        let result = match self.store.get(&self.location).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                debug!(location = %self.location, "no state object yet, starting empty");
                return Ok(AppState::default());
            }
            Err(err) => return Err(err.into()),
        };
        let bytes = result.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(&self, state: &AppState) -> Result<(), StateError> {
        let encoded = serde_json::to_vec_pretty(state)?;
        self.store.put(&self.location, encoded.into()).await?;
        debug!(location = %self.location, "state saved");
        Ok(())
    }
}
