//! # Durable Pipeline State
//!
//! The watermark the ingestion pipeline diffs against, plus the most recent
//! run record and a bounded run history, persisted as one JSON blob. The
//! blob lives either in a local file or behind an object-store URI; both
//! stores write atomically, so readers never observe a partial commit.

pub mod local;
pub mod object;

pub use local::LocalStateStore;
pub use object::ObjectStateStore;

use crate::types::IngestionResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// The persistent state blob. Keys carry the `app:` prefix on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppState {
    /// Ids of every post already processed, insertion-ordered on disk but
    /// treated as a set in memory.
    #[serde(rename = "app:last_seen_post_ids", default)]
    pub last_seen_post_ids: Vec<String>,

    /// The most recent run record.
    #[serde(rename = "app:last_result", default)]
    pub last_result: Option<IngestionResult>,

    /// Bounded run history, newest last.
    #[serde(rename = "app:history", default)]
    pub history: Vec<IngestionResult>,
}

impl AppState {
    /// The watermark as a set, for diffing a freshly parsed feed.
    pub fn seen_ids(&self) -> HashSet<String> {
        self.last_seen_post_ids.iter().cloned().collect()
    }

    /// Adds ids to the watermark, keeping insertion order and ignoring ids
    /// already present.
    pub fn mark_seen<I: IntoIterator<Item = String>>(&mut self, ids: I) {
        let mut existing: HashSet<String> = self.seen_ids();
        for id in ids {
            if existing.insert(id.clone()) {
                self.last_seen_post_ids.push(id);
            }
        }
    }

    /// Records a completed run: replaces the last result and appends to the
    /// history, dropping the oldest entries past `history_cap`.
    pub fn record_result(&mut self, result: IngestionResult, history_cap: usize) {
        self.history.push(result.clone());
        if self.history.len() > history_cap {
            let overflow = self.history.len() - history_cap;
            self.history.drain(..overflow);
        }
        self.last_result = Some(result);
    }
}

/// Errors raised by state stores.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("state i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode state: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("object store operation failed: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("invalid state path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Loads and atomically saves the state blob.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the stored state, or the empty state when none exists yet.
    async fn load(&self) -> Result<AppState, StateError>;

    /// Persists the state all-or-nothing.
    async fn save(&self, state: &AppState) -> Result<(), StateError>;
}

/// Opens the store for a state path: URIs with a scheme go to the matching
/// object store, anything else is a local file path.
pub fn open_state_store(path: &str) -> Result<Box<dyn StateStore>, StateError> {
    if path.contains("://") {
        let url = Url::parse(path).map_err(|err| StateError::InvalidPath {
            path: path.to_string(),
            reason: err.to_string(),
        })?;
        let (store, location) = object_store::parse_url(&url)?;
        Ok(Box::new(ObjectStateStore::new(store.into(), location)))
    } else {
        Ok(Box::new(LocalStateStore::new(path.into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_seen_is_a_set_with_stable_order() {
        let mut state = AppState::default();
        state.mark_seen(["a".to_string(), "b".to_string()]);
        state.mark_seen(["b".to_string(), "c".to_string(), "a".to_string()]);
        assert_eq!(state.last_seen_post_ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn history_is_bounded_dropping_oldest() {
        let mut state = AppState::default();
        for i in 0..5 {
            let mut result = IngestionResult::empty();
            result.discovered_count = i;
            state.record_result(result, 3);
        }
        assert_eq!(state.history.len(), 3);
        let discovered: Vec<usize> = state.history.iter().map(|r| r.discovered_count).collect();
        assert_eq!(discovered, vec![2, 3, 4]);
        assert_eq!(state.last_result.as_ref().map(|r| r.discovered_count), Some(4));
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = AppState::default();
        state.mark_seen(["a".to_string()]);
        state.record_result(IngestionResult::empty(), 10);

        let encoded = serde_json::to_string(&state).expect("state serializes");
        assert!(encoded.contains("app:last_seen_post_ids"));
        assert!(encoded.contains("app:last_result"));
        assert!(encoded.contains("app:history"));

        let decoded: AppState = serde_json::from_str(&encoded).expect("state deserializes");
        assert_eq!(decoded, state);
    }
}
