//! Sync-server metadata abstraction.
//!
//! The wire protocol of the sync service is out of scope; the orchestrator
//! only needs the per-round collection-info snapshot, fetched through this
//! trait. [`MockSyncServer`] is provided for tests.

use crate::auth::AccessTokenInfo;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use sync_types::SyncError;

/// Server-side collection metadata fetched once per round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collections the server reports as reset since our last sync.
    pub reset_collections: Vec<String>,
    /// Collections declined server-side (by another device).
    pub declined: Vec<String>,
    /// Server timestamp of the snapshot.
    pub last_modified_millis: u64,
}

/// Fetches collection metadata from the sync service.
#[async_trait]
pub trait SyncServerClient: Send + Sync {
    /// Fetch the current collection-info snapshot.
    async fn fetch_collection_info(
        &self,
        token: &AccessTokenInfo,
        tokenserver_url: &str,
    ) -> Result<CollectionInfo, SyncError>;
}

/// Mock sync-server client for testing.
#[derive(Debug, Clone, Default)]
pub struct MockSyncServer {
    inner: Arc<Mutex<MockServerInner>>,
}

#[derive(Debug, Default)]
struct MockServerInner {
    info: CollectionInfo,
    fetch_calls: u32,
    fail_next_fetch: Option<String>,
}

impl MockSyncServer {
    /// Create a mock server with an empty collection-info snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot returned by subsequent fetches.
    pub fn set_collection_info(&self, info: CollectionInfo) {
        self.inner.lock().unwrap().info = info;
    }

    /// Mark collections as server-reset.
    pub fn set_reset_collections(&self, names: &[&str]) {
        self.inner.lock().unwrap().info.reset_collections =
            names.iter().map(|s| s.to_string()).collect();
    }

    /// Mark collections as declined server-side.
    pub fn set_declined(&self, names: &[&str]) {
        self.inner.lock().unwrap().info.declined =
            names.iter().map(|s| s.to_string()).collect();
    }

    /// Cause the next fetch to fail with a network error.
    pub fn fail_next_fetch(&self, msg: &str) {
        self.inner.lock().unwrap().fail_next_fetch = Some(msg.to_string());
    }

    /// Number of fetches so far.
    pub fn fetch_calls(&self) -> u32 {
        self.inner.lock().unwrap().fetch_calls
    }
}

#[async_trait]
impl SyncServerClient for MockSyncServer {
    async fn fetch_collection_info(
        &self,
        _token: &AccessTokenInfo,
        _tokenserver_url: &str,
    ) -> Result<CollectionInfo, SyncError> {
        let mut inner = self.inner.lock().unwrap();
        inner.fetch_calls += 1;
        if let Some(msg) = inner.fail_next_fetch.take() {
            return Err(SyncError::Network(msg));
        }
        Ok(inner.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessTokenInfo, ScopedKeyBundle};

    fn token() -> AccessTokenInfo {
        AccessTokenInfo {
            scope: "app://services/sync".into(),
            token: "t".into(),
            key: Some(ScopedKeyBundle {
                kid: "k".into(),
                key: vec![0; 32],
            }),
        }
    }

    #[tokio::test]
    async fn mock_returns_configured_info() {
        let server = MockSyncServer::new();
        server.set_reset_collections(&["clients", "tabs"]);
        let info = server
            .fetch_collection_info(&token(), "https://token.example.com")
            .await
            .unwrap();
        assert_eq!(info.reset_collections, vec!["clients", "tabs"]);
        assert_eq!(server.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn fail_next_fetch_fires_once() {
        let server = MockSyncServer::new();
        server.fail_next_fetch("offline");
        assert!(server
            .fetch_collection_info(&token(), "url")
            .await
            .is_err());
        assert!(server.fetch_collection_info(&token(), "url").await.is_ok());
    }

    #[test]
    fn collection_info_serde_round_trips() {
        let info = CollectionInfo {
            reset_collections: vec!["history".into()],
            declined: vec!["logins".into()],
            last_modified_millis: 42,
        };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(serde_json::from_str::<CollectionInfo>(&json).unwrap(), info);
    }
}
