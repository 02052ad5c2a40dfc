//! Mock auth provider for testing.
//!
//! Allows scripting token failures and capturing the scopes requested.

use super::{AccessTokenInfo, AuthProvider, Constellation, Device, ScopedKeyBundle};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use sync_types::SyncError;
use uuid::Uuid;

/// Mock auth provider for testing.
#[derive(Debug, Clone, Default)]
pub struct MockAuthProvider {
    inner: Arc<Mutex<MockAuthInner>>,
}

#[derive(Debug)]
struct MockAuthInner {
    uid: Option<Uuid>,
    token_requests: Vec<String>,
    fail_next_token: Option<SyncErrorKind>,
    omit_key: bool,
}

impl Default for MockAuthInner {
    fn default() -> Self {
        Self {
            uid: Some(Uuid::new_v4()),
            token_requests: Vec::new(),
            fail_next_token: None,
            omit_key: false,
        }
    }
}

/// Which readiness error the next token request should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// `SyncError::TokenExpired`.
    TokenExpired,
    /// `SyncError::NoAccount`.
    NoAccount,
    /// `SyncError::Network`.
    Network,
}

impl MockAuthProvider {
    /// Create a mock provider for a signed-in account.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider with no signed-in account.
    pub fn signed_out() -> Self {
        let provider = Self::default();
        provider.inner.lock().unwrap().uid = None;
        provider
    }

    /// Cause the next `get_access_token` call to fail.
    pub fn fail_next_token(&self, kind: SyncErrorKind) {
        self.inner.lock().unwrap().fail_next_token = Some(kind);
    }

    /// Cause future tokens to come back without scoped key material.
    pub fn omit_key(&self) {
        self.inner.lock().unwrap().omit_key = true;
    }

    /// Every scope that was requested, in order.
    pub fn token_requests(&self) -> Vec<String> {
        self.inner.lock().unwrap().token_requests.clone()
    }
}

#[async_trait]
impl AuthProvider for MockAuthProvider {
    async fn get_access_token(&self, scope: &str) -> Result<AccessTokenInfo, SyncError> {
        let mut inner = self.inner.lock().unwrap();
        inner.token_requests.push(scope.to_string());
        if let Some(kind) = inner.fail_next_token.take() {
            return Err(match kind {
                SyncErrorKind::TokenExpired => SyncError::TokenExpired,
                SyncErrorKind::NoAccount => SyncError::NoAccount,
                SyncErrorKind::Network => SyncError::Network("mock network failure".into()),
            });
        }
        if inner.uid.is_none() {
            return Err(SyncError::NoAccount);
        }
        let key = if inner.omit_key {
            None
        } else {
            Some(ScopedKeyBundle {
                kid: "mock-kid".into(),
                key: vec![0x42; 32],
            })
        };
        Ok(AccessTokenInfo {
            scope: scope.to_string(),
            token: "mock-token".into(),
            key,
        })
    }

    async fn token_server_url(&self) -> Result<String, SyncError> {
        Ok("https://token.example.com/1.0/sync".into())
    }

    async fn account_uid(&self) -> Result<Option<Uuid>, SyncError> {
        Ok(self.inner.lock().unwrap().uid)
    }

    async fn device_constellation(&self) -> Result<Constellation, SyncError> {
        Ok(Constellation {
            local_device: Some(Device {
                id: "mock-device".into(),
                display_name: "Mock Device".into(),
            }),
            remote_devices: vec![],
        })
    }
}
