//! Auth provider abstraction.
//!
//! The orchestrator never talks to the account system directly; it consumes
//! this trait, which exchanges stored credentials for short-lived tokens and
//! key material. The concrete implementation lives in the host application;
//! [`MockAuthProvider`] is provided for tests.

mod mock;

pub use mock::{MockAuthProvider, SyncErrorKind};

use async_trait::async_trait;
use std::fmt;
use sync_types::SyncError;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// OAuth scope covering the sync service.
pub const SCOPE_SYNC: &str = "app://services/sync";

/// Scoped key material returned alongside an access token.
///
/// Zeroed on drop; Debug output never includes the key bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ScopedKeyBundle {
    /// Key identifier, used to detect key rotation.
    #[zeroize(skip)]
    pub kid: String,
    /// The raw key material.
    pub key: Vec<u8>,
}

impl fmt::Debug for ScopedKeyBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedKeyBundle")
            .field("kid", &self.kid)
            .field("key", &format!("[{} bytes REDACTED]", self.key.len()))
            .finish()
    }
}

/// An access token plus optional scoped key material.
#[derive(Debug, Clone)]
pub struct AccessTokenInfo {
    /// The scope this token was issued for.
    pub scope: String,
    /// The bearer token.
    pub token: String,
    /// Scoped key material, if the scope carries any.
    pub key: Option<ScopedKeyBundle>,
}

/// One device in the account's constellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Stable device identifier.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
}

/// The set of devices attached to the account.
#[derive(Debug, Clone, Default)]
pub struct Constellation {
    /// This device, if registered.
    pub local_device: Option<Device>,
    /// Every other device on the account.
    pub remote_devices: Vec<Device>,
}

/// The account system, as seen by the orchestrator.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Exchange stored credentials for an access token with the given scope.
    async fn get_access_token(&self, scope: &str) -> Result<AccessTokenInfo, SyncError>;

    /// The token-server endpoint the sync service lives behind.
    async fn token_server_url(&self) -> Result<String, SyncError>;

    /// The account identifier, if signed in.
    async fn account_uid(&self) -> Result<Option<Uuid>, SyncError>;

    /// The current device constellation.
    async fn device_constellation(&self) -> Result<Constellation, SyncError>;
}
