//! Error types for device-sync.

use thiserror::Error;

/// Errors that can occur while orchestrating a sync round.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No signed-in account; nothing can sync.
    #[error("no account")]
    NoAccount,

    /// The stored access token is expired or rejected.
    #[error("access token expired or invalid")]
    TokenExpired,

    /// The scoped key material required by an engine is missing.
    #[error("missing scoped key for {0}")]
    MissingKey(String),

    /// The persisted auth-state blob could not be used.
    #[error("invalid auth state: {0}")]
    InvalidAuthState(String),

    /// Network/transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// A storage backend operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The persisted sync-prefs branch could not be read or written.
    #[error("prefs error: {0}")]
    Prefs(String),

    /// An engine batch was appended to a round that already finished.
    ///
    /// This is a caller bug, not a recoverable runtime condition.
    #[error("engine batch appended to a finished round")]
    RoundFinished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SyncError::MissingKey("logins".into());
        assert_eq!(err.to_string(), "missing scoped key for logins");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncError>();
    }
}
