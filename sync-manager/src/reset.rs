//! Local reset policy.
//!
//! Maps a collection name to the storage-backend operation that discards
//! that collection's locally cached sync metadata. Pure dispatch; the
//! decision of *which* collections to reset is the reconciler's.

use crate::storage::Stores;
use sync_types::SyncError;

/// Dispatches collection resets to the right storage backend.
pub struct LocalResetPolicy {
    stores: Stores,
}

impl LocalResetPolicy {
    /// Create a policy over the given backends.
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Locally reset one collection.
    ///
    /// `"clients"` and `"tabs"` both reset the remote-tabs storage *and*
    /// the clients registry; the two historically shared a table.
    /// Unrecognized names are a no-op success, so server-introduced
    /// collections this client doesn't understand pass through harmlessly.
    pub async fn locally_reset_collection(&self, name: &str) -> Result<(), SyncError> {
        match name {
            "bookmarks" => self.stores.bookmarks.reset_bookmarks_metadata().await,
            "clients" | "tabs" => {
                self.stores.tabs.reset_remote_tabs().await?;
                self.stores.tabs.reset_clients_registry().await
            }
            "history" => self.stores.history.reset_history_metadata().await,
            "passwords" | "logins" => self.stores.logins.reset_sync().await,
            _ => {
                tracing::debug!("ignoring reset for unknown collection {name}");
                Ok(())
            }
        }
    }

    /// Locally reset several collections, attempting every one.
    ///
    /// A failed reset never prevents the remaining resets from running;
    /// failures are accumulated and returned for the caller to report.
    pub async fn locally_reset_collections(
        &self,
        names: &[String],
    ) -> Vec<(String, SyncError)> {
        let mut failures = Vec::new();
        for name in names {
            if let Err(err) = self.locally_reset_collection(name).await {
                failures.push((name.clone(), err));
            }
        }
        failures
    }
}
