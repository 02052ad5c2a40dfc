//! Engine identity for the device-sync orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A syncable data domain.
///
/// The engine set is fixed and known at compile time, so this is a closed
/// enum rather than a free-form string. The wire/prefs name of each engine
/// is available via [`EngineIdentifier::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineIdentifier {
    /// The device registry shared across a user's devices.
    Clients,
    /// Open tabs on remote devices.
    Tabs,
    /// Bookmarks.
    Bookmarks,
    /// Browsing history.
    History,
    /// Saved credentials.
    Logins,
}

impl EngineIdentifier {
    /// Every engine, in deterministic order.
    pub const ALL: [EngineIdentifier; 5] = [
        EngineIdentifier::Clients,
        EngineIdentifier::Tabs,
        EngineIdentifier::Bookmarks,
        EngineIdentifier::History,
        EngineIdentifier::Logins,
    ];

    /// The stable collection name used in prefs keys and server payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineIdentifier::Clients => "clients",
            EngineIdentifier::Tabs => "tabs",
            EngineIdentifier::Bookmarks => "bookmarks",
            EngineIdentifier::History => "history",
            EngineIdentifier::Logins => "logins",
        }
    }

    /// Parse a server/prefs collection name into an engine.
    ///
    /// Returns `None` for names this client does not understand (the server
    /// may introduce collections we have no engine for).
    pub fn from_str_opt(name: &str) -> Option<Self> {
        match name {
            "clients" => Some(EngineIdentifier::Clients),
            "tabs" => Some(EngineIdentifier::Tabs),
            "bookmarks" => Some(EngineIdentifier::Bookmarks),
            "history" => Some(EngineIdentifier::History),
            "logins" | "passwords" => Some(EngineIdentifier::Logins),
            _ => None,
        }
    }

    /// Map a public collection name (as exposed to the app layer) to the
    /// engines it implies.
    ///
    /// `"passwords"` is the public alias for the logins engine, and `"tabs"`
    /// implies the clients engine as well, since remote tabs are derived from
    /// the client registry. Unknown names map to nothing.
    pub fn from_collection_name(name: &str) -> Vec<Self> {
        match name {
            "clients" => vec![EngineIdentifier::Clients],
            "tabs" => vec![EngineIdentifier::Clients, EngineIdentifier::Tabs],
            "bookmarks" => vec![EngineIdentifier::Bookmarks],
            "history" => vec![EngineIdentifier::History],
            "logins" | "passwords" => vec![EngineIdentifier::Logins],
            _ => vec![],
        }
    }
}

impl fmt::Display for EngineIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
