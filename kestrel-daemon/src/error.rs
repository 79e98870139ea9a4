use std::path::PathBuf;

use kestrel_plugin::ContractError;
use thiserror::Error;

/// Failure of the persistence layer behind the favorites store, the plugin
/// registry or the custom labels.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store document: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("item {0} has no persistable payload")]
    NotPersistable(String),

    #[error("background write did not finish: {0}")]
    Background(#[from] tokio::task::JoinError),
}

/// Failure talking to an out-of-process plugin.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("plugin {0} is not registered")]
    UnknownPlugin(String),

    #[error("plugin {0} is disabled")]
    Disabled(String),

    #[error("plugin {authority} did not answer within {timeout_ms} ms")]
    Timeout { authority: String, timeout_ms: u128 },

    #[error("transport to {authority} failed: {message}")]
    Transport { authority: String, message: String },

    #[error("plugin {authority} broke the contract: {source}")]
    Contract {
        authority: String,
        #[source]
        source: ContractError,
    },

    #[error("plugin {authority} failed: {message}")]
    Plugin { authority: String, message: String },
}

impl BridgeError {
    /// Errors that say nothing about whether the item still exists.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout { .. } | BridgeError::Transport { .. } | BridgeError::Plugin { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
