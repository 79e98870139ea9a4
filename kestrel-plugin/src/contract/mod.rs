//! The cross-process plugin contract.
//!
//! A plugin is addressed by its authority. The launcher sends a
//! [`PluginRequest`] naming an operation ([`Path`]) and a few string
//! parameters; the plugin answers with a [`PluginResponse`] carrying rows of
//! named columns (see [`columns`]) and/or key/value parameters. Both messages
//! are plain serde values, so any transport (D-Bus, HTTP, in-process call)
//! can carry them.

pub mod columns;
mod config;
mod state;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use config::{PluginConfig, StorageStrategy};
pub use state::PluginState;

use crate::error::ContractError;
use crate::query::Category;

/// One result row: column name to value.
pub type Row = BTreeMap<String, serde_json::Value>;

pub mod params {
    pub const QUERY: &str = "query";
    pub const ALLOW_NETWORK: &str = "allowNetwork";
    pub const LANG: &str = "lang";
    pub const ID: &str = "id";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const NOT_UPDATED: &str = "notUpdated";

    pub const STORAGE_STRATEGY: &str = "storageStrategy";
    pub const REFRESH_INTERVAL: &str = "refreshInterval";
    pub const MANAGED_LOCATION: &str = "managedLocation";

    pub const STATE: &str = "state";
    pub const STATE_TEXT: &str = "text";
    pub const SETUP_ACTION: &str = "setupAction";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PluginType {
    FileSearch,
    ContactSearch,
    LocationSearch,
    PublicTransport,
    Weather,
}

impl PluginType {
    pub fn category(self) -> Category {
        match self {
            PluginType::FileSearch => Category::Files,
            PluginType::ContactSearch => Category::Contacts,
            PluginType::LocationSearch | PluginType::PublicTransport => Category::Places,
            PluginType::Weather => Category::Tools,
        }
    }

    pub fn is_searchable(self) -> bool {
        !matches!(self, PluginType::Weather)
    }
}

/// Operation selected by the path segment of a plugin address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Path {
    Search,
    Get,
    Refresh,
    Config,
    State,
}

impl Path {
    pub fn segment(self) -> &'static str {
        match self {
            Path::Search => "search",
            Path::Get => "get",
            Path::Refresh => "refresh",
            Path::Config => "config",
            Path::State => "state",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginRequest {
    pub path: Path,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// The stored item, for `refresh`.
    #[serde(default)]
    pub item: Option<Row>,
}

impl PluginRequest {
    pub fn new(path: Path) -> Self {
        Self {
            path,
            params: BTreeMap::new(),
            item: None,
        }
    }

    pub fn search(query: &str, allow_network: bool) -> Self {
        Self::new(Path::Search)
            .param(params::QUERY, query)
            .param(params::ALLOW_NETWORK, allow_network.to_string())
    }

    pub fn get(id: &str) -> Self {
        Self::new(Path::Get)
            .param(params::ID, id)
            .param(params::ALLOW_NETWORK, "false")
    }

    pub fn refresh(item: Row, updated_at: i64) -> Self {
        let mut request = Self::new(Path::Refresh).param(params::UPDATED_AT, updated_at.to_string());
        request.item = Some(item);
        request
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn require(&self, key: &'static str) -> Result<&str, ContractError> {
        self.params
            .get(key)
            .map(String::as_str)
            .ok_or(ContractError::MissingParam(key))
    }

    pub fn flag(&self, key: &str) -> bool {
        self.params
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(false)
    }

    pub fn to_json(&self) -> Result<String, ContractError> {
        serde_json::to_string(self).map_err(|e| ContractError::Malformed(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, ContractError> {
        serde_json::from_str(text).map_err(|e| ContractError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PluginResponse {
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl PluginResponse {
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            params: BTreeMap::new(),
        }
    }

    pub fn params(params: BTreeMap<String, String>) -> Self {
        Self {
            rows: Vec::new(),
            params,
        }
    }

    pub fn not_updated() -> Self {
        Self::params(BTreeMap::from([(
            params::NOT_UPDATED.to_string(),
            "true".to_string(),
        )]))
    }

    pub fn is_not_updated(&self) -> bool {
        self.params
            .get(params::NOT_UPDATED)
            .is_some_and(|v| v == "true")
    }

    pub fn to_json(&self) -> Result<String, ContractError> {
        serde_json::to_string(self).map_err(|e| ContractError::Malformed(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self, ContractError> {
        serde_json::from_str(text).map_err(|e| ContractError::Malformed(e.to_string()))
    }
}
