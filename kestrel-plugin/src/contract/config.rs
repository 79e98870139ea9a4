use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::params;

/// How a pinned plugin item is kept alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageStrategy {
    /// Only the key and plugin identity are stored; restoring re-queries the plugin.
    StoreReference,
    /// The full payload is stored at pin time; restoring never contacts the plugin.
    #[default]
    StoreCopy,
}

impl StorageStrategy {
    pub fn as_param(self) -> &'static str {
        match self {
            StorageStrategy::StoreReference => "ref",
            StorageStrategy::StoreCopy => "copy",
        }
    }

    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "ref" | "reference" => Some(StorageStrategy::StoreReference),
            "copy" => Some(StorageStrategy::StoreCopy),
            _ => None,
        }
    }
}

/// Configuration a query plugin announces through the `config` request.
///
/// Every key is optional on the wire so older plugins keep working:
///
/// | key | default |
/// |---|---|
/// | `storageStrategy` | `copy` |
/// | `refreshInterval` (ms) | `0`, no minimum |
/// | `managedLocation` | `false` |
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PluginConfig {
    pub storage_strategy: StorageStrategy,
    pub min_refresh_interval: Duration,
    pub managed_location: bool,
}

impl PluginConfig {
    pub fn from_params(values: &BTreeMap<String, String>) -> Self {
        let mut config = PluginConfig::default();
        if let Some(strategy) = values
            .get(params::STORAGE_STRATEGY)
            .and_then(|v| StorageStrategy::from_param(v))
        {
            config.storage_strategy = strategy;
        }
        if let Some(ms) = values
            .get(params::REFRESH_INTERVAL)
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.min_refresh_interval = Duration::from_millis(ms);
        }
        if let Some(managed) = values
            .get(params::MANAGED_LOCATION)
            .and_then(|v| v.parse::<bool>().ok())
        {
            config.managed_location = managed;
        }
        config
    }

    pub fn to_params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                params::STORAGE_STRATEGY.to_string(),
                self.storage_strategy.as_param().to_string(),
            ),
            (
                params::REFRESH_INTERVAL.to_string(),
                self.min_refresh_interval.as_millis().to_string(),
            ),
            (
                params::MANAGED_LOCATION.to_string(),
                self.managed_location.to_string(),
            ),
        ])
    }
}
