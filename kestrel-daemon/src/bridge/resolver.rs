use async_trait::async_trait;
use kestrel_plugin::provider::Refreshed;
use kestrel_plugin::{PluginItem, Searchable};
use std::sync::Arc;
use std::time::Duration;

use super::client::PluginClient;
use super::registry::PluginRegistry;
use crate::error::BridgeError;

/// What the favorites store needs from the plugin bridge to restore and
/// refresh plugin items.
#[async_trait]
pub trait PluginResolver: Send + Sync {
    /// Whether the plugin is still installed. Must not depend on the plugin
    /// being reachable.
    fn is_installed(&self, authority: &str) -> bool;

    async fn resolve(&self, authority: &str, id: &str) -> Result<Option<Searchable>, BridgeError>;

    async fn refresh(&self, item: &PluginItem) -> Result<Refreshed, BridgeError>;

    async fn min_refresh_interval(&self, authority: &str) -> Duration;
}

pub struct BridgeResolver {
    registry: Arc<PluginRegistry>,
    client: Arc<PluginClient>,
}

impl BridgeResolver {
    pub fn new(registry: Arc<PluginRegistry>, client: Arc<PluginClient>) -> Self {
        Self { registry, client }
    }
}

#[async_trait]
impl PluginResolver for BridgeResolver {
    fn is_installed(&self, authority: &str) -> bool {
        self.registry.contains(authority)
    }

    async fn resolve(&self, authority: &str, id: &str) -> Result<Option<Searchable>, BridgeError> {
        let descriptor = self
            .registry
            .get(authority)
            .ok_or_else(|| BridgeError::UnknownPlugin(authority.to_string()))?;
        if !descriptor.enabled {
            return Err(BridgeError::Disabled(authority.to_string()));
        }
        self.client.get(&descriptor, id).await
    }

    async fn refresh(&self, item: &PluginItem) -> Result<Refreshed, BridgeError> {
        let descriptor = self
            .registry
            .get(&item.authority)
            .ok_or_else(|| BridgeError::UnknownPlugin(item.authority.clone()))?;
        self.client.refresh(descriptor.plugin_type, item).await
    }

    async fn min_refresh_interval(&self, authority: &str) -> Duration {
        self.client.config(authority).await.min_refresh_interval
    }
}
