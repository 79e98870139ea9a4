//! Host side of the plugin bridge: out-of-process plugins as sources.

mod client;
mod registry;
mod resolver;
mod source;
mod transport;

pub use client::PluginClient;
pub use registry::{PluginDescriptor, PluginRegistry, PluginsSnapshot};
pub use resolver::{BridgeResolver, PluginResolver};
pub use source::PluginSource;
pub use transport::{DbusTransport, LocalTransport, PluginTransport};

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::registry::SourceRegistry;

/// Mirrors the installed plugins into the source registry: new plugins are
/// registered, removed ones unregistered and the enabled flag follows the
/// descriptor. A `[sources.<authority>]` config section still applies.
pub fn sync_sources(
    plugins: &[PluginDescriptor],
    sources: &SourceRegistry,
    client: &Arc<PluginClient>,
    config: &Config,
    previous: &mut HashSet<String>,
) {
    let current: HashSet<String> = plugins.iter().map(|p| p.authority.clone()).collect();
    for gone in previous.difference(&current) {
        sources.unregister(gone);
        client.forget(gone);
    }
    for descriptor in plugins {
        let mut source_config = config.source(&descriptor.authority);
        source_config.enabled &= descriptor.enabled;
        sources.register(
            Arc::new(PluginSource::new(descriptor.clone(), client.clone())),
            &source_config,
        );
    }
    *previous = current;
}

/// Keeps the source registry in sync with the plugin registry until the
/// plugin registry is dropped.
pub fn spawn_sync(
    plugins: Arc<PluginRegistry>,
    sources: Arc<SourceRegistry>,
    client: Arc<PluginClient>,
    config: Config,
) -> tokio::task::JoinHandle<()> {
    let mut updates = plugins.subscribe();
    drop(plugins);
    tokio::spawn(async move {
        let mut known = HashSet::new();
        loop {
            let snapshot = updates.borrow_and_update().clone();
            sync_sources(&snapshot, &sources, &client, &config, &mut known);
            if updates.changed().await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_plugin::contract::PluginType;
    use std::time::Duration;

    #[test]
    fn registry_changes_are_mirrored() {
        let sources = SourceRegistry::new();
        let client = Arc::new(PluginClient::new(Arc::new(LocalTransport::new()), Duration::from_secs(1)));
        let config = Config::default();
        let mut known = HashSet::new();

        let files = PluginDescriptor::new("files", PluginType::FileSearch, "p", "Files").enabled();
        let contacts = PluginDescriptor::new("contacts", PluginType::ContactSearch, "p", "Contacts");
        sync_sources(&[files.clone(), contacts], &sources, &client, &config, &mut known);
        assert_eq!(
            sources.names(),
            vec![("files".to_string(), true), ("contacts".to_string(), false)]
        );

        sync_sources(&[files], &sources, &client, &config, &mut known);
        assert_eq!(sources.names(), vec![("files".to_string(), true)]);
    }
}
