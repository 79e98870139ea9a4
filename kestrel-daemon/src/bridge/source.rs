use futures::stream::{self, StreamExt};
use kestrel_plugin::{Category, Query, ResultStream, Source, SourceError};
use std::sync::Arc;

use super::client::PluginClient;
use super::registry::PluginDescriptor;

/// Exposes a query plugin as a [`Source`].
pub struct PluginSource {
    descriptor: PluginDescriptor,
    client: Arc<PluginClient>,
}

impl PluginSource {
    pub fn new(descriptor: PluginDescriptor, client: Arc<PluginClient>) -> Self {
        Self { descriptor, client }
    }
}

impl Source for PluginSource {
    fn name(&self) -> &str {
        &self.descriptor.authority
    }

    fn category(&self) -> Category {
        self.descriptor.plugin_type.category()
    }

    fn search(&self, query: &Query) -> ResultStream {
        if !self.descriptor.plugin_type.is_searchable() || query.is_blank() {
            return stream::empty().boxed();
        }
        let descriptor = self.descriptor.clone();
        let client = self.client.clone();
        let query = query.clone();
        stream::once(async move {
            client
                .search(&descriptor, &query.text, query.allow_network)
                .await
                .map_err(|e| SourceError::failed(&descriptor.authority, e))
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LocalTransport;
    use async_trait::async_trait;
    use kestrel_plugin::contract::PluginType;
    use kestrel_plugin::provider::PluginProvider;
    use kestrel_plugin::{Location, PluginEntity};
    use std::time::Duration;

    struct Places;

    #[async_trait]
    impl PluginProvider for Places {
        fn plugin_type(&self) -> PluginType {
            PluginType::LocationSearch
        }

        async fn search(&self, query: &str, allow_network: bool) -> Result<Vec<PluginEntity>, SourceError> {
            if !allow_network {
                return Ok(Vec::new());
            }
            Ok(vec![PluginEntity::Location(Location {
                id: "p1".to_string(),
                label: format!("{query} Café"),
                latitude: 52.5,
                longitude: 13.4,
                ..Default::default()
            })])
        }

        async fn get(&self, _id: &str) -> Result<Option<PluginEntity>, SourceError> {
            Ok(None)
        }
    }

    fn source(plugin_type: PluginType) -> PluginSource {
        let transport = LocalTransport::new();
        transport.add("places", Arc::new(Places));
        let client = Arc::new(PluginClient::new(Arc::new(transport), Duration::from_secs(1)));
        PluginSource::new(PluginDescriptor::new("places", plugin_type, "org.example", "Places"), client)
    }

    #[tokio::test]
    async fn forwards_query_and_network_flag() {
        let source = source(PluginType::LocationSearch);
        assert_eq!(source.category(), Category::Places);

        let batches: Vec<_> = source.search(&Query::new("Berlin", true)).collect().await;
        let batch = batches.into_iter().next().unwrap().unwrap();
        assert_eq!(batch[0].label, "Berlin Café");
        assert!(batch[0].prefer_details_over_launch);

        let offline: Vec<_> = source.search(&Query::new("Berlin", false)).collect().await;
        assert!(offline[0].as_ref().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_searchable_plugins_yield_nothing() {
        let source = source(PluginType::Weather);
        assert_eq!(source.search(&Query::new("Berlin", true)).count().await, 0);
    }
}
