use kestrel_plugin::contract::{
    Path, PluginConfig, PluginRequest, PluginResponse, PluginState, PluginType, columns,
};
use kestrel_plugin::provider::Refreshed;
use kestrel_plugin::{PluginEntity, PluginItem, Searchable};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::registry::PluginDescriptor;
use super::transport::PluginTransport;
use crate::error::BridgeError;
use crate::favorites::now_millis;

/// Host side of the plugin contract: typed calls over a [`PluginTransport`].
pub struct PluginClient {
    transport: Arc<dyn PluginTransport>,
    timeout: Duration,
    configs: Mutex<HashMap<String, PluginConfig>>,
}

impl PluginClient {
    pub fn new(transport: Arc<dyn PluginTransport>, timeout: Duration) -> Self {
        Self {
            transport,
            timeout,
            configs: Mutex::new(HashMap::new()),
        }
    }

    async fn call(&self, authority: &str, request: PluginRequest) -> Result<PluginResponse, BridgeError> {
        match tokio::time::timeout(self.timeout, self.transport.call(authority, request)).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout {
                authority: authority.to_string(),
                timeout_ms: self.timeout.as_millis(),
            }),
        }
    }

    /// The plugin's announced configuration, fetched once per authority. A
    /// plugin that cannot be asked is assumed to use the defaults.
    pub async fn config(&self, authority: &str) -> PluginConfig {
        if let Some(config) = self.cached_config(authority) {
            return config;
        }
        match self.call(authority, PluginRequest::new(Path::Config)).await {
            Ok(response) => {
                let config = PluginConfig::from_params(&response.params);
                if let Ok(mut configs) = self.configs.lock() {
                    configs.insert(authority.to_string(), config.clone());
                }
                config
            }
            Err(e) => {
                log::debug!("Using default config for {authority}: {e}");
                PluginConfig::default()
            }
        }
    }

    fn cached_config(&self, authority: &str) -> Option<PluginConfig> {
        self.configs.lock().ok()?.get(authority).cloned()
    }

    /// Drops the cached configuration, e.g. after the plugin was updated.
    pub fn forget(&self, authority: &str) {
        if let Ok(mut configs) = self.configs.lock() {
            configs.remove(authority);
        }
    }

    pub async fn state(&self, authority: &str) -> Result<PluginState, BridgeError> {
        let response = self
            .call(authority, PluginRequest::new(Path::State))
            .await?;
        PluginState::from_params(&response.params).map_err(|source| BridgeError::Contract {
            authority: authority.to_string(),
            source,
        })
    }

    pub async fn search(
        &self,
        descriptor: &PluginDescriptor,
        query: &str,
        allow_network: bool,
    ) -> Result<Vec<Searchable>, BridgeError> {
        let config = self.config(&descriptor.authority).await;
        let response = self
            .call(&descriptor.authority, PluginRequest::search(query, allow_network))
            .await?;
        Ok(decode_rows(descriptor, &config, &response))
    }

    /// Looks up a previously issued id without network access.
    pub async fn get(&self, descriptor: &PluginDescriptor, id: &str) -> Result<Option<Searchable>, BridgeError> {
        let config = self.config(&descriptor.authority).await;
        let response = self.call(&descriptor.authority, PluginRequest::get(id)).await?;
        Ok(decode_rows(descriptor, &config, &response).into_iter().next())
    }

    pub async fn refresh(&self, plugin_type: PluginType, item: &PluginItem) -> Result<Refreshed, BridgeError> {
        let request = PluginRequest::refresh(columns::encode_entity(&item.entity), item.updated_at);
        let response = self.call(&item.authority, request).await?;
        if response.is_not_updated() {
            return Ok(Refreshed::NotUpdated);
        }
        let Some(row) = response.rows.first() else {
            return Ok(Refreshed::Gone);
        };
        columns::decode_entity(plugin_type, row)
            .map(Refreshed::Updated)
            .map_err(|source| BridgeError::Contract {
                authority: item.authority.clone(),
                source,
            })
    }
}

/// Rows that violate the column schema are dropped, the rest are kept.
fn decode_rows(descriptor: &PluginDescriptor, config: &PluginConfig, response: &PluginResponse) -> Vec<Searchable> {
    let updated_at = now_millis();
    response
        .rows
        .iter()
        .filter_map(|row| match columns::decode_entity(descriptor.plugin_type, row) {
            Ok(entity) => Some(into_searchable(descriptor, config, entity, updated_at)),
            Err(e) => {
                log::warn!("Dropping row from {}: {e}", descriptor.authority);
                None
            }
        })
        .collect()
}

fn into_searchable(
    descriptor: &PluginDescriptor,
    config: &PluginConfig,
    entity: PluginEntity,
    updated_at: i64,
) -> Searchable {
    Searchable::from_plugin(PluginItem {
        authority: descriptor.authority.clone(),
        strategy: config.storage_strategy,
        updated_at,
        entity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LocalTransport;
    use async_trait::async_trait;
    use kestrel_plugin::contract::{Row, StorageStrategy};
    use kestrel_plugin::provider::PluginProvider;
    use kestrel_plugin::{File, SourceError};
    use serde_json::json;

    struct Raw(Vec<Row>);

    #[async_trait]
    impl PluginTransport for Raw {
        async fn call(&self, _authority: &str, request: PluginRequest) -> Result<PluginResponse, BridgeError> {
            Ok(match request.path {
                Path::Search => PluginResponse::rows(self.0.clone()),
                _ => PluginResponse::default(),
            })
        }
    }

    struct Stuck;

    #[async_trait]
    impl PluginTransport for Stuck {
        async fn call(&self, _authority: &str, _request: PluginRequest) -> Result<PluginResponse, BridgeError> {
            std::future::pending().await
        }
    }

    struct Files;

    #[async_trait]
    impl PluginProvider for Files {
        fn plugin_type(&self) -> PluginType {
            PluginType::FileSearch
        }

        fn config(&self) -> PluginConfig {
            PluginConfig {
                storage_strategy: StorageStrategy::StoreReference,
                ..Default::default()
            }
        }

        async fn search(&self, query: &str, _allow_network: bool) -> Result<Vec<PluginEntity>, SourceError> {
            Ok(vec![file("1", query)])
        }

        async fn get(&self, id: &str) -> Result<Option<PluginEntity>, SourceError> {
            Ok((id == "1").then(|| file("1", "report.pdf")))
        }
    }

    fn file(id: &str, name: &str) -> PluginEntity {
        PluginEntity::File(File {
            id: id.to_string(),
            display_name: name.to_string(),
            content_uri: format!("content://files/{id}"),
            ..Default::default()
        })
    }

    fn descriptor(authority: &str) -> PluginDescriptor {
        PluginDescriptor::new(authority, PluginType::FileSearch, "org.example.files", "Files")
    }

    fn row(value: serde_json::Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn malformed_rows_are_dropped_individually() {
        let transport = Raw(vec![
            row(json!({"id": "1", "display_name": "a.txt", "content_uri": "content://1"})),
            row(json!({"id": "2", "content_uri": "content://2"})),
            row(json!({"id": "3", "display_name": "c.txt", "content_uri": "content://3", "size": "12"})),
        ]);
        let client = PluginClient::new(Arc::new(transport), Duration::from_secs(1));
        let results = client.search(&descriptor("files"), "a", false).await.unwrap();
        let keys: Vec<_> = results.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["plugin://files/1", "plugin://files/3"]);
    }

    #[tokio::test]
    async fn results_carry_the_announced_strategy() {
        let transport = LocalTransport::new();
        transport.add("files", Arc::new(Files));
        let client = PluginClient::new(Arc::new(transport), Duration::from_secs(1));

        let results = client.search(&descriptor("files"), "notes.md", false).await.unwrap();
        match &results[0].kind {
            kestrel_plugin::Kind::Plugin(item) => {
                assert_eq!(item.strategy, StorageStrategy::StoreReference)
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(results[0].label, "notes.md");

        let found = client.get(&descriptor("files"), "1").await.unwrap();
        assert_eq!(found.map(|s| s.label), Some("report.pdf".to_string()));
        assert!(client.get(&descriptor("files"), "2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unresponsive_plugins_time_out() {
        let client = PluginClient::new(Arc::new(Stuck), Duration::from_millis(20));
        let err = client.search(&descriptor("slow"), "x", false).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout { .. }));
        assert!(err.is_transient());
    }
}
