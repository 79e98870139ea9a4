//! Plugin-side half of the contract. A plugin implements [`PluginProvider`]
//! with typed entities; [`handle`] turns requests into responses in the
//! documented row format.

use async_trait::async_trait;

use crate::contract::{
    PluginConfig, PluginRequest, PluginResponse, PluginState, PluginType, Path, columns, params,
};
use crate::error::SourceError;
use crate::searchable::PluginEntity;

/// Outcome of a refresh request for a stored copy.
#[derive(Debug, Clone, PartialEq)]
pub enum Refreshed {
    Updated(PluginEntity),
    NotUpdated,
    /// The entity no longer exists.
    Gone,
}

#[async_trait]
pub trait PluginProvider: Send + Sync {
    fn plugin_type(&self) -> PluginType;

    fn config(&self) -> PluginConfig {
        PluginConfig::default()
    }

    async fn state(&self) -> PluginState {
        PluginState::ready()
    }

    async fn search(
        &self,
        query: &str,
        allow_network: bool,
    ) -> Result<Vec<PluginEntity>, SourceError>;

    /// Resolve a previously issued id. Must be fast and must not use the network.
    async fn get(&self, id: &str) -> Result<Option<PluginEntity>, SourceError>;

    async fn refresh(&self, _item: PluginEntity, _updated_at: i64) -> Result<Refreshed, SourceError> {
        Ok(Refreshed::NotUpdated)
    }
}

pub async fn handle(
    provider: &dyn PluginProvider,
    request: &PluginRequest,
) -> Result<PluginResponse, SourceError> {
    let response = match request.path {
        Path::Config => PluginResponse::params(provider.config().to_params()),
        Path::State => PluginResponse::params(provider.state().await.to_params()),
        Path::Search => {
            let query = request.require(params::QUERY)?;
            let allow_network = request.flag(params::ALLOW_NETWORK);
            let entities = provider.search(query, allow_network).await?;
            PluginResponse::rows(entities.iter().map(columns::encode_entity).collect())
        }
        Path::Get => {
            let id = request.require(params::ID)?;
            let rows = provider
                .get(id)
                .await?
                .iter()
                .map(columns::encode_entity)
                .collect();
            PluginResponse::rows(rows)
        }
        Path::Refresh => {
            let row = request
                .item
                .as_ref()
                .ok_or(crate::error::ContractError::MissingParam("item"))?;
            let item = columns::decode_entity(provider.plugin_type(), row)?;
            let updated_at = request
                .params
                .get(params::UPDATED_AT)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            match provider.refresh(item, updated_at).await? {
                Refreshed::Updated(entity) => {
                    PluginResponse::rows(vec![columns::encode_entity(&entity)])
                }
                Refreshed::NotUpdated => PluginResponse::not_updated(),
                Refreshed::Gone => PluginResponse::default(),
            }
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searchable::File;

    struct Files;

    fn file(id: &str, name: &str) -> PluginEntity {
        PluginEntity::File(File {
            id: id.to_string(),
            display_name: name.to_string(),
            content_uri: format!("content://files/{id}"),
            ..File::default()
        })
    }

    #[async_trait]
    impl PluginProvider for Files {
        fn plugin_type(&self) -> PluginType {
            PluginType::FileSearch
        }

        async fn search(&self, query: &str, _allow_network: bool) -> Result<Vec<PluginEntity>, SourceError> {
            Ok(vec![file("1", &format!("{query}.txt"))])
        }

        async fn get(&self, id: &str) -> Result<Option<PluginEntity>, SourceError> {
            Ok((id == "1").then(|| file("1", "a.txt")))
        }
    }

    #[tokio::test]
    async fn search_rows_follow_the_file_schema() {
        let response = handle(&Files, &PluginRequest::search("notes", false)).await.unwrap();
        assert_eq!(response.rows.len(), 1);
        let decoded = columns::decode_file(&response.rows[0]).unwrap();
        assert_eq!(decoded.display_name, "notes.txt");
    }

    #[tokio::test]
    async fn unknown_ids_yield_no_rows() {
        let response = handle(&Files, &PluginRequest::get("2")).await.unwrap();
        assert!(response.rows.is_empty());
    }

    #[tokio::test]
    async fn default_refresh_reports_not_updated() {
        let row = columns::encode_entity(&file("1", "a.txt"));
        let response = handle(&Files, &PluginRequest::refresh(row, 10)).await.unwrap();
        assert!(response.is_not_updated());
    }

    #[tokio::test]
    async fn search_without_query_is_a_contract_error() {
        let request = PluginRequest::new(Path::Search);
        assert!(matches!(
            handle(&Files, &request).await,
            Err(SourceError::Contract(_))
        ));
    }
}
