//! The daemon's D-Bus interface.

use kestrel_plugin::{Kind, Query, Searchable};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use zbus::fdo;
use zbus::{interface, zvariant::Type};

use crate::backup::{self, Stores};
use crate::bridge::{PluginClient, PluginRegistry};
use crate::coordinator::QueryCoordinator;
use crate::error::StoreError;
use crate::favorites::FavoritesStore;
use crate::labels::CustomLabels;
use crate::registry::SourceRegistry;

pub const BUS_NAME: &str = "org.kestrel.Engine";
pub const OBJECT_PATH: &str = "/org/kestrel/Engine1";

#[derive(Debug, Clone, PartialEq, Type, Serialize, Deserialize)]
pub struct DbusResult {
    key: String,
    label: String,
    domain: String,
    description: String,
    pinned: bool,
    prefer_details: bool,
}

impl DbusResult {
    fn new(item: &Searchable, favorites: &FavoritesStore, labels: &CustomLabels) -> Self {
        Self {
            key: item.key.clone(),
            label: labels
                .get(&item.key)
                .unwrap_or_else(|| item.effective_label().to_string()),
            domain: item.domain().to_string(),
            description: describe(&item.kind),
            pinned: favorites.is_pinned(&item.key),
            prefer_details: item.prefer_details_over_launch,
        }
    }
}

fn describe(kind: &Kind) -> String {
    match kind {
        Kind::App(app) => app.comment.clone().or_else(|| app.exec.clone()).unwrap_or_default(),
        Kind::Contact(contact) => contact.phone_numbers.first().cloned().unwrap_or_default(),
        Kind::File(file) => file.path.clone().unwrap_or_else(|| file.mime_type.clone()),
        Kind::Location(location) => location.address.clone().unwrap_or_default(),
        Kind::Website(site) => site.url.clone(),
        Kind::Wikipedia(article) => article.summary.clone().unwrap_or_default(),
        Kind::Calculator(calc) => format!("{} = {}", calc.expression, calc.value),
        Kind::UnitConverter(conversion) => conversion.outputs.join(", "),
        Kind::Plugin(item) => item.authority.clone(),
        Kind::Placeholder(placeholder) => placeholder.reason.clone(),
        Kind::Calendar(_) | Kind::Setting(_) | Kind::Tag(_) => String::new(),
    }
}

fn failed(e: StoreError) -> fdo::Error {
    log::error!("Store update failed: {e}");
    fdo::Error::Failed(e.to_string())
}

pub struct Engine {
    pub coordinator: Arc<QueryCoordinator>,
    pub favorites: Arc<FavoritesStore>,
    pub sources: Arc<SourceRegistry>,
    pub plugins: Arc<PluginRegistry>,
    pub labels: Arc<CustomLabels>,
    pub client: Arc<PluginClient>,
}

impl Engine {
    /// The item behind `key`, from the current results or the stored copy.
    fn item(&self, key: &str) -> fdo::Result<Searchable> {
        self.coordinator
            .find(key)
            .or_else(|| self.favorites.stored_item(key))
            .ok_or_else(|| fdo::Error::InvalidArgs(format!("unknown key {key}")))
    }

    /// Like [`Self::item`], but a key that only has a stored record whose
    /// payload no longer decodes still resolves, to a placeholder.
    fn favorite_item(&self, key: &str) -> fdo::Result<Searchable> {
        self.item(key).or_else(|e| match self.favorites.get(key) {
            Some(_) => Ok(Searchable::placeholder(key, key, "stored copy unreadable")),
            None => Err(e),
        })
    }

    fn result(&self, item: &Searchable) -> DbusResult {
        DbusResult::new(item, &self.favorites, &self.labels)
    }

    fn results(&self, items: &[Searchable]) -> Vec<DbusResult> {
        items.iter().map(|i| self.result(i)).collect()
    }

    fn stores(&self) -> Stores<'_> {
        Stores {
            favorites: &self.favorites,
            plugins: &self.plugins,
            labels: &self.labels,
        }
    }
}

#[interface(name = "org.kestrel.Engine1")]
impl Engine {
    async fn search(&self, text: &str, allow_network: bool) -> Vec<DbusResult> {
        let list = self.coordinator.search(Query::new(text, allow_network)).await;
        self.results(&list.items)
    }

    async fn favorites(&self) -> Vec<DbusResult> {
        self.results(&self.favorites.pinned().await)
    }

    /// Opening the details of a stored plugin copy refreshes it in the
    /// background.
    async fn details(&self, key: &str) -> fdo::Result<DbusResult> {
        let item = self.item(key)?;
        if matches!(item.kind, Kind::Plugin(_)) {
            let favorites = self.favorites.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                if let Err(e) = favorites.refresh_copy(&key).await {
                    log::warn!("Could not store refreshed copy of {key}: {e}");
                }
            });
        }
        Ok(self.result(&item))
    }

    async fn pin(&self, key: &str) -> fdo::Result<()> {
        let item = self.item(key)?;
        self.favorites.pin(&item).await.map_err(failed)
    }

    async fn unpin(&self, key: &str) -> fdo::Result<()> {
        self.favorites.unpin(key).await.map_err(failed)
    }

    async fn hide(&self, key: &str) -> fdo::Result<()> {
        let item = self.item(key)?;
        self.favorites.hide(&item).await.map_err(failed)
    }

    async fn unhide(&self, key: &str) -> fdo::Result<()> {
        self.favorites.unhide(key).await.map_err(failed)
    }

    /// Records a successful launch.
    async fn touch(&self, key: &str) -> fdo::Result<()> {
        let item = self.item(key)?;
        self.favorites.touch(&item).await.map_err(failed)
    }

    async fn reset(&self, key: &str) -> fdo::Result<()> {
        self.favorites.reset(key).await.map_err(failed)
    }

    async fn delete(&self, key: &str) -> fdo::Result<()> {
        self.favorites.delete(key).await.map_err(failed)
    }

    /// Keys without a record are resolved from the current results.
    async fn reorder(&self, manual: Vec<String>, automatic: Vec<String>) -> fdo::Result<()> {
        let resolve = |keys: &[String]| {
            keys.iter()
                .map(|key| self.favorite_item(key))
                .collect::<fdo::Result<Vec<_>>>()
        };
        let manual = resolve(&manual)?;
        let automatic = resolve(&automatic)?;
        self.favorites
            .reorder_favorites(&manual, &automatic)
            .await
            .map_err(failed)
    }

    /// A blank label clears it.
    async fn set_label(&self, key: &str, label: &str) -> fdo::Result<()> {
        self.labels.set(key, label).await.map_err(failed)
    }

    async fn clear_label(&self, key: &str) -> fdo::Result<()> {
        self.labels.clear(key).await.map_err(failed)
    }

    async fn labels(&self) -> Vec<(String, String)> {
        self.labels
            .export_records()
            .into_iter()
            .map(|l| (l.key, l.label))
            .collect()
    }

    async fn hidden(&self) -> Vec<String> {
        self.favorites.hidden()
    }

    async fn cleanup(&self) -> fdo::Result<u32> {
        let removed = self.favorites.cleanup().await.map_err(failed)?;
        Ok(removed as u32)
    }

    async fn sources(&self) -> Vec<(String, bool)> {
        self.sources.names()
    }

    /// Applies to the next query. Plugins are toggled in the plugin registry.
    async fn set_source_enabled(&self, name: &str, enabled: bool) -> fdo::Result<bool> {
        let found = if self.plugins.contains(name) {
            self.plugins.set_enabled(name, enabled).await.map_err(failed)?
        } else {
            self.sources.set_enabled(name, enabled)
        };
        self.coordinator.invalidate();
        Ok(found)
    }

    async fn plugins(&self) -> Vec<(String, String, bool)> {
        self.plugins
            .snapshot()
            .iter()
            .map(|p| (p.authority.clone(), p.label.clone(), p.enabled))
            .collect()
    }

    async fn plugin_state(&self, authority: &str) -> fdo::Result<String> {
        let state = self
            .client
            .state(authority)
            .await
            .map_err(|e| fdo::Error::Failed(e.to_string()))?;
        serde_json::to_string(&state.to_params()).map_err(|e| fdo::Error::Failed(e.to_string()))
    }

    async fn export(&self, dir: &str) -> fdo::Result<(u32, u32, u32)> {
        let summary = backup::export(Path::new(dir), self.stores()).map_err(failed)?;
        Ok((
            summary.favorites as u32,
            summary.plugins as u32,
            summary.labels as u32,
        ))
    }

    async fn import(&self, dir: &str) -> fdo::Result<(u32, u32, u32, u32)> {
        let summary = backup::import(Path::new(dir), self.stores())
            .await
            .map_err(failed)?;
        self.coordinator.invalidate();
        Ok((
            summary.favorites as u32,
            summary.plugins as u32,
            summary.labels as u32,
            summary.skipped as u32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_plugin::{App, Calculation};

    #[test]
    fn descriptions_prefer_the_most_useful_field() {
        let app = Kind::App(App {
            desktop_file_id: "gimp.desktop".to_string(),
            exec: Some("gimp %U".to_string()),
            comment: None,
            icon: None,
        });
        assert_eq!(describe(&app), "gimp %U");

        let calc = Kind::Calculator(Calculation {
            expression: "2*3".to_string(),
            value: 6.0,
        });
        assert_eq!(describe(&calc), "2*3 = 6");
    }
}
