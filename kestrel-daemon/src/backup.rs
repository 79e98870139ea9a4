//! Full export and replace-on-restore import of favorites, plugins and
//! custom labels.
//!
//! A backup is a directory holding `favorites.0000`, `favorites.0001`, ...
//! (JSON arrays of at most [`PAGE_SIZE`] records), `plugins.json` and
//! `labels.json`.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::bridge::{PluginDescriptor, PluginRegistry};
use crate::error::StoreError;
use crate::favorites::{FavoriteRecord, FavoritesStore};
use crate::labels::{CustomLabel, CustomLabels};

pub const PAGE_SIZE: usize = 100;
const FAVORITES_PREFIX: &str = "favorites.";
const PLUGINS_FILE: &str = "plugins.json";
const LABELS_FILE: &str = "labels.json";

/// The stores a backup covers.
#[derive(Clone, Copy)]
pub struct Stores<'a> {
    pub favorites: &'a FavoritesStore,
    pub plugins: &'a PluginRegistry,
    pub labels: &'a CustomLabels,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackupSummary {
    pub favorites: usize,
    pub plugins: usize,
    pub labels: usize,
    /// Records that could not be parsed on import.
    pub skipped: usize,
}

pub fn export(dir: &Path, stores: Stores<'_>) -> Result<BackupSummary, StoreError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| StoreError::Write { path, source }
    };
    fs::create_dir_all(dir).map_err(write_err(dir))?;

    let records = stores.favorites.export_records();
    for (page, chunk) in records.chunks(PAGE_SIZE).enumerate() {
        let path = dir.join(format!("{FAVORITES_PREFIX}{page:04}"));
        write_json(&path, chunk)?;
    }
    let descriptors = stores.plugins.export_records();
    write_json(&dir.join(PLUGINS_FILE), &descriptors)?;
    let labels = stores.labels.export_records();
    write_json(&dir.join(LABELS_FILE), &labels)?;

    log::info!(
        "Exported {} favorites, {} plugins and {} labels to {dir:?}",
        records.len(),
        descriptors.len(),
        labels.len()
    );
    Ok(BackupSummary {
        favorites: records.len(),
        plugins: descriptors.len(),
        labels: labels.len(),
        skipped: 0,
    })
}

/// Replaces all favorites, plugins and labels with the backup's content.
/// Corrupt records and pages are skipped with a warning. A missing
/// `plugins.json` or `labels.json` restores an empty set.
pub async fn import(dir: &Path, stores: Stores<'_>) -> Result<BackupSummary, StoreError> {
    let read_err = |source| StoreError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut pages: Vec<_> = fs::read_dir(dir)
        .map_err(read_err)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(FAVORITES_PREFIX))
        })
        .collect();
    pages.sort();

    let mut summary = BackupSummary::default();
    let mut records: Vec<FavoriteRecord> = Vec::new();
    for page in &pages {
        records.extend(read_records(page, &mut summary.skipped));
    }
    let descriptors: Vec<PluginDescriptor> = read_optional(&dir.join(PLUGINS_FILE), &mut summary.skipped);
    let labels: Vec<CustomLabel> = read_optional(&dir.join(LABELS_FILE), &mut summary.skipped);

    summary.favorites = records.len();
    summary.plugins = descriptors.len();
    summary.labels = labels.len();
    stores.favorites.import_records(records).await?;
    stores.plugins.import_records(descriptors).await?;
    stores.labels.import_records(labels).await?;
    log::info!(
        "Restored {} favorites, {} plugins and {} labels from {dir:?}, skipped {}",
        summary.favorites,
        summary.plugins,
        summary.labels,
        summary.skipped
    );
    Ok(summary)
}

fn write_json<T: Serialize>(path: &Path, records: &[T]) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(records)?;
    fs::write(path, content).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional<T: DeserializeOwned>(path: &Path, skipped: &mut usize) -> Vec<T> {
    if path.exists() {
        read_records(path, skipped)
    } else {
        Vec::new()
    }
}

fn read_records<T: DeserializeOwned>(path: &Path, skipped: &mut usize) -> Vec<T> {
    let values: Vec<serde_json::Value> = match fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()))
    {
        Ok(values) => values,
        Err(e) => {
            log::warn!("Skipping unreadable backup file {path:?}: {e}");
            *skipped += 1;
            return Vec::new();
        }
    };
    values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping corrupt record in {path:?}: {e}");
                *skipped += 1;
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::MemoryBackend;
    use kestrel_plugin::contract::PluginType;
    use kestrel_plugin::{Kind, Searchable, Tag};
    use std::sync::Arc;

    fn tag(name: &str) -> Searchable {
        Searchable::new(Kind::Tag(Tag { tag: name.to_string() }), name, name)
    }

    #[tokio::test]
    async fn favorites_are_paged() {
        let dir = tempfile::tempdir().unwrap();
        let store = FavoritesStore::open(Arc::new(MemoryBackend::default()));
        let records: Vec<_> = (0..250)
            .map(|i| FavoriteRecord::new(format!("tag://{i}"), "tag", "{}".to_string()))
            .collect();
        store.import_records(records).await.unwrap();

        let plugins = PluginRegistry::in_memory();
        let labels = CustomLabels::in_memory();
        let stores = Stores {
            favorites: &store,
            plugins: &plugins,
            labels: &labels,
        };
        let summary = export(dir.path(), stores).unwrap();
        assert_eq!(summary.favorites, 250);
        assert!(dir.path().join("favorites.0002").exists());
        assert!(!dir.path().join("favorites.0003").exists());
        assert!(dir.path().join("plugins.json").exists());
        assert!(dir.path().join("labels.json").exists());
    }

    #[tokio::test]
    async fn import_replaces_and_skips_corrupt_records() {
        let dir = tempfile::tempdir().unwrap();
        let source = FavoritesStore::open(Arc::new(MemoryBackend::default()));
        source.pin(&tag("kept")).await.unwrap();
        let plugins = PluginRegistry::in_memory();
        plugins
            .install(PluginDescriptor::new("files", PluginType::FileSearch, "p", "Files"))
            .await
            .unwrap();
        let labels = CustomLabels::in_memory();
        labels.set("tag://kept", "Keeper").await.unwrap();
        let stores = Stores {
            favorites: &source,
            plugins: &plugins,
            labels: &labels,
        };
        export(dir.path(), stores).unwrap();
        fs::write(dir.path().join("favorites.0001"), r#"[{"key": 5}, {"key":"tag://x","type":"tag","serializedPayload":"{}"}]"#).unwrap();
        fs::write(dir.path().join("favorites.0002"), "garbage").unwrap();

        let target = FavoritesStore::open(Arc::new(MemoryBackend::default()));
        target.pin(&tag("replaced")).await.unwrap();
        let target_plugins = PluginRegistry::in_memory();
        let target_labels = CustomLabels::in_memory();
        target_labels.set("tag://replaced", "Gone").await.unwrap();
        let stores = Stores {
            favorites: &target,
            plugins: &target_plugins,
            labels: &target_labels,
        };
        let summary = import(dir.path(), stores).await.unwrap();

        assert_eq!(
            summary,
            BackupSummary {
                favorites: 2,
                plugins: 1,
                labels: 1,
                skipped: 2
            }
        );
        assert_eq!(target_labels.get("tag://kept").as_deref(), Some("Keeper"));
        assert!(target_labels.get("tag://replaced").is_none());
        assert!(target.is_pinned("tag://kept"));
        assert!(target.get("tag://x").is_some());
        assert!(target.get("tag://replaced").is_none());
        assert!(target_plugins.contains("files"));
    }
}
