//! User-assigned labels that replace the label of an item wherever it is
//! shown and sorted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::persist::{JsonFile, StoreFile};

/// One entry of `labels.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomLabel {
    pub key: String,
    pub label: String,
}

/// Label by item key.
pub type LabelMap = Arc<HashMap<String, String>>;

pub struct CustomLabels {
    file: StoreFile,
    writes: tokio::sync::Mutex<()>,
    labels: watch::Sender<LabelMap>,
}

impl CustomLabels {
    pub fn open(file: JsonFile) -> Self {
        let (file, records) = StoreFile::open(file);
        Self::with(file, records)
    }

    pub fn in_memory() -> Self {
        Self::with(StoreFile::in_memory(), Vec::new())
    }

    fn with(file: StoreFile, records: Vec<CustomLabel>) -> Self {
        let (labels, _) = watch::channel(to_map(records));
        Self {
            file,
            writes: tokio::sync::Mutex::new(()),
            labels,
        }
    }

    pub fn snapshot(&self) -> LabelMap {
        self.labels.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LabelMap> {
        self.labels.subscribe()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.labels.borrow().get(key).cloned()
    }

    async fn update<F>(&self, change: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut HashMap<String, String>),
    {
        let _guard = self.writes.lock().await;
        if let Some(recovered) = self.file.recover()? {
            self.labels.send_replace(to_map(recovered));
        }
        let current = self.snapshot();
        let mut labels = current.as_ref().clone();
        change(&mut labels);
        if labels == *current {
            return Ok(false);
        }
        self.file.save(to_records(&labels)).await?;
        self.labels.send_replace(Arc::new(labels));
        Ok(true)
    }

    /// A blank label clears the entry.
    pub async fn set(&self, key: &str, label: &str) -> Result<(), StoreError> {
        let label = label.trim();
        if label.is_empty() {
            return self.clear(key).await;
        }
        self.update(|labels| {
            labels.insert(key.to_string(), label.to_string());
        })
        .await?;
        Ok(())
    }

    pub async fn clear(&self, key: &str) -> Result<(), StoreError> {
        self.update(|labels| {
            labels.remove(key);
        })
        .await?;
        Ok(())
    }

    pub fn export_records(&self) -> Vec<CustomLabel> {
        to_records(&self.snapshot())
    }

    /// Replaces every label with `records`.
    pub async fn import_records(&self, records: Vec<CustomLabel>) -> Result<(), StoreError> {
        self.update(|labels| *labels = records.into_iter().map(|r| (r.key, r.label)).collect())
            .await?;
        Ok(())
    }
}

fn to_map(records: Vec<CustomLabel>) -> LabelMap {
    Arc::new(records.into_iter().map(|r| (r.key, r.label)).collect())
}

fn to_records(labels: &HashMap<String, String>) -> Vec<CustomLabel> {
    let mut records: Vec<_> = labels
        .iter()
        .map(|(key, label)| CustomLabel {
            key: key.clone(),
            label: label.clone(),
        })
        .collect();
    records.sort_by(|a, b| a.key.cmp(&b.key));
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blank_labels_clear_the_entry() {
        let labels = CustomLabels::in_memory();
        labels.set("tag://a", "  Mine ").await.unwrap();
        assert_eq!(labels.get("tag://a").as_deref(), Some("Mine"));

        labels.set("tag://a", "   ").await.unwrap();
        assert!(labels.get("tag://a").is_none());
    }

    #[tokio::test]
    async fn changes_are_published() {
        let labels = CustomLabels::in_memory();
        let mut changes = labels.subscribe();
        labels.set("tag://a", "Mine").await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(changes.borrow_and_update().get("tag://a").map(String::as_str), Some("Mine"));

        // clearing an absent key is not a change
        labels.clear("tag://b").await.unwrap();
        assert!(!changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn labels_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        {
            let labels = CustomLabels::open(JsonFile::new(&path));
            labels.set("app://b", "Second").await.unwrap();
            labels.set("app://a", "First").await.unwrap();
        }
        let labels = CustomLabels::open(JsonFile::new(&path));
        assert_eq!(
            labels.export_records(),
            vec![
                CustomLabel { key: "app://a".to_string(), label: "First".to_string() },
                CustomLabel { key: "app://b".to_string(), label: "Second".to_string() },
            ]
        );
    }
}
