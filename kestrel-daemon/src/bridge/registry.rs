use kestrel_plugin::contract::PluginType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

use crate::error::StoreError;
use crate::persist::{JsonFile, StoreFile};

/// An installed plugin, keyed by authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    pub authority: String,
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    pub enabled: bool,
    #[serde(rename = "packageIdentity")]
    pub package: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PluginDescriptor {
    /// A newly discovered plugin starts disabled.
    pub fn new(
        authority: impl Into<String>,
        plugin_type: PluginType,
        package: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            authority: authority.into(),
            plugin_type,
            enabled: false,
            package: package.into(),
            label: label.into(),
            description: None,
        }
    }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }
}

pub type PluginsSnapshot = Arc<Vec<PluginDescriptor>>;

/// Installed plugins, persisted to `plugins.json` when backed by a file.
pub struct PluginRegistry {
    file: StoreFile,
    writes: tokio::sync::Mutex<()>,
    plugins: watch::Sender<PluginsSnapshot>,
}

impl PluginRegistry {
    pub fn open(file: JsonFile) -> Self {
        let (file, plugins) = StoreFile::open(file);
        Self::with(file, plugins)
    }

    pub fn in_memory() -> Self {
        Self::with(StoreFile::in_memory(), Vec::new())
    }

    fn with(file: StoreFile, plugins: Vec<PluginDescriptor>) -> Self {
        let (plugins, _) = watch::channel(Arc::new(plugins));
        Self {
            file,
            writes: tokio::sync::Mutex::new(()),
            plugins,
        }
    }

    pub fn snapshot(&self) -> PluginsSnapshot {
        self.plugins.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PluginsSnapshot> {
        self.plugins.subscribe()
    }

    pub fn get(&self, authority: &str) -> Option<PluginDescriptor> {
        self.snapshot().iter().find(|p| p.authority == authority).cloned()
    }

    pub fn contains(&self, authority: &str) -> bool {
        self.snapshot().iter().any(|p| p.authority == authority)
    }

    pub fn enabled(&self) -> Vec<PluginDescriptor> {
        self.snapshot().iter().filter(|p| p.enabled).cloned().collect()
    }

    async fn update<F>(&self, change: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Vec<PluginDescriptor>),
    {
        let _guard = self.writes.lock().await;
        if let Some(recovered) = self.file.recover()? {
            self.plugins.send_replace(Arc::new(recovered));
        }
        let current = self.snapshot();
        let mut plugins = current.as_ref().clone();
        change(&mut plugins);
        if plugins == *current {
            return Ok(false);
        }
        self.file.save(plugins.clone()).await?;
        self.plugins.send_replace(Arc::new(plugins));
        Ok(true)
    }

    /// Adds a plugin or updates its metadata. An existing plugin keeps its
    /// enabled flag.
    pub async fn install(&self, descriptor: PluginDescriptor) -> Result<(), StoreError> {
        self.update(|plugins| match plugins.iter_mut().find(|p| p.authority == descriptor.authority) {
            Some(existing) => {
                let enabled = existing.enabled;
                *existing = descriptor;
                existing.enabled = enabled;
            }
            None => plugins.push(descriptor),
        })
        .await?;
        Ok(())
    }

    /// Returns false if the authority is unknown.
    pub async fn set_enabled(&self, authority: &str, enabled: bool) -> Result<bool, StoreError> {
        if !self.contains(authority) {
            return Ok(false);
        }
        self.update(|plugins| {
            for plugin in plugins.iter_mut().filter(|p| p.authority == authority) {
                plugin.enabled = enabled;
            }
        })
        .await?;
        Ok(true)
    }

    /// Enables or disables every plugin of a package.
    pub async fn set_package_enabled(&self, package: &str, enabled: bool) -> Result<(), StoreError> {
        self.update(|plugins| {
            for plugin in plugins.iter_mut().filter(|p| p.package == package) {
                plugin.enabled = enabled;
            }
        })
        .await?;
        Ok(())
    }

    pub async fn remove(&self, authority: &str) -> Result<bool, StoreError> {
        self.update(|plugins| plugins.retain(|p| p.authority != authority))
            .await
    }

    /// Removes every plugin of an uninstalled package.
    pub async fn remove_package(&self, package: &str) -> Result<bool, StoreError> {
        self.update(|plugins| plugins.retain(|p| p.package != package))
            .await
    }

    pub fn export_records(&self) -> Vec<PluginDescriptor> {
        self.snapshot().as_ref().clone()
    }

    /// Replaces every descriptor with `plugins`.
    pub async fn import_records(&self, plugins: Vec<PluginDescriptor>) -> Result<(), StoreError> {
        self.update(|current| *current = plugins).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> PluginDescriptor {
        PluginDescriptor::new("org.example.files", PluginType::FileSearch, "org.example", "Files")
    }

    fn contacts() -> PluginDescriptor {
        PluginDescriptor::new("org.example.contacts", PluginType::ContactSearch, "org.example", "Contacts")
    }

    #[tokio::test]
    async fn reinstalling_keeps_the_enabled_flag() {
        let registry = PluginRegistry::in_memory();
        registry.install(files()).await.unwrap();
        registry.set_enabled("org.example.files", true).await.unwrap();

        let mut updated = files();
        updated.label = "Cloud files".to_string();
        registry.install(updated).await.unwrap();

        let stored = registry.get("org.example.files").unwrap();
        assert!(stored.enabled);
        assert_eq!(stored.label, "Cloud files");
    }

    #[tokio::test]
    async fn package_operations_touch_every_plugin_of_the_package() {
        let registry = PluginRegistry::in_memory();
        registry.install(files()).await.unwrap();
        registry.install(contacts()).await.unwrap();

        registry.set_package_enabled("org.example", true).await.unwrap();
        assert_eq!(registry.enabled().len(), 2);

        assert!(registry.remove_package("org.example").await.unwrap());
        assert!(registry.snapshot().is_empty());
    }

    #[tokio::test]
    async fn unknown_authorities_are_reported() {
        let registry = PluginRegistry::in_memory();
        assert!(!registry.set_enabled("nope", true).await.unwrap());
        assert!(!registry.remove("nope").await.unwrap());
    }

    #[tokio::test]
    async fn descriptors_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.json");
        {
            let registry = PluginRegistry::open(JsonFile::new(&path));
            registry.install(files().enabled()).await.unwrap();
        }
        let registry = PluginRegistry::open(JsonFile::new(&path));
        assert_eq!(registry.snapshot().as_ref(), &vec![files().enabled()]);

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json[0]["type"], "FileSearch");
        assert_eq!(json[0]["packageIdentity"], "org.example");
    }

    #[tokio::test]
    async fn a_corrupt_descriptor_does_not_take_the_others_with_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.json");
        {
            let registry = PluginRegistry::open(JsonFile::new(&path));
            registry.install(files().enabled()).await.unwrap();
        }
        let mut json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        json.as_array_mut()
            .unwrap()
            .push(serde_json::json!({ "authority": "broken", "type": "Hologram" }));
        std::fs::write(&path, json.to_string()).unwrap();

        let registry = PluginRegistry::open(JsonFile::new(&path));
        registry.install(contacts()).await.unwrap();

        let reopened = PluginRegistry::open(JsonFile::new(&path));
        assert!(reopened.get("org.example.files").unwrap().enabled);
        assert!(reopened.contains("org.example.contacts"));
        assert!(dir.path().join("plugins.json.rejected").exists());
    }
}
