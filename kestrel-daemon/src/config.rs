use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WeightFactor {
    Low,
    #[default]
    Medium,
    High,
}

impl WeightFactor {
    pub fn alpha(self) -> f64 {
        match self {
            WeightFactor::Low => 0.01,
            WeightFactor::Medium => 0.03,
            WeightFactor::High => 0.1,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct GeneralConfig {
    /// Hard upper bound for one source's contribution to a query.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default)]
    pub debounce_ms: u64,
    #[serde(default)]
    pub weight_factor: WeightFactor,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub native_source_dir: Option<PathBuf>,
}

fn default_query_timeout_ms() -> u64 {
    3000
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            debounce_ms: 0,
            weight_factor: WeightFactor::default(),
            data_dir: None,
            native_source_dir: None,
        }
    }
}

impl GeneralConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub start_delay_ms: u64,
}

fn default_true() -> bool {
    true
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delay_ms: 0,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PluginsConfig {
    /// How long restoring a StoreReference favorite may wait on its plugin.
    #[serde(default = "default_resolve_timeout_ms")]
    pub resolve_timeout_ms: u64,
}

fn default_resolve_timeout_ms() -> u64 {
    500
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            resolve_timeout_ms: default_resolve_timeout_ms(),
        }
    }
}

impl PluginsConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl Config {
    pub fn source(&self, name: &str) -> SourceConfig {
        self.sources.get(name).cloned().unwrap_or_default()
    }

    /// Directory holding favorites and the plugin registry.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.general.data_dir {
            return dir.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn native_source_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.general.native_source_dir {
            return Some(dir.clone());
        }
        if cfg!(debug_assertions) {
            Some(PathBuf::from("./target/debug/"))
        } else {
            project_dirs().map(|dirs| dirs.data_local_dir().join("sources"))
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "kestrel", "kestrel")
}

pub fn load_config() -> Result<Config, ConfigError> {
    let config_path = match project_dirs() {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    };
    load_config_from(&config_path)
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.general.query_timeout_ms, 3000);
        assert_eq!(config.general.weight_factor, WeightFactor::Medium);
        assert!(config.source("apps").enabled);
    }

    #[test]
    fn sources_and_weight_factor_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[general]
weight_factor = "high"
debounce_ms = 80

[sources.calendar]
enabled = false

[sources.wikipedia]
start_delay_ms = 750
"#,
        )
        .unwrap();
        let config = load_config_from(&path).unwrap();
        assert_eq!(config.general.weight_factor.alpha(), 0.1);
        assert_eq!(config.general.debounce(), Duration::from_millis(80));
        assert!(!config.source("calendar").enabled);
        assert_eq!(config.source("wikipedia").start_delay_ms, 750);
        assert!(config.source("wikipedia").enabled);
    }

    #[test]
    fn broken_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[general\n").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Parse { .. })));
    }
}
