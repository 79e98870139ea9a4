//! Source registry: the sources known to the daemon and whether they take
//! part in queries.

use futures::stream::{BoxStream, StreamExt};
use kestrel_plugin::{Batch, Query, Source};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::config::SourceConfig;

#[derive(Clone)]
pub struct RegisteredSource {
    pub source: Arc<dyn Source>,
    pub enabled: bool,
    pub start_delay: Duration,
}

impl RegisteredSource {
    pub fn name(&self) -> &str {
        self.source.name()
    }
}

/// A source's stream for one query, with failures already turned into empty
/// batches.
pub struct ActiveSource {
    pub name: String,
    pub start_delay: Duration,
    pub stream: BoxStream<'static, Batch>,
}

/// Entries in registration order.
pub type RegistrySnapshot = Arc<Vec<RegisteredSource>>;

pub struct SourceRegistry {
    entries: watch::Sender<RegistrySnapshot>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(Arc::new(Vec::new()));
        Self { entries }
    }

    /// Adds `source`, replacing a source registered under the same name.
    pub fn register(&self, source: Arc<dyn Source>, config: &SourceConfig) {
        let entry = RegisteredSource {
            source,
            enabled: config.enabled,
            start_delay: Duration::from_millis(config.start_delay_ms),
        };
        log::info!("Registered source {} (enabled: {})", entry.name(), entry.enabled);
        self.entries.send_modify(|entries| {
            let entries = Arc::make_mut(entries);
            match entries.iter_mut().find(|e| e.name() == entry.name()) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        });
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.entries.send_if_modified(|entries| {
            let before = entries.len();
            Arc::make_mut(entries).retain(|e| e.name() != name);
            entries.len() != before
        })
    }

    /// Returns false if no source has that name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut found = false;
        self.entries.send_if_modified(|entries| {
            let Some(index) = entries.iter().position(|e| e.name() == name) else {
                return false;
            };
            found = true;
            if entries[index].enabled == enabled {
                return false;
            }
            Arc::make_mut(entries)[index].enabled = enabled;
            true
        });
        found
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.entries.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.entries.subscribe()
    }

    pub fn names(&self) -> Vec<(String, bool)> {
        self.snapshot()
            .iter()
            .map(|e| (e.name().to_string(), e.enabled))
            .collect()
    }

    pub fn active_sources(&self, query: &Query) -> Vec<ActiveSource> {
        active_sources(&self.snapshot(), query)
    }
}

/// Streams of every enabled source whose category the query's filters allow.
/// Disabled sources are never invoked.
pub fn active_sources(snapshot: &[RegisteredSource], query: &Query) -> Vec<ActiveSource> {
    snapshot
        .iter()
        .filter(|e| e.enabled && query.filters.allows(e.source.category()))
        .map(|e| ActiveSource {
            name: e.name().to_string(),
            start_delay: e.start_delay,
            stream: guarded(e.name().to_string(), e.source.search(query)),
        })
        .collect()
}

/// Turns errors into an empty batch plus a diagnostic. A panicking source
/// contributes an empty batch and ends.
fn guarded(name: String, stream: kestrel_plugin::ResultStream) -> BoxStream<'static, Batch> {
    AssertUnwindSafe(stream)
        .catch_unwind()
        .map(move |result| match result {
            Ok(Ok(batch)) => batch,
            Ok(Err(e)) => {
                log::warn!("Source {name} failed: {e}");
                Vec::new()
            }
            Err(_) => {
                log::error!("Source {name} panicked");
                Vec::new()
            }
        })
        .boxed()
}
