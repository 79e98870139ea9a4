#![allow(dead_code)]

use futures::StreamExt;
use futures::stream;
use kestrel_daemon::config::{GeneralConfig, SourceConfig};
use kestrel_daemon::favorites::{FavoritesStore, MemoryBackend};
use kestrel_daemon::labels::CustomLabels;
use kestrel_daemon::{QueryCoordinator, RankedList, SourceRegistry};
use kestrel_plugin::{App, Category, Contact, Kind, Query, ResultStream, Searchable, Source};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Emits a fixed batch after an optional delay, whatever the query.
pub struct StaticSource {
    pub name: &'static str,
    pub category: Category,
    pub items: Vec<Searchable>,
    pub delay: Duration,
}

impl StaticSource {
    pub fn new(name: &'static str, category: Category, items: Vec<Searchable>) -> Self {
        Self {
            name,
            category,
            items,
            delay: Duration::ZERO,
        }
    }
}

impl Source for StaticSource {
    fn name(&self) -> &str {
        self.name
    }

    fn category(&self) -> Category {
        self.category
    }

    fn search(&self, _query: &Query) -> ResultStream {
        let items = self.items.clone();
        let delay = self.delay;
        stream::once(async move {
            tokio::time::sleep(delay).await;
            Ok(items)
        })
        .boxed()
    }
}

pub fn app(id: &str, label: &str) -> Searchable {
    Searchable::new(
        Kind::App(App {
            desktop_file_id: id.to_string(),
            exec: None,
            comment: None,
            icon: None,
        }),
        id,
        label,
    )
}

pub fn contact(id: &str, name: &str) -> Searchable {
    Searchable::new(
        Kind::Contact(Contact {
            id: id.to_string(),
            name: name.to_string(),
            ..Default::default()
        }),
        id,
        name,
    )
}

pub fn memory_store() -> Arc<FavoritesStore> {
    Arc::new(FavoritesStore::open(Arc::new(MemoryBackend::default())))
}

pub fn coordinator(sources: Vec<Arc<dyn Source>>, favorites: Arc<FavoritesStore>) -> QueryCoordinator {
    coordinator_with_labels(sources, favorites, Arc::new(CustomLabels::in_memory()))
}

pub fn coordinator_with_labels(
    sources: Vec<Arc<dyn Source>>,
    favorites: Arc<FavoritesStore>,
    labels: Arc<CustomLabels>,
) -> QueryCoordinator {
    let registry = Arc::new(SourceRegistry::new());
    for source in sources {
        registry.register(source, &SourceConfig::default());
    }
    QueryCoordinator::new(registry, favorites, labels, &GeneralConfig::default())
}

pub fn keys(list: &RankedList) -> Vec<&str> {
    list.items.iter().map(|i| i.key.as_str()).collect()
}

pub fn labels(list: &RankedList) -> Vec<&str> {
    list.items.iter().map(|i| i.effective_label()).collect()
}

/// Waits until a published list satisfies `done`, failing after two seconds.
pub async fn wait_for_list<F>(rx: &mut watch::Receiver<Arc<RankedList>>, done: F) -> Arc<RankedList>
where
    F: FnMut(&Arc<RankedList>) -> bool,
{
    within(rx.wait_for(done)).await.unwrap().clone()
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("timed out")
}
