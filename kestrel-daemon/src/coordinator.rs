//! Query coordinator.
//!
//! Holds the one current query. Submitting a new query cancels every task of
//! the previous one, fans the new query out to the enabled sources and keeps
//! a [`RankedList`] up to date as batches arrive and as favorites or custom
//! labels change.
//!
//! Every query gets a generation number. A list is only published if its
//! generation is still the current one, checked under the lock of the result
//! channel, so a slow source of a superseded query can never overwrite the
//! list of a newer one.

use futures::StreamExt;
use kestrel_plugin::{Batch, Query, Searchable};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::GeneralConfig;
use crate::favorites::FavoritesStore;
use crate::labels::CustomLabels;
use crate::ranking::Merger;
use crate::registry::{ActiveSource, SourceRegistry, active_sources};

/// The externally visible result of the current query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedList {
    pub generation: u64,
    pub query: Option<Query>,
    pub items: Vec<Searchable>,
    /// Every source has finished or timed out.
    pub complete: bool,
}

struct InFlight {
    query: Query,
    generation: u64,
    token: CancellationToken,
    stale: bool,
}

struct Shared {
    favorites: Arc<FavoritesStore>,
    labels: Arc<CustomLabels>,
    generation: AtomicU64,
    results: watch::Sender<Arc<RankedList>>,
    query_timeout: Duration,
    debounce: Duration,
}

pub struct QueryCoordinator {
    sources: Arc<SourceRegistry>,
    shared: Arc<Shared>,
    current: Mutex<Option<InFlight>>,
}

impl QueryCoordinator {
    pub fn new(
        sources: Arc<SourceRegistry>,
        favorites: Arc<FavoritesStore>,
        labels: Arc<CustomLabels>,
        config: &GeneralConfig,
    ) -> Self {
        let (results, _) = watch::channel(Arc::new(RankedList::default()));
        Self {
            sources,
            shared: Arc::new(Shared {
                favorites,
                labels,
                generation: AtomicU64::new(0),
                results,
                query_timeout: config.query_timeout(),
                debounce: config.debounce(),
            }),
            current: Mutex::new(None),
        }
    }

    /// Starts evaluating `query` and returns its generation. Submitting the
    /// query that is already current keeps the running evaluation.
    pub fn submit(&self, query: Query) -> u64 {
        let mut current = match self.current.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(in_flight) = current.as_ref() {
            if in_flight.query == query && !in_flight.stale {
                return in_flight.generation;
            }
        }
        self.start(&mut current, query)
    }

    /// Makes the next submission start a fresh evaluation even if its query
    /// equals the current one. The running evaluation is left alone.
    pub fn invalidate(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(in_flight) = current.as_mut() {
                in_flight.stale = true;
            }
        }
    }

    /// Re-runs the current query, e.g. after sources were enabled or disabled.
    pub fn resubmit(&self) -> Option<u64> {
        let mut current = match self.current.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        let query = current.as_ref()?.query.clone();
        Some(self.start(&mut current, query))
    }

    fn start(&self, current: &mut Option<InFlight>, query: Query) -> u64 {
        if let Some(previous) = current.take() {
            previous.token.cancel();
        }
        let generation = self.shared.next_generation();
        let token = CancellationToken::new();
        // enablement changes after this point apply to the next query
        let sources = self.sources.snapshot();
        log::debug!("Query {generation}: {:?} on {} sources", query.text, sources.len());

        let shared = self.shared.clone();
        let evaluation_query = query.clone();
        let evaluation_token = token.clone();
        tokio::spawn(async move {
            if !shared.debounce.is_zero() {
                tokio::select! {
                    _ = evaluation_token.cancelled() => return,
                    _ = tokio::time::sleep(shared.debounce) => {}
                }
            }
            let active = active_sources(&sources, &evaluation_query);
            shared.evaluate(generation, evaluation_query, active, evaluation_token).await;
        });

        *current = Some(InFlight {
            query,
            generation,
            token,
            stale: false,
        });
        generation
    }

    /// Cancels the current query without starting a new one.
    pub fn cancel(&self) {
        let mut current = match self.current.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(previous) = current.take() {
            previous.token.cancel();
            self.shared.next_generation();
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RankedList>> {
        self.shared.results.subscribe()
    }

    pub fn current(&self) -> Arc<RankedList> {
        self.shared.results.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Submits `query` and waits until every source has answered or timed
    /// out. If the query is superseded first, the newest list is returned.
    pub async fn search(&self, query: Query) -> Arc<RankedList> {
        let mut results = self.subscribe();
        let generation = self.submit(query);
        let shared = self.shared.clone();
        let waited = results
            .wait_for(|list| {
                (list.generation == generation && list.complete)
                    || shared.generation.load(Ordering::SeqCst) != generation
            })
            .await
            .map(|list| list.clone());
        waited.unwrap_or_else(|_| self.current())
    }

    /// An item of the current list by key.
    pub fn find(&self, key: &str) -> Option<Searchable> {
        self.current().items.iter().find(|i| i.key == key).cloned()
    }
}

impl Drop for QueryCoordinator {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(in_flight) = current.take() {
                in_flight.token.cancel();
            }
        }
    }
}

impl Shared {
    /// Bumped under the result channel lock so that no publish of the old
    /// generation can interleave.
    fn next_generation(&self) -> u64 {
        let mut next = 0;
        self.results.send_if_modified(|_| {
            next = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            false
        });
        next
    }

    async fn evaluate(&self, generation: u64, query: Query, active: Vec<ActiveSource>, token: CancellationToken) {
        let deadline = Instant::now() + self.query_timeout;
        let (tx, mut batches) = mpsc::channel::<(String, Batch)>(active.len().max(1) * 2);
        for source in active {
            tokio::spawn(run_source(source, tx.clone(), token.clone(), deadline));
        }
        drop(tx);

        let mut favorites = self.favorites.subscribe();
        let mut labels = self.labels.subscribe();
        let mut merger = Merger::new();
        let mut sources_done = false;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::trace!("Query {generation} cancelled");
                    return;
                }
                batch = batches.recv(), if !sources_done => match batch {
                    Some((source, items)) => {
                        merger.push(&source, items);
                        self.publish(generation, &query, &merger, false);
                    }
                    None => {
                        sources_done = true;
                        self.publish(generation, &query, &merger, true);
                    }
                },
                changed = favorites.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if sources_done || !merger.is_empty() {
                        self.publish(generation, &query, &merger, sources_done);
                    }
                }
                changed = labels.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if sources_done || !merger.is_empty() {
                        self.publish(generation, &query, &merger, sources_done);
                    }
                }
            }
        }
    }

    fn publish(&self, generation: u64, query: &Query, merger: &Merger, complete: bool) -> bool {
        let items = merger.rank(&self.favorites.snapshot(), &self.labels.snapshot());
        self.results.send_if_modified(|list| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *list = Arc::new(RankedList {
                generation,
                query: Some(query.clone()),
                items,
                complete,
            });
            true
        })
    }
}

/// Forwards the batches of one source until it ends, the query is cancelled
/// or the deadline passes. Nothing is forwarded after the deadline.
async fn run_source(
    source: ActiveSource,
    tx: mpsc::Sender<(String, Batch)>,
    token: CancellationToken,
    deadline: Instant,
) {
    let ActiveSource {
        name,
        start_delay,
        mut stream,
    } = source;
    let work = async {
        if !start_delay.is_zero() {
            tokio::time::sleep(start_delay).await;
        }
        while let Some(batch) = stream.next().await {
            if tx.send((name.clone(), batch)).await.is_err() {
                break;
            }
        }
    };
    tokio::select! {
        _ = token.cancelled() => {}
        finished = tokio::time::timeout_at(deadline, work) => {
            if finished.is_err() {
                log::debug!("Source {name} exceeded the query timeout");
            }
        }
    }
}
