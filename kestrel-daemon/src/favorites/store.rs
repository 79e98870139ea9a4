use kestrel_plugin::provider::Refreshed;
use kestrel_plugin::{Kind, PluginItem, Searchable};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use super::backend::FavoritesBackend;
use super::codec::{self, Decoded, StoredReference};
use super::record::FavoriteRecord;
use super::weight::{ExponentialAverage, WeightStrategy};
use crate::bridge::PluginResolver;
use crate::error::StoreError;
use crate::persist::open_records;

const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(500);

/// Placeholder reason prefix when the plugin may answer later.
pub const TEMPORARILY_UNAVAILABLE: &str = "temporarily unavailable";

/// The record of `item`, created if missing, carrying `payload`.
fn upsert<'r>(
    records: &'r mut HashMap<String, FavoriteRecord>,
    item: &Searchable,
    payload: &str,
) -> &'r mut FavoriteRecord {
    let record = records
        .entry(item.key.clone())
        .or_insert_with(|| FavoriteRecord::new(&item.key, item.domain(), payload.to_string()));
    record.kind = item.domain().to_string();
    record.serialized_payload = payload.to_string();
    record
}

/// Immutable view of all favorite records at one point in time.
#[derive(Debug, Default, Clone)]
pub struct FavoritesSnapshot {
    records: HashMap<String, FavoriteRecord>,
    hidden: HashSet<String>,
}

impl FavoritesSnapshot {
    fn from_records(records: Vec<FavoriteRecord>) -> Self {
        Self::new(records.into_iter().map(|r| (r.key.clone(), r)).collect())
    }

    fn new(records: HashMap<String, FavoriteRecord>) -> Self {
        let hidden = records
            .values()
            .filter(|r| r.hidden)
            .map(|r| r.key.clone())
            .collect();
        Self { records, hidden }
    }

    pub fn get(&self, key: &str) -> Option<&FavoriteRecord> {
        self.records.get(key)
    }

    pub fn pin_position(&self, key: &str) -> Option<u32> {
        self.records.get(key).and_then(|r| r.pin_position)
    }

    pub fn weight(&self, key: &str) -> f64 {
        self.records.get(key).map_or(0.0, |r| r.weight)
    }

    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.contains(key)
    }

    pub fn hidden_keys(&self) -> &HashSet<String> {
        &self.hidden
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Pinned records by ascending pin position. Records sharing a position
    /// are ordered by descending weight.
    pub fn pinned_records(&self) -> Vec<&FavoriteRecord> {
        let mut pinned: Vec<_> = self.records.values().filter(|r| r.is_pinned()).collect();
        pinned.sort_by(|a, b| {
            a.pin_position
                .cmp(&b.pin_position)
                .then_with(|| b.weight.total_cmp(&a.weight))
                .then_with(|| a.key.cmp(&b.key))
        });
        pinned
    }

    fn records_sorted(&self) -> Vec<FavoriteRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }
}

/// Durable per-key user state: pins, hides, launch counts and weights.
///
/// Every mutation persists first and only then publishes a new snapshot, so
/// subscribers never observe state that failed to reach the backend.
///
/// A backend that could not be read at open and could not be set aside is
/// never written: every mutation first retries the read and fails while it
/// keeps failing.
pub struct FavoritesStore {
    backend: Arc<dyn FavoritesBackend>,
    readable: AtomicBool,
    weights: Arc<dyn WeightStrategy>,
    resolver: Option<Arc<dyn PluginResolver>>,
    resolve_timeout: Duration,
    writes: tokio::sync::Mutex<()>,
    snapshot: watch::Sender<Arc<FavoritesSnapshot>>,
    last_refresh: Mutex<HashMap<String, Instant>>,
}

impl FavoritesStore {
    /// Loads the persisted records. Unreadable content is set aside and the
    /// store starts empty.
    pub fn open(backend: Arc<dyn FavoritesBackend>) -> Self {
        let (records, readable) = open_records("favorites", || backend.load(), || backend.set_aside());
        let (snapshot, _) = watch::channel(Arc::new(FavoritesSnapshot::from_records(records)));
        Self {
            backend,
            readable: AtomicBool::new(readable),
            weights: Arc::new(ExponentialAverage::default()),
            resolver: None,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            writes: tokio::sync::Mutex::new(()),
            snapshot,
            last_refresh: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_weight_strategy(mut self, weights: Arc<dyn WeightStrategy>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn PluginResolver>, timeout: Duration) -> Self {
        self.resolver = Some(resolver);
        self.resolve_timeout = timeout;
        self
    }

    pub fn snapshot(&self) -> Arc<FavoritesSnapshot> {
        self.snapshot.borrow().clone()
    }

    /// Receives the current snapshot immediately and every later change.
    pub fn subscribe(&self) -> watch::Receiver<Arc<FavoritesSnapshot>> {
        self.snapshot.subscribe()
    }

    /// Applies `change` to a copy of the records, persists the result and
    /// publishes it. Returns whether anything changed.
    async fn update<F>(&self, change: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut HashMap<String, FavoriteRecord>),
    {
        let _guard = self.writes.lock().await;
        self.recover()?;
        let current = self.snapshot();
        let mut records = current.records.clone();
        change(&mut records);
        if records == current.records {
            return Ok(false);
        }
        let next = FavoritesSnapshot::new(records);
        let backend = self.backend.clone();
        let persisted = next.records_sorted();
        tokio::task::spawn_blocking(move || backend.save(&persisted)).await??;
        self.snapshot.send_replace(Arc::new(next));
        Ok(true)
    }

    /// Reads the backend again if it was unreadable at open.
    fn recover(&self) -> Result<(), StoreError> {
        if self.readable.load(Ordering::SeqCst) {
            return Ok(());
        }
        let records = self.backend.load()?;
        log::info!("Favorites are readable again, {} records recovered", records.len());
        self.readable.store(true, Ordering::SeqCst);
        self.snapshot
            .send_replace(Arc::new(FavoritesSnapshot::from_records(records)));
        Ok(())
    }

    /// Payload to persist for `item`. A placeholder keeps whatever payload is
    /// already stored for its key.
    fn payload_for(&self, item: &Searchable) -> Result<String, StoreError> {
        match codec::encode(item) {
            Err(StoreError::NotPersistable(key)) => self
                .snapshot()
                .get(&key)
                .map(|r| r.serialized_payload.clone())
                .ok_or(StoreError::NotPersistable(key)),
            other => other,
        }
    }

    pub async fn pin(&self, item: &Searchable) -> Result<(), StoreError> {
        let payload = self.payload_for(item)?;
        self.update(|records| {
            let next_position = records
                .values()
                .filter_map(|r| r.pin_position)
                .max()
                .map_or(0, |p| p + 1);
            let record = upsert(records, item, &payload);
            record.pin_position.get_or_insert(next_position);
            record.hidden = false;
        })
        .await?;
        Ok(())
    }

    pub async fn unpin(&self, key: &str) -> Result<(), StoreError> {
        self.update(|records| {
            if let Some(record) = records.get_mut(key) {
                record.pin_position = None;
            }
        })
        .await?;
        Ok(())
    }

    pub async fn hide(&self, item: &Searchable) -> Result<(), StoreError> {
        let payload = self.payload_for(item)?;
        self.update(|records| {
            let record = upsert(records, item, &payload);
            record.hidden = true;
            record.pin_position = None;
        })
        .await?;
        Ok(())
    }

    pub async fn unhide(&self, key: &str) -> Result<(), StoreError> {
        self.update(|records| {
            if let Some(record) = records.get_mut(key) {
                record.hidden = false;
            }
        })
        .await?;
        Ok(())
    }

    /// Records one successful launch of `item`.
    pub async fn touch(&self, item: &Searchable) -> Result<(), StoreError> {
        let payload = self.payload_for(item)?;
        let weights = self.weights.clone();
        self.update(|records| {
            for record in records.values_mut() {
                if record.key != item.key {
                    record.weight = weights.decayed(record.weight);
                }
            }
            let record = upsert(records, item, &payload);
            record.launch_count = record.launch_count.saturating_add(1);
            record.weight = weights.launched(record.weight, record.launch_count);
        })
        .await?;
        Ok(())
    }

    /// Clears pin, hidden flag and weight. The launch count is kept.
    pub async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.update(|records| {
            if let Some(record) = records.get_mut(key) {
                record.pin_position = None;
                record.hidden = false;
                record.weight = 0.0;
            }
        })
        .await?;
        Ok(())
    }

    /// Rewrites the favorites in one update. `manual` is pinned at positions
    /// `0..n` in list order. `automatic` shares position `n` and keeps its
    /// existing weights, redistributed so that the items rank in list order.
    /// Items without a record are created; every other record loses its pin.
    pub async fn reorder_favorites(&self, manual: &[Searchable], automatic: &[Searchable]) -> Result<(), StoreError> {
        let manual = self.persistable(manual);
        let automatic = self.persistable(automatic);
        let automatic_position = manual.len() as u32;
        self.update(|records| {
            for record in records.values_mut() {
                record.pin_position = None;
            }
            for (position, (item, payload)) in manual.iter().enumerate() {
                let record = upsert(records, item, payload);
                record.pin_position = Some(position as u32);
                record.hidden = false;
            }
            let mut weights: Vec<f64> = automatic
                .iter()
                .map(|(item, _)| records.get(&item.key).map_or(0.0, |r| r.weight))
                .collect();
            weights.sort_by(|a, b| b.total_cmp(a));
            let mut previous: Option<f64> = None;
            for ((item, payload), mut weight) in automatic.iter().zip(weights) {
                if let Some(previous) = previous {
                    if previous > 0.0 {
                        weight = weight.min(previous * (1.0 - 1e-6));
                    }
                }
                let record = upsert(records, item, payload);
                record.pin_position = Some(automatic_position);
                record.hidden = false;
                record.weight = weight;
                previous = Some(weight);
            }
        })
        .await?;
        Ok(())
    }

    /// Pairs each item with its payload, dropping items that have none.
    fn persistable<'i>(&self, items: &'i [Searchable]) -> Vec<(&'i Searchable, String)> {
        items
            .iter()
            .filter_map(|item| match self.payload_for(item) {
                Ok(payload) => Some((item, payload)),
                Err(e) => {
                    log::warn!("Leaving {} out of the favorites: {e}", item.key);
                    None
                }
            })
            .collect()
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.update(|records| {
            records.remove(key);
        })
        .await?;
        Ok(())
    }

    /// Removes records whose payload no longer decodes or whose plugin is no
    /// longer installed. Returns the number of removed records.
    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        let snapshot = self.snapshot();
        let mut stale = Vec::new();
        for record in snapshot.records.values() {
            match codec::decode(&record.serialized_payload) {
                Err(e) => {
                    log::info!("Removing favorite {} with unreadable payload: {e}", record.key);
                    stale.push(record.key.clone());
                }
                Ok(decoded) => {
                    let Some(authority) = codec::plugin_authority(&decoded) else {
                        continue;
                    };
                    if let Some(resolver) = &self.resolver {
                        if !resolver.is_installed(authority) {
                            log::info!("Removing favorite {} of uninstalled plugin {authority}", record.key);
                            stale.push(record.key.clone());
                        }
                    }
                }
            }
        }
        if stale.is_empty() {
            return Ok(0);
        }
        let mut removed = 0;
        self.update(|records| {
            for key in &stale {
                if records.remove(key).is_some() {
                    removed += 1;
                }
            }
        })
        .await?;
        Ok(removed)
    }

    pub fn get(&self, key: &str) -> Option<FavoriteRecord> {
        self.snapshot().get(key).cloned()
    }

    pub fn is_pinned(&self, key: &str) -> bool {
        self.snapshot().pin_position(key).is_some()
    }

    pub fn is_hidden(&self, key: &str) -> bool {
        self.snapshot().is_hidden(key)
    }

    /// The stored copy of `key`. References are not resolved.
    pub fn stored_item(&self, key: &str) -> Option<Searchable> {
        let record = self.get(key)?;
        match codec::decode(&record.serialized_payload) {
            Ok(Decoded::Ready(item)) => Some(item),
            _ => None,
        }
    }

    /// Keys of all hidden items, sorted.
    pub fn hidden(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.snapshot().hidden.iter().cloned().collect();
        keys.sort();
        keys
    }

    /// `keys` reordered by descending weight. Equal weights keep their order.
    pub fn sort_by_weight(&self, keys: &[String]) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut keys = keys.to_vec();
        keys.sort_by(|a, b| snapshot.weight(b).total_cmp(&snapshot.weight(a)));
        keys
    }

    /// Restores the pinned items in pin order.
    ///
    /// Copies are decoded locally. References are resolved through their
    /// plugin within the resolve timeout; a reference that cannot be resolved
    /// right now yields a placeholder with the same key. Records that no
    /// longer decode are skipped until `cleanup` removes them.
    pub async fn pinned(&self) -> Vec<Searchable> {
        let snapshot = self.snapshot();
        let mut items = Vec::new();
        for record in snapshot.pinned_records() {
            match codec::decode(&record.serialized_payload) {
                Ok(Decoded::Ready(item)) => items.push(item),
                Ok(Decoded::Reference(reference)) => {
                    items.push(self.restore_reference(&record.key, reference).await)
                }
                Err(e) => log::debug!("Skipping favorite {} with unreadable payload: {e}", record.key),
            }
        }
        items
    }

    async fn restore_reference(&self, key: &str, reference: StoredReference) -> Searchable {
        let label = reference.label_override.as_ref().unwrap_or(&reference.label).clone();
        let Some(resolver) = &self.resolver else {
            return Searchable::placeholder(key, label, "plugin bridge unavailable");
        };
        let lookup = resolver.resolve(&reference.authority, &reference.id);
        let reason = match tokio::time::timeout(self.resolve_timeout, lookup).await {
            Ok(Ok(Some(mut item))) => {
                item.label_override = reference.label_override;
                return item;
            }
            Ok(Ok(None)) => "not found".to_string(),
            Ok(Err(e)) if e.is_transient() => {
                log::debug!("Favorite {key} is temporarily unavailable: {e}");
                return Searchable::placeholder(key, label, format!("{TEMPORARILY_UNAVAILABLE}: {e}"));
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => {
                let waited = self.resolve_timeout.as_millis();
                log::debug!("Favorite {key} got no answer within {waited} ms");
                return Searchable::placeholder(
                    key,
                    label,
                    format!("{TEMPORARILY_UNAVAILABLE}: no answer within {waited} ms"),
                );
            }
        };
        log::warn!("Could not restore favorite {key}: {reason}");
        Searchable::placeholder(key, label, reason)
    }

    /// Replaces the stored payload of an existing record, e.g. after a plugin
    /// delivered a fresher copy. Unknown keys are ignored.
    pub async fn update_payload(&self, item: &Searchable) -> Result<(), StoreError> {
        let payload = codec::encode(item)?;
        self.update(|records| {
            if let Some(record) = records.get_mut(&item.key) {
                record.serialized_payload = payload;
            }
        })
        .await?;
        Ok(())
    }

    /// Asks the plugin behind a stored copy for a fresher version, at most
    /// once per the plugin's minimum refresh interval. Returns whether the
    /// payload changed.
    pub async fn refresh_copy(&self, key: &str) -> Result<bool, StoreError> {
        let Some(resolver) = &self.resolver else {
            return Ok(false);
        };
        let Some(record) = self.get(key) else {
            return Ok(false);
        };
        let Ok(Decoded::Ready(Searchable {
            kind: Kind::Plugin(item),
            label_override,
            ..
        })) = codec::decode(&record.serialized_payload)
        else {
            return Ok(false);
        };
        let interval = resolver.min_refresh_interval(&item.authority).await;
        if !self.claim_refresh(key, interval) {
            return Ok(false);
        }
        let authority = item.authority.clone();
        match resolver.refresh(&item).await {
            Ok(Refreshed::Updated(entity)) => {
                let mut fresh = Searchable::from_plugin(PluginItem {
                    entity,
                    updated_at: now_millis(),
                    ..item
                });
                fresh.label_override = label_override;
                self.update_payload(&fresh).await?;
                Ok(true)
            }
            Ok(Refreshed::NotUpdated) => Ok(false),
            Ok(Refreshed::Gone) => {
                log::info!("Plugin {authority} no longer knows favorite {key}, keeping stored copy");
                Ok(false)
            }
            Err(e) if e.is_transient() => {
                log::debug!("Refreshing favorite {key} failed: {e}");
                Ok(false)
            }
            Err(e) => {
                log::warn!("Refreshing favorite {key} failed: {e}");
                Ok(false)
            }
        }
    }

    fn claim_refresh(&self, key: &str, interval: Duration) -> bool {
        let Ok(mut last) = self.last_refresh.lock() else {
            return false;
        };
        let now = Instant::now();
        if let Some(at) = last.get(key) {
            if now.duration_since(*at) < interval {
                return false;
            }
        }
        last.insert(key.to_string(), now);
        true
    }

    pub fn export_records(&self) -> Vec<FavoriteRecord> {
        self.snapshot().records_sorted()
    }

    /// Replaces every record with `records`.
    pub async fn import_records(&self, records: Vec<FavoriteRecord>) -> Result<(), StoreError> {
        self.update(|current| {
            *current = records.into_iter().map(|r| (r.key.clone(), r)).collect();
        })
        .await?;
        Ok(())
    }
}

pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
