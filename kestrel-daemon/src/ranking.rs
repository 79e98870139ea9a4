//! Ranking/merge engine.
//!
//! The ranked list is rebuilt from scratch on every input change: the
//! latest batch of every source, deduplicated by key, filtered against the
//! hidden set, relabelled with the user's custom labels and sorted by pin
//! position, weight and label.

use kestrel_plugin::Searchable;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::collation::CollationKey;
use crate::favorites::FavoritesSnapshot;
use crate::hidden::HiddenFilter;
use crate::labels::LabelMap;

/// Latest batch of every source for the current query.
#[derive(Debug, Default)]
pub struct Merger {
    latest: HashMap<String, SourceBatch>,
    next_seq: u64,
}

#[derive(Debug)]
struct SourceBatch {
    seq: u64,
    items: Vec<Searchable>,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the batch of `source`. Later batches win key collisions.
    pub fn push(&mut self, source: &str, items: Vec<Searchable>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.latest.insert(source.to_string(), SourceBatch { seq, items });
    }

    pub fn clear(&mut self) {
        self.latest.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn rank(&self, favorites: &FavoritesSnapshot, labels: &LabelMap) -> Vec<Searchable> {
        rank(
            self.latest.values().map(|b| (b.seq, b.items.as_slice())),
            favorites,
            labels,
        )
    }
}

struct Candidate<'a> {
    item: &'a Searchable,
    custom_label: Option<&'a str>,
    pin: Option<u32>,
    weight: f64,
    collation: CollationKey,
}

impl Candidate<'_> {
    fn compare(&self, other: &Self) -> Ordering {
        match (self.pin, other.pin) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| other.weight.total_cmp(&self.weight)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => other.weight.total_cmp(&self.weight),
        }
        .then_with(|| self.collation.cmp(&other.collation))
        .then_with(|| self.item.key.cmp(&other.item.key))
    }
}

/// Merges batches tagged with their emission sequence into one ordered list.
///
/// The result does not depend on the order the batches are given in.
pub fn rank<'a, I>(batches: I, favorites: &FavoritesSnapshot, labels: &'a LabelMap) -> Vec<Searchable>
where
    I: IntoIterator<Item = (u64, &'a [Searchable])>,
{
    let hidden = HiddenFilter::new(favorites);

    let mut newest: HashMap<&str, (u64, &Searchable)> = HashMap::new();
    for (seq, items) in batches {
        for item in hidden.apply(items) {
            match newest.get(item.key.as_str()) {
                Some((existing, _)) if *existing > seq => {}
                _ => {
                    newest.insert(item.key.as_str(), (seq, item));
                }
            }
        }
    }

    let mut candidates: Vec<Candidate> = newest
        .into_values()
        .map(|(_, item)| {
            let custom_label = labels.get(&item.key).map(String::as_str);
            Candidate {
                item,
                custom_label,
                pin: favorites.pin_position(&item.key),
                weight: favorites.weight(&item.key),
                collation: CollationKey::new(custom_label.unwrap_or(item.effective_label())),
            }
        })
        .collect();
    candidates.sort_by(Candidate::compare);
    candidates
        .into_iter()
        .map(|c| {
            let mut item = c.item.clone();
            if let Some(label) = c.custom_label {
                item.label_override = Some(label.to_string());
            }
            item
        })
        .collect()
}
