//! Hidden-item filter.
//!
//! The hidden set is a projection of the favorites snapshot. The filter is
//! applied every time the ranked list is rebuilt rather than when a batch
//! arrives, so unhiding an item makes it reappear from the cached batches
//! without a new query.

use kestrel_plugin::Searchable;
use std::collections::HashSet;

use crate::favorites::FavoritesSnapshot;

#[derive(Debug, Clone, Copy)]
pub struct HiddenFilter<'a> {
    keys: &'a HashSet<String>,
}

impl<'a> HiddenFilter<'a> {
    pub fn new(favorites: &'a FavoritesSnapshot) -> Self {
        Self {
            keys: favorites.hidden_keys(),
        }
    }

    pub fn admits(&self, item: &Searchable) -> bool {
        !self.keys.contains(&item.key)
    }

    pub fn apply<'b>(self, batch: &'b [Searchable]) -> impl Iterator<Item = &'b Searchable> {
        batch.iter().filter(move |item| self.admits(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favorites::{FavoritesStore, MemoryBackend};
    use kestrel_plugin::{Kind, Tag};
    use std::sync::Arc;

    fn tag(name: &str) -> Searchable {
        Searchable::new(Kind::Tag(Tag { tag: name.to_string() }), name, name)
    }

    #[tokio::test]
    async fn hidden_keys_are_removed_and_come_back() {
        let store = FavoritesStore::open(Arc::new(MemoryBackend::default()));
        let batch = vec![tag("a"), tag("b"), tag("c")];

        store.hide(&batch[1]).await.unwrap();
        let snapshot = store.snapshot();
        let kept: Vec<_> = HiddenFilter::new(&snapshot).apply(&batch).map(|i| i.label.as_str()).collect();
        assert_eq!(kept, vec!["a", "c"]);

        store.unhide("tag://b").await.unwrap();
        let snapshot = store.snapshot();
        assert_eq!(HiddenFilter::new(&snapshot).apply(&batch).count(), 3);
    }
}
