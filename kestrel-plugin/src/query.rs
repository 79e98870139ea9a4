use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Broad grouping of sources, used to narrow a search to some kinds of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Apps,
    Contacts,
    Calendar,
    Files,
    Places,
    Websites,
    Articles,
    Tools,
    Settings,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Apps,
        Category::Contacts,
        Category::Calendar,
        Category::Files,
        Category::Places,
        Category::Websites,
        Category::Articles,
        Category::Tools,
        Category::Settings,
    ];
}

/// Which categories take part in a search. Everything is enabled by default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    disabled: BTreeSet<Category>,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self::all()
    }
}

impl SearchFilters {
    pub fn all() -> Self {
        Self {
            disabled: BTreeSet::new(),
        }
    }

    /// Filters that only let the given categories through.
    pub fn only(categories: &[Category]) -> Self {
        let disabled = Category::ALL
            .into_iter()
            .filter(|c| !categories.contains(c))
            .collect();
        Self { disabled }
    }

    pub fn without(mut self, category: Category) -> Self {
        self.disabled.insert(category);
        self
    }

    pub fn allows(&self, category: Category) -> bool {
        !self.disabled.contains(&category)
    }
}

/// One immutable search request. A new value is created for every (debounced)
/// keystroke and supersedes the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub allow_network: bool,
    #[serde(default)]
    pub filters: SearchFilters,
}

impl Query {
    pub fn new(text: impl Into<String>, allow_network: bool) -> Self {
        Self {
            text: text.into(),
            allow_network,
            filters: SearchFilters::all(),
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_disables_everything_else() {
        let filters = SearchFilters::only(&[Category::Apps, Category::Tools]);
        assert!(filters.allows(Category::Apps));
        assert!(filters.allows(Category::Tools));
        assert!(!filters.allows(Category::Contacts));
        assert!(!filters.allows(Category::Articles));
    }

    #[test]
    fn query_defaults_to_all_categories() {
        let query = Query::new("fire", false);
        for category in Category::ALL {
            assert!(query.filters.allows(category));
        }
        assert!(!query.is_blank());
        assert!(Query::new("   ", true).is_blank());
    }
}
