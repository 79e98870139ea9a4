//! The kestrel search engine: fans a query out to every enabled source,
//! merges the results with the user's pins, hides and usage weights, and
//! keeps the ranked list live.

pub mod backup;
pub mod bridge;
pub mod collation;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod favorites;
pub mod hidden;
pub mod labels;
pub mod logging;
pub mod native;
pub mod persist;
pub mod ranking;
pub mod registry;
pub mod service;

pub use coordinator::{QueryCoordinator, RankedList};
pub use favorites::{FavoriteRecord, FavoritesStore};
pub use registry::SourceRegistry;
