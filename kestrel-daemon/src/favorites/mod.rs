//! Favorites and usage: pins, hides, launch counts and weights per key.

mod backend;
pub mod codec;
mod record;
mod store;
mod weight;

pub use backend::{FavoritesBackend, MemoryBackend};
pub use record::FavoriteRecord;
pub use store::{FavoritesSnapshot, FavoritesStore, TEMPORARILY_UNAVAILABLE};
pub(crate) use store::now_millis;
pub use weight::{ExponentialAverage, WeightStrategy};
