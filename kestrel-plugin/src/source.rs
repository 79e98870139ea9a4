use futures::stream::BoxStream;

use crate::error::SourceError;
use crate::query::{Category, Query};
use crate::searchable::Searchable;

pub type Batch = Vec<Searchable>;

/// Stream of result batches produced by one source for one query.
pub type ResultStream = BoxStream<'static, Result<Batch, SourceError>>;

/// A provider of search results for one domain.
///
/// `search` must be lazy: nothing happens until the returned stream is
/// polled, and every call starts a fresh evaluation. A source may emit any
/// number of batches, e.g. a fast local batch followed by a network-refined
/// one. Each batch replaces the previous one from the same source.
pub trait Source: Send + Sync {
    /// Returns the name of the source, unique within a registry.
    fn name(&self) -> &str;

    fn category(&self) -> Category;

    fn search(&self, query: &Query) -> ResultStream;
}

/// A blocking, single-shot source loaded from a native library.
///
/// The daemon runs `query` on the blocking pool and wraps it into a
/// [`Source`].
pub trait NativeSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn category(&self) -> Category;

    /// Called by the daemon to get results for a given query.
    fn query(&self, query: &Query) -> Vec<Searchable>;
}

/// Symbol every native source library exports.
pub const NATIVE_INIT_SYMBOL: &[u8] = b"_kestrel_init";
