//! Sources compiled as native libraries (`*.so`) and loaded at startup.

use futures::stream::{self, StreamExt};
use kestrel_plugin::{Category, NATIVE_INIT_SYMBOL, NativeSource, Query, ResultStream, Source, SourceError};
use libloading::{Library, Symbol};
use std::path::Path;
use std::sync::Arc;

/// Runs a blocking [`NativeSource`] on the blocking pool.
pub struct NativeSourceAdapter {
    // declared before the library so it is dropped first
    inner: Arc<dyn NativeSource>,
    _library: Option<Arc<Library>>,
}

impl NativeSourceAdapter {
    pub fn new(inner: Arc<dyn NativeSource>) -> Self {
        Self { inner, _library: None }
    }

    fn loaded(inner: Arc<dyn NativeSource>, library: Arc<Library>) -> Self {
        Self {
            inner,
            _library: Some(library),
        }
    }
}

impl Source for NativeSourceAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn category(&self) -> Category {
        self.inner.category()
    }

    fn search(&self, query: &Query) -> ResultStream {
        let inner = self.inner.clone();
        let query = query.clone();
        stream::once(async move {
            let name = inner.name();
            tokio::task::spawn_blocking(move || inner.query(&query))
                .await
                .map_err(|e| SourceError::failed(name, e))
        })
        .boxed()
    }
}

/// Loads every `*.so` in `dir` that exports the native source constructor.
/// A library that fails to load is skipped with a warning.
///
/// # Safety
///
/// The libraries are trusted: their constructor must return a pointer
/// obtained from `Box::into_raw` of a `Box<dyn NativeSource>` built with the
/// same compiler as the daemon.
pub unsafe fn load_native_sources(dir: &Path) -> Vec<NativeSourceAdapter> {
    log::info!("Loading native sources from {dir:?}");
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Native source directory {dir:?} is not readable: {e}");
            return Vec::new();
        }
    };

    let mut sources = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|e| e != "so") {
            continue;
        }
        match unsafe { load_library(&path) } {
            Ok(source) => {
                log::info!("Loaded native source {} from {path:?}", source.name());
                sources.push(source);
            }
            Err(e) => log::warn!("Skipping {path:?}: {e}"),
        }
    }
    sources
}

unsafe fn load_library(path: &Path) -> Result<NativeSourceAdapter, libloading::Error> {
    let library = unsafe { Library::new(path) }?;
    let source = {
        let constructor: Symbol<unsafe extern "C" fn() -> *mut dyn NativeSource> =
            unsafe { library.get(NATIVE_INIT_SYMBOL) }?;
        let raw = unsafe { constructor() };
        Arc::<dyn NativeSource>::from(unsafe { Box::from_raw(raw) })
    };
    Ok(NativeSourceAdapter::loaded(source, Arc::new(library)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_plugin::{Calculation, Kind, Searchable};

    struct Echo;

    impl NativeSource for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn category(&self) -> Category {
            Category::Tools
        }

        fn query(&self, query: &Query) -> Vec<Searchable> {
            vec![Searchable::new(
                Kind::Calculator(Calculation {
                    expression: query.text.clone(),
                    value: 0.0,
                }),
                &query.text,
                query.text.clone(),
            )]
        }
    }

    #[tokio::test]
    async fn adapter_emits_one_batch() {
        let adapter = NativeSourceAdapter::new(Arc::new(Echo));
        let batches: Vec<_> = adapter.search(&Query::new("1+1", false)).collect().await;
        assert_eq!(batches.len(), 1);
        let batch = batches.into_iter().next().unwrap().unwrap();
        assert_eq!(batch[0].key, "calculator://1+1");
    }

    #[test]
    fn missing_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sources = unsafe { load_native_sources(&dir.path().join("absent")) };
        assert!(sources.is_empty());
    }

    #[test]
    fn non_libraries_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(dir.path().join("broken.so"), "not an elf").unwrap();
        let sources = unsafe { load_native_sources(dir.path()) };
        assert!(sources.is_empty());
    }
}
