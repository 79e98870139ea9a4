use anyhow::{Context, Result};
use kestrel_daemon::bridge::{self, BridgeResolver, DbusTransport, PluginClient, PluginRegistry};
use kestrel_daemon::config::{self, Config};
use kestrel_daemon::favorites::{ExponentialAverage, FavoritesStore};
use kestrel_daemon::labels::CustomLabels;
use kestrel_daemon::native::{NativeSourceAdapter, load_native_sources};
use kestrel_daemon::persist::JsonFile;
use kestrel_daemon::service::{BUS_NAME, Engine, OBJECT_PATH};
use kestrel_daemon::{QueryCoordinator, SourceRegistry, logging};
use kestrel_plugin::Source;
use std::sync::Arc;
use zbus::{Connection, ConnectionBuilder};

fn load_native(config: &Config) -> Vec<NativeSourceAdapter> {
    let Some(dir) = config.native_source_dir() else {
        log::error!("Could not determine the native source directory");
        return Vec::new();
    };
    if !dir.exists() {
        log::warn!("Native source directory does not exist at {dir:?}");
        return Vec::new();
    }
    // libraries in the source directory are part of the installation
    unsafe { load_native_sources(&dir) }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let config = config::load_config().context("Failed to load configuration")?;
    let data_dir = config.data_dir();
    log::info!("Daemon starting up, data in {data_dir:?}");

    let sources = Arc::new(SourceRegistry::new());
    for source in load_native(&config) {
        let source_config = config.source(source.name());
        sources.register(Arc::new(source), &source_config);
    }
    if sources.snapshot().is_empty() {
        log::warn!("No native sources loaded, only plugins will answer queries");
    }

    let plugin_bus = Connection::session()
        .await
        .context("Failed to connect to the session bus")?;
    let client = Arc::new(PluginClient::new(
        Arc::new(DbusTransport::new(plugin_bus)),
        config.general.query_timeout(),
    ));
    let plugins = Arc::new(PluginRegistry::open(JsonFile::new(data_dir.join("plugins.json"))));
    let _sync = bridge::spawn_sync(plugins.clone(), sources.clone(), client.clone(), config.clone());

    let resolver = Arc::new(BridgeResolver::new(plugins.clone(), client.clone()));
    let favorites = Arc::new(
        FavoritesStore::open(Arc::new(JsonFile::new(data_dir.join("favorites.json"))))
            .with_weight_strategy(Arc::new(ExponentialAverage::new(
                config.general.weight_factor.alpha(),
            )))
            .with_resolver(resolver, config.plugins.resolve_timeout()),
    );

    let labels = Arc::new(CustomLabels::open(JsonFile::new(data_dir.join("labels.json"))));

    let coordinator = Arc::new(QueryCoordinator::new(
        sources.clone(),
        favorites.clone(),
        labels.clone(),
        &config.general,
    ));
    let engine = Engine {
        coordinator: coordinator.clone(),
        favorites,
        sources,
        plugins,
        labels,
        client,
    };

    let _conn = ConnectionBuilder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, engine)?
        .build()
        .await?;

    log::info!("kestrel engine is running");
    tokio::signal::ctrl_c().await?;
    coordinator.cancel();
    log::info!("Shutting down");

    Ok(())
}
