use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use zbus::{Connection, proxy, zvariant::Type};

/// One result as the daemon reports it.
#[derive(Debug, Deserialize, Type)]
struct Entry {
    key: String,
    label: String,
    domain: String,
    description: String,
    pinned: bool,
    prefer_details: bool,
}

#[proxy(
    interface = "org.kestrel.Engine1",
    default_service = "org.kestrel.Engine",
    default_path = "/org/kestrel/Engine1"
)]
trait Engine {
    async fn search(&self, text: &str, allow_network: bool) -> zbus::Result<Vec<Entry>>;
    async fn favorites(&self) -> zbus::Result<Vec<Entry>>;
    async fn details(&self, key: &str) -> zbus::Result<Entry>;
    async fn pin(&self, key: &str) -> zbus::Result<()>;
    async fn unpin(&self, key: &str) -> zbus::Result<()>;
    async fn hide(&self, key: &str) -> zbus::Result<()>;
    async fn unhide(&self, key: &str) -> zbus::Result<()>;
    async fn touch(&self, key: &str) -> zbus::Result<()>;
    async fn reset(&self, key: &str) -> zbus::Result<()>;
    async fn delete(&self, key: &str) -> zbus::Result<()>;
    async fn reorder(&self, manual: Vec<String>, automatic: Vec<String>) -> zbus::Result<()>;
    async fn hidden(&self) -> zbus::Result<Vec<String>>;
    async fn cleanup(&self) -> zbus::Result<u32>;
    async fn sources(&self) -> zbus::Result<Vec<(String, bool)>>;
    async fn set_source_enabled(&self, name: &str, enabled: bool) -> zbus::Result<bool>;
    async fn plugins(&self) -> zbus::Result<Vec<(String, String, bool)>>;
    async fn plugin_state(&self, authority: &str) -> zbus::Result<String>;
    async fn set_label(&self, key: &str, label: &str) -> zbus::Result<()>;
    async fn clear_label(&self, key: &str) -> zbus::Result<()>;
    async fn labels(&self) -> zbus::Result<Vec<(String, String)>>;
    async fn export(&self, dir: &str) -> zbus::Result<(u32, u32, u32)>;
    async fn import(&self, dir: &str) -> zbus::Result<(u32, u32, u32, u32)>;
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search every enabled source
    Search {
        /// The search term
        text: String,
        /// Let sources use the network
        #[arg(long)]
        online: bool,
    },
    /// List pinned favorites in order
    Favorites,
    /// Show one item and refresh its stored copy
    Details { key: String },
    Pin { key: String },
    Unpin { key: String },
    Hide { key: String },
    Unhide { key: String },
    /// Record a launch of the item
    Launch { key: String },
    /// Forget launch statistics of the item
    Reset { key: String },
    Delete { key: String },
    /// Reorder favorites: pinned keys, then `--` and keys sorted by weight
    Reorder {
        manual: Vec<String>,
        #[arg(last = true)]
        automatic: Vec<String>,
    },
    /// List hidden keys
    Hidden,
    /// Remove favorites of uninstalled plugins
    Cleanup,
    /// List sources or toggle one
    Sources {
        name: Option<String>,
        #[arg(long, conflicts_with = "disable", requires = "name")]
        enable: bool,
        #[arg(long, requires = "name")]
        disable: bool,
    },
    /// List plugins or show the state of one
    Plugins { authority: Option<String> },
    /// Show an item under a label of your own, or list custom labels
    Label { key: Option<String>, label: Option<String> },
    /// Go back to the item's own label
    Unlabel { key: String },
    Export { dir: String },
    /// Replace favorites, plugins and labels with a backup
    Import { dir: String },
}

fn print_entries(entries: &[Entry]) {
    if entries.is_empty() {
        println!("No results");
    }
    for entry in entries {
        let pin = if entry.pinned { "*" } else { " " };
        println!("{pin} {:<32} {:<10} {}", entry.label, entry.domain, entry.key);
        if !entry.description.is_empty() {
            println!("    {}", entry.description);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let connection = Connection::session().await?;
    let engine = EngineProxy::new(&connection).await?;

    match args.command {
        Command::Search { text, online } => print_entries(&engine.search(&text, online).await?),
        Command::Favorites => print_entries(&engine.favorites().await?),
        Command::Details { key } => {
            let entry = engine.details(&key).await?;
            if entry.prefer_details {
                println!("(opens details instead of launching)");
            }
            print_entries(&[entry]);
        }
        Command::Pin { key } => engine.pin(&key).await?,
        Command::Unpin { key } => engine.unpin(&key).await?,
        Command::Hide { key } => engine.hide(&key).await?,
        Command::Unhide { key } => engine.unhide(&key).await?,
        Command::Launch { key } => engine.touch(&key).await?,
        Command::Reset { key } => engine.reset(&key).await?,
        Command::Delete { key } => engine.delete(&key).await?,
        Command::Reorder { manual, automatic } => engine.reorder(manual, automatic).await?,
        Command::Hidden => {
            for key in engine.hidden().await? {
                println!("{key}");
            }
        }
        Command::Cleanup => println!("Removed {} favorites", engine.cleanup().await?),
        Command::Sources {
            name: Some(name),
            enable,
            disable,
        } if enable || disable => {
            if !engine.set_source_enabled(&name, enable).await? {
                anyhow::bail!("no source named {name}");
            }
        }
        Command::Sources { .. } => {
            for (name, enabled) in engine.sources().await? {
                println!("{} {name}", if enabled { "on " } else { "off" });
            }
        }
        Command::Plugins {
            authority: Some(authority),
        } => println!("{}", engine.plugin_state(&authority).await?),
        Command::Plugins { authority: None } => {
            for (authority, label, enabled) in engine.plugins().await? {
                println!("{} {label:<24} {authority}", if enabled { "on " } else { "off" });
            }
        }
        Command::Label {
            key: Some(key),
            label: Some(label),
        } => engine.set_label(&key, &label).await?,
        Command::Label { key: Some(key), label: None } => {
            anyhow::bail!("missing the new label for {key}, use unlabel to remove one")
        }
        Command::Label { key: None, .. } => {
            for (key, label) in engine.labels().await? {
                println!("{label:<32} {key}");
            }
        }
        Command::Unlabel { key } => engine.clear_label(&key).await?,
        Command::Export { dir } => {
            let (favorites, plugins, labels) = engine.export(&dir).await?;
            println!("Exported {favorites} favorites, {plugins} plugins and {labels} labels");
        }
        Command::Import { dir } => {
            let (favorites, plugins, labels, skipped) = engine.import(&dir).await?;
            println!("Restored {favorites} favorites, {plugins} plugins and {labels} labels, skipped {skipped}");
        }
    }

    Ok(())
}
