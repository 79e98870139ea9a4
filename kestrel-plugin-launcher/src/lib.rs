//! Native source for installed desktop applications.

use freedesktop_desktop_entry::DesktopEntry;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use kestrel_plugin::{App, Category, Kind, NativeSource, Query, Searchable};
use notify::{RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use walkdir::WalkDir;
use xdg::BaseDirectories;

const MAX_RESULTS: usize = 20;

#[derive(Debug, Clone, PartialEq)]
struct IndexedApp {
    name: String,
    app: App,
}

impl IndexedApp {
    fn to_searchable(&self) -> Searchable {
        Searchable::new(Kind::App(self.app.clone()), &self.app.desktop_file_id, self.name.clone())
    }
}

struct AppIndex {
    dirs: Vec<PathBuf>,
    apps: Vec<IndexedApp>,
}

impl AppIndex {
    fn new(dirs: Vec<PathBuf>) -> Self {
        let mut index = Self { dirs, apps: Vec::new() };
        index.reindex();
        index
    }

    /// Rescans every directory. Earlier directories shadow later ones with
    /// the same desktop file id.
    fn reindex(&mut self) {
        let mut seen = HashSet::new();
        let mut apps = Vec::new();
        for dir in &self.dirs {
            for entry in WalkDir::new(dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "desktop"))
            {
                let Some(id) = desktop_file_id(dir, entry.path()) else {
                    continue;
                };
                if !seen.insert(id.clone()) {
                    continue;
                }
                if let Some(app) = parse_desktop_file(entry.path(), id) {
                    apps.push(app);
                }
            }
        }
        log::info!("Indexed {} applications", apps.len());
        self.apps = apps;
    }
}

fn application_dirs() -> Vec<PathBuf> {
    match BaseDirectories::new() {
        Ok(xdg_dirs) => std::iter::once(xdg_dirs.get_data_home())
            .chain(xdg_dirs.get_data_dirs())
            .map(|p| p.join("applications"))
            .collect(),
        Err(e) => {
            log::warn!("No XDG base directories: {e}");
            Vec::new()
        }
    }
}

/// `applications/org/gnome/Foo.desktop` has the id `org-gnome-Foo.desktop`.
fn desktop_file_id(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let parts: Vec<_> = relative.iter().map(|p| p.to_string_lossy()).collect();
    Some(parts.join("-"))
}

fn parse_desktop_file(path: &Path, desktop_file_id: String) -> Option<IndexedApp> {
    let content = std::fs::read_to_string(path).ok()?;
    let entry = match DesktopEntry::decode(path, &content) {
        Ok(entry) => entry,
        Err(e) => {
            log::debug!("Skipping {path:?}: {e:?}");
            return None;
        }
    };
    if entry.no_display() || entry.type_() != Some("Application") {
        return None;
    }
    Some(IndexedApp {
        name: entry.name(None)?.to_string(),
        app: App {
            desktop_file_id,
            exec: entry.exec().map(str::to_string),
            comment: entry.comment(None).map(|s| s.to_string()),
            icon: entry.icon().map(str::to_string),
        },
    })
}

fn best_matches(apps: &[IndexedApp], matcher: &SkimMatcherV2, text: &str) -> Vec<Searchable> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    let mut scored: Vec<_> = apps
        .iter()
        .filter_map(|app| matcher.fuzzy_match(&app.name, text).map(|score| (score, app)))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_RESULTS)
        .map(|(_, app)| app.to_searchable())
        .collect()
}

fn start_watcher_thread(index: Arc<Mutex<AppIndex>>) {
    thread::spawn(move || {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut watcher = match notify::recommended_watcher(tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                log::warn!("Application directories are not watched: {e}");
                return;
            }
        };
        let dirs = index.lock().unwrap_or_else(PoisonError::into_inner).dirs.clone();
        for dir in dirs.iter().filter(|d| d.exists()) {
            if let Err(e) = watcher.watch(dir, RecursiveMode::Recursive) {
                log::warn!("Cannot watch {dir:?}: {e}");
            }
        }
        for event in rx {
            if event.is_ok() {
                index.lock().unwrap_or_else(PoisonError::into_inner).reindex();
            }
        }
    });
}

pub struct LauncherSource {
    index: Arc<Mutex<AppIndex>>,
    matcher: SkimMatcherV2,
}

impl LauncherSource {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            index: Arc::new(Mutex::new(AppIndex::new(dirs))),
            matcher: SkimMatcherV2::default(),
        }
    }

    /// Indexes the XDG application directories and keeps watching them.
    pub fn watching() -> Self {
        let source = Self::new(application_dirs());
        start_watcher_thread(Arc::clone(&source.index));
        source
    }
}

impl NativeSource for LauncherSource {
    fn name(&self) -> &'static str {
        "apps"
    }

    fn category(&self) -> Category {
        Category::Apps
    }

    fn query(&self, query: &Query) -> Vec<Searchable> {
        let index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        best_matches(&index.apps, &self.matcher, &query.text)
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn _kestrel_init() -> *mut dyn NativeSource {
    Box::into_raw(Box::new(LauncherSource::watching()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_entry(dir: &Path, relative: &str, body: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("[Desktop Entry]\n{body}")).unwrap();
    }

    #[test]
    fn nested_entries_get_dashed_ids() {
        let dir = Path::new("/usr/share/applications");
        let id = desktop_file_id(dir, &dir.join("org/gnome/Maps.desktop"));
        assert_eq!(id.as_deref(), Some("org-gnome-Maps.desktop"));
    }

    #[test]
    fn index_skips_hidden_entries_and_shadowed_ids() {
        let local = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        write_entry(local.path(), "firefox.desktop", "Type=Application\nName=Firefox Nightly\nExec=firefox\n");
        write_entry(system.path(), "firefox.desktop", "Type=Application\nName=Firefox\nExec=firefox\n");
        write_entry(system.path(), "hidden.desktop", "Type=Application\nName=Hidden\nNoDisplay=true\n");
        write_entry(system.path(), "site.desktop", "Type=Link\nName=Site\nURL=https://example.org\n");

        let index = AppIndex::new(vec![local.path().to_path_buf(), system.path().to_path_buf()]);
        let names: Vec<_> = index.apps.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Firefox Nightly"]);
        assert_eq!(index.apps[0].app.exec.as_deref(), Some("firefox"));
    }

    #[test]
    fn queries_yield_app_results() {
        let dir = tempfile::tempdir().unwrap();
        write_entry(dir.path(), "gimp.desktop", "Type=Application\nName=GIMP\nComment=Edit images\n");
        write_entry(dir.path(), "maps.desktop", "Type=Application\nName=Maps\n");
        let source = LauncherSource::new(vec![dir.path().to_path_buf()]);

        let results = source.query(&Query::new("gim", false));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "app://gimp.desktop");
        assert_eq!(results[0].label, "GIMP");
        assert!(source.query(&Query::new("  ", false)).is_empty());
    }
}
