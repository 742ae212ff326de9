//! Program assembly: configuration, entry loading, and the host surface.
//!
//! [`ProgramBuilder`] merges caller overrides with the project
//! configuration, loads the full module graph, preloads default
//! libraries, and hands back a [`Program`] whose host adapter a compiler
//! frontend can consume.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use futures::future::join_all;
use serde_json::{Map, Value};
use tracing::info;
use url::Url;

use crate::config;
use crate::diagnostics::{
    self, DiagnosticClass, EventLog, LoadEvent, LoadObserver, TracingObserver,
};
use crate::fetch::{FetchCache, Fetcher};
use crate::graph::{LibrarySources, ModuleLoader, lib_file_name};
use crate::importmap::ImportMap;
use crate::store::{ModuleStore, StoreHost, virtual_path};

/// Configures and runs one build.
pub struct ProgramBuilder {
    root: PathBuf,
    entries: Vec<String>,
    entry_globs: Vec<String>,
    import_map: ImportMap,
    compiler_options: Map<String, Value>,
    config_path: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    library_sources: Option<LibrarySources>,
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl ProgramBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
            entry_globs: Vec::new(),
            import_map: ImportMap::new(),
            compiler_options: Map::new(),
            config_path: None,
            cache_dir: None,
            library_sources: None,
            observers: Vec::new(),
        }
    }

    /// Add one entry point: a URL or a root-relative path.
    pub fn entry(mut self, specifier: impl Into<String>) -> Self {
        self.entries.push(specifier.into());
        self
    }

    pub fn entries<I, S>(mut self, specifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(specifiers.into_iter().map(Into::into));
        self
    }

    /// Add entry points matching a glob pattern under the root.
    pub fn entry_glob(mut self, pattern: impl Into<String>) -> Self {
        self.entry_globs.push(pattern.into());
        self
    }

    /// Caller-supplied import map. Mappings from the configuration file
    /// are merged on top and win per key.
    pub fn import_map(mut self, map: ImportMap) -> Self {
        self.import_map = map;
        self
    }

    /// Caller-supplied compiler options. Applied over the configuration
    /// file, which itself applies over built-in defaults.
    pub fn compiler_options(mut self, options: Map<String, Value>) -> Self {
        self.compiler_options = options;
        self
    }

    /// Configuration file location. Defaults to `weft.json` under the root.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Fetch cache directory. Defaults to the user cache directory.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn library_sources(mut self, sources: LibrarySources) -> Self {
        self.library_sources = Some(sources);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LoadObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Load the entry set and every transitive dependency.
    ///
    /// Fails hard only when an entry itself cannot be loaded; failures
    /// deeper in the graph surface as recorded events.
    pub async fn build(self) -> anyhow::Result<Program> {
        let ProgramBuilder {
            root,
            entries,
            entry_globs,
            import_map,
            compiler_options,
            config_path,
            cache_dir,
            library_sources,
            observers,
        } = self;

        let root = root.canonicalize().unwrap_or(root);

        let config_file = config_path.unwrap_or_else(|| root.join(config::CONFIG_FILE));
        let project = config::load_or_default(&config_file);

        let mut options = config::default_compiler_options();
        config::merge_compiler_options(&mut options, &project.compiler_options);
        config::merge_compiler_options(&mut options, &compiler_options);

        let mut map = import_map;
        map.merge(project.import_map.clone());

        let mut specifiers = entries;
        for pattern in &entry_globs {
            let full = root.join(pattern);
            let matches = glob::glob(&full.to_string_lossy())
                .with_context(|| format!("Invalid entry glob '{pattern}'"))?;
            for path in matches.flatten() {
                specifiers.push(path.to_string_lossy().into_owned());
            }
        }
        specifiers.extend(project.export_entries());
        if specifiers.is_empty() {
            bail!(
                "No entry points: pass at least one entry or add an exports field to {}",
                config_file.display()
            );
        }

        let mut entry_urls = Vec::with_capacity(specifiers.len());
        for specifier in &specifiers {
            entry_urls.push(entry_url(&root, specifier)?);
        }

        let cache = FetchCache::new(cache_dir.unwrap_or_else(FetchCache::default_dir));
        let fetcher = Fetcher::new(cache)?;

        let libraries = match library_sources {
            Some(sources) => sources,
            None => LibrarySources::defaults()?,
        };
        let lib_root = virtual_path(&libraries.primary);
        let target = config::target(&options);
        let default_lib = lib_file_name(&target);

        let store = Arc::new(ModuleStore::new());
        let events = Arc::new(EventLog::new());
        let mut loader = ModuleLoader::new(Arc::clone(&store), fetcher, map, libraries);
        loader.add_observer(Arc::new(TracingObserver));
        let log_observer: Arc<dyn LoadObserver> = Arc::clone(&events);
        loader.add_observer(log_observer);
        for observer in observers {
            loader.add_observer(observer);
        }
        let loader = Arc::new(loader);

        // Default libraries first, so entry transforms find them in place.
        let mut libs = config::lib_names(&options);
        if !libs.contains(&target) {
            libs.push(target.clone());
        }
        join_all(libs.iter().map(|name| loader.load_library(name))).await;

        info!(count = entry_urls.len(), root = %root.display(), "loading module graph");
        let results = join_all(entry_urls.iter().map(|url| loader.load(url.clone()))).await;
        let mut entry_paths = Vec::with_capacity(results.len());
        for (url, result) in entry_urls.iter().zip(results) {
            let path = result.with_context(|| format!("Failed to load entry {url}"))?;
            entry_paths.push(path);
        }

        Ok(Program {
            store,
            options,
            entry_paths,
            events,
            root,
            lib_root,
            default_lib,
        })
    }
}

/// A fully loaded module graph and the pieces a frontend consumes.
#[derive(Debug)]
pub struct Program {
    store: Arc<ModuleStore>,
    options: Map<String, Value>,
    entry_paths: Vec<String>,
    events: Arc<EventLog>,
    root: PathBuf,
    lib_root: String,
    default_lib: String,
}

impl Program {
    pub fn store(&self) -> Arc<ModuleStore> {
        Arc::clone(&self.store)
    }

    /// Effective compiler options after all merges.
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Virtual paths of the entry points, in the order given.
    pub fn entry_paths(&self) -> &[String] {
        &self.entry_paths
    }

    /// Everything observed during the build, in emission order.
    pub fn events(&self) -> Vec<LoadEvent> {
        self.events.snapshot()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host adapter for a compiler frontend reading this program.
    pub fn host(&self) -> StoreHost {
        StoreHost::new(
            Arc::clone(&self.store),
            self.root.to_string_lossy().into_owned(),
            self.lib_root.clone(),
            self.default_lib.clone(),
        )
    }

    /// Classify a diagnostic-bearing path by where its content came from.
    pub fn classify(&self, path: &str) -> DiagnosticClass {
        diagnostics::classify(path, &self.root, &self.lib_root)
    }
}

/// Interpret an entry specifier as a URL, else as a root-relative path.
fn entry_url(root: &Path, specifier: &str) -> anyhow::Result<Url> {
    if let Ok(url) = Url::parse(specifier) {
        return Ok(url);
    }
    let path = root.join(specifier);
    Url::from_file_path(&path).map_err(|_| {
        anyhow::anyhow!("Entry '{specifier}' is neither a URL nor a project-relative path")
    })
}
