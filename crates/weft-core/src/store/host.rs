//! Read-only filesystem adapter over the module store.
//!
//! The compiler frontend only understands conventional file paths. This
//! adapter answers its host queries from the store, applying two read-path
//! normalizations: a trailing `/jsx-runtime` probe segment is stripped, and
//! requests under the default-library root are folded to the canonical
//! `lib.<name>.d.ts` spelling. When a request only matches after
//! normalization the adapter serves a tiny redirect stub instead of the real
//! content, letting the frontend's own file-redirect mechanism take over.

use std::sync::Arc;

use anyhow::bail;
use serde_json::Value;
use tracing::{debug, trace};

use super::ModuleStore;

/// One stored file as handed to the compiler frontend.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

/// The host contract consumed by the external compiler frontend.
pub trait CompilerHost {
    /// The stored text for `path`, or `None` when absent.
    fn source_file(&self, path: &str, options: &Value) -> Option<SourceFile>;

    /// File name (not path) of the default library for the build's target.
    fn default_lib_file_name(&self) -> String;

    /// Virtual directory under which default libraries are stored.
    fn default_lib_location(&self) -> String;

    fn current_directory(&self) -> String;

    fn canonical_file_name(&self, path: &str) -> String {
        path.to_string()
    }

    fn use_case_sensitive_file_names(&self) -> bool {
        true
    }

    fn new_line(&self) -> &'static str {
        "\n"
    }

    fn file_exists(&self, path: &str) -> bool;

    fn read_file(&self, path: &str) -> Option<String>;

    /// Always fails: this filesystem is read-only.
    fn write_file(&self, path: &str, text: &str) -> anyhow::Result<()>;
}

/// Stateless [`CompilerHost`] over a shared [`ModuleStore`].
#[derive(Debug, Clone)]
pub struct StoreHost {
    store: Arc<ModuleStore>,
    current_dir: String,
    lib_root: String,
    default_lib: String,
}

impl StoreHost {
    /// # Arguments
    /// * `store` - the populated module store
    /// * `current_dir` - project root reported to the frontend
    /// * `lib_root` - virtual directory holding default libraries
    /// * `default_lib` - file name of the target's default library
    pub fn new(
        store: Arc<ModuleStore>,
        current_dir: impl Into<String>,
        lib_root: impl Into<String>,
        default_lib: impl Into<String>,
    ) -> Self {
        let mut lib_root = lib_root.into();
        if !lib_root.ends_with('/') {
            lib_root.push('/');
        }
        Self {
            store,
            current_dir: current_dir.into(),
            lib_root,
            default_lib: default_lib.into(),
        }
    }

    /// Canonical spelling for a requested path.
    ///
    /// Strips a trailing `/jsx-runtime` segment, then folds file names under
    /// the default-library root to lower-case `lib.<name>.d.ts`.
    fn normalize(&self, path: &str) -> String {
        let path = path.strip_suffix("/jsx-runtime").unwrap_or(path);
        if let Some(rest) = path.strip_prefix(&self.lib_root) {
            let (dir, file) = match rest.rfind('/') {
                Some(idx) => rest.split_at(idx + 1),
                None => ("", rest),
            };
            let mut name = file.to_ascii_lowercase();
            if !name.starts_with("lib.") {
                name.insert_str(0, "lib.");
            }
            if !name.ends_with(".d.ts") {
                name.push_str(".d.ts");
            }
            return format!("{}{}{}", self.lib_root, dir, name);
        }
        path.to_string()
    }

    /// Look up `path`, serving a redirect stub when only the normalized
    /// spelling is stored.
    fn lookup(&self, path: &str) -> Option<String> {
        if let Some(text) = self.store.read(path) {
            return Some(text);
        }
        let normalized = self.normalize(path);
        if normalized != path && self.store.contains(&normalized) {
            return Some(redirect_stub(&normalized));
        }
        self.log_miss(path);
        None
    }

    fn exists(&self, path: &str) -> bool {
        if self.store.contains(path) {
            return true;
        }
        let normalized = self.normalize(path);
        normalized != path && self.store.contains(&normalized)
    }

    /// Negative probes for dependency manifests are routine during module
    /// resolution, so they log at trace instead of debug.
    fn log_miss(&self, path: &str) {
        if path.ends_with("package.json") {
            trace!(path, "virtual file not found");
        } else {
            debug!(path, "virtual file not found");
        }
    }
}

/// Stub content pointing the frontend at the canonical path.
fn redirect_stub(target: &str) -> String {
    format!("/// <reference no-default-lib=\"true\"/>\n/// <reference path=\"{target}\" />\n")
}

impl CompilerHost for StoreHost {
    fn source_file(&self, path: &str, _options: &Value) -> Option<SourceFile> {
        self.lookup(path).map(|text| SourceFile {
            path: path.to_string(),
            text,
        })
    }

    fn default_lib_file_name(&self) -> String {
        self.default_lib.clone()
    }

    fn default_lib_location(&self) -> String {
        self.lib_root.clone()
    }

    fn current_directory(&self) -> String {
        self.current_dir.clone()
    }

    fn file_exists(&self, path: &str) -> bool {
        let found = self.exists(path);
        if !found {
            self.log_miss(path);
        }
        found
    }

    fn read_file(&self, path: &str) -> Option<String> {
        self.lookup(path)
    }

    fn write_file(&self, path: &str, _text: &str) -> anyhow::Result<()> {
        bail!("virtual filesystem is read-only: cannot write {path}")
    }
}
