//! The virtual file store.
//!
//! A path-to-text map that becomes the read-only filesystem handed to the
//! compiler frontend. Entries go through exactly two states: reserved with
//! placeholder empty content, then filled once with final text. The store is
//! append-only; nothing is ever removed or mutated after filling.

mod host;
mod vpath;

pub use host::{CompilerHost, SourceFile, StoreHost};
pub use vpath::virtual_path;

pub(crate) use vpath::declaration_suffix;

use std::collections::HashMap;

use parking_lot::RwLock;

/// Path-keyed module texts with single-writer-per-key reservation.
///
/// `reserve` is the only admission point: the check and the placeholder
/// insert happen under one write lock, so two tasks racing on the same key
/// cannot both win. This is not a general concurrent map; it is safe only
/// under the reserve-then-fill discipline.
#[derive(Debug, Default)]
pub struct ModuleStore {
    files: RwLock<HashMap<String, String>>,
}

impl ModuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`, inserting placeholder empty content.
    ///
    /// Returns `true` if this call claimed the key. A `false` return means
    /// some earlier load already owns it (possibly still in flight) and the
    /// caller must not fetch or fill it.
    pub fn reserve(&self, path: &str) -> bool {
        let mut files = self.files.write();
        if files.contains_key(path) {
            return false;
        }
        files.insert(path.to_string(), String::new());
        true
    }

    /// Write final content for a previously reserved key.
    pub fn fill(&self, path: &str, text: String) {
        self.files.write().insert(path.to_string(), text);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    pub fn read(&self, path: &str) -> Option<String> {
        self.files.read().get(path).cloned()
    }

    /// All stored paths, sorted for stable output.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}
