//! Weft Core Library
//!
//! Loads a module graph from local files, remote URLs, and package
//! registries into a read-only virtual filesystem, rewriting every
//! import specifier to a stable virtual path a compiler frontend can
//! resolve without touching the network.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fetch;
pub mod graph;
pub mod importmap;
pub mod program;
pub mod store;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{CONFIG_FILE, ExportsField, ProjectConfig};

    // Diagnostics
    pub use crate::diagnostics::{DiagnosticClass, EventLog, LoadEvent, LoadObserver};

    // Errors
    pub use crate::error::{LoadError, ResolveError};

    // Fetching
    pub use crate::fetch::{CacheStats, FetchCache, Fetcher};

    // Graph loading
    pub use crate::graph::{LibrarySources, ModuleLoader, TextEdits};

    // Import maps
    pub use crate::importmap::ImportMap;

    // Program assembly
    pub use crate::program::{Program, ProgramBuilder};

    // Virtual filesystem
    pub use crate::store::{CompilerHost, ModuleStore, SourceFile, StoreHost, virtual_path};
}
