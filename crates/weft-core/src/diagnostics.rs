//! Structured load events and diagnostic classification.
//!
//! The resolution core never writes log lines directly; it emits
//! [`LoadEvent`] values to registered observers. [`TracingObserver`]
//! translates them to log output and [`EventLog`] records them for
//! programmatic inspection, which keeps the core testable without
//! capturing text output.

use std::path::Path;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

/// One observable step of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoadEvent {
    /// A module was fetched, transformed, and stored.
    ModuleLoaded { url: String, virtual_path: String },
    /// A specifier could not be resolved or loaded and was left as-is.
    SpecifierSkipped {
        specifier: String,
        referrer: String,
        reason: String,
    },
    /// A default library was stored under its canonical virtual path.
    LibraryLoaded { name: String, virtual_path: String },
    /// Neither library source could supply a requested library.
    LibraryMissing {
        name: String,
        primary: String,
        fallback: String,
    },
}

/// Receives load events as they happen.
pub trait LoadObserver: Send + Sync {
    fn event(&self, event: &LoadEvent);
}

/// Observer that forwards events to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn event(&self, event: &LoadEvent) {
        match event {
            LoadEvent::ModuleLoaded { url, virtual_path } => {
                debug!(%url, %virtual_path, "module loaded");
            }
            LoadEvent::SpecifierSkipped {
                specifier,
                referrer,
                reason,
            } => {
                warn!(%specifier, %referrer, %reason, "leaving specifier unresolved");
            }
            LoadEvent::LibraryLoaded { name, virtual_path } => {
                debug!(%name, %virtual_path, "library loaded");
            }
            LoadEvent::LibraryMissing {
                name,
                primary,
                fallback,
            } => {
                warn!(%name, %primary, %fallback, "library unavailable from any source");
            }
        }
    }
}

/// Observer that accumulates events in memory.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LoadEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events recorded so far, in emission order.
    pub fn snapshot(&self) -> Vec<LoadEvent> {
        self.events.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl LoadObserver for EventLog {
    fn event(&self, event: &LoadEvent) {
        self.events.lock().push(event.clone());
    }
}

/// How prominently a diagnostic for a given file should surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticClass {
    /// File under the project root: a user-facing warning.
    User,
    /// Loaded remote or mapped dependency: informational.
    Dependency,
    /// Default library file: debug-only noise.
    Library,
}

/// Classify a virtual path by where its content came from.
pub fn classify(path: &str, root: &Path, lib_root: &str) -> DiagnosticClass {
    if path.starts_with(lib_root) {
        DiagnosticClass::Library
    } else if Path::new(path).starts_with(root) {
        DiagnosticClass::User
    } else {
        DiagnosticClass::Dependency
    }
}
