//! Error taxonomy for module loading.
//!
//! Every variant of [`LoadError`] is fatal to the branch of the module graph
//! that produced it, never to the whole build. Callers loading a dependency
//! catch and report these, leaving the importing file's specifier text
//! untouched; only a failure on a top-level entry point aborts a build.

use thiserror::Error;

/// A failure while resolving, fetching, or parsing one module.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The URL's scheme has no fetch strategy (anything outside
    /// `file`, `https`, `npm` and `jsr`, including plain `http`).
    #[error("unsupported protocol '{scheme}' in {url}")]
    UnsupportedProtocol { scheme: String, url: String },

    /// The specifier could not be turned into a URL.
    #[error(transparent)]
    Unresolved(#[from] ResolveError),

    /// Network error, non-success status, or unreadable local file.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The fetched text was rejected by the parser.
    #[error("failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl LoadError {
    /// Fetch failure for a URL, with the cause flattened to a message.
    pub fn fetch(url: impl ToString, reason: impl ToString) -> Self {
        LoadError::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A failure while resolving a specifier against an import map.
///
/// Resolution is pure computation, so these carry everything needed to
/// reproduce the lookup: the specifier and the URL of the importing file.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Neither an absolute URL, nor relative, nor matched by any map entry.
    #[error("unresolved bare specifier '{specifier}' imported from {referrer}")]
    BareSpecifier { specifier: String, referrer: String },

    /// An import map entry matched but its expansion is not a valid URL.
    #[error("import map target '{target}' for '{specifier}' is not a valid URL: {source}")]
    InvalidTarget {
        specifier: String,
        target: String,
        source: url::ParseError,
    },

    /// A relative specifier that does not join onto its referrer.
    #[error("cannot resolve '{specifier}' relative to {referrer}: {source}")]
    InvalidRelative {
        specifier: String,
        referrer: String,
        source: url::ParseError,
    },
}
