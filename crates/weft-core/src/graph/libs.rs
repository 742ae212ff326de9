//! Default-library sources and filename canonicalization.

use anyhow::Context;
use url::Url;

/// Primary CDN base for `lib.*.d.ts` files. Must end with `/`.
pub const DEFAULT_PRIMARY_LIB_BASE: &str = "https://cdn.jsdelivr.net/npm/typescript@5.6.3/lib/";
/// Fallback base consulted when the primary fails. Must end with `/`.
pub const DEFAULT_FALLBACK_LIB_BASE: &str = "https://unpkg.com/typescript@5.6.3/lib/";

/// Primary and fallback locations for default library files.
///
/// Content fetched from the fallback is stored under the virtual path the
/// primary would have produced, so callers never observe which source
/// supplied a library.
#[derive(Debug, Clone)]
pub struct LibrarySources {
    pub primary: Url,
    pub fallback: Url,
}

impl LibrarySources {
    pub fn new(primary: Url, fallback: Url) -> Self {
        Self { primary, fallback }
    }

    pub fn defaults() -> anyhow::Result<Self> {
        let primary = Url::parse(DEFAULT_PRIMARY_LIB_BASE)
            .context("Failed to parse primary library base URL")?;
        let fallback = Url::parse(DEFAULT_FALLBACK_LIB_BASE)
            .context("Failed to parse fallback library base URL")?;
        Ok(Self::new(primary, fallback))
    }
}

/// Canonical `lib.<name>.d.ts` filename for a library name.
///
/// Accepts any casing and tolerates names that already carry the prefix
/// or the extension.
pub fn lib_file_name(name: &str) -> String {
    let mut file = name.to_ascii_lowercase();
    if !file.starts_with("lib.") {
        file.insert_str(0, "lib.");
    }
    if !file.ends_with(".d.ts") {
        file.push_str(".d.ts");
    }
    file
}
