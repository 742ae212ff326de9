//! Virtual path derivation.
//!
//! Every loaded module gets one canonical key in the store, derived from its
//! resolved URL. Local files keep their filesystem path so the compiler
//! frontend sees familiar paths; remote modules are mapped under a
//! protocol-prefixed tree (`/https/example.com/a/b.ts`). The derivation is a
//! pure function of the URL and stable for the lifetime of a build.

use url::Url;

/// Suffixes marking a type-declaration file, longest first.
pub(crate) const DECLARATION_SUFFIXES: [&str; 3] = [".d.ts", ".d.mts", ".d.cts"];

/// The declaration suffix of `path`, if it has one.
pub(crate) fn declaration_suffix(path: &str) -> Option<&'static str> {
    DECLARATION_SUFFIXES
        .iter()
        .find(|suffix| path.ends_with(*suffix))
        .copied()
}

/// Derive the canonical store key for a resolved URL.
///
/// `file:` URLs map to their local path. Anything else becomes
/// `/<scheme>/<host>[_port]<path>`, with a query string folded into the file
/// name as a short hash so URLs differing only by query never collide.
pub fn virtual_path(url: &Url) -> String {
    if url.scheme() == "file" {
        if let Ok(path) = url.to_file_path() {
            return path.to_string_lossy().into_owned();
        }
        return url.path().to_string();
    }

    let mut host = url.host_str().unwrap_or("").to_string();
    if let Some(port) = url.port() {
        host.push('_');
        host.push_str(&port.to_string());
    }

    // Registry-style URLs (npm:pkg) have an opaque path with no leading
    // slash and no host.
    let mut path = url.path().to_string();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }
    if let Some(query) = url.query() {
        path = fold_query(&path, query);
    }

    if host.is_empty() {
        format!("/{}{}", url.scheme(), path)
    } else {
        format!("/{}/{}{}", url.scheme(), host, path)
    }
}

/// Fold a query string into the final path segment as an 8-char hash,
/// placed before the extension so the file keeps its media suffix.
fn fold_query(path: &str, query: &str) -> String {
    let digest = blake3::hash(query.as_bytes()).to_hex();
    let tag = &digest.as_str()[..8];

    let (dir, file) = match path.rfind('/') {
        Some(idx) => path.split_at(idx + 1),
        None => ("", path),
    };
    for suffix in DECLARATION_SUFFIXES {
        if let Some(stem) = file.strip_suffix(suffix) {
            return format!("{dir}{stem}.{tag}{suffix}");
        }
    }
    match file.rsplit_once('.') {
        Some((stem, ext)) => format!("{dir}{stem}.{tag}.{ext}"),
        None => format!("{dir}{file}_{tag}"),
    }
}
