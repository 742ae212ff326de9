//! Multi-protocol content fetching.
//!
//! One entry point, [`Fetcher::fetch`], dispatching on the URL scheme:
//! `file:` reads straight from disk, `https:` goes through the durable
//! cache, and the `npm:`/`jsr:` pseudo-protocols are rewritten onto fixed
//! public CDN origins before re-entering the `https` path. Responses that
//! advertise a companion type-declaration URL are retargeted to it, since
//! declarations beat executable source for the compiler frontend. Anything
//! else, plain `http:` included, is refused.

mod cache;

pub use cache::{CacheEntry, CacheStats, FetchCache};

use std::collections::HashMap;

use anyhow::Context;
use tracing::{debug, trace};
use url::Url;

use crate::error::LoadError;
use crate::store::declaration_suffix;

/// CDN origin serving `npm:` packages.
pub const NPM_ORIGIN: &str = "https://esm.sh";
/// CDN origin serving `jsr:` packages.
pub const JSR_ORIGIN: &str = "https://jsr.io";

/// Response header advertising a companion type-declaration URL.
const TYPES_HEADER: &str = "x-typescript-types";

/// Suffixes the frontend recognizes without help, longest first so the
/// declaration forms win over their plain counterparts.
const SCRIPT_SUFFIXES: [&str; 12] = [
    ".d.ts", ".d.mts", ".d.cts", ".tsx", ".mts", ".cts", ".ts", ".jsx", ".mjs", ".cjs", ".js",
    ".json",
];

/// The recognized script suffix of `path`, if any.
pub(crate) fn script_suffix(path: &str) -> Option<&'static str> {
    SCRIPT_SUFFIXES
        .iter()
        .find(|suffix| path.ends_with(*suffix))
        .copied()
}

/// Fetched text plus the URL it should be attributed to.
///
/// `resolved_url` differs from the requested URL when the response was
/// retargeted to a type declaration or had a media suffix guessed onto an
/// extension-less path.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub text: String,
    pub resolved_url: Url,
    pub headers: HashMap<String, String>,
}

/// Protocol-dispatching fetcher with a durable response cache.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    cache: FetchCache,
}

impl Fetcher {
    pub fn new(cache: FetchCache) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("weft/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, cache })
    }

    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Retrieve the text behind a URL.
    pub async fn fetch(&self, url: &Url) -> Result<FetchResult, LoadError> {
        match url.scheme() {
            "file" => self.fetch_file(url).await,
            "https" => self.fetch_https(url).await,
            "npm" => {
                let rewritten = registry_url(url, NPM_ORIGIN)?;
                debug!(%url, %rewritten, "rewriting npm specifier");
                self.fetch_https(&rewritten).await
            }
            "jsr" => {
                let rewritten = registry_url(url, JSR_ORIGIN)?;
                debug!(%url, %rewritten, "rewriting jsr specifier");
                self.fetch_https(&rewritten).await
            }
            scheme => Err(LoadError::UnsupportedProtocol {
                scheme: scheme.to_string(),
                url: url.to_string(),
            }),
        }
    }

    /// Local files read directly and are never cached.
    async fn fetch_file(&self, url: &Url) -> Result<FetchResult, LoadError> {
        let path = url
            .to_file_path()
            .map_err(|_| LoadError::fetch(url, "not a local file path"))?;
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| LoadError::fetch(url, err))?;
        Ok(FetchResult {
            text,
            resolved_url: url.clone(),
            headers: HashMap::new(),
        })
    }

    async fn fetch_https(&self, url: &Url) -> Result<FetchResult, LoadError> {
        let entry = self.cached_get(url).await?;

        // A declaration companion replaces the executable response outright.
        if let Some(types) = entry.headers.get(TYPES_HEADER) {
            let base = Url::parse(&entry.final_url).unwrap_or_else(|_| url.clone());
            let types_url = base.join(types).map_err(|err| {
                LoadError::fetch(url, format!("bad {TYPES_HEADER} header '{types}': {err}"))
            })?;
            debug!(%url, %types_url, "following type declaration header");
            let decl = self.cached_get(&types_url).await?;
            return Ok(FetchResult {
                text: decl.text,
                resolved_url: force_declaration_suffix(types_url),
                headers: decl.headers,
            });
        }

        let resolved_url = guess_suffix(url.clone(), &entry.headers);
        Ok(FetchResult {
            text: entry.text,
            resolved_url,
            headers: entry.headers,
        })
    }

    /// One cached GET: a fresh hit short-circuits with zero network
    /// activity, a miss fetches and persists the response.
    async fn cached_get(&self, url: &Url) -> Result<CacheEntry, LoadError> {
        if let Some(entry) = self.cache.lookup(url.as_str()) {
            trace!(%url, "cache hit");
            return Ok(entry);
        }
        debug!(%url, "fetching");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| LoadError::fetch(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::fetch(url, format!("HTTP {status}")));
        }
        let final_url = response.url().clone();
        let headers = header_map(response.headers());
        let text = response
            .text()
            .await
            .map_err(|err| LoadError::fetch(url, err))?;
        let entry = CacheEntry::new(url.as_str(), final_url.as_str(), text, headers);
        self.cache.store(&entry);
        Ok(entry)
    }
}

fn header_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Map a registry pseudo-protocol URL onto its CDN origin.
fn registry_url(url: &Url, origin: &str) -> Result<Url, LoadError> {
    let path = url.path().trim_start_matches('/');
    let mut joined = format!("{origin}/{path}");
    if let Some(query) = url.query() {
        joined.push('?');
        joined.push_str(query);
    }
    Url::parse(&joined)
        .map_err(|err| LoadError::fetch(url, format!("invalid registry specifier: {err}")))
}

/// Append a media suffix guessed from `content-type` when the path has no
/// recognized extension. Best effort; a wrong guess is not detected.
fn guess_suffix(mut url: Url, headers: &HashMap<String, String>) -> Url {
    if script_suffix(url.path()).is_some() {
        return url;
    }
    let content_type = headers.get("content-type").map(String::as_str).unwrap_or("");
    let suffix = suffix_for_content_type(content_type);
    trace!(%url, content_type, suffix, "guessing media suffix");
    let path = format!("{}{}", url.path(), suffix);
    url.set_path(&path);
    url
}

fn suffix_for_content_type(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence {
        "application/typescript" | "text/typescript" | "video/mp2t" => ".ts",
        "text/tsx" => ".tsx",
        "text/jsx" => ".jsx",
        "application/json" => ".json",
        _ => ".js",
    }
}

/// Force a `.d.ts` suffix onto declaration URLs that lack one.
fn force_declaration_suffix(mut url: Url) -> Url {
    if declaration_suffix(url.path()).is_none() {
        let path = format!("{}.d.ts", url.path());
        url.set_path(&path);
    }
    url
}
