//! Durable cache for fetched responses.
//!
//! One JSON file per URL under the platform cache directory, named by the
//! blake3 hash of the URL. Entries carry the response text, a header
//! snapshot, and the fetch timestamp; anything older than the freshness
//! window reads as a miss and gets overwritten by the next fetch. Disk
//! trouble on either path degrades to a miss, never to a failure.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How long a cached response stays fresh.
const FRESHNESS_HOURS: i64 = 24;

/// One cached response.
///
/// `url` is the request URL the entry is keyed by; `final_url` is where the
/// response actually came from after redirects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub url: String,
    pub final_url: String,
    pub text: String,
    pub headers: HashMap<String, String>,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// An entry stamped with the current time.
    pub fn new(
        url: impl Into<String>,
        final_url: impl Into<String>,
        text: impl Into<String>,
        headers: HashMap<String, String>,
    ) -> Self {
        Self {
            url: url.into(),
            final_url: final_url.into(),
            text: text.into(),
            headers,
            fetched_at: Utc::now(),
        }
    }
}

/// Aggregate numbers for the cache directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

/// URL-keyed response cache persisted across process invocations.
#[derive(Debug, Clone)]
pub struct FetchCache {
    dir: PathBuf,
    max_age: Duration,
}

impl FetchCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_age: Duration::hours(FRESHNESS_HOURS),
        }
    }

    /// Mainly for tests that need a tiny freshness window.
    pub fn with_max_age(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    /// Platform cache location: `<cache_dir>/weft/fetch`.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("weft")
            .join("fetch")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let hash = blake3::hash(url.as_bytes()).to_hex();
        self.dir.join(format!("{hash}.json"))
    }

    /// A fresh cached response for `url`, if one exists.
    ///
    /// Stale, unreadable, and malformed entries all read as a miss; the
    /// next `store` for the same URL overwrites them in place.
    pub fn lookup(&self, url: &str) -> Option<CacheEntry> {
        let path = self.entry_path(url);
        let bytes = fs::read(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                debug!(url, error = %err, "discarding malformed cache entry");
                return None;
            }
        };
        if Utc::now() - entry.fetched_at > self.max_age {
            debug!(url, fetched_at = %entry.fetched_at, "cache entry is stale");
            return None;
        }
        Some(entry)
    }

    /// Persist a response. Failures are logged and swallowed.
    pub fn store(&self, entry: &CacheEntry) {
        if let Err(err) = self.try_store(entry) {
            debug!(url = %entry.url, error = %err, "failed to write cache entry");
        }
    }

    fn try_store(&self, entry: &CacheEntry) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create cache directory: {}", self.dir.display()))?;
        let path = self.entry_path(&entry.url);
        let bytes = serde_json::to_vec(entry).context("Failed to serialize cache entry")?;
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write cache entry: {}", path.display()))?;
        Ok(())
    }

    /// Delete every entry, returning how many were removed.
    pub fn clear(&self) -> anyhow::Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let mut removed = 0;
        for dir_entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read cache directory: {}", self.dir.display()))?
        {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove cache entry: {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Count entries and their total size on disk.
    pub fn stats(&self) -> anyhow::Result<CacheStats> {
        let mut stats = CacheStats::default();
        if !self.dir.exists() {
            return Ok(stats);
        }
        for dir_entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read cache directory: {}", self.dir.display()))?
        {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                stats.entries += 1;
                stats.bytes += dir_entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }
        Ok(stats)
    }
}
