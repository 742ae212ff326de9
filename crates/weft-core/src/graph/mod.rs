//! Recursive module-graph loading.
//!
//! [`ModuleLoader::load`] reserves the destination virtual path before its
//! first suspension point, fetches the content, rewrites every specifier
//! to a virtual path while loading the targets concurrently, and fills
//! the store. Reservation-before-recursion is the sole mechanism that
//! makes cyclic imports and shared dependencies terminate.

mod edits;
mod libs;
mod scan;
mod transform;

pub use edits::TextEdits;
pub use libs::{
    DEFAULT_FALLBACK_LIB_BASE, DEFAULT_PRIMARY_LIB_BASE, LibrarySources, lib_file_name,
};

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, trace};
use url::Url;

use crate::diagnostics::{LoadEvent, LoadObserver};
use crate::error::LoadError;
use crate::fetch::{FetchResult, Fetcher, script_suffix};
use crate::importmap::ImportMap;
use crate::store::{ModuleStore, virtual_path};
use transform::{RewriteSite, RewriteStyle};

/// Loads modules into a [`ModuleStore`], one write per virtual path.
pub struct ModuleLoader {
    store: Arc<ModuleStore>,
    fetcher: Fetcher,
    import_map: ImportMap,
    libraries: LibrarySources,
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl ModuleLoader {
    pub fn new(
        store: Arc<ModuleStore>,
        fetcher: Fetcher,
        import_map: ImportMap,
        libraries: LibrarySources,
    ) -> Self {
        Self {
            store,
            fetcher,
            import_map,
            libraries,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn LoadObserver>) {
        self.observers.push(observer);
    }

    fn emit(&self, event: LoadEvent) {
        for observer in &self.observers {
            observer.event(&event);
        }
    }

    /// Load `url` and every transitive dependency into the store.
    ///
    /// Returns the virtual path importers should reference. The path is
    /// reserved synchronously before the first suspension point, so a
    /// concurrent or cyclic request for the same URL returns it
    /// immediately without re-entering transformation.
    pub fn load(self: &Arc<Self>, url: Url) -> BoxFuture<'static, Result<String, LoadError>> {
        let this = Arc::clone(self);
        async move {
            let requested = virtual_path(&url);
            if !this.store.reserve(&requested) {
                trace!(%url, path = %requested, "already reserved");
                return Ok(requested);
            }

            let FetchResult {
                text,
                resolved_url,
                headers: _,
            } = this.fetcher.fetch(&url).await?;

            let final_path = final_store_path(&requested, &resolved_url);
            // The suffix-completed key is what importers reference; claim
            // it too so racers resolve to it while the fill is pending.
            let fill_final = final_path != requested && this.store.reserve(&final_path);

            let transformed = this.transform(&resolved_url, text).await?;

            if fill_final {
                this.store.fill(&final_path, transformed.clone());
            }
            this.store.fill(&requested, transformed);
            this.emit(LoadEvent::ModuleLoaded {
                url: url.to_string(),
                virtual_path: final_path.clone(),
            });
            Ok(final_path)
        }
        .boxed()
    }

    /// Rewrite every specifier in `text` to a virtual path, loading the
    /// targets concurrently. A failing site is logged and left as
    /// written; it never aborts the containing file.
    async fn transform(self: &Arc<Self>, source: &Url, text: String) -> Result<String, LoadError> {
        let mut sites = transform::module_specifiers(source, &text)?;

        if let Some(pragma) = scan::jsx_import_source(&text) {
            sites.push(RewriteSite {
                start: pragma.start,
                end: pragma.end,
                specifier: format!("{}/jsx-runtime", pragma.value),
                style: RewriteStyle::Verbatim,
            });
        }
        for reference in scan::reference_paths(&text) {
            sites.push(RewriteSite {
                start: reference.start,
                end: reference.end,
                specifier: reference.value,
                style: RewriteStyle::Verbatim,
            });
        }

        // Referenced libraries must be in place before this file's own
        // rewrite completes.
        let libraries = scan::reference_libs(&text);
        join_all(libraries.iter().map(|lib| self.load_library(&lib.value))).await;

        let mut resolved = Vec::new();
        let mut loads = Vec::new();
        for site in sites {
            match self.import_map.resolve(source, &site.specifier) {
                Ok(target) => {
                    loads.push(self.load(target));
                    resolved.push(site);
                }
                Err(err) => self.skip(source, &site.specifier, &err.to_string()),
            }
        }

        let mut edits = TextEdits::new();
        for (site, result) in resolved.into_iter().zip(join_all(loads).await) {
            match result {
                Ok(path) => {
                    edits.replace(
                        site.start,
                        site.end,
                        transform::replacement_for(site.style, &path),
                    );
                }
                Err(err) => self.skip(source, &site.specifier, &err.to_string()),
            }
        }
        Ok(edits.apply(&text))
    }

    fn skip(&self, referrer: &Url, specifier: &str, reason: &str) {
        self.emit(LoadEvent::SpecifierSkipped {
            specifier: specifier.to_string(),
            referrer: referrer.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Load a default library by name, falling back to the secondary
    /// source. Fallback content is stored under the primary's virtual
    /// path, so callers never observe which source supplied it. A library
    /// missing from both sources logs a warning and nothing more.
    pub fn load_library(self: &Arc<Self>, name: &str) -> BoxFuture<'static, ()> {
        let this = Arc::clone(self);
        let name = name.to_string();
        async move {
            let file = lib_file_name(&name);
            let primary = match this.libraries.primary.join(&file) {
                Ok(url) => url,
                Err(err) => {
                    debug!(%name, %err, "invalid primary library URL");
                    return;
                }
            };
            let primary_path = virtual_path(&primary);
            if this.store.contains(&primary_path) {
                return;
            }

            match this.load(primary.clone()).await {
                Ok(path) => {
                    this.emit(LoadEvent::LibraryLoaded {
                        name,
                        virtual_path: path,
                    });
                    return;
                }
                Err(err) => debug!(%name, %primary, %err, "primary library source failed"),
            }

            let fallback = match this.libraries.fallback.join(&file) {
                Ok(url) => url,
                Err(err) => {
                    debug!(%name, %err, "invalid fallback library URL");
                    return;
                }
            };
            match this.library_from_fallback(&fallback, &primary).await {
                Ok(text) => {
                    this.store.fill(&primary_path, text);
                    this.emit(LoadEvent::LibraryLoaded {
                        name,
                        virtual_path: primary_path,
                    });
                }
                Err(err) => {
                    debug!(%name, %fallback, %err, "fallback library source failed");
                    this.emit(LoadEvent::LibraryMissing {
                        name,
                        primary: primary.to_string(),
                        fallback: fallback.to_string(),
                    });
                }
            }
        }
        .boxed()
    }

    /// Fetch a library from the fallback source, transforming it as if it
    /// had come from the primary so its rewrites key consistently.
    async fn library_from_fallback(
        self: &Arc<Self>,
        fallback: &Url,
        primary: &Url,
    ) -> Result<String, LoadError> {
        let fetched = self.fetcher.fetch(fallback).await?;
        self.transform(primary, fetched.text).await
    }
}

/// Complete the stored key with the resolved URL's suffix when the
/// requested URL did not carry a recognizable one.
fn final_store_path(requested: &str, resolved: &Url) -> String {
    if script_suffix(requested).is_some() {
        return requested.to_string();
    }
    match script_suffix(resolved.path()) {
        Some(suffix) => format!("{requested}{suffix}"),
        None => requested.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_store_path_keeps_recognized_suffix() {
        let resolved = Url::parse("https://example.invalid/mod.d.ts").expect("url");
        assert_eq!(
            final_store_path("/https/example.invalid/mod.ts", &resolved),
            "/https/example.invalid/mod.ts"
        );
    }

    #[test]
    fn test_final_store_path_completes_from_resolved_url() {
        let resolved = Url::parse("https://example.invalid/lodash.d.ts").expect("url");
        assert_eq!(
            final_store_path("/https/example.invalid/lodash", &resolved),
            "/https/example.invalid/lodash.d.ts"
        );
    }

    #[test]
    fn test_final_store_path_without_any_suffix() {
        let resolved = Url::parse("https://example.invalid/raw").expect("url");
        assert_eq!(
            final_store_path("/https/example.invalid/raw", &resolved),
            "/https/example.invalid/raw"
        );
    }
}
