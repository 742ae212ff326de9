//! Specifier resolution through an import map.
//!
//! An import map redirects module specifiers before any fetching happens:
//! top-level entries apply everywhere, scoped entries apply only to files
//! whose own URL sits under the scope prefix. Resolution is pure string and
//! URL computation; nothing here touches the network or the filesystem.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ResolveError;

/// Specifier-to-URL redirections with optional scoped overrides.
///
/// Keys match a specifier either exactly or, when the key ends with `/`,
/// as a prefix. The longest matching key wins. A matching entry in the
/// innermost applicable scope always beats a top-level entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportMap {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub imports: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scopes: BTreeMap<String, BTreeMap<String, String>>,
}

impl ImportMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.scopes.is_empty()
    }

    /// Fold `other` into this map, with `other` winning on key conflicts.
    ///
    /// Scopes are merged entry-wise rather than replaced wholesale, so two
    /// layers can each contribute entries to the same scope.
    pub fn merge(&mut self, other: ImportMap) {
        self.imports.extend(other.imports);
        for (scope, entries) in other.scopes {
            self.scopes.entry(scope).or_default().extend(entries);
        }
    }

    /// Resolve `specifier` as imported from `source`.
    ///
    /// Lookup order: the innermost scope covering `source`, then the
    /// top-level entries, then plain URL rules (absolute URL as-is,
    /// `.`/`/`-prefixed specifiers joined onto `source`). A specifier that
    /// matches none of these is a bare specifier and fails.
    pub fn resolve(&self, source: &Url, specifier: &str) -> Result<Url, ResolveError> {
        let matched = self
            .scope_for(source)
            .and_then(|entries| longest_match(entries, specifier))
            .or_else(|| longest_match(&self.imports, specifier));

        if let Some((prefix, target)) = matched {
            let expanded = format!("{}{}", target, &specifier[prefix.len()..]);
            return Url::parse(&expanded).map_err(|source| ResolveError::InvalidTarget {
                specifier: specifier.to_string(),
                target: expanded,
                source,
            });
        }

        if let Ok(url) = Url::parse(specifier) {
            return Ok(url);
        }

        if specifier.starts_with('.') || specifier.starts_with('/') {
            return source
                .join(specifier)
                .map_err(|err| ResolveError::InvalidRelative {
                    specifier: specifier.to_string(),
                    referrer: source.to_string(),
                    source: err,
                });
        }

        Err(ResolveError::BareSpecifier {
            specifier: specifier.to_string(),
            referrer: source.to_string(),
        })
    }

    /// The entries of the longest scope whose prefix covers `source`.
    ///
    /// Only that one scope is consulted; if it has no entry for a given
    /// specifier the lookup falls through to the top-level entries, never
    /// to a shorter enclosing scope.
    fn scope_for(&self, source: &Url) -> Option<&BTreeMap<String, String>> {
        let source = source.as_str();
        self.scopes
            .iter()
            .filter(|(prefix, _)| source.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, entries)| entries)
    }
}

/// Find the entry with the longest key matching `specifier`.
///
/// An exact key is the longest possible match by construction. Otherwise
/// only `/`-terminated keys participate, matching as prefixes.
fn longest_match<'a>(
    entries: &'a BTreeMap<String, String>,
    specifier: &str,
) -> Option<(&'a str, &'a str)> {
    if let Some((key, target)) = entries.get_key_value(specifier) {
        return Some((key.as_str(), target.as_str()));
    }
    entries
        .iter()
        .filter(|(key, _)| key.ends_with('/') && specifier.starts_with(key.as_str()))
        .max_by_key(|(key, _)| key.len())
        .map(|(key, target)| (key.as_str(), target.as_str()))
}
