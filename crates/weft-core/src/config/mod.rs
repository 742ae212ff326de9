//! Project configuration (`weft.json`).
//!
//! A missing or malformed file never fails a build; defaults substitute
//! and the problem is logged.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::importmap::ImportMap;

/// Name of the configuration file discovered under the project root.
pub const CONFIG_FILE: &str = "weft.json";

/// Contents of a `weft.json` file. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    /// Shallow-merged over built-in defaults; the file wins per key.
    pub compiler_options: Map<String, Value>,
    /// Top-level `imports` and `scopes` keys form the file's import map.
    #[serde(flatten)]
    pub import_map: ImportMap,
    /// Additional entry points: one specifier or a name-to-specifier map.
    pub exports: Option<ExportsField>,
}

/// The `exports` field accepts a single entry point or a mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportsField {
    Single(String),
    Map(BTreeMap<String, String>),
}

impl ProjectConfig {
    /// Entry points contributed by the `exports` field, in stable order.
    pub fn export_entries(&self) -> Vec<String> {
        match &self.exports {
            Some(ExportsField::Single(entry)) => vec![entry.clone()],
            Some(ExportsField::Map(map)) => map.values().cloned().collect(),
            None => Vec::new(),
        }
    }
}

/// Read and parse a configuration file.
pub fn load(path: &Path) -> anyhow::Result<ProjectConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load a configuration file, substituting defaults when it is missing
/// or malformed.
pub fn load_or_default(path: &Path) -> ProjectConfig {
    if !path.exists() {
        debug!(path = %path.display(), "no project configuration, using defaults");
        return ProjectConfig::default();
    }
    match load(path) {
        Ok(config) => config,
        Err(err) => {
            warn!(path = %path.display(), "ignoring malformed configuration: {err:#}");
            ProjectConfig::default()
        }
    }
}

/// Built-in compiler options applied beneath any overrides.
pub fn default_compiler_options() -> Map<String, Value> {
    let defaults = json!({
        "target": "es2022",
        "lib": ["es2022", "dom"],
        "module": "esnext",
        "moduleResolution": "bundler",
        "allowJs": true,
        "strict": true,
        "noEmit": true,
    });
    defaults.as_object().cloned().unwrap_or_default()
}

/// Shallow-merge `over` on top of `base`; `over` wins per key.
pub fn merge_compiler_options(base: &mut Map<String, Value>, over: &Map<String, Value>) {
    for (key, value) in over {
        base.insert(key.clone(), value.clone());
    }
}

/// The effective `target`, lower-cased.
pub fn target(options: &Map<String, Value>) -> String {
    options
        .get("target")
        .and_then(Value::as_str)
        .unwrap_or("es2022")
        .to_ascii_lowercase()
}

/// The effective `lib` list, lower-cased. Empty when unset.
pub fn lib_names(options: &Map<String, Value>) -> Vec<String> {
    options
        .get("lib")
        .and_then(Value::as_array)
        .map(|libs| {
            libs.iter()
                .filter_map(Value::as_str)
                .map(str::to_ascii_lowercase)
                .collect()
        })
        .unwrap_or_default()
}
