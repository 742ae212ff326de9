use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;
use url::Url;

use weft_core::diagnostics::{DiagnosticClass, LoadEvent};
use weft_core::graph::LibrarySources;
use weft_core::program::ProgramBuilder;
use weft_core::store::CompilerHost;

fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, text).unwrap();
    path
}

/// A local stand-in for the CDN library sources, stocked with the lib
/// files the default compiler options ask for.
fn lib_sources(temp: &TempDir) -> LibrarySources {
    let dir = temp.path().join("libs");
    for name in ["es2020", "es2022", "esnext", "dom"] {
        write(
            &dir,
            &format!("lib.{name}.d.ts"),
            "declare const globalThis: any;\n",
        );
    }
    let base = Url::from_directory_path(&dir).unwrap();
    LibrarySources::new(base.clone(), base)
}

fn builder(temp: &TempDir, root: &Path) -> ProgramBuilder {
    ProgramBuilder::new(root)
        .library_sources(lib_sources(temp))
        .cache_dir(temp.path().join("cache"))
}

fn library_loads(events: &[LoadEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            LoadEvent::LibraryLoaded { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn build_loads_entries_and_default_libraries() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(&root, "src/main.ts", "import { u } from \"./util.ts\";\nexport const m = u;\n");
    write(&root, "src/util.ts", "export const u = 1;\n");

    let program = builder(&temp, &root)
        .entry("src/main.ts")
        .build()
        .await
        .unwrap();

    assert_eq!(program.entry_paths().len(), 1);
    assert!(program.entry_paths()[0].ends_with("src/main.ts"));

    let store = program.store();
    let util_path = program.entry_paths()[0].replace("main.ts", "util.ts");
    assert!(store.read(&util_path).is_some());

    // Default options pull es2022 and dom in before the entries.
    let libs = library_loads(&program.events());
    assert!(libs.contains(&"es2022".to_string()));
    assert!(libs.contains(&"dom".to_string()));
}

#[tokio::test]
async fn exports_field_supplies_entries() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(&root, "weft.json", "{\"exports\": \"./src/main.ts\"}");
    write(&root, "src/main.ts", "export const m = 1;\n");

    let program = builder(&temp, &root).build().await.unwrap();

    assert_eq!(program.entry_paths().len(), 1);
    assert!(program.entry_paths()[0].ends_with("src/main.ts"));
}

#[tokio::test]
async fn exports_map_supplies_every_target() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(
        &root,
        "weft.json",
        "{\"exports\": {\".\": \"./src/a.ts\", \"./b\": \"./src/b.ts\"}}",
    );
    write(&root, "src/a.ts", "export const a = 1;\n");
    write(&root, "src/b.ts", "export const b = 2;\n");

    let program = builder(&temp, &root).build().await.unwrap();

    let paths = program.entry_paths();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().any(|p| p.ends_with("a.ts")));
    assert!(paths.iter().any(|p| p.ends_with("b.ts")));
}

#[tokio::test]
async fn caller_options_override_the_config_file() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(&root, "weft.json", "{\"compilerOptions\": {\"target\": \"es2020\"}}");
    write(&root, "src/main.ts", "export const m = 1;\n");

    let overrides = json!({"target": "esnext"}).as_object().cloned().unwrap();
    let program = builder(&temp, &root)
        .entry("src/main.ts")
        .compiler_options(overrides)
        .build()
        .await
        .unwrap();

    assert_eq!(program.options()["target"], json!("esnext"));
    // Untouched defaults survive the merges.
    assert_eq!(program.options()["strict"], json!(true));
    // The effective target's library is pulled in alongside the defaults.
    assert!(library_loads(&program.events()).contains(&"esnext".to_string()));
}

#[tokio::test]
async fn config_file_options_override_defaults() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(
        &root,
        "weft.json",
        "{\"compilerOptions\": {\"target\": \"es2020\", \"lib\": [\"es2020\"]}}",
    );
    write(&root, "src/main.ts", "export const m = 1;\n");

    let program = builder(&temp, &root)
        .entry("src/main.ts")
        .build()
        .await
        .unwrap();

    assert_eq!(program.options()["target"], json!("es2020"));
    assert_eq!(library_loads(&program.events()), vec!["es2020".to_string()]);
}

#[tokio::test]
async fn malformed_config_falls_back_to_defaults() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(&root, "weft.json", "not json at all {{{");
    write(&root, "src/main.ts", "export const m = 1;\n");

    let program = builder(&temp, &root)
        .entry("src/main.ts")
        .build()
        .await
        .unwrap();

    assert_eq!(program.options()["target"], json!("es2022"));
}

#[tokio::test]
async fn entry_glob_expands_against_the_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(&root, "src/a.ts", "export const a = 1;\n");
    write(&root, "src/b.ts", "export const b = 2;\n");
    write(&root, "src/notes.md", "not a module\n");

    let program = builder(&temp, &root)
        .entry_glob("src/*.ts")
        .build()
        .await
        .unwrap();

    let paths = program.entry_paths();
    assert_eq!(paths.len(), 2);
    assert!(paths.iter().any(|p| p.ends_with("a.ts")));
    assert!(paths.iter().any(|p| p.ends_with("b.ts")));
}

#[tokio::test]
async fn missing_entry_fails_the_build() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    std::fs::create_dir_all(&root).unwrap();

    let result = builder(&temp, &root).entry("src/nope.ts").build().await;

    let err = result.err().unwrap();
    assert!(format!("{err:#}").contains("Failed to load entry"));
}

#[tokio::test]
async fn empty_entry_set_fails_the_build() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    std::fs::create_dir_all(&root).unwrap();

    let result = builder(&temp, &root).build().await;

    let err = result.err().unwrap();
    assert!(format!("{err:#}").contains("No entry points"));
}

#[tokio::test]
async fn broken_dependency_does_not_fail_the_build() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(&root, "src/main.ts", "import \"./gone.ts\";\nexport const m = 1;\n");

    let program = builder(&temp, &root)
        .entry("src/main.ts")
        .build()
        .await
        .unwrap();

    let skipped = program
        .events()
        .iter()
        .any(|event| matches!(event, LoadEvent::SpecifierSkipped { specifier, .. } if specifier == "./gone.ts"));
    assert!(skipped);
}

#[tokio::test]
async fn classify_partitions_paths_by_origin() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(&root, "src/main.ts", "export const m = 1;\n");

    let program = builder(&temp, &root)
        .entry("src/main.ts")
        .build()
        .await
        .unwrap();

    assert_eq!(
        program.classify(&program.entry_paths()[0]),
        DiagnosticClass::User
    );

    let lib_path = program
        .events()
        .iter()
        .find_map(|event| match event {
            LoadEvent::LibraryLoaded { virtual_path, .. } => Some(virtual_path.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(program.classify(&lib_path), DiagnosticClass::Library);

    assert_eq!(
        program.classify("/https/esm.sh/react@18/index.js"),
        DiagnosticClass::Dependency
    );
}

#[tokio::test]
async fn host_serves_loaded_modules() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    write(&root, "src/main.ts", "export const m = 1;\n");

    let program = builder(&temp, &root)
        .entry("src/main.ts")
        .build()
        .await
        .unwrap();

    let host = program.host();
    let entry = &program.entry_paths()[0];
    assert!(host.file_exists(entry));
    let file = host.source_file(entry, &serde_json::Value::Null).unwrap();
    assert!(file.text.contains("export const m"));
    assert!(host.read_file("/nowhere/else.ts").is_none());
}

#[tokio::test]
async fn config_import_map_wins_over_caller_map() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("project");
    let from_config = write(&root, "vendor/config_x.ts", "export const x = \"config\";\n");
    let from_caller = write(&root, "vendor/caller_x.ts", "export const x = \"caller\";\n");
    write(
        &root,
        "weft.json",
        &format!(
            "{{\"imports\": {{\"x\": \"{}\"}}}}",
            Url::from_file_path(&from_config).unwrap()
        ),
    );
    write(&root, "src/main.ts", "import { x } from \"x\";\nexport const m = x;\n");

    let mut caller_map = weft_core::importmap::ImportMap::new();
    caller_map.imports.insert(
        "x".to_string(),
        Url::from_file_path(&from_caller).unwrap().to_string(),
    );

    let program = builder(&temp, &root)
        .entry("src/main.ts")
        .import_map(caller_map)
        .build()
        .await
        .unwrap();

    let store = program.store();
    let entry_text = store.read(&program.entry_paths()[0]).unwrap();
    assert!(entry_text.contains("config_x.ts"));
    assert!(!entry_text.contains("caller_x.ts"));
}
