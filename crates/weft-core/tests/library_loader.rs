use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use url::Url;

use weft_core::diagnostics::{EventLog, LoadEvent};
use weft_core::fetch::{FetchCache, Fetcher};
use weft_core::graph::{LibrarySources, ModuleLoader, lib_file_name};
use weft_core::importmap::ImportMap;
use weft_core::store::{ModuleStore, virtual_path};

fn write_lib(dir: &Path, file: &str, text: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(file), text).unwrap();
}

fn new_loader(
    temp: &TempDir,
    sources: LibrarySources,
) -> (Arc<ModuleLoader>, Arc<ModuleStore>, Arc<EventLog>) {
    let store = Arc::new(ModuleStore::new());
    let fetcher = Fetcher::new(FetchCache::new(temp.path().join("cache"))).unwrap();
    let events = Arc::new(EventLog::new());

    let mut loader = ModuleLoader::new(Arc::clone(&store), fetcher, ImportMap::new(), sources);
    loader.add_observer(Arc::clone(&events));

    (Arc::new(loader), store, events)
}

fn sources_for(temp: &TempDir) -> (LibrarySources, Url, Url) {
    let primary = Url::from_directory_path(temp.path().join("primary")).unwrap();
    let fallback = Url::from_directory_path(temp.path().join("fallback")).unwrap();
    (
        LibrarySources::new(primary.clone(), fallback.clone()),
        primary,
        fallback,
    )
}

#[tokio::test]
async fn primary_source_serves_the_library() {
    let temp = TempDir::new().unwrap();
    let (sources, primary, _) = sources_for(&temp);
    write_lib(
        &temp.path().join("primary"),
        "lib.es2022.d.ts",
        "declare const es2022: true;\n",
    );

    let (loader, store, events) = new_loader(&temp, sources);
    loader.load_library("es2022").await;

    let path = virtual_path(&primary.join("lib.es2022.d.ts").unwrap());
    assert_eq!(store.read(&path).unwrap(), "declare const es2022: true;\n");
    assert!(
        events
            .snapshot()
            .iter()
            .any(|event| matches!(event, LoadEvent::LibraryLoaded { name, .. } if name == "es2022"))
    );
}

#[tokio::test]
async fn fallback_content_lands_under_the_primary_path() {
    let temp = TempDir::new().unwrap();
    let (sources, primary, _) = sources_for(&temp);
    write_lib(
        &temp.path().join("fallback"),
        "lib.dom.d.ts",
        "declare const dom: true;\n",
    );

    let (loader, store, events) = new_loader(&temp, sources);
    loader.load_library("dom").await;

    // Consumers never learn which source answered.
    let path = virtual_path(&primary.join("lib.dom.d.ts").unwrap());
    assert_eq!(store.read(&path).unwrap(), "declare const dom: true;\n");
    assert!(
        events
            .snapshot()
            .iter()
            .any(|event| matches!(event, LoadEvent::LibraryLoaded { name, .. } if name == "dom"))
    );
}

#[tokio::test]
async fn missing_everywhere_records_an_event_and_nothing_more() {
    let temp = TempDir::new().unwrap();
    let (sources, _, _) = sources_for(&temp);

    let (loader, _, events) = new_loader(&temp, sources);
    loader.load_library("webworker").await;

    let snapshot = events.snapshot();
    assert!(
        snapshot
            .iter()
            .any(|event| matches!(event, LoadEvent::LibraryMissing { name, .. } if name == "webworker"))
    );
    assert!(
        !snapshot
            .iter()
            .any(|event| matches!(event, LoadEvent::LibraryLoaded { .. }))
    );
}

#[tokio::test]
async fn library_names_are_normalized_to_file_names() {
    let temp = TempDir::new().unwrap();
    let (sources, primary, _) = sources_for(&temp);
    write_lib(
        &temp.path().join("primary"),
        "lib.es2022.d.ts",
        "declare const es2022: true;\n",
    );

    let (loader, store, _) = new_loader(&temp, sources);
    loader.load_library("ES2022").await;

    assert_eq!(lib_file_name("ES2022"), "lib.es2022.d.ts");
    let path = virtual_path(&primary.join("lib.es2022.d.ts").unwrap());
    assert!(store.read(&path).is_some());
}

#[tokio::test]
async fn repeated_loads_resolve_from_the_store() {
    let temp = TempDir::new().unwrap();
    let (sources, _, _) = sources_for(&temp);
    write_lib(
        &temp.path().join("primary"),
        "lib.es2022.d.ts",
        "declare const es2022: true;\n",
    );

    let (loader, _, events) = new_loader(&temp, sources);
    loader.load_library("es2022").await;
    loader.load_library("es2022").await;

    let loaded = events
        .snapshot()
        .iter()
        .filter(|event| matches!(event, LoadEvent::LibraryLoaded { .. }))
        .count();
    assert_eq!(loaded, 1);
}

#[tokio::test]
async fn library_references_pull_in_sibling_libraries() {
    let temp = TempDir::new().unwrap();
    let (sources, primary, _) = sources_for(&temp);
    write_lib(
        &temp.path().join("primary"),
        "lib.es2022.d.ts",
        "/// <reference lib=\"es2021\" />\ndeclare const es2022: true;\n",
    );
    write_lib(
        &temp.path().join("primary"),
        "lib.es2021.d.ts",
        "declare const es2021: true;\n",
    );

    let (loader, store, _) = new_loader(&temp, sources);
    loader.load_library("es2022").await;

    let sibling = virtual_path(&primary.join("lib.es2021.d.ts").unwrap());
    assert!(store.read(&sibling).is_some());
}
