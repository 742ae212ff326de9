//! Weft - module graph resolver
//!
//! Usage:
//!   weft build ./src/main.ts     # Load a module graph into the store
//!   weft resolve <specifier>     # Resolve one specifier by hand
//!   weft cache stats             # Inspect the fetch cache
//!   weft cache clear             # Drop cached responses

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use weft_core::diagnostics::LoadEvent;
use weft_core::fetch::FetchCache;
use weft_core::importmap::ImportMap;
use weft_core::program::{Program, ProgramBuilder};
use weft_core::store::virtual_path;

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Module graph resolver and virtual filesystem builder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a module graph from one or more entry points
    Build(BuildArgs),

    /// Resolve a single specifier against the import map
    Resolve {
        /// The specifier to resolve (bare, relative, or absolute)
        specifier: String,

        /// Source URL the specifier appears in (defaults to the root)
        #[arg(long)]
        from: Option<String>,

        /// Import map file merged over the project configuration
        #[arg(long)]
        import_map: Option<PathBuf>,

        /// Project root directory
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Manage the durable fetch cache
    Cache(CacheArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Entry points: URLs or root-relative paths
    entries: Vec<String>,

    /// Project root directory
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Glob pattern for additional entries, relative to the root
    #[arg(long)]
    glob: Option<String>,

    /// Configuration file (defaults to weft.json under the root)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Import map file applied beneath the project configuration
    #[arg(long)]
    import_map: Option<PathBuf>,

    /// Fetch cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct CacheArgs {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand)]
enum CacheSubcommand {
    /// Show entry count and total size
    Stats {
        /// Cache directory (defaults to the user cache directory)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every cached response
    Clear {
        /// Cache directory (defaults to the user cache directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
    /// Only show issues (non-zero exit if problems)
    Quiet,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weft=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => run_build(args).await?,
        Commands::Resolve {
            specifier,
            from,
            import_map,
            root,
            format,
        } => run_resolve(specifier, from, import_map, root, format)?,
        Commands::Cache(args) => run_cache(args)?,
    }

    Ok(())
}

async fn run_build(args: BuildArgs) -> Result<()> {
    let mut builder = ProgramBuilder::new(&args.root).entries(args.entries);
    if let Some(pattern) = args.glob {
        builder = builder.entry_glob(pattern);
    }
    if let Some(config) = args.config {
        builder = builder.config_path(config);
    }
    if let Some(dir) = args.cache_dir {
        builder = builder.cache_dir(dir);
    }
    if let Some(path) = args.import_map {
        builder = builder.import_map(read_import_map(&path)?);
    }

    let program = builder.build().await?;
    info!(modules = program.store().len(), "build complete");

    match args.format {
        OutputFormat::Table => print_build_table(&program),
        OutputFormat::Json => print_build_json(&program)?,
        OutputFormat::Quiet => {
            let issues = count_issues(&program.events());
            if issues > 0 {
                println!("{issues} issues found");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn read_import_map(path: &PathBuf) -> Result<ImportMap> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import map {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse import map {}", path.display()))
}

fn print_build_table(program: &Program) {
    let store = program.store();
    println!(
        "Loaded {} modules from {} entries",
        store.len(),
        program.entry_paths().len()
    );
    println!();

    println!("Entries:");
    for path in program.entry_paths() {
        println!("  {path}");
    }

    let mut issues = 0;
    for event in program.events() {
        match event {
            LoadEvent::SpecifierSkipped {
                specifier,
                referrer,
                reason,
            } => {
                issues += 1;
                println!("  ⚠ {specifier} (from {referrer}): {reason}");
            }
            LoadEvent::LibraryMissing { name, .. } => {
                issues += 1;
                println!("  ⚠ library '{name}' unavailable");
            }
            _ => {}
        }
    }

    println!();
    if issues > 0 {
        println!("Summary: {} modules, {} issues", store.len(), issues);
    } else {
        println!("Summary: {} modules, all OK", store.len());
    }
}

fn print_build_json(program: &Program) -> Result<()> {
    let store = program.store();
    let output = serde_json::json!({
        "schema_version": 1,
        "root": program.root(),
        "entries": program.entry_paths(),
        "modules": store.paths(),
        "events": program.events(),
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn count_issues(events: &[LoadEvent]) -> usize {
    events
        .iter()
        .filter(|event| {
            matches!(
                event,
                LoadEvent::SpecifierSkipped { .. } | LoadEvent::LibraryMissing { .. }
            )
        })
        .count()
}

fn run_resolve(
    specifier: String,
    from: Option<String>,
    import_map: Option<PathBuf>,
    root: PathBuf,
    format: OutputFormat,
) -> Result<()> {
    let root = root.canonicalize().unwrap_or(root);

    // Same precedence as a build: the configuration file wins over the
    // map passed on the command line.
    let mut map = match import_map {
        Some(path) => read_import_map(&path)?,
        None => ImportMap::new(),
    };
    let config = weft_core::config::load_or_default(&root.join(weft_core::config::CONFIG_FILE));
    map.merge(config.import_map);

    let source = match from {
        Some(url) => Url::parse(&url).with_context(|| format!("Invalid --from URL '{url}'"))?,
        None => Url::from_directory_path(&root)
            .map_err(|_| anyhow::anyhow!("Project root is not an absolute directory"))?,
    };

    match map.resolve(&source, &specifier) {
        Ok(url) => match format {
            OutputFormat::Table => {
                println!("{:<15} {}", "URL:", url);
                println!("{:<15} {}", "Virtual path:", virtual_path(&url));
            }
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "specifier": specifier,
                    "source": source,
                    "url": url,
                    "virtual_path": virtual_path(&url),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Quiet => {}
        },
        Err(err) => bail!("Cannot resolve '{specifier}': {err}"),
    }

    Ok(())
}

fn run_cache(args: CacheArgs) -> Result<()> {
    match args.command {
        CacheSubcommand::Stats { dir, format } => {
            let cache = FetchCache::new(dir.unwrap_or_else(FetchCache::default_dir));
            let stats = cache.stats()?;

            match format {
                OutputFormat::Table => {
                    println!("Cache directory: {}", cache.dir().display());
                    println!("Entries: {}", stats.entries);
                    println!("Size: {} bytes", stats.bytes);
                }
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "dir": cache.dir(),
                        "entries": stats.entries,
                        "bytes": stats.bytes,
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Quiet => {}
            }
        }
        CacheSubcommand::Clear { dir } => {
            let cache = FetchCache::new(dir.unwrap_or_else(FetchCache::default_dir));
            let removed = cache.clear()?;
            println!("✓ Removed {removed} cached responses");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn build_with_entries_parses() {
        let args = ["weft", "build", "./src/main.ts", "./src/worker.ts"];

        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok(), "CLI parsing should succeed");
    }

    #[test]
    fn build_with_all_flags_parses() {
        let args = [
            "weft",
            "build",
            "./src/main.ts",
            "--root",
            "/tmp/project",
            "--glob",
            "src/**/*.ts",
            "--config",
            "alt.json",
            "--import-map",
            "map.json",
            "--cache-dir",
            "/tmp/cache",
            "--format",
            "json",
        ];

        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok(), "CLI parsing should succeed");
    }

    #[test]
    fn resolve_parses() {
        let args = [
            "weft",
            "resolve",
            "lodash",
            "--from",
            "file:///proj/src/main.ts",
        ];

        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok(), "CLI parsing should succeed");
    }

    #[test]
    fn cache_stats_parses() {
        let args = ["weft", "cache", "stats", "--format", "json"];

        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok(), "CLI parsing should succeed");
    }

    #[test]
    fn cache_clear_with_dir_parses() {
        let args = ["weft", "cache", "clear", "--dir", "/tmp/weft-cache"];

        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok(), "CLI parsing should succeed");
    }

    #[test]
    fn build_without_entries_still_parses() {
        // Entries may come from the configuration's exports field.
        let args = ["weft", "build"];

        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok(), "CLI parsing should succeed");
    }
}
