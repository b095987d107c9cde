//! Prism CLI - renders a sample document through the fragment cache.
//!
//! Commands:
//! - `prism render` - Render the sample document and report cache activity

use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use prism_cache::{CacheOptions, MemoryStore};
use prism_render::{locals, JsonTemplate, PartialRegistry};
use serde_json::{json, Value};

/// Prism CLI - Exercise the fragment-cached JSON renderer
#[derive(Parser)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the sample document and report cache activity
    Render(RenderArgs),
}

#[derive(Args)]
struct RenderArgs {
    /// Number of render passes against the same store
    #[arg(long, default_value_t = 2)]
    passes: usize,

    /// Disable fragment caching
    #[arg(long)]
    no_cache: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Render(args) => render(args),
    }
}

fn render(args: RenderArgs) -> Result<()> {
    let mut registry = PartialRegistry::new().with_caching(!args.no_cache);
    registry.register("author", |json, locals| {
        let author = locals.get("author").cloned().unwrap_or(Value::Null);
        json.extract(&author, &["name", "genre"])
    });

    let store = MemoryStore::new();
    let authors = vec![
        json!({"id": 1, "name": "Ada Lovelace", "genre": "notes"}),
        json!({"id": 2, "name": "Grace Hopper", "genre": "manuals"}),
        json!({"id": 3, "name": "Mary Shelley", "genre": "novels"}),
    ];
    let options = || CacheOptions::new().expires_in(Duration::from_secs(300));

    for pass in 1..=args.passes.max(1) {
        let mut json = JsonTemplate::new(&registry).with_store(&store);

        json.set("library", "central")?;
        json.attr("featured")?;
        json.cache("authors/featured", &options(), |json| {
            json.object(|json| json.extract(&authors[0], &["name", "genre"]))
        })?;

        json.attr("authors")?;
        json.cache_collection(&authors, options(), |json, author| {
            json.partial("author", locals(json!({"author": author})))
        })?;

        let stats = json.stats();
        println!("pass {pass}: {}", json.finish());
        println!(
            "  cache: {} hit(s), {} miss(es), {} bypass(es), {} stored",
            stats.hits,
            stats.misses,
            stats.bypasses,
            store.len()
        );
    }

    Ok(())
}
