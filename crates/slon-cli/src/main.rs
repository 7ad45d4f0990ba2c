//! SLON command line
//!
//! # Usage
//! ```bash
//! slon --database net.db insert "program | A"
//! slon --database net.db insert "* | * & js | () => {}" --under "program | A"
//! slon --database net.db find "* | *" --under "program | *"
//! slon --database net.db --json show
//! ```

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use slon_core::{CascadePolicy, Context, Entry, NodeTerm, Slon, SlonConfig, Topology};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Database used when neither `--config` nor `--database` is given
const DEFAULT_DATABASE: &str = "slon.db";

/// SLON - Semantically-loose object network
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the configuration)
    #[arg(short, long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// At most one context per entry; inserts fan out over parents
    #[arg(long, global = true)]
    tree: bool,

    /// Refuse to delete entries that others use as context
    #[arg(long, global = true)]
    reject: bool,

    /// Print JSON projections instead of display ids
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a node, e.g. "step | 1" or "step | 1 & js | x"
    Insert {
        node: String,

        /// Path from top level to the parents
        #[arg(long = "under", value_name = "PATTERN")]
        under: Vec<String>,
    },

    /// Find entries matching a pattern
    Find {
        pattern: String,

        /// Path from top level to the context
        #[arg(long = "under", value_name = "PATTERN")]
        under: Vec<String>,
    },

    /// Delete entries matching a pattern
    Delete {
        pattern: String,

        /// Path from top level to the context
        #[arg(long = "under", value_name = "PATTERN")]
        under: Vec<String>,
    },

    /// Follow a chain of patterns from top level
    Path {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// List every entry
    Show,

    /// Row counts
    Stats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    let slon = Slon::open(load_config(&cli)?).context("Opening SLON store")?;

    match &cli.command {
        Commands::Insert { node, under } => {
            let context = resolve_context(&slon, under)?;
            let inserted = slon.insert(parse(node)?, context)?;
            print_entries(&inserted, cli.json)?;
        }
        Commands::Find { pattern, under } => {
            let context = resolve_context(&slon, under)?;
            let found = slon.find(parse(pattern)?, context)?;
            print_entries(&found, cli.json)?;
        }
        Commands::Delete { pattern, under } => {
            let context = resolve_context(&slon, under)?;
            let removed = slon.delete(parse(pattern)?, context)?;
            print_entries(&removed, cli.json)?;
        }
        Commands::Path { patterns } => {
            let terms = patterns.iter().map(|p| parse(p)).collect::<anyhow::Result<Vec<_>>>()?;
            let found = slon.path(terms)?;
            print_entries(&found, cli.json)?;
        }
        Commands::Show => {
            let all = slon.entries().collect::<slon_core::Result<Vec<_>>>()?;
            print_entries(&all, cli.json)?;
        }
        Commands::Stats => {
            let stats = slon.stats()?;
            if cli.json {
                println!("{}", serde_json::to_string(&stats)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<SlonConfig> {
    let mut config = match &cli.config {
        Some(path) => SlonConfig::from_file(path)
            .with_context(|| format!("Loading configuration from {}", path.display()))?,
        None => SlonConfig::new().with_database(DEFAULT_DATABASE),
    };

    if let Some(database) = &cli.database {
        config = config.with_database(database);
    }
    if cli.tree {
        config = config.with_topology(Topology::Tree);
    }
    if cli.reject {
        config = config.with_cascade(CascadePolicy::Reject);
    }
    Ok(config)
}

fn parse(text: &str) -> anyhow::Result<NodeTerm> {
    NodeTerm::parse(text).with_context(|| format!("Invalid pattern {text:?}"))
}

/// `--under a --under b` means the matches of `b` under the matches of `a`
fn resolve_context(slon: &Slon, under: &[String]) -> anyhow::Result<Context> {
    if under.is_empty() {
        return Ok(Context::Top);
    }
    let terms = under.iter().map(|p| parse(p)).collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Context::from(slon.path(terms)?))
}

fn print_entries(entries: &[Entry], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else {
        for entry in entries {
            println!("{entry}");
        }
    }
    Ok(())
}
