//! # content-sync CLI (`csync`)
//!
//! ## Usage
//!
//! ```bash
//! csync [--config ./csync.toml] [--verbose] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csync init` | Create the SQLite database and schema |
//! | `csync sync` | Import posts into the configured store |
//! | `csync get <key>` | Print one stored record (SQLite store) |
//!
//! ## Examples
//!
//! ```bash
//! # Import ./drafts into SQLite and move files to ./published
//! csync sync
//!
//! # CI: import the posts touched by the current pull request into Couchbase
//! COUCHBASE_URL=http://db:8093 COUCHBASE_USERNAME=ci COUCHBASE_PASSWORD=... \
//!   COUCHBASE_BUCKET=blog csync sync --strategy changes --json
//!
//! # Check what would be imported
//! csync sync --dry-run
//! ```
//!
//! Exit status is 0 when every document was imported and 1 when any document
//! failed, the batch aborted, or configuration/discovery failed.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

use content_sync::config::{self, Config, Strategy};
use content_sync::progress::ProgressMode;
use content_sync::store::SqliteStore;
use content_sync::{get, ingest, logging};

const DEFAULT_CONFIG: &str = "./csync.toml";

/// content-sync: import Markdown posts with frontmatter into a document store.
#[derive(Parser)]
#[command(name = "csync", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./csync.toml`, which may be absent. A path given here
    /// must exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging on stderr (ignored when RUST_LOG is set).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the SQLite database and schema. Idempotent.
    Init,

    /// Import posts into the store.
    ///
    /// Every candidate is processed in order: parse frontmatter, derive the
    /// document id, upsert the record, optionally embed, then move
    /// directory-sourced files to the destination directory. A failing
    /// document is reported and the batch continues unless --fail-fast.
    Sync {
        /// Discovery strategy.
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,

        /// Drafts directory (directory strategy).
        #[arg(long)]
        source_dir: Option<PathBuf>,

        /// Published directory (directory strategy).
        #[arg(long)]
        dest_dir: Option<PathBuf>,

        /// Compute and store an embedding per document.
        #[arg(long, overrides_with = "no_embed")]
        embed: bool,

        /// Skip embeddings even if enabled in config.
        #[arg(long, overrides_with = "embed")]
        no_embed: bool,

        /// Stop after the first failed document.
        #[arg(long)]
        fail_fast: bool,

        /// Parse and validate only; write nothing and move nothing.
        #[arg(long)]
        dry_run: bool,

        /// Print the summary as JSON.
        #[arg(long)]
        json: bool,

        /// Progress on stderr. Default: human when stderr is a TTY, else off.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print the record stored at KEY (SQLite store only).
    Get {
        /// Record key, e.g. `blog_hello-world_1705276800000` or
        /// `embedding::blog_hello-world_1705276800000`.
        key: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn load(path: Option<&Path>) -> Result<Config> {
    let mut cfg = match path {
        Some(path) => config::load_config(path, true)?,
        None => config::load_config(Path::new(DEFAULT_CONFIG), false)?,
    };
    cfg.apply_env(|key| std::env::var(key).ok())?;
    Ok(cfg)
}

async fn run(cli: Cli) -> Result<i32> {
    let mut cfg = load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            if cfg.store.backend != "sqlite" {
                bail!(
                    "init only applies to the sqlite store (configured: {})",
                    cfg.store.backend
                );
            }
            let store = SqliteStore::open(&cfg.store.path).await?;
            let records = store.count(None).await?;
            store.close().await;
            println!(
                "Database initialized: {} ({} records)",
                cfg.store.path.display(),
                records
            );
            Ok(0)
        }
        Commands::Sync {
            strategy,
            source_dir,
            dest_dir,
            embed,
            no_embed,
            fail_fast,
            dry_run,
            json,
            progress,
        } => {
            if let Some(strategy) = strategy {
                cfg.source.strategy = strategy;
            }
            if let Some(dir) = source_dir {
                cfg.source.source_dir = dir;
            }
            if let Some(dir) = dest_dir {
                cfg.source.dest_dir = dir;
            }
            if embed {
                cfg.pipeline.embeddings = true;
            }
            if no_embed {
                cfg.pipeline.embeddings = false;
            }
            if fail_fast {
                cfg.pipeline.fail_fast = true;
            }
            if dry_run {
                cfg.pipeline.dry_run = true;
            }

            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let report = ingest::run_sync(&cfg, mode.reporter()).await?;

            let mut out = std::io::stdout().lock();
            if json {
                report.write_json(&mut out)?;
            } else {
                report.write_human(&mut out)?;
            }
            out.flush()?;
            Ok(if report.is_success() { 0 } else { 1 })
        }
        Commands::Get { key } => {
            get::run_get(&cfg.store, &key).await?;
            Ok(0)
        }
    }
}
