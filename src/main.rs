//! A two-phase harvester for GitHub repository metadata.
//!
//! # Overview
//!
//! `repo-harvest` collects metadata about repositories through the GitHub
//! search API and stores it durably in SQLite. It works in two phases over
//! the same population:
//!
//! - **Discovery** runs many narrow, bounded searches (file-type/language
//!   pairs and topics), deduplicates the hits, and bulk-upserts basic
//!   records.
//! - **Enrichment** selects the most interesting discovered repositories
//!   (by stars and recency) and fetches per-repo detail: language byte
//!   breakdowns, contributors, activity counts, and a readme excerpt.
//!
//! Progress survives restarts: completion markers in the database are the
//! only resumability state, so a re-run picks up exactly where the last one
//! stopped.
//!
//! # Quick Start
//!
//! ```bash
//! export GITHUB_TOKEN=ghp_xxxxxxxxxxxxxxxxxxxx
//! repo-harvest run
//! ```
//!
//! Run a single phase:
//!
//! ```bash
//! repo-harvest discover          # basic collection only
//! repo-harvest enrich            # detail enrichment only
//! ```
//!
//! Inspect what has been collected so far:
//!
//! ```bash
//! repo-harvest stats
//! ```
//!
//! # Credentials
//!
//! Tokens come from `--token`/`GITHUB_TOKEN`, a comma-separated
//! `--tokens`/`GITHUB_TOKENS` list, or the config file. With several tokens
//! the harvester rotates to whichever has the most quota headroom and blocks
//! until the earliest reset when all are exhausted. With no token at all it
//! degrades to anonymous access (60 requests/hour).
//!
//! # Configuration
//!
//! Settings load from `harvest.[toml|yml|yaml|json]` in the working
//! directory, or a file named with `--config`. Generate a commented default
//! file with:
//!
//! ```bash
//! repo-harvest init
//! ```
//!
//! # Interruption
//!
//! Ctrl-C stops new work from starting, lets in-flight requests finish, and
//! flushes any accumulated batch before exiting; nothing already collected
//! is lost.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Args, Parser, Subcommand};
use repo_harvest::Result;
use repo_harvest::store::SqliteStore;
use std::path::PathBuf;

mod commands;

use crate::commands::{Common, CommonArgs, init_config, run_all, run_discovery, run_enrichment, show_stats};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "repo-harvest", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run discovery then enrichment
    Run(Box<CommonArgs>),
    /// Phase 1 only: collect basic repository records
    Discover(Box<CommonArgs>),
    /// Phase 2 only: enrich selected repositories with detail data
    Enrich(Box<CommonArgs>),
    /// Show statistics for an existing harvest database
    Stats(StatsArgs),
    /// Write a default configuration file
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Path to the SQLite database
    #[arg(long, value_name = "PATH", default_value = "harvest.db")]
    db: PathBuf,
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Where to write the configuration file
    #[arg(value_name = "PATH", default_value = "harvest.toml")]
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command {
        Command::Run(args) => {
            let common = Common::new(&args)?;
            run_all(&common).await
        }
        Command::Discover(args) => {
            let common = Common::new(&args)?;
            run_discovery(&common).await
        }
        Command::Enrich(args) => {
            let common = Common::new(&args)?;
            run_enrichment(&common).await
        }
        Command::Stats(args) => {
            let store = SqliteStore::open(&args.db)?;
            show_stats(&store, &args.db)
        }
        Command::Init(args) => init_config(&args.path),
    }
}
