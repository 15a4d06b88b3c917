//! Command implementations for the CLI.

mod common;
mod init;
mod run;
mod stats;

pub use common::{Common, CommonArgs, LogLevel};
pub use init::init_config;
pub use run::{run_all, run_discovery, run_enrichment};
pub use stats::show_stats;
