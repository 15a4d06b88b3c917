//! Shared setup for the harvesting commands: logging, configuration,
//! credentials, client, and store.

use clap::Args;
use clap::ValueEnum;
use core::time::Duration;
use repo_harvest::Result;
use repo_harvest::api::{CredentialPool, GithubClient, RetryPolicy};
use repo_harvest::config::Config;
use repo_harvest::harvest::Shutdown;
use repo_harvest::store::{SqliteStore, Store};
use std::path::PathBuf;
use std::sync::Arc;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

/// Common arguments shared between the harvesting commands
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Comma-separated list of GitHub tokens to rotate across
    #[arg(long, value_name = "TOKENS", env = "GITHUB_TOKENS", hide_env_values = true, value_delimiter = ',')]
    pub tokens: Vec<String>,

    /// Path to configuration file [default: one of harvest.[toml|yml|yaml|json] ]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database
    #[arg(long, value_name = "PATH", default_value = "harvest.db")]
    pub db: PathBuf,

    /// Base URL of the API, for GitHub Enterprise installations
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

/// Fully wired engine dependencies, built once per invocation.
pub struct Common {
    pub config: Config,
    pub client: Arc<GithubClient>,
    pub store: Arc<dyn Store>,
    pub shutdown: Arc<Shutdown>,
}

impl Common {
    /// Create a new Common processor with logging, config, credentials,
    /// client, and store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store cannot
    /// be opened; these are the only conditions fatal to a run.
    pub fn new(args: &CommonArgs) -> Result<Self> {
        Self::init_logging(args.log_level);

        let (config, warnings) = Config::load(args.config.as_deref())?;
        for warning in &warnings {
            eprintln!("warning: {warning}");
        }

        // Command-line and environment tokens take precedence over the config file.
        let mut tokens: Vec<String> = Vec::new();
        tokens.extend(args.tokens.iter().cloned());
        tokens.extend(args.token.iter().cloned());
        tokens.extend(config.tokens.iter().cloned());
        tokens.retain(|token| !token.is_empty());
        tokens.dedup();

        let pool = Arc::new(CredentialPool::new(&tokens));
        let retry = RetryPolicy {
            max_attempts: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        };
        let client = Arc::new(GithubClient::new(pool, args.api_url.as_deref(), retry)?);
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&args.db)?);
        let shutdown = Shutdown::listen();

        Ok(Self {
            config,
            client,
            store,
            shutdown,
        })
    }

    fn init_logging(log_level: LogLevel) {
        if log_level == LogLevel::None {
            return;
        }

        let level = match log_level {
            LogLevel::None => return, // Already checked above, but being explicit
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        let env = env_logger::Env::default().filter_or("RUST_LOG", level);

        env_logger::Builder::from_env(env).format_timestamp(None).init();
    }
}
