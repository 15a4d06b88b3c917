//! Externally-supplied settings: credentials, rate budget, pool sizes,
//! batch sizes, thresholds, and facet lists. Nothing here is hard-coded into
//! the engine; every knob has a default so an empty file is valid.

use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// The default configuration content, embedded from `default_config.toml`.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Configuration files searched in the working directory, in order.
const DEFAULT_CONFIG_FILES: &[&str] = &["harvest.toml", "harvest.yml", "harvest.yaml", "harvest.json"];

/// The search API refuses page sizes above this.
const MAX_PER_PAGE: u32 = 100;

const fn default_requests_per_second() -> f64 {
    1.0
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_base_delay_ms() -> u64 {
    1000
}

const fn default_per_page() -> u32 {
    100
}

const fn default_batch_size() -> usize {
    500
}

fn default_file_types() -> Vec<String> {
    [
        ".env",
        "config.json",
        "config.yml",
        "config.yaml",
        "settings.py",
        "application.properties",
        "secrets.json",
        "credentials.json",
        "docker-compose.yml",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_languages() -> Vec<String> {
    ["Python", "JavaScript", "TypeScript", "Java", "Go", "Rust", "PHP"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_topics() -> Vec<String> {
    ["api", "web", "database", "security", "config", "environment"]
        .iter()
        .map(ToString::to_string)
        .collect()
}

const fn default_discovery_max_age_years() -> u32 {
    5
}

const fn default_discovery_max_repos() -> usize {
    10_000
}

const fn default_true() -> bool {
    true
}

const fn default_discovery_workers() -> usize {
    4
}

const fn default_enrichment_min_stars() -> u64 {
    10
}

const fn default_enrichment_max_age_years() -> u32 {
    5
}

const fn default_enrichment_max_repos() -> usize {
    1000
}

const fn default_enrichment_workers() -> usize {
    8
}

const fn default_readme_excerpt_chars() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// GitHub personal access tokens. Empty means anonymous access.
    #[serde(default)]
    pub tokens: Vec<String>,

    /// Global pacing budget for paginated searches.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    /// Transient-failure retries on top of the original request.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay, doubled per attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Search page size; the server caps this at 100.
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Discovered records accumulated before a bulk upsert.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// File names searched for, one facet each.
    #[serde(default = "default_file_types")]
    pub file_types: Vec<String>,

    /// Languages crossed with each file facet. Empty means no language qualifier.
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Topic labels searched for, one facet each.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    #[serde(default)]
    pub min_stars: u64,

    /// Only repositories created within this many years are collected.
    #[serde(default = "default_discovery_max_age_years")]
    pub max_age_years: u32,

    /// Result ceiling per discovery task.
    #[serde(default = "default_discovery_max_repos")]
    pub max_repos_per_task: usize,

    #[serde(default = "default_true")]
    pub exclude_forks: bool,

    /// Concurrent discovery tasks.
    #[serde(default = "default_discovery_workers")]
    pub workers: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            file_types: default_file_types(),
            languages: default_languages(),
            topics: default_topics(),
            min_stars: 0,
            max_age_years: default_discovery_max_age_years(),
            max_repos_per_task: default_discovery_max_repos(),
            exclude_forks: true,
            workers: default_discovery_workers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichmentConfig {
    /// Only repositories at or above this star count are enriched.
    #[serde(default = "default_enrichment_min_stars")]
    pub min_stars: u64,

    #[serde(default = "default_enrichment_max_age_years")]
    pub max_age_years: u32,

    /// Upper bound on candidates selected per run.
    #[serde(default = "default_enrichment_max_repos")]
    pub max_repos: usize,

    #[serde(default = "default_true")]
    pub skip_forks: bool,

    /// Concurrent enrichment workers.
    #[serde(default = "default_enrichment_workers")]
    pub workers: usize,

    /// Character budget for stored readme excerpts.
    #[serde(default = "default_readme_excerpt_chars")]
    pub readme_excerpt_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            min_stars: default_enrichment_min_stars(),
            max_age_years: default_enrichment_max_age_years(),
            max_repos: default_enrichment_max_repos(),
            skip_forks: true,
            workers: default_enrichment_workers(),
            readme_excerpt_chars: default_readme_excerpt_chars(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tokens: Vec::new(),
            requests_per_second: default_requests_per_second(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            per_page: default_per_page(),
            batch_size: default_batch_size(),
            discovery: DiscoveryConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the given file, or from the first of
    /// `harvest.[toml|yml|yaml|json]` present in the working directory, or
    /// fall back to defaults. Returns the config plus validation warnings.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Vec<String>)> {
        let path = match explicit {
            Some(path) => Some(PathBuf::from(path)),
            None => DEFAULT_CONFIG_FILES.iter().map(PathBuf::from).find(|candidate| candidate.is_file()),
        };

        let config = match path {
            None => Self::default(),
            Some(path) => {
                let contents = fs::read_to_string(&path).into_app_err_with(|| format!("unable to read config file '{}'", path.display()))?;
                Self::parse(&contents, &path)?
            }
        };

        let warnings = config.validate()?;
        Ok((config, warnings))
    }

    /// Parse config contents, dispatching on the file extension.
    fn parse(contents: &str, path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        match extension {
            "toml" => toml::from_str(contents).into_app_err_with(|| format!("invalid TOML in config file '{}'", path.display())),
            "yml" | "yaml" => serde_yaml::from_str(contents).into_app_err_with(|| format!("invalid YAML in config file '{}'", path.display())),
            "json" => serde_json::from_str(contents).into_app_err_with(|| format!("invalid JSON in config file '{}'", path.display())),
            _ => bail!("unsupported config file extension '{extension}' (expected toml, yml, yaml, or json)"),
        }
    }

    /// Reject configurations the engine cannot run with; collect warnings for
    /// the rest.
    fn validate(&self) -> Result<Vec<String>> {
        if self.requests_per_second <= 0.0 {
            bail!("requests_per_second must be positive");
        }
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.per_page == 0 {
            bail!("per_page must be at least 1");
        }
        if self.discovery.workers == 0 || self.enrichment.workers == 0 {
            bail!("worker pool sizes must be at least 1");
        }

        let mut warnings = Vec::new();
        if self.per_page > MAX_PER_PAGE {
            warnings.push(format!("per_page {} exceeds the server maximum of {MAX_PER_PAGE} and will be clamped", self.per_page));
        }
        if self.discovery.file_types.is_empty() && self.discovery.topics.is_empty() {
            warnings.push("no file types or topics configured; discovery will find nothing".to_string());
        }
        if self.enrichment.max_repos == 0 {
            warnings.push("enrichment.max_repos is 0; enrichment will select nothing".to_string());
        }

        Ok(warnings)
    }

    /// Pause between result pages within one worker, derived from the global
    /// requests-per-second budget.
    #[must_use]
    pub fn page_pace(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.requests_per_second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        let warnings = config.validate().unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.per_page, 100);
        assert!((config.page_pace().as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn embedded_default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn toml_overrides_defaults() {
        let config: Config = toml::from_str(
            r#"
            requests_per_second = 2.0
            batch_size = 50

            [discovery]
            file_types = [".env"]
            languages = ["Rust"]
            topics = []
            workers = 2

            [enrichment]
            min_stars = 25
            "#,
        )
        .unwrap();

        assert!((config.requests_per_second - 2.0).abs() < 1e-9);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.discovery.file_types, vec![".env"]);
        assert_eq!(config.discovery.workers, 2);
        assert_eq!(config.enrichment.min_stars, 25);
        // Untouched sections keep their defaults.
        assert_eq!(config.enrichment.workers, 8);
        assert!((config.page_pace().as_secs_f64() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: core::result::Result<Config, _> = toml::from_str("no_such_knob = 1");
        assert!(result.is_err());
    }

    #[test]
    fn zero_rate_budget_is_rejected() {
        let config: Config = toml::from_str("requests_per_second = 0.0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_are_rejected() {
        let config: Config = toml::from_str("[discovery]\nworkers = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_page_warns() {
        let config: Config = toml::from_str("per_page = 500").unwrap();
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("per_page"));
    }

    #[test]
    fn load_reads_explicit_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.toml");
        fs::write(&path, "batch_size = 7").unwrap();

        let (config, warnings) = Config::load(Some(&path)).unwrap();
        assert_eq!(config.batch_size, 7);
        assert!(warnings.is_empty());
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harvest.ini");
        fs::write(&path, "").unwrap();

        assert!(Config::load(Some(&path)).is_err());
    }
}
