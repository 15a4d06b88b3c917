//! Configuration surface for the harvesting engine.

mod config;

pub use config::{Config, DEFAULT_CONFIG_TOML, DiscoveryConfig, EnrichmentConfig};
