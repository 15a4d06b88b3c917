//! The two-phase harvesting engine.
//!
//! Phase 1 partitions the facet space into bounded discovery tasks and bulk
//! upserts basic records; phase 2 selects a prioritized subset and enriches
//! it with detail calls. Both phases run on bounded worker pools over the
//! shared rate-limited client.

pub mod discovery;
pub mod enrichment;
pub mod facets;
pub mod phase1;
pub mod phase2;
pub mod progress;
pub mod seen;
pub mod shutdown;

pub use phase1::DiscoveryOutcome;
pub use phase2::EnrichmentOutcome;
pub use shutdown::Shutdown;
