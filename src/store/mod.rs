//! Persistence boundary for harvested repositories.
//!
//! The engine is written against the [`Store`] trait so storage backends can
//! be swapped without touching the harvesting logic. Uniqueness on the GitHub
//! id plus the completion markers are the durable guarantees: a restarted run
//! re-derives remaining work purely by querying the markers.

pub mod entity;
pub mod sqlite;

pub use entity::{Candidate, CandidateFilter, DetailUpdate, FoundFile, LanguageShare, RepoRecord, StoreCounts};
pub use sqlite::SqliteStore;

use crate::Result;

/// Capability set every storage backend must provide.
pub trait Store: Send + Sync {
    /// Insert-or-update records keyed on the GitHub id. An update widens the
    /// basic attribute set and completion marker but never touches detail
    /// fields. Returns the number of rows written.
    fn bulk_upsert(&self, records: &[RepoRecord]) -> Result<usize>;

    /// Record facet files observed for repositories. Duplicate sightings of
    /// the same (repository, filename) pair are ignored.
    fn record_found_files(&self, files: &[FoundFile]) -> Result<usize>;

    /// Apply a partial detail update, setting only the fields present plus
    /// the detail completion marker. Never clears basic fields.
    fn apply_details(&self, id: i64, update: &DetailUpdate) -> Result<usize>;

    /// Rows eligible for enrichment: basic-completed, not detail-completed,
    /// above the star threshold, young enough, optionally not forks; ordered
    /// by stars descending then recency descending, bounded by the limit.
    fn enrichment_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Candidate>>;

    /// Aggregate statistics over everything stored.
    fn counts(&self) -> Result<StoreCounts>;

    /// Most common primary languages with their row counts.
    fn top_languages(&self, limit: usize) -> Result<Vec<(String, u64)>>;
}
