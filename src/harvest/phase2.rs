//! Phase-2 scheduler: prioritized candidate selection and a bounded
//! enrichment pool.

use crate::Result;
use crate::api::GithubClient;
use crate::config::Config;
use crate::harvest::enrichment::EnrichmentWorker;
use crate::harvest::progress::phase_bar;
use crate::harvest::shutdown::Shutdown;
use crate::store::{CandidateFilter, Store};
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;

const LOG_TARGET: &str = "    phase2";

/// Aggregate result of an enrichment run.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnrichmentOutcome {
    pub candidates: usize,
    pub enriched: usize,
    pub failed: usize,
}

/// Select eligible repositories from the store and enrich them on a bounded
/// pool. A single worker's failure is counted, never propagated to siblings.
pub async fn run(client: &Arc<GithubClient>, store: &Arc<dyn Store>, config: &Config, shutdown: &Arc<Shutdown>) -> Result<EnrichmentOutcome> {
    let cutoff = Utc::now() - chrono::Duration::days(i64::from(config.enrichment.max_age_years) * 365);
    let filter = CandidateFilter {
        min_stars: config.enrichment.min_stars,
        created_after: cutoff,
        skip_forks: config.enrichment.skip_forks,
        limit: config.enrichment.max_repos,
    };

    let candidates = store.enrichment_candidates(&filter)?;
    let mut outcome = EnrichmentOutcome {
        candidates: candidates.len(),
        ..Default::default()
    };

    log::info!(target: LOG_TARGET, "{} repositories selected for enrichment", candidates.len());
    if candidates.is_empty() {
        return Ok(outcome);
    }

    let worker = EnrichmentWorker::new(Arc::clone(client), Arc::clone(store), config.enrichment.readme_excerpt_chars);
    let worker = &worker;
    let bar = phase_bar(candidates.len() as u64, "enrich");

    let mut results = futures::stream::iter(candidates)
        .take_while(|_| futures::future::ready(!shutdown.is_requested()))
        .map(|candidate| async move {
            let full_name = candidate.full_name.clone();
            let result = worker.run(&candidate).await;
            (full_name, result)
        })
        .buffer_unordered(config.enrichment.workers);

    while let Some((full_name, result)) = results.next().await {
        match result {
            Ok(_) => outcome.enriched += 1,
            Err(e) => {
                outcome.failed += 1;
                log::warn!(target: LOG_TARGET, "enrichment of '{full_name}' failed: {e:#}");
            }
        }
        bar.inc(1);
    }

    bar.finish_and_clear();
    log::info!(
        target: LOG_TARGET,
        "enrichment complete: {} enriched, {} failed of {} selected",
        outcome.enriched,
        outcome.failed,
        outcome.candidates
    );

    Ok(outcome)
}
