//! Phase-1 scheduler: facet partitioning, a bounded discovery pool, and
//! batched bulk upserts.

use crate::Result;
use crate::api::GithubClient;
use crate::config::Config;
use crate::harvest::discovery::DiscoveryWorker;
use crate::harvest::facets;
use crate::harvest::progress::phase_bar;
use crate::harvest::seen::SeenSet;
use crate::harvest::shutdown::Shutdown;
use crate::scan;
use crate::store::{FoundFile, RepoRecord, Store};
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;

const LOG_TARGET: &str = "    phase1";

/// Aggregate result of a discovery run.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryOutcome {
    pub tasks: usize,
    pub discovered: usize,
    pub saved: usize,
    pub skipped_tasks: usize,
}

/// Run every discovery task on a bounded pool, accumulating results into
/// batches and flushing them to the store. One failed task is logged and
/// counted, never fatal to its siblings; an interrupt stops new submissions
/// and still flushes whatever accumulated.
pub async fn run(client: &Arc<GithubClient>, store: &Arc<dyn Store>, config: &Config, shutdown: &Arc<Shutdown>) -> Result<DiscoveryOutcome> {
    let tasks = facets::partition(config);
    let mut outcome = DiscoveryOutcome {
        tasks: tasks.len(),
        ..Default::default()
    };

    log::info!(target: LOG_TARGET, "starting discovery over {} facet tasks", tasks.len());

    let seen = Arc::new(SeenSet::default());
    let worker = DiscoveryWorker::new(Arc::clone(client), Arc::clone(&seen), config);
    let worker = &worker;
    let bar = phase_bar(tasks.len() as u64, "discover");

    let mut results = futures::stream::iter(tasks)
        .take_while(|_| futures::future::ready(!shutdown.is_requested()))
        .map(|task| async move {
            let label = task.label();
            let result = worker.run(&task).await;
            (label, result)
        })
        .buffer_unordered(config.discovery.workers);

    let mut batch: Vec<RepoRecord> = Vec::new();
    while let Some((label, result)) = results.next().await {
        match result {
            Ok(records) => {
                log::info!(target: LOG_TARGET, "task '{label}' discovered {} repositories", records.len());
                outcome.discovered += records.len();
                batch.extend(records);
                if batch.len() >= config.batch_size {
                    outcome.saved += flush(store.as_ref(), &mut batch)?;
                }
            }
            Err(e) => {
                outcome.skipped_tasks += 1;
                log::warn!(target: LOG_TARGET, "task '{label}' skipped: {e:#}");
            }
        }
        bar.inc(1);
    }
    drop(results);

    outcome.saved += flush(store.as_ref(), &mut batch)?;
    bar.finish_and_clear();

    log::info!(
        target: LOG_TARGET,
        "discovery complete: {} discovered, {} saved, {} of {} tasks skipped",
        outcome.discovered,
        outcome.saved,
        outcome.skipped_tasks,
        outcome.tasks
    );

    Ok(outcome)
}

/// Bulk-upsert the accumulated batch and its facet-file sightings, then clear
/// the batch.
fn flush(store: &dyn Store, batch: &mut Vec<RepoRecord>) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }

    let files: Vec<FoundFile> = batch
        .iter()
        .filter_map(|record| {
            record.found_file.as_ref().map(|name| FoundFile {
                repository_id: record.id,
                filename: name.clone(),
                is_config_file: scan::is_config_file(name),
                is_secret_file: scan::is_secret_file(name),
                detected_at: Utc::now(),
            })
        })
        .collect();

    let saved = store.bulk_upsert(batch)?;
    let _ = store.record_found_files(&files)?;
    log::debug!(target: LOG_TARGET, "flushed {saved} repositories");

    batch.clear();
    Ok(saved)
}
