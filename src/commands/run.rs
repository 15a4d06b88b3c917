//! The discovery and enrichment commands.

use crate::commands::Common;
use owo_colors::OwoColorize;
use repo_harvest::Result;
use repo_harvest::harvest::{DiscoveryOutcome, EnrichmentOutcome, phase1, phase2};

/// Run phase 1 only: collect basic repository records.
pub async fn run_discovery(common: &Common) -> Result<()> {
    let outcome = phase1::run(&common.client, &common.store, &common.config, &common.shutdown).await?;
    print_discovery_summary(&outcome);
    print_quota(common);
    Ok(())
}

/// Run phase 2 only: enrich previously discovered repositories.
pub async fn run_enrichment(common: &Common) -> Result<()> {
    let outcome = phase2::run(&common.client, &common.store, &common.config, &common.shutdown).await?;
    print_enrichment_summary(&outcome);
    print_quota(common);
    Ok(())
}

/// Run discovery then enrichment. An interrupt during discovery skips
/// enrichment but still reports what was flushed.
pub async fn run_all(common: &Common) -> Result<()> {
    let discovered = phase1::run(&common.client, &common.store, &common.config, &common.shutdown).await?;
    print_discovery_summary(&discovered);

    if common.shutdown.is_requested() {
        println!("{}", "interrupted, skipping enrichment".yellow());
        print_quota(common);
        return Ok(());
    }

    let enriched = phase2::run(&common.client, &common.store, &common.config, &common.shutdown).await?;
    print_enrichment_summary(&enriched);
    print_quota(common);
    Ok(())
}

fn print_discovery_summary(outcome: &DiscoveryOutcome) {
    println!("{}", "Discovery complete".green().bold());
    println!("  facet tasks:    {}", outcome.tasks);
    println!("  discovered:     {}", outcome.discovered);
    println!("  saved:          {}", outcome.saved);
    if outcome.skipped_tasks > 0 {
        println!("  tasks skipped:  {}", outcome.skipped_tasks.to_string().yellow());
    }
}

fn print_enrichment_summary(outcome: &EnrichmentOutcome) {
    println!("{}", "Enrichment complete".green().bold());
    println!("  selected:       {}", outcome.candidates);
    println!("  enriched:       {}", outcome.enriched);
    if outcome.failed > 0 {
        println!("  failed:         {}", outcome.failed.to_string().yellow());
    }
}

fn print_quota(common: &Common) {
    println!("  quota left:     {}", common.client.pool().remaining_total());
}
