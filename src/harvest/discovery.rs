//! Discovery worker: one bounded, paced, deduplicated search per task.

use crate::Result;
use crate::api::models::SearchResponse;
use crate::api::{Fetch, GithubClient};
use crate::config::Config;
use crate::harvest::facets::DiscoveryTask;
use crate::harvest::seen::SeenSet;
use crate::store::RepoRecord;
use core::time::Duration;
use std::sync::Arc;

const LOG_TARGET: &str = " discovery";

/// The search API truncates any single query to this many results.
const SEARCH_DEPTH_LIMIT: u32 = 1000;

/// Executes one [`DiscoveryTask`], paging until exhaustion, the task ceiling,
/// or the API's result depth ceiling.
#[derive(Debug)]
pub struct DiscoveryWorker {
    client: Arc<GithubClient>,
    seen: Arc<SeenSet>,
    per_page: u32,
    page_pace: Duration,
}

impl DiscoveryWorker {
    #[must_use]
    pub fn new(client: Arc<GithubClient>, seen: Arc<SeenSet>, config: &Config) -> Self {
        Self {
            client,
            seen,
            per_page: config.per_page.clamp(1, 100),
            page_pace: config.page_pace(),
        }
    }

    /// Run the task to completion, returning the basic records it discovered.
    ///
    /// Items race through the shared seen-set before counting toward the
    /// ceiling, so two workers on overlapping facets never double-count one
    /// repository; the store's upsert absorbs the case where both still
    /// discover it.
    pub async fn run(&self, task: &DiscoveryTask) -> Result<Vec<RepoRecord>> {
        let query = task.query();
        let max_pages = (SEARCH_DEPTH_LIMIT / self.per_page).max(1);
        let mut records = Vec::new();

        log::debug!(target: LOG_TARGET, "searching '{query}'");

        for page in 1..=max_pages {
            let params = [
                ("q", query.clone()),
                ("sort", "updated".to_string()),
                ("order", "desc".to_string()),
                ("per_page", self.per_page.to_string()),
                ("page", page.to_string()),
            ];

            let response = self.client.get_json::<SearchResponse>("search/repositories", &params).await?;
            let Some(body) = response.ok() else {
                break;
            };
            if body.items.is_empty() {
                break;
            }

            let page_len = body.items.len();
            for item in body.items {
                if !self.seen.first_sighting(item.id) {
                    continue;
                }
                records.push(RepoRecord::from_search(item, task.found_file()));
                if records.len() >= task.ceiling {
                    log::debug!(target: LOG_TARGET, "task '{}' hit its ceiling of {}", task.label(), task.ceiling);
                    return Ok(records);
                }
            }

            // A short page means the result set is exhausted.
            if page_len < self.per_page as usize {
                break;
            }

            if page < max_pages {
                tokio::time::sleep(self.page_pace).await;
            }
        }

        Ok(records)
    }
}
