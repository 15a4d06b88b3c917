//! Enrichment worker: four best-effort detail fetches per repository merged
//! into one idempotent partial update.

use crate::Result;
use crate::api::models::{Contributor, Readme, Release};
use crate::api::{Fetch, GithubClient};
use crate::scan;
use crate::store::{Candidate, DetailUpdate, LanguageShare, Store};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use serde::de::IgnoredAny;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const LOG_TARGET: &str = "    enrich";

/// Enriches one previously discovered repository with detail data.
pub struct EnrichmentWorker {
    client: Arc<GithubClient>,
    store: Arc<dyn Store>,
    readme_budget: usize,
}

impl core::fmt::Debug for EnrichmentWorker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EnrichmentWorker")
            .field("client", &self.client)
            .field("store", &"<dyn Store>")
            .field("readme_budget", &self.readme_budget)
            .finish()
    }
}

/// Byte-weighted language breakdown of one repository.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageBreakdown {
    pub main_language: String,
    pub total_bytes: u64,
    pub shares: BTreeMap<String, LanguageShare>,
}

struct Activity {
    commits: Option<u64>,
    branches: Option<u64>,
    releases: Option<u64>,
    latest_release_tag: Option<String>,
}

impl EnrichmentWorker {
    #[must_use]
    pub fn new(client: Arc<GithubClient>, store: Arc<dyn Store>, readme_budget: usize) -> Self {
        Self {
            client,
            store,
            readme_budget,
        }
    }

    /// Enrich one repository and write the merged partial update.
    ///
    /// Each sub-fetch is independently best-effort; a fetch that fails or
    /// returns nothing simply omits its fields. The update is written even
    /// when every fetch came back empty, so a repository with dead detail
    /// endpoints is not re-selected forever.
    pub async fn run(&self, candidate: &Candidate) -> Result<usize> {
        let full_name = &candidate.full_name;
        log::debug!(target: LOG_TARGET, "enriching '{full_name}'");

        let (languages, contributors, activity, readme) = tokio::join!(
            self.fetch_languages(full_name),
            self.fetch_contributors(full_name),
            self.fetch_activity(full_name),
            self.fetch_readme(full_name),
        );

        let mut update = DetailUpdate::new(Utc::now());

        if let Some(breakdown) = languages {
            update.main_language = Some(breakdown.main_language);
            update.total_code_bytes = Some(breakdown.total_bytes);
            update.language_stats = Some(breakdown.shares);
        }
        if let Some((count, top)) = contributors {
            update.contributors_count = Some(count);
            update.top_contributor = top;
        }
        if let Some(activity) = activity {
            update.commits_count = activity.commits;
            update.branches_count = activity.branches;
            update.releases_count = activity.releases;
            update.latest_release_tag = activity.latest_release_tag;
        }
        if let Some(excerpt) = readme {
            update.readme_sensitive_hits = u64::try_from(scan::sensitive_hits(&excerpt)).ok();
            update.readme_excerpt = Some(excerpt);
        }

        let rows = self.store.apply_details(candidate.id, &update)?;
        if rows == 0 {
            log::warn!(target: LOG_TARGET, "no row updated for '{full_name}'");
        }
        Ok(rows)
    }

    async fn fetch_languages(&self, full_name: &str) -> Option<LanguageBreakdown> {
        let path = format!("repos/{full_name}/languages");
        match self.client.get_json::<HashMap<String, u64>>(&path, &[]).await {
            Ok(Fetch::Found(bytes_by_language)) => language_breakdown(&bytes_by_language),
            Ok(Fetch::NotFound) => None,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "languages fetch failed for '{full_name}': {e:#}");
                None
            }
        }
    }

    async fn fetch_contributors(&self, full_name: &str) -> Option<(u64, Option<String>)> {
        let path = format!("repos/{full_name}/contributors");
        match self.client.get_json::<Vec<Contributor>>(&path, &[("per_page", "100".to_string())]).await {
            Ok(Fetch::Found(contributors)) if !contributors.is_empty() => {
                // Remote ordering by contribution count is trusted, not recomputed.
                let top = contributors.first().and_then(|c| c.login.clone());
                Some((contributors.len() as u64, top))
            }
            Ok(_) => None,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "contributors fetch failed for '{full_name}': {e:#}");
                None
            }
        }
    }

    /// Commit count is approximated from the last-page number of a one-item
    /// page; when the server omits pagination links the literal item count is
    /// used, which undercounts. A best-effort metric, not an exact one.
    async fn fetch_activity(&self, full_name: &str) -> Option<Activity> {
        let commits = match self
            .client
            .get_json_with_last_page::<Vec<IgnoredAny>>(&format!("repos/{full_name}/commits"), &[("per_page", "1".to_string())])
            .await
        {
            Ok(Fetch::Found((items, last_page))) => last_page.or(Some(items.len() as u64)),
            Ok(Fetch::NotFound) => None,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "commits fetch failed for '{full_name}': {e:#}");
                None
            }
        };

        let branches = match self
            .client
            .get_json::<Vec<IgnoredAny>>(&format!("repos/{full_name}/branches"), &[("per_page", "100".to_string())])
            .await
        {
            Ok(Fetch::Found(items)) => Some(items.len() as u64),
            Ok(Fetch::NotFound) => None,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "branches fetch failed for '{full_name}': {e:#}");
                None
            }
        };

        let (releases, latest_release_tag) = match self
            .client
            .get_json::<Vec<Release>>(&format!("repos/{full_name}/releases"), &[("per_page", "100".to_string())])
            .await
        {
            Ok(Fetch::Found(releases)) => {
                let latest = releases.first().and_then(|r| r.tag_name.clone());
                (Some(releases.len() as u64), latest)
            }
            Ok(Fetch::NotFound) => (None, None),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "releases fetch failed for '{full_name}': {e:#}");
                (None, None)
            }
        };

        if commits.is_none() && branches.is_none() && releases.is_none() {
            return None;
        }

        Some(Activity {
            commits,
            branches,
            releases,
            latest_release_tag,
        })
    }

    async fn fetch_readme(&self, full_name: &str) -> Option<String> {
        let path = format!("repos/{full_name}/readme");
        match self.client.get_json::<Readme>(&path, &[]).await {
            Ok(Fetch::Found(readme)) => decode_readme(&readme.content, self.readme_budget),
            Ok(Fetch::NotFound) => None,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "readme fetch failed for '{full_name}': {e:#}");
                None
            }
        }
    }
}

/// Derive the byte-weighted language breakdown. The main language is the
/// arg-max by bytes; percentages are rounded to two decimals.
#[must_use]
pub fn language_breakdown(bytes_by_language: &HashMap<String, u64>) -> Option<LanguageBreakdown> {
    let total_bytes: u64 = bytes_by_language.values().sum();
    if total_bytes == 0 {
        return None;
    }

    let main_language = bytes_by_language
        .iter()
        .max_by_key(|(_, bytes)| **bytes)
        .map(|(language, _)| language.clone())?;

    #[expect(clippy::cast_precision_loss, reason = "byte counts are far below 2^52")]
    let shares = bytes_by_language
        .iter()
        .map(|(language, bytes)| {
            let percentage = (*bytes as f64 / total_bytes as f64) * 100.0;
            (
                language.clone(),
                LanguageShare {
                    bytes: *bytes,
                    percentage: (percentage * 100.0).round() / 100.0,
                },
            )
        })
        .collect();

    Some(LanguageBreakdown {
        main_language,
        total_bytes,
        shares,
    })
}

/// Decode a transport-encoded readme and truncate it to the character budget.
#[must_use]
pub fn decode_readme(content: &str, budget: usize) -> Option<String> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let decoded = BASE64.decode(compact.as_bytes()).ok()?;
    let text = String::from_utf8_lossy(&decoded);
    let excerpt: String = text.chars().take(budget).collect();

    if excerpt.is_empty() { None } else { Some(excerpt) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakdown_picks_arg_max_and_sums_to_hundred() {
        let mut bytes = HashMap::new();
        let _ = bytes.insert("A".to_string(), 300);
        let _ = bytes.insert("B".to_string(), 100);

        let breakdown = language_breakdown(&bytes).unwrap();
        assert_eq!(breakdown.main_language, "A");
        assert_eq!(breakdown.total_bytes, 400);

        let a = breakdown.shares.get("A").unwrap();
        let b = breakdown.shares.get("B").unwrap();
        assert!((a.percentage - 75.0).abs() < 1e-9);
        assert!((b.percentage - 25.0).abs() < 1e-9);
        assert!((a.percentage + b.percentage - 100.0).abs() < 0.01);
        assert_eq!(a.bytes, 300);
    }

    #[test]
    fn breakdown_of_nothing_is_none() {
        assert!(language_breakdown(&HashMap::new()).is_none());

        let mut zeroed = HashMap::new();
        let _ = zeroed.insert("A".to_string(), 0);
        assert!(language_breakdown(&zeroed).is_none());
    }

    #[test]
    fn breakdown_rounds_to_two_decimals() {
        let mut bytes = HashMap::new();
        let _ = bytes.insert("A".to_string(), 1);
        let _ = bytes.insert("B".to_string(), 2);

        let breakdown = language_breakdown(&bytes).unwrap();
        assert!((breakdown.shares.get("A").unwrap().percentage - 33.33).abs() < 1e-9);
        assert!((breakdown.shares.get("B").unwrap().percentage - 66.67).abs() < 1e-9);
    }

    #[test]
    fn readme_decodes_transport_encoding() {
        // "# Hello\nworld" encoded with the line wrapping the API uses.
        let encoded = "IyBIZWxs\nbwp3b3Js\nZA==\n";
        assert_eq!(decode_readme(encoded, 1000).unwrap(), "# Hello\nworld");
    }

    #[test]
    fn readme_is_truncated_to_budget() {
        let encoded = BASE64.encode("abcdefghij");
        assert_eq!(decode_readme(&encoded, 4).unwrap(), "abcd");
    }

    #[test]
    fn empty_or_garbage_readme_is_none() {
        assert!(decode_readme("", 100).is_none());
        assert!(decode_readme("   \n ", 100).is_none());
        assert!(decode_readme("!!!not-base64!!!", 100).is_none());
    }
}
