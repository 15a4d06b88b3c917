//! Persisted entity types shared between the engine and storage backends.

use crate::api::models::SearchItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A repository row as written by the basic discovery phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRecord {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: Option<String>,
    pub clone_url: Option<String>,
    pub ssh_url: Option<String>,
    pub size: u64,
    pub stargazers: u64,
    pub watchers: u64,
    pub forks: u64,
    pub open_issues: u64,
    pub language: Option<String>,
    pub topics: Vec<String>,
    pub has_issues: bool,
    pub has_wiki: bool,
    pub has_pages: bool,
    pub has_downloads: bool,
    pub archived: bool,
    pub disabled: bool,
    pub fork: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub owner_login: Option<String>,
    pub owner_id: Option<i64>,
    pub owner_type: Option<String>,
    pub default_branch: Option<String>,
    pub license_key: Option<String>,
    pub license_name: Option<String>,
    pub visibility: Option<String>,
    pub private: bool,
    pub is_template: bool,

    /// Facet filename that surfaced this repository, for file facets.
    pub found_file: Option<String>,

    pub basic_completed: bool,
    pub basic_completed_at: Option<DateTime<Utc>>,
}

impl RepoRecord {
    /// Build a basic record from a search hit, stamping the basic completion
    /// marker.
    #[must_use]
    pub fn from_search(item: SearchItem, found_file: Option<&str>) -> Self {
        let (owner_login, owner_id, owner_type) = match item.owner {
            Some(owner) => (Some(owner.login), Some(owner.id), owner.kind),
            None => (None, None, None),
        };
        let (license_key, license_name) = match item.license {
            Some(license) => (license.key, license.name),
            None => (None, None),
        };

        Self {
            id: item.id,
            name: item.name,
            full_name: item.full_name,
            description: item.description,
            html_url: item.html_url,
            clone_url: item.clone_url,
            ssh_url: item.ssh_url,
            size: item.size,
            stargazers: item.stargazers_count,
            watchers: item.watchers_count,
            forks: item.forks_count,
            open_issues: item.open_issues_count,
            language: item.language,
            topics: item.topics,
            has_issues: item.has_issues,
            has_wiki: item.has_wiki,
            has_pages: item.has_pages,
            has_downloads: item.has_downloads,
            archived: item.archived,
            disabled: item.disabled,
            fork: item.fork,
            created_at: item.created_at,
            updated_at: item.updated_at,
            pushed_at: item.pushed_at,
            owner_login,
            owner_id,
            owner_type,
            default_branch: item.default_branch,
            license_key,
            license_name,
            visibility: item.visibility,
            private: item.private,
            is_template: item.is_template,
            found_file: found_file.map(ToString::to_string),
            basic_completed: true,
            basic_completed_at: Some(Utc::now()),
        }
    }
}

/// One language's slice of a repository's code.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LanguageShare {
    pub bytes: u64,
    pub percentage: f64,
}

/// Partial update produced by the enrichment phase. Absent fields are left
/// untouched in the stored row.
#[derive(Debug, Clone)]
pub struct DetailUpdate {
    pub main_language: Option<String>,
    pub language_stats: Option<BTreeMap<String, LanguageShare>>,
    pub total_code_bytes: Option<u64>,
    pub contributors_count: Option<u64>,
    pub top_contributor: Option<String>,
    pub commits_count: Option<u64>,
    pub branches_count: Option<u64>,
    pub releases_count: Option<u64>,
    pub latest_release_tag: Option<String>,
    pub readme_excerpt: Option<String>,
    pub readme_sensitive_hits: Option<u64>,
    pub detail_completed_at: DateTime<Utc>,
}

impl DetailUpdate {
    /// An update carrying only the completion marker. Fields are filled in by
    /// whichever sub-fetches succeed.
    #[must_use]
    pub fn new(detail_completed_at: DateTime<Utc>) -> Self {
        Self {
            main_language: None,
            language_stats: None,
            total_code_bytes: None,
            contributors_count: None,
            top_contributor: None,
            commits_count: None,
            branches_count: None,
            releases_count: None,
            latest_release_tag: None,
            readme_excerpt: None,
            readme_sensitive_hits: None,
            detail_completed_at,
        }
    }
}

/// A row eligible for enrichment.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: i64,
    pub full_name: String,
    pub stargazers: u64,
}

/// Selection criteria for enrichment candidates.
#[derive(Debug, Clone)]
pub struct CandidateFilter {
    pub min_stars: u64,
    pub created_after: DateTime<Utc>,
    pub skip_forks: bool,
    pub limit: usize,
}

/// A facet file recorded against a repository at discovery time.
#[derive(Debug, Clone)]
pub struct FoundFile {
    pub repository_id: i64,
    pub filename: String,
    pub is_config_file: bool,
    pub is_secret_file: bool,
    pub detected_at: DateTime<Utc>,
}

/// Aggregate database statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreCounts {
    pub total: u64,
    pub basic_completed: u64,
    pub detail_completed: u64,
    pub non_forks: u64,
    pub avg_stars: f64,
    pub max_stars: u64,
    pub distinct_languages: u64,
    pub distinct_owners: u64,
    pub found_files: u64,
    pub secret_files: u64,
}
