//! Wire-format models for the GitHub REST API.
//!
//! Every field the server may omit carries a serde default so schema drift on
//! the remote side degrades to missing data instead of a parse failure.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of `search/repositories` results.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,

    #[serde(default)]
    pub incomplete_results: bool,

    #[serde(default)]
    pub items: Vec<SearchItem>,
}

/// A repository as returned by the search and repo endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub id: i64,
    pub name: String,
    pub full_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub html_url: Option<String>,

    #[serde(default)]
    pub clone_url: Option<String>,

    #[serde(default)]
    pub ssh_url: Option<String>,

    /// Repository size in kilobytes.
    #[serde(default)]
    pub size: u64,

    #[serde(default)]
    pub stargazers_count: u64,

    #[serde(default)]
    pub watchers_count: u64,

    #[serde(default)]
    pub forks_count: u64,

    #[serde(default)]
    pub open_issues_count: u64,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub has_issues: bool,

    #[serde(default)]
    pub has_wiki: bool,

    #[serde(default)]
    pub has_pages: bool,

    #[serde(default)]
    pub has_downloads: bool,

    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub fork: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub owner: Option<Owner>,

    #[serde(default)]
    pub default_branch: Option<String>,

    #[serde(default)]
    pub license: Option<License>,

    #[serde(default)]
    pub visibility: Option<String>,

    #[serde(default)]
    pub private: bool,

    #[serde(default)]
    pub is_template: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    pub login: String,

    #[serde(default)]
    pub id: i64,

    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct License {
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// One entry of a `/contributors` listing. Anonymous contributors have no login.
#[derive(Debug, Clone, Deserialize)]
pub struct Contributor {
    #[serde(default)]
    pub login: Option<String>,

    #[serde(default)]
    pub contributions: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    #[serde(default)]
    pub tag_name: Option<String>,
}

/// Readme payload; `content` is transport-encoded (base64 with embedded newlines).
#[derive(Debug, Clone, Deserialize)]
pub struct Readme {
    #[serde(default)]
    pub content: String,

    #[serde(default)]
    pub encoding: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_item_parses_with_sparse_fields() {
        let item: SearchItem = serde_json::from_value(json!({
            "id": 42,
            "name": "widget",
            "full_name": "acme/widget"
        }))
        .unwrap();

        assert_eq!(item.id, 42);
        assert_eq!(item.full_name, "acme/widget");
        assert_eq!(item.stargazers_count, 0);
        assert!(item.owner.is_none());
        assert!(item.created_at.is_none());
        assert!(!item.fork);
    }

    #[test]
    fn search_item_parses_full_payload() {
        let item: SearchItem = serde_json::from_value(json!({
            "id": 7,
            "name": "widget",
            "full_name": "acme/widget",
            "description": "a widget",
            "stargazers_count": 120,
            "fork": true,
            "language": "Rust",
            "topics": ["api", "config"],
            "created_at": "2024-03-01T12:00:00Z",
            "owner": {"login": "acme", "id": 9, "type": "Organization"},
            "license": {"key": "mit", "name": "MIT License"}
        }))
        .unwrap();

        assert_eq!(item.stargazers_count, 120);
        assert!(item.fork);
        assert_eq!(item.topics, vec!["api", "config"]);
        assert_eq!(item.owner.as_ref().map(|o| o.login.as_str()), Some("acme"));
        assert_eq!(item.license.as_ref().and_then(|l| l.key.as_deref()), Some("mit"));
        assert_eq!(item.created_at.map(|t| t.timestamp()), Some(1_709_294_400));
    }

    #[test]
    fn contributor_without_login_parses() {
        let contributor: Contributor = serde_json::from_value(json!({"contributions": 3})).unwrap();
        assert!(contributor.login.is_none());
        assert_eq!(contributor.contributions, 3);
    }
}
