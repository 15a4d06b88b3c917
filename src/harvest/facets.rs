//! Partitioning of the search space into bounded discovery tasks.
//!
//! The search API truncates any single query to a fixed maximum result
//! depth, so a broad target population has to be split into many narrow
//! queries: one per file-type/language pair plus one per topic.

use crate::config::Config;
use chrono::{NaiveDate, Utc};

/// One bounded search dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facet {
    /// Repositories containing a file with this name, optionally narrowed to
    /// a single language.
    File { name: String, language: Option<String> },

    /// Repositories carrying a topic label.
    Topic { topic: String },
}

/// Immutable description of one bounded search. Created by the phase-1
/// scheduler, consumed by exactly one worker.
#[derive(Debug, Clone)]
pub struct DiscoveryTask {
    pub facet: Facet,
    pub ceiling: usize,
    pub min_stars: u64,
    pub created_after: NaiveDate,
    pub exclude_forks: bool,
}

impl DiscoveryTask {
    /// Conjoined search expression for this task. The recency sort travels as
    /// a separate query parameter.
    #[must_use]
    pub fn query(&self) -> String {
        let mut parts = Vec::new();

        match &self.facet {
            Facet::File { name, language } => {
                parts.push(format!("filename:{name}"));
                if let Some(language) = language {
                    parts.push(format!("language:{language}"));
                }
            }
            Facet::Topic { topic } => parts.push(format!("topic:{topic}")),
        }

        if self.min_stars > 0 {
            parts.push(format!("stars:>={}", self.min_stars));
        }
        parts.push(format!("created:>={}", self.created_after.format("%Y-%m-%d")));
        if self.exclude_forks {
            parts.push("fork:false".to_string());
        }

        parts.join(" ")
    }

    /// Short label for logs and progress display.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.facet {
            Facet::File {
                name,
                language: Some(language),
            } => format!("{name}/{language}"),
            Facet::File { name, language: None } => name.clone(),
            Facet::Topic { topic } => format!("topic:{topic}"),
        }
    }

    /// The facet filename, when this task searches by file.
    #[must_use]
    pub fn found_file(&self) -> Option<&str> {
        match &self.facet {
            Facet::File { name, .. } => Some(name),
            Facet::Topic { .. } => None,
        }
    }
}

/// Expand the configured facet lists into independent discovery tasks: the
/// cartesian product of file types and languages, plus one task per topic.
#[must_use]
pub fn partition(config: &Config) -> Vec<DiscoveryTask> {
    let discovery = &config.discovery;
    let created_after = (Utc::now() - chrono::Duration::days(i64::from(discovery.max_age_years) * 365)).date_naive();

    let task = |facet: Facet| DiscoveryTask {
        facet,
        ceiling: discovery.max_repos_per_task,
        min_stars: discovery.min_stars,
        created_after,
        exclude_forks: discovery.exclude_forks,
    };

    let mut tasks = Vec::new();
    for file_type in &discovery.file_types {
        if discovery.languages.is_empty() {
            tasks.push(task(Facet::File {
                name: file_type.clone(),
                language: None,
            }));
        } else {
            for language in &discovery.languages {
                tasks.push(task(Facet::File {
                    name: file_type.clone(),
                    language: Some(language.clone()),
                }));
            }
        }
    }
    for topic in &discovery.topics {
        tasks.push(task(Facet::Topic { topic: topic.clone() }));
    }

    tasks
}
