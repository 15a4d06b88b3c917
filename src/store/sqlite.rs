//! SQLite-backed [`Store`] implementation.
//!
//! The connection sits behind a mutex, so writers are serialized; with WAL
//! journaling and a busy timeout this is safe for many concurrent workers
//! upserting the same ids. All statements go through `ON CONFLICT` upserts or
//! partial updates, so rediscovery is idempotent.

use crate::Result;
use crate::store::entity::{Candidate, CandidateFilter, DetailUpdate, FoundFile, RepoRecord, StoreCounts};
use crate::store::Store;
use core::time::Duration;
use ohno::IntoAppError;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const LOG_TARGET: &str = "     store";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    full_name TEXT NOT NULL,
    description TEXT,
    html_url TEXT,
    clone_url TEXT,
    ssh_url TEXT,
    size INTEGER NOT NULL DEFAULT 0,
    stargazers INTEGER NOT NULL DEFAULT 0,
    watchers INTEGER NOT NULL DEFAULT 0,
    forks INTEGER NOT NULL DEFAULT 0,
    open_issues INTEGER NOT NULL DEFAULT 0,
    language TEXT,
    topics TEXT,
    has_issues INTEGER NOT NULL DEFAULT 0,
    has_wiki INTEGER NOT NULL DEFAULT 0,
    has_pages INTEGER NOT NULL DEFAULT 0,
    has_downloads INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    disabled INTEGER NOT NULL DEFAULT 0,
    fork INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    updated_at TEXT,
    pushed_at TEXT,
    owner_login TEXT,
    owner_id INTEGER,
    owner_type TEXT,
    default_branch TEXT,
    license_key TEXT,
    license_name TEXT,
    visibility TEXT,
    private INTEGER NOT NULL DEFAULT 0,
    is_template INTEGER NOT NULL DEFAULT 0,
    found_file TEXT,
    basic_completed INTEGER NOT NULL DEFAULT 0,
    basic_completed_at TEXT,
    detail_completed INTEGER NOT NULL DEFAULT 0,
    detail_completed_at TEXT,
    main_language TEXT,
    language_stats TEXT,
    total_code_bytes INTEGER,
    contributors_count INTEGER,
    top_contributor TEXT,
    commits_count INTEGER,
    branches_count INTEGER,
    releases_count INTEGER,
    latest_release_tag TEXT,
    readme_excerpt TEXT,
    readme_sensitive_hits INTEGER
);

CREATE INDEX IF NOT EXISTS idx_repositories_enrichment
    ON repositories (detail_completed, stargazers);

CREATE TABLE IF NOT EXISTS found_files (
    repository_id INTEGER NOT NULL,
    filename TEXT NOT NULL,
    is_config_file INTEGER NOT NULL,
    is_secret_file INTEGER NOT NULL,
    detected_at TEXT NOT NULL,
    UNIQUE (repository_id, filename)
);
";

/// The conflict update widens basic attributes and re-stamps the basic
/// marker; detail columns are deliberately untouched so a rediscovery never
/// narrows an enriched row.
const UPSERT_SQL: &str = "
INSERT INTO repositories (
    id, name, full_name, description, html_url, clone_url, ssh_url,
    size, stargazers, watchers, forks, open_issues, language, topics,
    has_issues, has_wiki, has_pages, has_downloads, archived, disabled, fork,
    created_at, updated_at, pushed_at, owner_login, owner_id, owner_type,
    default_branch, license_key, license_name, visibility, private, is_template,
    found_file, basic_completed, basic_completed_at
) VALUES (
    ?1, ?2, ?3, ?4, ?5, ?6, ?7,
    ?8, ?9, ?10, ?11, ?12, ?13, ?14,
    ?15, ?16, ?17, ?18, ?19, ?20, ?21,
    ?22, ?23, ?24, ?25, ?26, ?27,
    ?28, ?29, ?30, ?31, ?32, ?33,
    ?34, 1, ?35
)
ON CONFLICT(id) DO UPDATE SET
    name = excluded.name,
    full_name = excluded.full_name,
    description = excluded.description,
    size = excluded.size,
    stargazers = excluded.stargazers,
    watchers = excluded.watchers,
    forks = excluded.forks,
    open_issues = excluded.open_issues,
    language = excluded.language,
    topics = excluded.topics,
    archived = excluded.archived,
    disabled = excluded.disabled,
    updated_at = excluded.updated_at,
    pushed_at = excluded.pushed_at,
    basic_completed = 1,
    basic_completed_at = excluded.basic_completed_at
";

/// SQLite-backed store. One bundled database file, no external services.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).into_app_err_with(|| format!("unable to open database '{}'", path.display()))?;
        log::debug!(target: LOG_TARGET, "opened database '{}'", path.display());
        Self::init(conn)
    }

    /// Open an in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().into_app_err("unable to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT).into_app_err("unable to set busy timeout")?;
        let _: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .into_app_err("unable to set journal mode")?;
        conn.execute_batch(SCHEMA).into_app_err("unable to create schema")?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store lock poisoned")
    }
}

impl Store for SqliteStore {
    fn bulk_upsert(&self, records: &[RepoRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock();
        let tx = conn.transaction().into_app_err("could not begin upsert transaction")?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare_cached(UPSERT_SQL).into_app_err("could not prepare upsert")?;
            for record in records {
                let topics = serde_json::to_string(&record.topics).into_app_err("could not encode topics")?;
                written += stmt
                    .execute(params![
                        record.id,
                        record.name,
                        record.full_name,
                        record.description,
                        record.html_url,
                        record.clone_url,
                        record.ssh_url,
                        record.size,
                        record.stargazers,
                        record.watchers,
                        record.forks,
                        record.open_issues,
                        record.language,
                        topics,
                        record.has_issues,
                        record.has_wiki,
                        record.has_pages,
                        record.has_downloads,
                        record.archived,
                        record.disabled,
                        record.fork,
                        record.created_at,
                        record.updated_at,
                        record.pushed_at,
                        record.owner_login,
                        record.owner_id,
                        record.owner_type,
                        record.default_branch,
                        record.license_key,
                        record.license_name,
                        record.visibility,
                        record.private,
                        record.is_template,
                        record.found_file,
                        record.basic_completed_at,
                    ])
                    .into_app_err_with(|| format!("could not upsert repository {}", record.id))?;
            }
        }
        tx.commit().into_app_err("could not commit upsert transaction")?;

        log::debug!(target: LOG_TARGET, "upserted {written} repositories");
        Ok(written)
    }

    fn record_found_files(&self, files: &[FoundFile]) -> Result<usize> {
        if files.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock();
        let tx = conn.transaction().into_app_err("could not begin found-files transaction")?;
        let mut written = 0;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO found_files (repository_id, filename, is_config_file, is_secret_file, detected_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .into_app_err("could not prepare found-files insert")?;
            for file in files {
                written += stmt
                    .execute(params![
                        file.repository_id,
                        file.filename,
                        file.is_config_file,
                        file.is_secret_file,
                        file.detected_at,
                    ])
                    .into_app_err_with(|| format!("could not record found file for repository {}", file.repository_id))?;
            }
        }
        tx.commit().into_app_err("could not commit found-files transaction")?;

        Ok(written)
    }

    fn apply_details(&self, id: i64, update: &DetailUpdate) -> Result<usize> {
        let mut assignments: Vec<&'static str> = vec!["detail_completed = 1", "detail_completed_at = ?"];
        let mut values: Vec<Value> = vec![Value::Text(update.detail_completed_at.to_rfc3339())];

        if let Some(v) = &update.main_language {
            assignments.push("main_language = ?");
            values.push(Value::Text(v.clone()));
        }
        if let Some(v) = &update.language_stats {
            assignments.push("language_stats = ?");
            values.push(Value::Text(serde_json::to_string(v).into_app_err("could not encode language stats")?));
        }
        if let Some(v) = update.total_code_bytes {
            assignments.push("total_code_bytes = ?");
            values.push(int(v));
        }
        if let Some(v) = update.contributors_count {
            assignments.push("contributors_count = ?");
            values.push(int(v));
        }
        if let Some(v) = &update.top_contributor {
            assignments.push("top_contributor = ?");
            values.push(Value::Text(v.clone()));
        }
        if let Some(v) = update.commits_count {
            assignments.push("commits_count = ?");
            values.push(int(v));
        }
        if let Some(v) = update.branches_count {
            assignments.push("branches_count = ?");
            values.push(int(v));
        }
        if let Some(v) = update.releases_count {
            assignments.push("releases_count = ?");
            values.push(int(v));
        }
        if let Some(v) = &update.latest_release_tag {
            assignments.push("latest_release_tag = ?");
            values.push(Value::Text(v.clone()));
        }
        if let Some(v) = &update.readme_excerpt {
            assignments.push("readme_excerpt = ?");
            values.push(Value::Text(v.clone()));
        }
        if let Some(v) = update.readme_sensitive_hits {
            assignments.push("readme_sensitive_hits = ?");
            values.push(int(v));
        }

        let sql = format!("UPDATE repositories SET {} WHERE id = ?", assignments.join(", "));
        values.push(Value::Integer(id));

        let conn = self.lock();
        conn.execute(&sql, params_from_iter(values))
            .into_app_err_with(|| format!("could not apply detail update for repository {id}"))
    }

    fn enrichment_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Candidate>> {
        let mut sql = String::from(
            "SELECT id, full_name, stargazers FROM repositories
             WHERE basic_completed = 1 AND detail_completed = 0
               AND stargazers >= ?1 AND created_at >= ?2",
        );
        if filter.skip_forks {
            sql.push_str(" AND fork = 0");
        }
        sql.push_str(" ORDER BY stargazers DESC, created_at DESC LIMIT ?3");

        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
        let conn = self.lock();
        let mut stmt = conn.prepare(&sql).into_app_err("could not prepare candidate query")?;
        let rows = stmt
            .query_map(params![filter.min_stars, filter.created_after, limit], |row| {
                Ok(Candidate {
                    id: row.get(0)?,
                    full_name: row.get(1)?,
                    stargazers: row.get(2)?,
                })
            })
            .into_app_err("could not query enrichment candidates")?;

        rows.collect::<core::result::Result<Vec<_>, _>>()
            .into_app_err("could not read enrichment candidates")
    }

    fn counts(&self) -> Result<StoreCounts> {
        let conn = self.lock();
        let mut counts = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(basic_completed), 0),
                        COALESCE(SUM(detail_completed), 0),
                        COALESCE(SUM(CASE WHEN fork = 0 THEN 1 ELSE 0 END), 0),
                        COALESCE(AVG(stargazers), 0.0),
                        COALESCE(MAX(stargazers), 0),
                        COUNT(DISTINCT language),
                        COUNT(DISTINCT owner_login)
                 FROM repositories",
                [],
                |row| {
                    Ok(StoreCounts {
                        total: row.get(0)?,
                        basic_completed: row.get(1)?,
                        detail_completed: row.get(2)?,
                        non_forks: row.get(3)?,
                        avg_stars: row.get(4)?,
                        max_stars: row.get(5)?,
                        distinct_languages: row.get(6)?,
                        distinct_owners: row.get(7)?,
                        found_files: 0,
                        secret_files: 0,
                    })
                },
            )
            .into_app_err("could not query repository counts")?;

        let (found_files, secret_files) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_secret_file), 0) FROM found_files",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .into_app_err("could not query found-file counts")?;
        counts.found_files = found_files;
        counts.secret_files = secret_files;

        Ok(counts)
    }

    fn top_languages(&self, limit: usize) -> Result<Vec<(String, u64)>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT language, COUNT(*) AS n FROM repositories
                 WHERE language IS NOT NULL
                 GROUP BY language ORDER BY n DESC LIMIT ?1",
            )
            .into_app_err("could not prepare language query")?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))
            .into_app_err("could not query top languages")?;

        rows.collect::<core::result::Result<Vec<_>, _>>()
            .into_app_err("could not read top languages")
    }
}

fn int(v: u64) -> Value {
    Value::Integer(i64::try_from(v).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    fn record(id: i64, full_name: &str, stargazers: u64) -> RepoRecord {
        RepoRecord {
            id,
            name: full_name.split('/').next_back().unwrap_or(full_name).to_string(),
            full_name: full_name.to_string(),
            description: None,
            html_url: None,
            clone_url: None,
            ssh_url: None,
            size: 10,
            stargazers,
            watchers: stargazers,
            forks: 0,
            open_issues: 0,
            language: Some("Rust".to_string()),
            topics: vec!["api".to_string()],
            has_issues: true,
            has_wiki: false,
            has_pages: false,
            has_downloads: false,
            archived: false,
            disabled: false,
            fork: false,
            created_at: Some(Utc::now() - ChronoDuration::days(30)),
            updated_at: Some(Utc::now()),
            pushed_at: Some(Utc::now()),
            owner_login: Some("acme".to_string()),
            owner_id: Some(1),
            owner_type: Some("Organization".to_string()),
            default_branch: Some("main".to_string()),
            license_key: None,
            license_name: None,
            visibility: Some("public".to_string()),
            private: false,
            is_template: false,
            found_file: Some(".env".to_string()),
            basic_completed: true,
            basic_completed_at: Some(Utc::now()),
        }
    }

    fn filter(min_stars: u64) -> CandidateFilter {
        CandidateFilter {
            min_stars,
            created_after: Utc::now() - ChronoDuration::days(365),
            skip_forks: true,
            limit: 100,
        }
    }

    #[test]
    fn upsert_is_idempotent_and_keeps_latest_snapshot() {
        let store = SqliteStore::open_in_memory().unwrap();

        assert_eq!(store.bulk_upsert(&[record(1, "acme/widget", 5)]).unwrap(), 1);
        assert_eq!(store.bulk_upsert(&[record(1, "acme/widget", 99)]).unwrap(), 1);

        let counts = store.counts().unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.basic_completed, 1);
        assert_eq!(counts.max_stars, 99);
    }

    #[test]
    fn empty_upsert_is_a_no_op() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.bulk_upsert(&[]).unwrap(), 0);
    }

    #[test]
    fn detail_update_sets_markers_and_is_excluded_from_candidates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let _ = store.bulk_upsert(&[record(1, "acme/widget", 50)]).unwrap();

        let mut update = DetailUpdate::new(Utc::now());
        update.main_language = Some("Rust".to_string());
        update.commits_count = Some(120);
        assert_eq!(store.apply_details(1, &update).unwrap(), 1);

        let counts = store.counts().unwrap();
        assert_eq!(counts.detail_completed, 1);
        assert_eq!(counts.basic_completed, 1);

        // Resumability: re-querying candidates with no in-memory state skips it.
        assert!(store.enrichment_candidates(&filter(0)).unwrap().is_empty());
    }

    #[test]
    fn rediscovery_never_narrows_an_enriched_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let _ = store.bulk_upsert(&[record(1, "acme/widget", 50)]).unwrap();
        let _ = store.apply_details(1, &DetailUpdate::new(Utc::now())).unwrap();

        // The same repository comes back in a later discovery pass.
        let _ = store.bulk_upsert(&[record(1, "acme/widget", 60)]).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.total, 1);
        assert_eq!(counts.detail_completed, 1);
        assert_eq!(counts.max_stars, 60);
    }

    #[test]
    fn marker_only_detail_update_still_completes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let _ = store.bulk_upsert(&[record(1, "acme/widget", 50)]).unwrap();

        assert_eq!(store.apply_details(1, &DetailUpdate::new(Utc::now())).unwrap(), 1);
        assert!(store.enrichment_candidates(&filter(0)).unwrap().is_empty());
    }

    #[test]
    fn detail_values_round_trip_into_the_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let _ = store.bulk_upsert(&[record(1, "acme/widget", 50)]).unwrap();

        let mut update = DetailUpdate::new(Utc::now());
        update.main_language = Some("Rust".to_string());
        update.commits_count = Some(347);
        update.latest_release_tag = Some("v1.2.0".to_string());
        update.readme_excerpt = Some("# widget".to_string());
        let _ = store.apply_details(1, &update).unwrap();

        let (language, commits, tag, excerpt): (Option<String>, Option<i64>, Option<String>, Option<String>) = store
            .lock()
            .query_row(
                "SELECT main_language, commits_count, latest_release_tag, readme_excerpt FROM repositories WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();

        assert_eq!(language.as_deref(), Some("Rust"));
        assert_eq!(commits, Some(347));
        assert_eq!(tag.as_deref(), Some("v1.2.0"));
        assert_eq!(excerpt.as_deref(), Some("# widget"));
    }

    #[test]
    fn detail_update_on_missing_row_touches_nothing() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.apply_details(42, &DetailUpdate::new(Utc::now())).unwrap(), 0);
    }

    #[test]
    fn candidates_respect_thresholds_forks_and_order() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut fork = record(3, "acme/forked", 500);
        fork.fork = true;
        let mut ancient = record(4, "acme/ancient", 900);
        ancient.created_at = Some(Utc::now() - ChronoDuration::days(4000));

        let _ = store
            .bulk_upsert(&[record(1, "acme/small", 5), record(2, "acme/mid", 50), fork, ancient, record(5, "acme/big", 200)])
            .unwrap();

        let candidates = store.enrichment_candidates(&filter(10)).unwrap();
        let names: Vec<_> = candidates.iter().map(|c| c.full_name.as_str()).collect();

        // Fork and too-old rows are excluded, rest ordered by stars descending.
        assert_eq!(names, vec!["acme/big", "acme/mid"]);
    }

    #[test]
    fn candidate_limit_is_honored() {
        let store = SqliteStore::open_in_memory().unwrap();
        let _ = store
            .bulk_upsert(&[record(1, "acme/a", 10), record(2, "acme/b", 20), record(3, "acme/c", 30)])
            .unwrap();

        let mut bounded = filter(0);
        bounded.limit = 2;
        let candidates = store.enrichment_candidates(&bounded).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].full_name, "acme/c");
    }

    #[test]
    fn found_files_are_deduplicated() {
        let store = SqliteStore::open_in_memory().unwrap();
        let file = FoundFile {
            repository_id: 1,
            filename: ".env".to_string(),
            is_config_file: true,
            is_secret_file: true,
            detected_at: Utc::now(),
        };

        assert_eq!(store.record_found_files(&[file.clone()]).unwrap(), 1);
        assert_eq!(store.record_found_files(&[file]).unwrap(), 0);

        let counts = store.counts().unwrap();
        assert_eq!(counts.found_files, 1);
        assert_eq!(counts.secret_files, 1);
    }

    #[test]
    fn counts_on_empty_store_are_zero() {
        let store = SqliteStore::open_in_memory().unwrap();
        let counts = store.counts().unwrap();
        assert_eq!(counts.total, 0);
        assert_eq!(counts.found_files, 0);
        assert!(counts.avg_stars.abs() < f64::EPSILON);
    }

    #[test]
    fn top_languages_order_by_frequency() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut go = record(3, "acme/gopher", 1);
        go.language = Some("Go".to_string());

        let _ = store
            .bulk_upsert(&[record(1, "acme/a", 1), record(2, "acme/b", 2), go])
            .unwrap();

        let languages = store.top_languages(10).unwrap();
        assert_eq!(languages[0], ("Rust".to_string(), 2));
        assert_eq!(languages[1], ("Go".to_string(), 1));
    }
}
