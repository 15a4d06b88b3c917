//! Rate-limited HTTP client for the GitHub REST API.
//!
//! Wraps every outbound call with credential selection, quota reporting,
//! retry with exponential backoff, and quota-exhaustion rotation. Callers see
//! only three shapes of outcome: data, a valid empty result, or an error that
//! exhausted its retry budget and should be treated as a skip.

use crate::Result;
use crate::api::credentials::{CredentialLease, CredentialPool};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, LINK, RETRY_AFTER};
use serde::de::DeserializeOwned;
use std::sync::{Arc, LazyLock};

const LOG_TARGET: &str = "    client";

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "repo-harvest";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pattern to extract the last page number from a GitHub API Link header.
static PAGE_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new(r"page=(\d+)>; rel=.last.").expect("invalid regex"));

/// Outcome of a call that can legitimately find nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    /// The request succeeded and data came back.
    Found(T),

    /// The resource does not exist (404), or the query was rejected as
    /// unsatisfiable (422). Both mean "no data available", not failure.
    NotFound,
}

impl<T> Fetch<T> {
    /// Converts to an `Option`, returning `Some` only for `Found`.
    #[must_use]
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    /// Returns `true` if the result is `Found`.
    #[must_use]
    pub const fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Bounded retry behavior for transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries on top of the original request.
    pub max_attempts: u32,

    /// Base delay, doubled on each successive attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

struct RawResponse {
    headers: HeaderMap,
    body: Bytes,
}

/// HTTP client that delegates credential selection to a [`CredentialPool`]
/// and reports observed quota state after every completed call.
#[derive(Debug)]
pub struct GithubClient {
    http: reqwest::Client,
    pool: Arc<CredentialPool>,
    base_url: String,
    retry: RetryPolicy,
}

impl GithubClient {
    /// Create a client. `base_url` overrides the public API endpoint, for
    /// GitHub Enterprise installations and for tests.
    pub fn new(pool: Arc<CredentialPool>, base_url: Option<&str>, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            pool,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// The credential pool this client reports quota state to.
    #[must_use]
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Issue a GET and deserialize the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Fetch<T>> {
        match self.send(path, query).await? {
            Fetch::NotFound => Ok(Fetch::NotFound),
            Fetch::Found(raw) => {
                let value = serde_json::from_slice(&raw.body).into_app_err_with(|| format!("malformed JSON response from '{path}'"))?;
                Ok(Fetch::Found(value))
            }
        }
    }

    /// Issue a GET, additionally returning the `rel="last"` page number from
    /// the Link header when the server paginated the collection.
    pub async fn get_json_with_last_page<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<Fetch<(T, Option<u64>)>> {
        match self.send(path, query).await? {
            Fetch::NotFound => Ok(Fetch::NotFound),
            Fetch::Found(raw) => {
                let last_page = last_page(&raw.headers);
                let value = serde_json::from_slice(&raw.body).into_app_err_with(|| format!("malformed JSON response from '{path}'"))?;
                Ok(Fetch::Found((value, last_page)))
            }
        }
    }

    /// Bounded retry loop. Quota exhaustion rotates credentials without
    /// spending the transient budget; transient failures back off
    /// exponentially up to the attempt ceiling.
    async fn send(&self, path: &str, query: &[(&str, String)]) -> Result<Fetch<RawResponse>> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut attempt: u32 = 0;

        loop {
            let lease = self.pool.acquire().await;

            let mut request = self.http.get(&url).query(query);
            if let Some(token) = lease.token() {
                let mut value = HeaderValue::from_str(&format!("token {token}"))?;
                value.set_sensitive(true);
                request = request.header(AUTHORIZATION, value);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();
                    self.observe_quota(&lease, &headers);

                    if status.is_success() {
                        let body = response
                            .bytes()
                            .await
                            .into_app_err_with(|| format!("could not read response body from '{url}'"))?;
                        return Ok(Fetch::Found(RawResponse { headers, body }));
                    }

                    if status == StatusCode::NOT_FOUND {
                        log::debug!(target: LOG_TARGET, "resource not found at '{url}'");
                        return Ok(Fetch::NotFound);
                    }

                    if status == StatusCode::UNPROCESSABLE_ENTITY {
                        log::warn!(target: LOG_TARGET, "query rejected as unsatisfiable at '{url}'");
                        return Ok(Fetch::NotFound);
                    }

                    if quota_exhausted(status, &headers) {
                        self.pool.mark_exhausted(&lease, reset_time(&headers));
                        log::info!(target: LOG_TARGET, "quota exhausted on credential {}, rotating", lease.index());
                        continue;
                    }

                    if status == StatusCode::FORBIDDEN
                        && let Some(delay) = retry_after(&headers)
                    {
                        // Secondary rate limit: honor the requested delay.
                        attempt += 1;
                        if attempt > self.retry.max_attempts {
                            bail!("request to '{url}' still rate-limited after {attempt} attempts");
                        }
                        log::debug!(target: LOG_TARGET, "secondary rate limit at '{url}', waiting {}s", delay.as_secs());
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    attempt += 1;
                    if attempt > self.retry.max_attempts {
                        bail!("request to '{url}' failed with status {status} after {attempt} attempts");
                    }
                    self.backoff(attempt, &url, &format!("status {status}")).await;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.retry.max_attempts {
                        return Err(e).into_app_err_with(|| format!("request to '{url}' failed after {attempt} attempts"));
                    }
                    let cause = format!("{e:#}");
                    self.backoff(attempt, &url, &cause).await;
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32, url: &str, cause: &str) {
        let delay = self.retry.base_delay * 2u32.saturating_pow(attempt - 1);
        log::debug!(target: LOG_TARGET, "retrying '{url}' (attempt {attempt}, delay {}ms): {cause}", delay.as_millis());
        tokio::time::sleep(delay).await;
    }

    fn observe_quota(&self, lease: &CredentialLease, headers: &HeaderMap) {
        if let Some(remaining) = header_u64(headers, "x-ratelimit-remaining") {
            self.pool.report(lease, remaining, reset_time(headers));
        }
    }
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn reset_time(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let secs = header_u64(headers, "x-ratelimit-reset")?;
    DateTime::from_timestamp(i64::try_from(secs).ok()?, 0)
}

/// A 403 or 429 only signals exhaustion when the quota header reads zero;
/// other 403s are ordinary client errors.
fn quota_exhausted(status: StatusCode, headers: &HeaderMap) -> bool {
    (status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS) && header_u64(headers, "x-ratelimit-remaining") == Some(0)
}

/// Parse the `Retry-After` header value as seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.parse().ok()?;
    Some(Duration::from_secs(secs))
}

fn last_page(headers: &HeaderMap) -> Option<u64> {
    let link = headers.get(LINK)?.to_str().ok()?;
    PAGE_REGEX.captures(link)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let _ = headers.insert(
                reqwest::header::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn last_page_parses_github_link_header() {
        let headers = header_map(&[(
            "link",
            "<https://api.github.com/repos/a/b/commits?per_page=1&page=2>; rel=\"next\", \
             <https://api.github.com/repos/a/b/commits?per_page=1&page=347>; rel=\"last\"",
        )]);
        assert_eq!(last_page(&headers), Some(347));
    }

    #[test]
    fn last_page_absent_without_link_header() {
        assert_eq!(last_page(&HeaderMap::new()), None);
    }

    #[test]
    fn quota_exhaustion_requires_zero_remaining() {
        let exhausted = header_map(&[("x-ratelimit-remaining", "0")]);
        let healthy = header_map(&[("x-ratelimit-remaining", "41")]);

        assert!(quota_exhausted(StatusCode::FORBIDDEN, &exhausted));
        assert!(quota_exhausted(StatusCode::TOO_MANY_REQUESTS, &exhausted));
        assert!(!quota_exhausted(StatusCode::FORBIDDEN, &healthy));
        assert!(!quota_exhausted(StatusCode::FORBIDDEN, &HeaderMap::new()));
        assert!(!quota_exhausted(StatusCode::INTERNAL_SERVER_ERROR, &exhausted));
    }

    #[test]
    fn reset_time_converts_epoch_seconds() {
        let headers = header_map(&[("x-ratelimit-reset", "1700000000")]);
        let reset = reset_time(&headers).unwrap();
        assert_eq!(reset.timestamp(), 1_700_000_000);
    }
}
