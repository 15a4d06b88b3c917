//! Multi-credential quota tracking and rotation.
//!
//! The pool owns all per-credential quota state. Workers never see raw
//! counters; they acquire a lease, make their call, and report the quota
//! headers the server returned. Header values are server-side truth at call
//! time, so concurrent reports follow last-observation-wins per credential.

use chrono::{DateTime, Utc};
use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard};

const LOG_TARGET: &str = "      pool";

/// Hourly quota ceiling for a personal access token.
const AUTHENTICATED_QUOTA: u64 = 5000;

/// Hourly quota ceiling for anonymous access.
const UNAUTHENTICATED_QUOTA: u64 = 60;

/// Upper bound on a single reset wait.
const MAX_RESET_WAIT: Duration = Duration::from_secs(3600);

/// Margin added after a reset wait so the server-side window has rolled over.
const RESET_WAIT_BUFFER: Duration = Duration::from_secs(5);

/// A credential handed out by [`CredentialPool::acquire`].
#[derive(Debug, Clone)]
pub struct CredentialLease {
    index: usize,
    token: Option<Arc<str>>,
}

impl CredentialLease {
    /// The bearer token, or `None` for the implicit anonymous credential.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Position of the credential within the pool, for logging.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug)]
struct CredentialState {
    token: Option<Arc<str>>,
    ceiling: u64,
    remaining: u64,
    reset: DateTime<Utc>,
    active: bool,
}

impl CredentialState {
    fn new(token: Option<Arc<str>>, ceiling: u64) -> Self {
        Self {
            token,
            ceiling,
            remaining: ceiling,
            reset: Utc::now(),
            active: true,
        }
    }

    /// Restore the credential after its reset window elapsed. The server will
    /// correct the optimistic quota on the next report.
    fn reactivate(&mut self) {
        self.active = true;
        self.remaining = self.ceiling;
    }
}

/// Tracks quota across all configured credentials and hands out the one with
/// the most headroom.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Mutex<Vec<CredentialState>>,
}

impl CredentialPool {
    /// Build a pool from the configured tokens. With no tokens the pool
    /// degrades to a single anonymous credential with a much lower ceiling.
    #[must_use]
    pub fn new(tokens: &[String]) -> Self {
        let credentials = if tokens.is_empty() {
            log::warn!(target: LOG_TARGET, "no tokens configured, using anonymous access with a quota of {UNAUTHENTICATED_QUOTA}/hour");
            vec![CredentialState::new(None, UNAUTHENTICATED_QUOTA)]
        } else {
            log::info!(target: LOG_TARGET, "pool initialized with {} credentials", tokens.len());
            tokens
                .iter()
                .map(|token| CredentialState::new(Some(Arc::from(token.as_str())), AUTHENTICATED_QUOTA))
                .collect()
        };

        Self {
            credentials: Mutex::new(credentials),
        }
    }

    /// Returns the active credential with the most remaining quota.
    ///
    /// When every credential is exhausted, sleeps until the earliest reset
    /// timestamp elapses, reactivates all credentials, and retries. The lock
    /// is never held across the sleep, so concurrent callers rendezvous here
    /// without busy-waiting.
    pub async fn acquire(&self) -> CredentialLease {
        loop {
            let wait = {
                let mut credentials = self.lock();
                let now = Utc::now();

                // Reactivate credentials whose reset window already rolled over.
                for cred in credentials.iter_mut() {
                    if !cred.active && now >= cred.reset {
                        cred.reactivate();
                    }
                }

                let best = credentials
                    .iter()
                    .enumerate()
                    .filter(|(_, cred)| cred.active && cred.remaining > 0)
                    .max_by_key(|(_, cred)| cred.remaining);

                if let Some((index, cred)) = best {
                    log::trace!(target: LOG_TARGET, "credential {index} selected, {} remaining", cred.remaining);
                    return CredentialLease {
                        index,
                        token: cred.token.clone(),
                    };
                }

                let earliest = credentials.iter().map(|cred| cred.reset).min().unwrap_or(now);
                (earliest - now).to_std().unwrap_or(Duration::ZERO).min(MAX_RESET_WAIT) + RESET_WAIT_BUFFER
            };

            log::info!(target: LOG_TARGET, "all credentials exhausted, waiting {}s for the earliest quota reset", wait.as_secs());
            tokio::time::sleep(wait).await;

            let mut credentials = self.lock();
            for cred in credentials.iter_mut() {
                cred.reactivate();
            }
        }
    }

    /// Record quota state observed in response headers. Safe to call from many
    /// workers; the last observation wins.
    pub fn report(&self, lease: &CredentialLease, remaining: u64, reset: Option<DateTime<Utc>>) {
        let mut credentials = self.lock();
        if let Some(cred) = credentials.get_mut(lease.index) {
            cred.remaining = remaining;
            cred.active = remaining > 0;
            if let Some(reset) = reset {
                cred.reset = reset;
            }
        }
    }

    /// Deactivate a credential until the given reset time (or one minute from
    /// now when the server did not say).
    pub fn mark_exhausted(&self, lease: &CredentialLease, reset: Option<DateTime<Utc>>) {
        let mut credentials = self.lock();
        if let Some(cred) = credentials.get_mut(lease.index) {
            cred.remaining = 0;
            cred.active = false;
            cred.reset = reset.unwrap_or_else(|| Utc::now() + chrono::Duration::seconds(60));
            log::debug!(target: LOG_TARGET, "credential {} exhausted until {}", lease.index, cred.reset);
        }
    }

    /// Sum of remaining quota across all credentials, for end-of-run reporting.
    #[must_use]
    pub fn remaining_total(&self) -> u64 {
        self.lock().iter().map(|cred| cred.remaining).sum()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<CredentialState>> {
        self.credentials.lock().expect("credential pool lock poisoned")
    }
}
