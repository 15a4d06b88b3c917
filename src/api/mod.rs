//! GitHub API access: credential pool, rate-limited client, and wire models.

pub mod client;
pub mod credentials;
pub mod models;

pub use client::{Fetch, GithubClient, RetryPolicy};
pub use credentials::{CredentialLease, CredentialPool};
