//! Repository access layer.
//!
//! Three stateless queries against a code-hosting REST API. The controller
//! only sees the [`RepositoryAccess`] trait; [`GitHubClient`] is the
//! production implementation.

pub mod client;

pub use client::GitHubClient;

use crate::error::AccessError;
use crate::models::{ContentEntry, RepositoryMetadata};

/// Read-only queries against a remote repository host.
///
/// Implementations never retry and never turn a failed request into an
/// empty result.
#[allow(async_fn_in_trait)]
pub trait RepositoryAccess {
    /// Fetch canonical metadata for `owner/repo`.
    async fn get_repository_info(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryMetadata, AccessError>;

    /// List a directory. A file path yields a one-element listing.
    ///
    /// `path` is relative to the repository root (empty for the root);
    /// `branch: None` lets the host pick the repository's default branch.
    async fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Vec<ContentEntry>, AccessError>;

    /// Fetch a raw download reference and decode it as UTF-8 text.
    async fn read_file(&self, download_url: &str) -> Result<String, AccessError>;
}

/// Parse `owner/repo`, `https://github.com/owner/repo(.git)` or
/// `git@github.com:owner/repo(.git)` into its two parts.
pub fn parse_repo_reference(reference: &str) -> Option<(String, String)> {
    let reference = reference.trim().trim_end_matches('/');
    let reference = reference.strip_suffix(".git").unwrap_or(reference);

    let rest = reference
        .strip_prefix("https://github.com/")
        .or_else(|| reference.strip_prefix("http://github.com/"))
        .or_else(|| reference.strip_prefix("git@github.com:"))
        .unwrap_or(reference);

    if rest.contains("://") {
        return None;
    }

    let parts: Vec<&str> = rest.split('/').collect();
    match parts.as_slice() {
        [owner, repo, ..] if !owner.is_empty() && !repo.is_empty() => {
            Some((owner.to_string(), repo.to_string()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(owner: &str, repo: &str) -> Option<(String, String)> {
        Some((owner.to_string(), repo.to_string()))
    }

    #[test]
    fn test_parse_short_form() {
        assert_eq!(parse_repo_reference("acme/widget"), pair("acme", "widget"));
    }

    #[test]
    fn test_parse_https() {
        assert_eq!(
            parse_repo_reference("https://github.com/rust-lang/rust"),
            pair("rust-lang", "rust")
        );
        assert_eq!(
            parse_repo_reference("https://github.com/rust-lang/rust.git"),
            pair("rust-lang", "rust")
        );
        assert_eq!(
            parse_repo_reference("https://github.com/rust-lang/rust/tree/master/src"),
            pair("rust-lang", "rust")
        );
    }

    #[test]
    fn test_parse_ssh() {
        assert_eq!(
            parse_repo_reference("git@github.com:rust-lang/rust.git"),
            pair("rust-lang", "rust")
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_repo_reference("https://gitlab.com/user/repo"), None);
        assert_eq!(parse_repo_reference("widget"), None);
        assert_eq!(parse_repo_reference("/widget"), None);
    }
}
