//! GitHub REST client.
//!
//! Implements [`RepositoryAccess`] over `reqwest`. Every non-2xx status
//! becomes a typed [`AccessError`]; nothing is retried.

use super::RepositoryAccess;
use crate::config::Config;
use crate::error::AccessError;
use crate::models::{ContentEntry, RepositoryMetadata};
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("gitbae/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";

/// The contents endpoint answers with an array for directories and a
/// single object for files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentEntry>),
    Single(ContentEntry),
}

impl From<ContentsResponse> for Vec<ContentEntry> {
    fn from(response: ContentsResponse) -> Self {
        match response {
            ContentsResponse::Listing(entries) => entries,
            ContentsResponse::Single(entry) => vec![entry],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http_client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client from the startup configuration.
    pub fn new(config: &Config) -> Result<Self, AccessError> {
        let api_url = Url::parse(&config.github.api_url).map_err(|e| {
            AccessError::Transport(format!(
                "Invalid GitHub API URL {}: {}",
                config.github.api_url, e
            ))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.github.timeout_seconds))
            .user_agent(USER_AGENT)
            .build()?;

        let token = config.secrets.github_token.clone();
        if token.is_none() {
            warn!("No GitHub token configured; requests will be unauthenticated");
        }

        info!("GitHub client ready for {}", api_url);

        Ok(Self {
            http_client,
            api_url,
            token,
        })
    }

    /// Build an API URL from path segments, percent-encoding each one.
    fn endpoint<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, AccessError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| AccessError::Transport(format!("Cannot build URL from {}", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Whether the token may be sent to this URL.
    ///
    /// Download references come from the model, so the credential only
    /// goes to the API host itself and GitHub's raw content hosts.
    fn should_authorize(&self, url: &Url) -> bool {
        match url.host_str() {
            Some(host) => {
                Some(host) == self.api_url.host_str()
                    || host == "githubusercontent.com"
                    || host.ends_with(".githubusercontent.com")
            }
            None => false,
        }
    }

    fn get(&self, url: Url) -> RequestBuilder {
        let authorize = self.should_authorize(&url);
        let request = self.http_client.get(url).header(ACCEPT, GITHUB_JSON);
        match (&self.token, authorize) {
            (Some(token), true) => request.bearer_auth(token),
            _ => request,
        }
    }

    /// Send a request and turn non-2xx statuses into typed failures.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, AccessError> {
        let response = request.send().await?;
        check_status(response, what).await
    }
}

/// Pass 2xx responses through; map anything else to an [`AccessError`].
async fn check_status(response: Response, what: &str) -> Result<Response, AccessError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);

    let body = response.text().await.unwrap_or_default();
    let reason = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.message)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());

    debug!("{} failed with {}: {}", what, status, body);

    Err(AccessError::from_status(
        status.as_u16(),
        quota_exhausted,
        format!("{} ({})", what, reason),
    ))
}

impl RepositoryAccess for GitHubClient {
    async fn get_repository_info(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<RepositoryMetadata, AccessError> {
        let url = self.endpoint(["repos", owner, repo])?;
        debug!("GET {}", url);

        let what = format!("{}/{}", owner, repo);
        let response = self.send(self.get(url), &what).await?;
        Ok(response.json().await?)
    }

    async fn list_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Vec<ContentEntry>, AccessError> {
        let segments = ["repos", owner, repo, "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.endpoint(segments)?;
        if let Some(branch) = branch {
            url.query_pairs_mut().append_pair("ref", branch);
        }
        debug!("GET {}", url);

        let what = format!("{}/{}:{}", owner, repo, path.trim_matches('/'));
        let response = self.get(url).send().await?;
        if let Some(hint) = listing_diagnostic(response.status().as_u16()) {
            warn!("{}", hint);
        }
        let response = check_status(response, &what).await?;

        let contents: ContentsResponse = response.json().await?;
        Ok(contents.into())
    }

    async fn read_file(&self, download_url: &str) -> Result<String, AccessError> {
        let url = Url::parse(download_url).map_err(|e| {
            AccessError::Transport(format!("Invalid download URL {}: {}", download_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AccessError::Transport(format!(
                "Unsupported download URL scheme: {}",
                download_url
            )));
        }
        debug!("GET {}", url);

        let response = self.send(self.get(url), download_url).await?;
        let bytes = response.bytes().await?;

        String::from_utf8(bytes.to_vec()).map_err(|e| {
            AccessError::DecodeError(format!("{} is not valid UTF-8 text: {}", download_url, e))
        })
    }
}

/// Advisory hint for the common listing failures. Never replaces the error.
fn listing_diagnostic(status: u16) -> Option<&'static str> {
    match status {
        401 => Some("Unauthorized: check your GitHub token."),
        403 => Some(
            "Forbidden: the token may have the right permissions, but the request \
             is being rate limited or access is restricted.",
        ),
        404 => Some("Not Found: check the repository details (owner/repo/path/branch)."),
        _ => None,
    }
}
