//! Localer GitHub Integration Module
//! REST API surface for branch, content, and pull request operations

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("Transient remote failure: {0}")]
    Transient(String),
    #[error("Write conflict on {path}: stale or missing prior content sha")]
    Conflict { path: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Nothing to publish: no difference between {head} and {base}")]
    NothingToPublish { head: String, base: String },
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl GitHubError {
    /// Only transient failures are safe to retry without re-reading remote state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GitHubError::Transient(_))
    }
}

// Network errors, timeouts included, are retryable by definition.
impl From<reqwest::Error> for GitHubError {
    fn from(e: reqwest::Error) -> Self {
        GitHubError::Transient(e.to_string())
    }
}

/// A named line of development on the remote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRef {
    pub name: String,
    pub head_sha: Option<String>,
    /// False when an existing branch was reused.
    pub created: bool,
}

/// The tip commit of a branch.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub sha: String,
}

/// A file as it currently exists on a branch, content already decoded.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub sha: String,
    pub content: Vec<u8>,
}

/// An open review request from a branch into the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
}

/// Remote version-control operations the publish pipeline is built on.
///
/// `GitHubClient` is the production implementation; tests use in-memory
/// implementations. Lookups return `Ok(None)` when the referenced object
/// does not exist, since absence is a normal signal for the pipeline.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// Resolve a branch ref to its current sha.
    async fn branch_sha(&self, branch: &str) -> Result<Option<String>, GitHubError>;

    /// Most recent commit reachable from a branch ref.
    async fn latest_commit(&self, branch: &str) -> Result<Option<CommitInfo>, GitHubError>;

    /// Current content and blob sha of a file on a branch.
    async fn file_content(&self, branch: &str, path: &str)
        -> Result<Option<RemoteFile>, GitHubError>;

    /// Open pull request whose source branch matches, if any.
    async fn open_pull_request_for(
        &self,
        head_branch: &str,
    ) -> Result<Option<PullRequestRef>, GitHubError>;

    /// Create a new branch ref pointing at `base_sha`.
    async fn create_branch(&self, branch: &str, base_sha: &str) -> Result<(), GitHubError>;

    /// Create or update a file on a branch. `prior_sha` must be the file's
    /// current blob sha for an update and absent for a creation.
    async fn put_file(
        &self,
        branch: &str,
        path: &str,
        message: &str,
        content: &[u8],
        prior_sha: Option<&str>,
    ) -> Result<StatusCode, GitHubError>;

    /// Open a pull request from `head` into `base`.
    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestRef, GitHubError>;
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct CreateRefRequest {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentRequest {
    message: String,
    content: String,
    branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreatePullRequest {
    title: String,
    head: String,
    base: String,
}

/// Client for the hosted version-control REST API.
///
/// Owner, repository, and token are injected at construction and immutable
/// afterwards. Every call carries a bounded timeout; a timeout surfaces as
/// a transient failure.
pub struct GitHubClient {
    owner: String,
    repo: String,
    token: String,
    api_url: String,
    http_client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(owner: &str, repo: &str, token: &str) -> Self {
        Self::with_timeout(owner, repo, token, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(owner: &str, repo: &str, token: &str, timeout: Duration) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            token: token.to_string(),
            api_url: GITHUB_API_URL.to_string(),
            http_client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Point the client at a different API host (GitHub Enterprise, test servers).
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    fn repo_url(&self, tail: &str) -> String {
        format!("{}/repos/{}/{}/{}", self.api_url, self.owner, self.repo, tail)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(USER_AGENT, "Localer")
            .header(ACCEPT, "application/vnd.github+json")
    }

    /// Map an unexpected response status to the error taxonomy.
    async fn status_error(context: &str, response: reqwest::Response) -> GitHubError {
        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            GitHubError::Transient(format!("{}: {} {}", context, status, message))
        } else {
            GitHubError::Api {
                status: status.as_u16(),
                message: format!("{}: {}", context, message),
            }
        }
    }
}

/// Decode a base64 content body as returned by the contents endpoint,
/// which wraps the payload across multiple lines.
pub(crate) fn decode_content(encoded: &str) -> Result<Vec<u8>, GitHubError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|e| GitHubError::Api {
            status: 200,
            message: format!("Invalid base64 content body: {}", e),
        })
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn branch_sha(&self, branch: &str) -> Result<Option<String>, GitHubError> {
        let url = self.repo_url(&format!("git/ref/heads/{}", branch));
        let response = self.request(self.http_client.get(url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(branch, "branch ref not found");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::status_error("Failed to get branch ref", response).await);
        }

        let body: RefResponse = response.json().await?;
        tracing::debug!(branch, sha = %body.object.sha, "resolved branch ref");
        Ok(Some(body.object.sha))
    }

    async fn latest_commit(&self, branch: &str) -> Result<Option<CommitInfo>, GitHubError> {
        let url = self.repo_url(&format!("commits/{}", branch));
        let response = self.request(self.http_client.get(url)).send().await?;

        // 422 is what the commits endpoint returns for an unknown ref.
        if response.status() == StatusCode::NOT_FOUND
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
        {
            tracing::debug!(branch, "no commit found for branch");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::status_error("Failed to get latest commit", response).await);
        }

        let body: CommitResponse = response.json().await?;
        Ok(Some(CommitInfo { sha: body.sha }))
    }

    async fn file_content(
        &self,
        branch: &str,
        path: &str,
    ) -> Result<Option<RemoteFile>, GitHubError> {
        let url = self.repo_url(&format!("contents/{}", path));
        let response = self
            .request(self.http_client.get(url).query(&[("ref", branch)]))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(branch, path, "file not found on branch");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::status_error("Failed to get file content", response).await);
        }

        let body: ContentResponse = response.json().await?;
        let content = decode_content(&body.content)?;
        Ok(Some(RemoteFile {
            sha: body.sha,
            content,
        }))
    }

    async fn open_pull_request_for(
        &self,
        head_branch: &str,
    ) -> Result<Option<PullRequestRef>, GitHubError> {
        let url = self.repo_url("pulls");
        let head = format!("{}:{}", self.owner, head_branch);
        let response = self
            .request(
                self.http_client
                    .get(url)
                    .query(&[("head", head.as_str()), ("state", "open")]),
            )
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error("Failed to list pull requests", response).await);
        }

        let pulls: Vec<PullResponse> = response.json().await?;
        Ok(pulls.into_iter().next().map(|p| PullRequestRef {
            number: p.number,
            url: p.html_url,
        }))
    }

    async fn create_branch(&self, branch: &str, base_sha: &str) -> Result<(), GitHubError> {
        let url = self.repo_url("git/refs");
        let request = CreateRefRequest {
            git_ref: format!("refs/heads/{}", branch),
            sha: base_sha.to_string(),
        };
        let response = self
            .request(self.http_client.post(url).json(&request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error("Failed to create branch", response).await);
        }

        tracing::info!(branch, base_sha, "created branch");
        Ok(())
    }

    async fn put_file(
        &self,
        branch: &str,
        path: &str,
        message: &str,
        content: &[u8],
        prior_sha: Option<&str>,
    ) -> Result<StatusCode, GitHubError> {
        let url = self.repo_url(&format!("contents/{}", path));
        let request = PutContentRequest {
            message: message.to_string(),
            content: BASE64.encode(content),
            branch: branch.to_string(),
            sha: prior_sha.map(str::to_string),
        };
        let response = self
            .request(self.http_client.put(url).json(&request))
            .send()
            .await?;

        let status = response.status();
        // The contents endpoint rejects a stale or missing sha with 409 or 422.
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(GitHubError::Conflict {
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            return Err(Self::status_error("Failed to write file", response).await);
        }

        tracing::info!(branch, path, updated = prior_sha.is_some(), "wrote file");
        Ok(status)
    }

    async fn create_pull_request(
        &self,
        title: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestRef, GitHubError> {
        let url = self.repo_url("pulls");
        let request = CreatePullRequest {
            title: title.to_string(),
            head: head.to_string(),
            base: base.to_string(),
        };
        let response = self
            .request(self.http_client.post(url).json(&request))
            .send()
            .await?;

        // 422 here means there is no diff between head and base.
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(GitHubError::NothingToPublish {
                head: head.to_string(),
                base: base.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(Self::status_error("Failed to create pull request", response).await);
        }

        let body: PullResponse = response.json().await?;
        tracing::info!(head, base, number = body.number, "created pull request");
        Ok(PullRequestRef {
            number: body.number,
            url: body.html_url,
        })
    }
}
