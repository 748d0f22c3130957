//! Branch Synchronizer & Publisher
//!
//! The translation publish pipeline: ensure a working branch exists for an
//! identity, write every changed locale file onto it, then open (or reuse)
//! the pull request into the default branch.
//!
//! Every operation re-queries the remote for current state; nothing is
//! cached locally between calls. The pipeline performs no retries of its
//! own. Remote state already written when a step fails is left as-is.

use thiserror::Error;

use crate::engine::github::{BranchRef, GitHubApi, GitHubError, PullRequestRef};

/// Pipeline stage that failed, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Validate,
    EnsureBranch,
    WriteFiles,
    EnsurePullRequest,
}

impl std::fmt::Display for PublishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Validate => "validate",
            Self::EnsureBranch => "ensure-branch",
            Self::WriteFiles => "write-files",
            Self::EnsurePullRequest => "ensure-pull-request",
        };
        write!(f, "{}", name)
    }
}

/// A publish failure, reporting which stage halted the pipeline.
#[derive(Debug, Error)]
#[error("Publish failed at {stage} stage: {source}")]
pub struct PublishError {
    pub stage: PublishStage,
    #[source]
    pub source: GitHubError,
}

impl PublishError {
    fn at(stage: PublishStage) -> impl FnOnce(GitHubError) -> Self {
        move |source| Self { stage, source }
    }
}

/// Result of a completed publish.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub branch: BranchRef,
    pub pull_request: PullRequestRef,
    pub files_written: usize,
}

/// Write mode for a single content write, decided per call by comparing the
/// working branch's latest commit against the default branch tip at the
/// moment of writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Branch has no independent history; files are created fresh.
    Create,
    /// Branch has diverged; writes update relative to its own content.
    Update,
}

/// The Branch Synchronizer & Publisher.
///
/// Generic over the remote API so tests can run against an in-memory
/// implementation. One working branch per identity; the branch name is the
/// identity string itself (the identity-to-branch mapping is the caller's
/// responsibility).
pub struct Publisher<A> {
    api: A,
    default_branch: String,
    locale_dir: String,
}

impl<A: GitHubApi> Publisher<A> {
    pub fn new(api: A, default_branch: &str, locale_dir: &str) -> Self {
        Self {
            api,
            default_branch: default_branch.to_string(),
            locale_dir: locale_dir.to_string(),
        }
    }

    fn locale_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.locale_dir, file_name)
    }

    /// Look up the identity's branch, creating it at `base_sha` if it does
    /// not exist yet. An existing branch is returned unchanged, commits and
    /// all, so repeated publishes for the same identity reuse one branch.
    pub async fn ensure_branch(
        &self,
        identity: &str,
        base_sha: &str,
    ) -> Result<BranchRef, GitHubError> {
        if let Some(sha) = self.api.branch_sha(identity).await? {
            tracing::debug!(identity, %sha, "reusing existing branch");
            return Ok(BranchRef {
                name: identity.to_string(),
                head_sha: Some(sha),
                created: false,
            });
        }

        self.api.create_branch(identity, base_sha).await?;
        Ok(BranchRef {
            name: identity.to_string(),
            head_sha: Some(base_sha.to_string()),
            created: true,
        })
    }

    /// Most recent commit sha on the identity's branch. `None` when the
    /// branch has no commits visible yet, which is a normal signal, not an
    /// error.
    pub async fn latest_commit_sha(&self, identity: &str) -> Result<Option<String>, GitHubError> {
        Ok(self.api.latest_commit(identity).await?.map(|c| c.sha))
    }

    /// Decide create-vs-update for the next write. A branch whose latest
    /// commit differs from the default branch tip already carries
    /// independent history, so writes must update relative to its own
    /// content.
    async fn write_mode(&self, identity: &str) -> Result<WriteMode, GitHubError> {
        let tip = self
            .api
            .branch_sha(&self.default_branch)
            .await?
            .ok_or_else(|| GitHubError::NotFound(format!("branch {}", self.default_branch)))?;

        match self.latest_commit_sha(identity).await? {
            Some(sha) if sha != tip => Ok(WriteMode::Update),
            _ => Ok(WriteMode::Create),
        }
    }

    /// Write one locale file onto the identity's branch. In update mode the
    /// file's current sha on the branch is fetched and sent as the prior
    /// sha; in create mode no prior sha is sent.
    pub async fn write_file(
        &self,
        identity: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<reqwest::StatusCode, GitHubError> {
        let path = self.locale_path(file_name);
        let mode = self.write_mode(identity).await?;

        let prior_sha = match mode {
            WriteMode::Update => self
                .api
                .file_content(identity, &path)
                .await?
                .map(|f| f.sha),
            WriteMode::Create => None,
        };

        let message = format!("{} changed {}", identity, file_name);
        self.api
            .put_file(identity, &path, &message, content, prior_sha.as_deref())
            .await
    }

    /// Write every file of the ordered sequence, sequentially. The write
    /// mode is re-evaluated for each file, so the first write onto a fresh
    /// branch flips subsequent writes into update mode. Halts at the first
    /// failure; earlier writes stay committed.
    pub async fn publish_all(
        &self,
        identity: &str,
        files: &[(String, Vec<u8>)],
    ) -> Result<usize, GitHubError> {
        validate_input(identity, files)?;

        for (file_name, content) in files {
            self.write_file(identity, file_name, content).await?;
        }
        Ok(files.len())
    }

    /// Return the open pull request for the identity's branch, creating one
    /// into the default branch if none exists. At most one open pull
    /// request per branch.
    pub async fn ensure_pull_request(
        &self,
        identity: &str,
    ) -> Result<PullRequestRef, GitHubError> {
        if let Some(existing) = self.api.open_pull_request_for(identity).await? {
            tracing::debug!(identity, number = existing.number, "reusing open pull request");
            return Ok(existing);
        }

        let title = format!("[Translate] {}", identity);
        self.api
            .create_pull_request(&title, identity, &self.default_branch)
            .await
    }

    /// The full pipeline: ensure the branch, write all files, ensure the
    /// pull request. Halts at the first failing stage and reports it; no
    /// partial rollback is attempted.
    pub async fn publish(
        &self,
        identity: &str,
        base_sha: &str,
        files: &[(String, Vec<u8>)],
    ) -> Result<PublishOutcome, PublishError> {
        validate_input(identity, files).map_err(PublishError::at(PublishStage::Validate))?;

        let branch = self
            .ensure_branch(identity, base_sha)
            .await
            .map_err(PublishError::at(PublishStage::EnsureBranch))?;

        let files_written = self
            .publish_all(identity, files)
            .await
            .map_err(PublishError::at(PublishStage::WriteFiles))?;

        let pull_request = self
            .ensure_pull_request(identity)
            .await
            .map_err(PublishError::at(PublishStage::EnsurePullRequest))?;

        tracing::info!(
            identity,
            files_written,
            pr = pull_request.number,
            "publish complete"
        );

        Ok(PublishOutcome {
            branch,
            pull_request,
            files_written,
        })
    }
}

fn validate_input(identity: &str, files: &[(String, Vec<u8>)]) -> Result<(), GitHubError> {
    if identity.trim().is_empty() {
        return Err(GitHubError::MalformedInput("empty identity".to_string()));
    }
    if files.is_empty() {
        return Err(GitHubError::MalformedInput("empty file list".to_string()));
    }
    for (name, _) in files {
        if name.is_empty() {
            return Err(GitHubError::MalformedInput("empty file name".to_string()));
        }
        if name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(GitHubError::MalformedInput(format!(
                "invalid file name: {}",
                name
            )));
        }
    }
    Ok(())
}
