//! End-to-end publish scenario against an in-memory remote, driven entirely
//! through the crate's public API.

use async_trait::async_trait;
use localer_lib::engine::github::{
    CommitInfo, GitHubApi, GitHubError, PullRequestRef, RemoteFile,
};
use localer_lib::engine::publish::Publisher;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RemoteState {
    branches: HashMap<String, String>,
    files: HashMap<(String, String), (String, Vec<u8>)>,
    pulls: HashMap<String, PullRequestRef>,
    sha_counter: u64,
}

#[derive(Clone, Default)]
struct InMemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl InMemoryRemote {
    fn with_default_branch(name: &str, tip_sha: &str) -> Self {
        let remote = Self::default();
        remote
            .state
            .lock()
            .unwrap()
            .branches
            .insert(name.to_string(), tip_sha.to_string());
        remote
    }

    fn file_content_bytes(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&(branch.to_string(), path.to_string()))
            .map(|(_, content)| content.clone())
    }
}

#[async_trait]
impl GitHubApi for InMemoryRemote {
    async fn branch_sha(&self, branch: &str) -> Result<Option<String>, GitHubError> {
        Ok(self.state.lock().unwrap().branches.get(branch).cloned())
    }

    async fn latest_commit(&self, branch: &str) -> Result<Option<CommitInfo>, GitHubError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .branches
            .get(branch)
            .map(|sha| CommitInfo { sha: sha.clone() }))
    }

    async fn file_content(
        &self,
        branch: &str,
        path: &str,
    ) -> Result<Option<RemoteFile>, GitHubError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .get(&(branch.to_string(), path.to_string()))
            .map(|(sha, content)| RemoteFile {
                sha: sha.clone(),
                content: content.clone(),
            }))
    }

    async fn open_pull_request_for(
        &self,
        head_branch: &str,
    ) -> Result<Option<PullRequestRef>, GitHubError> {
        Ok(self.state.lock().unwrap().pulls.get(head_branch).cloned())
    }

    async fn create_branch(&self, branch: &str, base_sha: &str) -> Result<(), GitHubError> {
        self.state
            .lock()
            .unwrap()
            .branches
            .insert(branch.to_string(), base_sha.to_string());
        Ok(())
    }

    async fn put_file(
        &self,
        branch: &str,
        path: &str,
        _message: &str,
        content: &[u8],
        prior_sha: Option<&str>,
    ) -> Result<StatusCode, GitHubError> {
        let mut state = self.state.lock().unwrap();

        let key = (branch.to_string(), path.to_string());
        let current = state.files.get(&key).map(|(sha, _)| sha.clone());
        let matches = match (&current, prior_sha) {
            (Some(current), Some(prior)) => current == prior,
            (None, None) => true,
            _ => false,
        };
        if !matches {
            return Err(GitHubError::Conflict {
                path: path.to_string(),
            });
        }

        state.sha_counter += 1;
        let blob_sha = format!("blob-{}", state.sha_counter);
        state.files.insert(key, (blob_sha, content.to_vec()));
        state.sha_counter += 1;
        let commit_sha = format!("commit-{}", state.sha_counter);
        state.branches.insert(branch.to_string(), commit_sha);
        Ok(StatusCode::CREATED)
    }

    async fn create_pull_request(
        &self,
        _title: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestRef, GitHubError> {
        let mut state = self.state.lock().unwrap();
        if state.branches.get(head) == state.branches.get(base) {
            return Err(GitHubError::NothingToPublish {
                head: head.to_string(),
                base: base.to_string(),
            });
        }
        let number = state.pulls.len() as u64 + 1;
        let pr = PullRequestRef {
            number,
            url: format!("https://github.test/pull/{}", number),
        };
        state.pulls.insert(head.to_string(), pr.clone());
        Ok(pr)
    }
}

#[tokio::test]
async fn test_publish_pipeline_end_to_end() {
    let remote = InMemoryRemote::with_default_branch("main", "abc123");
    let publisher = Publisher::new(remote.clone(), "main", "locales");

    let files = vec![("en_US.json".to_string(), br#"{"a":1}"#.to_vec())];

    let outcome = publisher.publish("alice", "abc123", &files).await.unwrap();

    assert!(outcome.branch.created);
    assert_eq!(outcome.branch.name, "alice");
    assert_eq!(outcome.files_written, 1);
    assert_eq!(outcome.pull_request.number, 1);

    // Content landed under the locale directory on the identity's branch.
    assert_eq!(
        remote.file_content_bytes("alice", "locales/en_US.json"),
        Some(br#"{"a":1}"#.to_vec())
    );
}

#[tokio::test]
async fn test_republish_reuses_branch_and_pull_request() {
    let remote = InMemoryRemote::with_default_branch("main", "abc123");
    let publisher = Publisher::new(remote.clone(), "main", "locales");

    let first = publisher
        .publish(
            "alice",
            "abc123",
            &[("en_US.json".to_string(), br#"{"a":1}"#.to_vec())],
        )
        .await
        .unwrap();

    // Second publish for the same identity updates the same branch and
    // lands in the same pull request.
    let second = publisher
        .publish(
            "alice",
            "abc123",
            &[("en_US.json".to_string(), br#"{"a":2}"#.to_vec())],
        )
        .await
        .unwrap();

    assert!(!second.branch.created);
    assert_eq!(second.pull_request, first.pull_request);
    assert_eq!(
        remote.file_content_bytes("alice", "locales/en_US.json"),
        Some(br#"{"a":2}"#.to_vec())
    );
}

#[tokio::test]
async fn test_publish_without_changes_reports_nothing_to_publish() {
    let remote = InMemoryRemote::with_default_branch("main", "abc123");
    // Branch already sits at the default tip with no file changes.
    remote.create_branch("alice", "abc123").await.unwrap();
    let publisher = Publisher::new(remote, "main", "locales");

    let err = publisher.ensure_pull_request("alice").await.unwrap_err();
    assert!(matches!(err, GitHubError::NothingToPublish { .. }));
}
