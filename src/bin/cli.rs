//! Localer CLI - Main entry point for CLI binary
//!
//! This binary provides the `localer-cli` tool for publishing translation
//! changes as pull requests.

use clap::Parser;
use localer_lib::engine::{
    cli::{Cli, Commands, OutputFormat},
    config::{self, Config, ConfigError},
    github::{GitHubApi, GitHubClient, GitHubError},
    publish::{PublishError, Publisher},
};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run_cli(cli).await {
        eprintln!("Error: {}", e.message);
        std::process::exit(e.code);
    }
}

/// Failure plus the exit code the error kind maps to.
struct CliError {
    code: i32,
    message: String,
}

/// Exit codes: 2 malformed input, 3 not found, 4 conflict,
/// 5 nothing to publish, 6 transient (retry may succeed), 1 anything else.
fn exit_code(err: &GitHubError) -> i32 {
    match err {
        GitHubError::MalformedInput(_) => 2,
        GitHubError::NotFound(_) => 3,
        GitHubError::Conflict { .. } => 4,
        GitHubError::NothingToPublish { .. } => 5,
        GitHubError::Transient(_) => 6,
        GitHubError::Api { .. } => 1,
    }
}

impl From<GitHubError> for CliError {
    fn from(e: GitHubError) -> Self {
        Self {
            code: exit_code(&e),
            message: e.to_string(),
        }
    }
}

impl From<PublishError> for CliError {
    fn from(e: PublishError) -> Self {
        Self {
            code: exit_code(&e.source),
            message: e.to_string(),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self {
            code: 1,
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self {
            code: 1,
            message: e.to_string(),
        }
    }
}

async fn run_cli(cli: Cli) -> Result<(), CliError> {
    let project_dir = cli.get_project_dir();
    let json_output = cli.format == OutputFormat::Json;

    match cli.command {
        Commands::Publish { identity, files } => {
            cmd_publish(&project_dir, &identity, &files, json_output).await
        }
        Commands::Status { identity } => cmd_status(&project_dir, &identity, json_output).await,
    }
}

fn build_client(config: &Config) -> Result<GitHubClient, CliError> {
    let token = config::github_token()?;
    Ok(GitHubClient::with_timeout(
        &config.github.owner,
        &config.github.repo,
        &token,
        Duration::from_secs(config.http.timeout_secs),
    ))
}

async fn cmd_publish(
    project_dir: &Path,
    identity: &str,
    files: &[String],
    json: bool,
) -> Result<(), CliError> {
    let config = Config::load(project_dir)?;
    let client = build_client(&config)?;

    let mut changes = Vec::new();
    for name in files {
        let path = project_dir.join(&config.github.locale_dir).join(name);
        let content = std::fs::read(&path)?;
        changes.push((name.clone(), content));
    }

    let base_sha = client
        .branch_sha(&config.github.default_branch)
        .await?
        .ok_or_else(|| {
            CliError::from(GitHubError::NotFound(format!(
                "branch {}",
                config.github.default_branch
            )))
        })?;

    let publisher = Publisher::new(
        client,
        &config.github.default_branch,
        &config.github.locale_dir,
    );
    let outcome = publisher.publish(identity, &base_sha, &changes).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "branch": outcome.branch.name,
                "branch_created": outcome.branch.created,
                "files_written": outcome.files_written,
                "pr_number": outcome.pull_request.number,
                "pr_url": outcome.pull_request.url,
            })
        );
    } else {
        println!(
            "Published {} file(s) on branch '{}'",
            outcome.files_written, outcome.branch.name
        );
        println!(
            "Pull request #{}: {}",
            outcome.pull_request.number, outcome.pull_request.url
        );
    }

    Ok(())
}

async fn cmd_status(project_dir: &Path, identity: &str, json: bool) -> Result<(), CliError> {
    let config = Config::load(project_dir)?;
    let client = build_client(&config)?;

    let branch_sha = client.branch_sha(identity).await?;
    let pull_request = client.open_pull_request_for(identity).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "identity": identity,
                "branch_exists": branch_sha.is_some(),
                "branch_sha": branch_sha,
                "pr_number": pull_request.as_ref().map(|p| p.number),
                "pr_url": pull_request.as_ref().map(|p| p.url.clone()),
            })
        );
    } else {
        match branch_sha {
            Some(sha) => println!("Branch '{}' at {}", identity, sha),
            None => println!("Branch '{}' does not exist", identity),
        }
        match pull_request {
            Some(pr) => println!("Open pull request #{}: {}", pr.number, pr.url),
            None => println!("No open pull request"),
        }
    }

    Ok(())
}
