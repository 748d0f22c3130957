// Localer Engine - Core module structure
pub mod cli;
pub mod config;
pub mod github;
pub mod publish;

pub use config::Config;
pub use github::{GitHubApi, GitHubClient, GitHubError};
pub use publish::Publisher;
