//! Localer CLI Module
//! Command-line interface for publishing translation changes

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "localer")]
#[command(author = "Localer Team")]
#[command(version)]
#[command(about = "GitHub-backed translation publishing tool", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn get_project_dir(&self) -> PathBuf {
        self.project
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish locale files as a pull request for an identity
    Publish {
        /// Identity the working branch is named after
        #[arg(short, long)]
        identity: String,

        /// Locale file names under the configured locale directory
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Show branch and pull request state for an identity
    Status {
        /// Identity the working branch is named after
        #[arg(short, long)]
        identity: String,
    },
}
