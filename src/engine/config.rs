//! Localer Configuration Module
//! Handles loading and validating localer.config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the API token. The token is never written
/// to the config file.
pub const TOKEN_ENV: &str = "LOCALER_GITHUB_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid config format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Missing API token: set {TOKEN_ENV}")]
    MissingToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub project: ProjectConfig,
    pub github: GitHubConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "default_locale_dir")]
    pub locale_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_locale_dir() -> String {
    "locales".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn load(project_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = project_dir.join("localer.config.json");
        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }
        let content = std::fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, project_dir: &Path) -> Result<(), ConfigError> {
        let config_path = project_dir.join("localer.config.json");
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn default_for_project(name: &str, owner: &str, repo: &str) -> Self {
        Self {
            version: "0.1.0".to_string(),
            project: ProjectConfig {
                name: name.to_string(),
                id: format!("localer-{}", name),
            },
            github: GitHubConfig {
                owner: owner.to_string(),
                repo: repo.to_string(),
                default_branch: default_branch(),
                locale_dir: default_locale_dir(),
            },
            http: HttpConfig::default(),
        }
    }
}

/// Read the API token from the environment.
pub fn github_token() -> Result<String, ConfigError> {
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Ok(token),
        _ => Err(ConfigError::MissingToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_round_trip() {
        let dir = tempdir().unwrap();

        let config = Config::default_for_project("gump", "gump-org", "translations");
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.project.name, "gump");
        assert_eq!(loaded.github.owner, "gump-org");
        assert_eq!(loaded.github.default_branch, "main");
        assert_eq!(loaded.github.locale_dir, "locales");
        assert_eq!(loaded.http.timeout_secs, 30);
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempdir().unwrap();
        let result = Config::load(dir.path());
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_defaults_fill_omitted_fields() {
        let dir = tempdir().unwrap();
        let content = r#"{
            "version": "0.1.0",
            "project": { "name": "gump", "id": "localer-gump" },
            "github": { "owner": "gump-org", "repo": "translations" }
        }"#;
        std::fs::write(dir.path().join("localer.config.json"), content).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.github.default_branch, "main");
        assert_eq!(loaded.github.locale_dir, "locales");
        assert_eq!(loaded.http.timeout_secs, 30);
    }
}
