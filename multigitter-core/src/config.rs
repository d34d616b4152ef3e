//! Configuration management for multigitter
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (MULTIGITTER_*, GITHUB_USERNAME)
//! 3. Config file (~/.config/multigitter/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mutate::DEFAULT_WRITE_ATTEMPTS;
use crate::{Error, Result};

/// Working branch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BranchConfig {
    /// Branch that changes are committed to
    pub name: String,

    /// Branch the working branch is created from when missing
    pub base: String,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            name: "multigitter".to_string(),
            base: "main".to_string(),
        }
    }
}

/// File mutation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Read-modify-write cycles before giving up on a contended file
    pub max_attempts: u32,

    /// Fixed commit message (defaults to "Create <path>" / "Update <path>")
    pub commit_message: Option<String>,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_WRITE_ATTEMPTS,
            commit_message: None,
        }
    }
}

/// Which clone mechanism to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneBackendKind {
    /// Spawn the git executable
    #[default]
    Git,
    /// Clone in-process with libgit2
    Libgit2,
}

impl std::str::FromStr for CloneBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "git" => Ok(Self::Git),
            "libgit2" | "git2" => Ok(Self::Libgit2),
            other => Err(Error::Config(format!(
                "Unknown clone backend '{}'. Expected git or libgit2",
                other
            ))),
        }
    }
}

/// Clone configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloneConfig {
    /// Attempts before giving up
    pub max_attempts: u32,

    /// Pause between attempts
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Clone mechanism
    pub backend: CloneBackendKind,

    /// Where clones go by default (`~/.cache/multigitter/repos` when unset)
    pub cache_dir: Option<PathBuf>,

    /// Path to the git executable for the `git` backend
    pub git_path: String,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            backend: CloneBackendKind::Git,
            cache_dir: None,
            git_path: "git".to_string(),
        }
    }
}

/// GitHub account configuration (the token lives in secrets)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Login the changes are made as
    pub username: Option<String>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub branch: BranchConfig,
    pub mutation: MutationConfig,
    pub clone: CloneConfig,
    pub github: GitHubConfig,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub branch: Option<String>,
    pub base: Option<String>,
    pub write_attempts: Option<u32>,
    pub clone_attempts: Option<u32>,
    pub commit_message: Option<String>,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/multigitter/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("multigitter").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - MULTIGITTER_BRANCH: working branch name
    /// - MULTIGITTER_BASE_BRANCH: base branch name
    /// - MULTIGITTER_MAX_WRITE_ATTEMPTS: write attempts per file
    /// - MULTIGITTER_CLONE_ATTEMPTS: clone attempts
    /// - GITHUB_USERNAME: GitHub login
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(branch) = lookup("MULTIGITTER_BRANCH") {
            self.branch.name = branch;
        }

        if let Some(base) = lookup("MULTIGITTER_BASE_BRANCH") {
            self.branch.base = base;
        }

        if let Some(attempts) = lookup("MULTIGITTER_MAX_WRITE_ATTEMPTS") {
            self.mutation.max_attempts =
                parse_attempts("MULTIGITTER_MAX_WRITE_ATTEMPTS", &attempts)?;
        }

        if let Some(attempts) = lookup("MULTIGITTER_CLONE_ATTEMPTS") {
            self.clone.max_attempts = parse_attempts("MULTIGITTER_CLONE_ATTEMPTS", &attempts)?;
        }

        if let Some(username) = lookup("GITHUB_USERNAME") {
            let username = username.trim().to_string();
            if !username.is_empty() {
                self.github.username = Some(username);
            }
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(branch) = overrides.branch {
            self.branch.name = branch;
        }

        if let Some(base) = overrides.base {
            self.branch.base = base;
        }

        if let Some(attempts) = overrides.write_attempts {
            self.mutation.max_attempts = attempts;
        }

        if let Some(attempts) = overrides.clone_attempts {
            self.clone.max_attempts = attempts;
        }

        if let Some(message) = overrides.commit_message {
            self.mutation.commit_message = Some(message);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(config_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };

        Ok(base.with_env_overrides()?.with_cli_overrides(overrides))
    }
}

fn parse_attempts(var: &str, value: &str) -> Result<u32> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{} must be a positive integer, got '{}'",
            var, value
        ))),
    }
}
