//! GitHub token lookup
//!
//! The token comes from `GITHUB_TOKEN`, falling back to
//! `~/.config/multigitter/secrets.toml`. The file is kept apart from
//! `config.toml` and must not be readable by group or others.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Error, Result};

const TEMPLATE: &str = r#"# multigitter secrets, keep this file private (chmod 600)

[github]
# Personal access token with Contents and Pull requests read/write
token = ""
"#;

/// Credentials available to the GitHub client
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    file_token: Option<String>,
}

/// On-disk layout of `secrets.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SecretsFile {
    github: GitHubSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GitHubSection {
    token: Option<String>,
}

fn secrets_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("multigitter").join("secrets.toml"))
}

/// Non-empty trimmed token
fn usable(token: &str) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(unix)]
fn ensure_private(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(Error::Config(format!(
            "{} is accessible by other users (mode {:o}); run chmod 600 {}",
            path.display(),
            mode,
            path.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_private(_path: &Path) -> Result<()> {
    Ok(())
}

impl Secrets {
    /// Read the secrets file if there is one
    pub fn load() -> Result<Self> {
        match secrets_path() {
            Some(path) if path.exists() => Self::read(&path),
            _ => Ok(Self::default()),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        ensure_private(path)?;

        let contents = std::fs::read_to_string(path)?;
        let file: SecretsFile = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded secrets file");

        Ok(Self {
            file_token: file.github.token.as_deref().and_then(usable),
        })
    }

    /// GitHub token, `GITHUB_TOKEN` first
    pub fn github_token(&self) -> Option<String> {
        self.token_with(std::env::var("GITHUB_TOKEN").ok())
    }

    fn token_with(&self, env_token: Option<String>) -> Option<String> {
        env_token
            .as_deref()
            .and_then(usable)
            .or_else(|| self.file_token.clone())
    }

    /// Write an empty secrets file at the default location and return its path
    pub fn create_template() -> Result<PathBuf> {
        let path = secrets_path()
            .ok_or_else(|| Error::Config("Could not determine secrets path".to_string()))?;
        write_template(&path)?;
        Ok(path)
    }
}

/// Create `path` with the template and mode 0600, never overwriting
fn write_template(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::Config(format!(
            "Secrets file already exists at {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, TEMPLATE)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    warn!(path = %path.display(), "Created secrets template, add your token to it");
    Ok(())
}
