//! GitHub API client using octocrab

use crate::{Error, Result};
use multigitter_core::Secrets;
use octocrab::Octocrab;
use tracing::debug;

/// Authenticated GitHub session
///
/// Built once by the caller and passed by reference to everything that talks
/// to GitHub. Implements the core capability traits
/// ([`RefStore`](multigitter_core::RefStore),
/// [`ContentStore`](multigitter_core::ContentStore),
/// [`RepositoryDirectory`](multigitter_core::RepositoryDirectory)).
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    /// Create a client authenticated with a personal access token
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let client = Octocrab::builder()
            .personal_token(token.into())
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        debug!("Created GitHub client");

        Ok(Self { client })
    }

    /// Create a client from loaded secrets
    ///
    /// Token is taken from (in priority order):
    /// 1. GITHUB_TOKEN environment variable
    /// 2. ~/.config/multigitter/secrets.toml
    pub fn from_secrets(secrets: &Secrets) -> Result<Self> {
        let token = secrets.github_token().ok_or_else(|| {
            Error::Auth(
                "GitHub token not found. Set GITHUB_TOKEN environment variable \
                 or add token to ~/.config/multigitter/secrets.toml"
                    .to_string(),
            )
        })?;

        Self::new(token)
    }

    /// Wrap an already configured octocrab instance
    pub fn from_octocrab(client: Octocrab) -> Self {
        Self { client }
    }

    /// Get the underlying octocrab client
    pub fn client(&self) -> &Octocrab {
        &self.client
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient").finish_non_exhaustive()
    }
}
