//! CLI command implementations

pub mod apply;
pub mod branch;
pub mod clone;
pub mod find;
pub mod secrets;

pub use apply::ApplyArgs;
pub use branch::BranchArgs;
pub use clone::CloneArgs;
pub use find::FindArgs;
pub use secrets::SecretsArgs;

use multigitter_core::{Config, RepositoryDirectory, RepositoryRef, Secrets};
use multigitter_github::GitHubClient;

/// Build a GitHub client from GITHUB_TOKEN or the secrets file
pub(crate) fn github_client() -> anyhow::Result<GitHubClient> {
    let secrets = Secrets::load()?;
    Ok(GitHubClient::from_secrets(&secrets)?)
}

/// Repository named directly on the command line, without searching
///
/// `owner/repo` and GitHub URLs are taken as is. A bare repository name
/// belongs to the configured GitHub username, when there is one.
fn direct_repository(arg: &str, username: Option<&str>) -> Option<RepositoryRef> {
    if let Ok(repo) = RepositoryRef::parse(arg) {
        return Some(repo);
    }

    let is_bare_name = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    match username {
        Some(owner) if is_bare_name => Some(RepositoryRef::new(owner, arg)),
        _ => None,
    }
}

/// Turn a command line repository argument into a repository
///
/// Anything not named directly is a search query that must match exactly
/// one repository.
pub(crate) async fn resolve_repository(
    client: &GitHubClient,
    config: &Config,
    arg: &str,
) -> anyhow::Result<RepositoryRef> {
    if let Some(repo) = direct_repository(arg, config.github.username.as_deref()) {
        return Ok(repo);
    }

    tracing::debug!(query = arg, "Not a repository name, searching");
    Ok(client.find_repository(arg).await?)
}
