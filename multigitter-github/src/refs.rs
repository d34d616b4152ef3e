//! Branch reference lookup and creation

use async_trait::async_trait;
use multigitter_core::{BranchRef, Error, RefStore, RepositoryRef, Result};
use octocrab::models::repos::{Object, Ref};
use octocrab::params::repos::Reference;
use tracing::debug;

use crate::classify::{into_core, Operation};
use crate::GitHubClient;

/// Convert a ref response into a branch pointing at a commit
fn branch_from_ref(git_ref: Ref, what: &str) -> Result<BranchRef> {
    match git_ref.object {
        Object::Commit { sha, .. } => Ok(BranchRef::new(&git_ref.ref_field, sha)),
        _ => Err(Error::Remote(format!("{} does not point at a commit", what))),
    }
}

#[async_trait]
impl RefStore for GitHubClient {
    async fn get_ref(&self, repo: &RepositoryRef, branch: &str) -> Result<BranchRef> {
        debug!(repo = %repo, branch, "Fetching branch ref");
        let what = format!("branch '{}' in {}", branch, repo);

        let git_ref = self
            .client()
            .repos(&repo.owner, &repo.name)
            .get_ref(&Reference::Branch(branch.to_string()))
            .await
            .map_err(|e| into_core(Operation::GetRef, e, &what))?;

        branch_from_ref(git_ref, &what)
    }

    async fn create_ref(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        commit: &str,
    ) -> Result<BranchRef> {
        debug!(repo = %repo, branch, commit, "Creating branch ref");
        let what = format!("branch '{}' in {}", branch, repo);

        let git_ref = self
            .client()
            .repos(&repo.owner, &repo.name)
            .create_ref(&Reference::Branch(branch.to_string()), commit)
            .await
            .map_err(|e| into_core(Operation::CreateRef, e, &what))?;

        branch_from_ref(git_ref, &what)
    }
}
