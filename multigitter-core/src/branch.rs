//! Working branch resolution
//!
//! Maps a desired branch name to a branch that exists on the remote, deriving
//! it from a base branch when it is missing. Resolution is an idempotent
//! get-or-create: once the branch exists every further call is a plain lookup.

use tracing::{debug, info};

use crate::model::{BranchRef, RepositoryRef};
use crate::remote::RefStore;
use crate::{Error, Result};

/// Resolves working branches against a [`RefStore`]
#[derive(Debug)]
pub struct BranchResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RefStore + ?Sized> BranchResolver<'a, S> {
    /// Create a resolver backed by `store`
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Return `branch`, creating it from the tip of `base` if it does not exist yet
    ///
    /// # Errors
    /// * [`Error::InvalidConfiguration`] if the branch is missing and `base` is
    ///   empty or equal to `branch`
    /// * [`Error::NotFound`] if the branch is missing and so is `base`
    /// * any other remote failure, unchanged
    pub async fn resolve(
        &self,
        repo: &RepositoryRef,
        branch: &str,
        base: &str,
    ) -> Result<BranchRef> {
        if branch.is_empty() {
            return Err(Error::InvalidConfiguration(
                "the working branch name must not be empty".to_string(),
            ));
        }

        match self.store.get_ref(repo, branch).await {
            Ok(existing) => {
                debug!(
                    repo = %repo,
                    branch = %existing.name,
                    commit = %existing.commit,
                    "Working branch already exists"
                );
                return Ok(existing);
            }
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        if branch == base {
            return Err(Error::InvalidConfiguration(format!(
                "branch '{}' does not exist in {} and cannot be created from itself; \
                 choose a different base branch",
                branch, repo
            )));
        }

        if base.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "branch '{}' does not exist in {} and no base branch was given to create it from",
                branch, repo
            )));
        }

        let base_ref = match self.store.get_ref(repo, base).await {
            Ok(base_ref) => base_ref,
            Err(Error::NotFound(_)) => {
                return Err(Error::NotFound(format!(
                    "base branch '{}' in {}",
                    base, repo
                )))
            }
            Err(e) => return Err(e),
        };

        debug!(
            repo = %repo,
            branch,
            base = %base_ref.name,
            commit = %base_ref.commit,
            "Creating working branch"
        );

        match self.store.create_ref(repo, branch, &base_ref.commit).await {
            Ok(created) => {
                info!(
                    repo = %repo,
                    branch = %created.name,
                    commit = %created.commit,
                    "Created working branch"
                );
                Ok(created)
            }
            Err(Error::AlreadyExists(_)) => {
                // Someone else created it between our lookup and our create.
                debug!(repo = %repo, branch, "Branch created concurrently, fetching it");
                self.store.get_ref(repo, branch).await
            }
            Err(e) => Err(e),
        }
    }
}
