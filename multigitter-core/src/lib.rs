//! Multigitter Core - branch reconciliation and conflict-safe file mutation
//!
//! This crate holds the decision logic of multigitter: resolving (or creating)
//! a working branch on a remote, applying a read-modify-write change to a file
//! without losing concurrent edits, and cloning repositories with bounded
//! retries. Remote services are reached through the capability traits in
//! [`remote`]; the GitHub implementation lives in `multigitter-github`.

pub mod branch;
pub mod config;
pub mod error;
pub mod git;
pub mod model;
pub mod mutate;
pub mod remote;
pub mod secrets;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

pub use branch::BranchResolver;
pub use config::{
    BranchConfig, CloneBackendKind, CloneConfig, Config, GitHubConfig, MutationConfig, Overrides,
};
pub use error::{Error, Result};
pub use git::{
    cached_repo_path, default_repos_cache_dir, CloneAttempt, CloneBackend, CloneFailure,
    CloneOutcome, FailureKind, GitCli, GitRepo, Libgit2, ProgressSink, RepoFetcher, RepoUrl,
    TracingSink,
};
pub use model::{
    branch_ref_name, BranchRef, FileRevision, FileWrite, RepositoryRef, RevisionMarker,
    WriteOutcome, WriteResult,
};
pub use mutate::{ContentMutator, DEFAULT_WRITE_ATTEMPTS};
pub use remote::{ContentStore, RefStore, RepositoryDirectory};
pub use secrets::Secrets;
