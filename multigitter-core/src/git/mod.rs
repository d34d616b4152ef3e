//! Local git operations for multigitter
//!
//! This module provides repository URL parsing, cloning with bounded retries,
//! the clone backends (git CLI and libgit2) and inspection of local checkouts.

mod backend;
mod clone;
mod repo;

pub use backend::{
    CloneBackend, CloneFailure, FailureKind, GitCli, Libgit2, ProgressSink, TracingSink,
};
pub use clone::{
    cached_repo_path, default_repos_cache_dir, CloneAttempt, CloneOutcome, RepoFetcher, RepoUrl,
};
pub use repo::GitRepo;
