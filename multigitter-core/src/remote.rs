//! Capabilities a remote forge must provide
//!
//! The resolver and the mutator only ever talk to a remote through these
//! traits. Implementations must report failures with the matching
//! [`Error`](crate::Error) kind so the core can tell races apart from real
//! failures:
//!
//! | capability                  | expected failure                  |
//! |-----------------------------|-----------------------------------|
//! | [`RefStore::get_ref`]       | [`Error::NotFound`]               |
//! | [`RefStore::create_ref`]    | [`Error::AlreadyExists`]          |
//! | [`ContentStore::get_file`]  | [`Error::NotFound`]               |
//! | [`ContentStore::put_file`]  | [`Error::MarkerMismatch`]         |
//!
//! Anything else is surfaced to the caller unchanged.
//!
//! [`Error::NotFound`]: crate::Error::NotFound
//! [`Error::AlreadyExists`]: crate::Error::AlreadyExists
//! [`Error::MarkerMismatch`]: crate::Error::MarkerMismatch

use async_trait::async_trait;

use crate::model::{BranchRef, FileRevision, FileWrite, RepositoryRef, RevisionMarker};
use crate::Result;

/// Read and create branch references
#[async_trait]
pub trait RefStore: Send + Sync {
    /// Look up a branch by its short name
    async fn get_ref(&self, repo: &RepositoryRef, branch: &str) -> Result<BranchRef>;

    /// Create a branch pointing at `commit`
    async fn create_ref(&self, repo: &RepositoryRef, branch: &str, commit: &str)
        -> Result<BranchRef>;
}

/// Read and conditionally write file contents on a branch
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read a file and the marker of its current version
    async fn get_file(
        &self,
        repo: &RepositoryRef,
        branch: &BranchRef,
        path: &str,
    ) -> Result<FileRevision>;

    /// Write a file, rejecting the write if the file no longer matches `write.expected`
    ///
    /// Returns the marker of the newly written version.
    async fn put_file(
        &self,
        repo: &RepositoryRef,
        branch: &BranchRef,
        write: FileWrite<'_>,
    ) -> Result<RevisionMarker>;
}

/// Find a repository from a search query
#[async_trait]
pub trait RepositoryDirectory: Send + Sync {
    /// Resolve a query to exactly one repository
    async fn find_repository(&self, query: &str) -> Result<RepositoryRef>;
}
