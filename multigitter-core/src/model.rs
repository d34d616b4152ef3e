//! Data model shared by the resolver, the mutator and the remote implementations

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::git::RepoUrl;
use crate::Result;

/// Prefix of fully qualified branch reference names
pub const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Build the fully qualified reference name for a branch
///
/// Names that already carry the `refs/heads/` prefix are returned unchanged.
pub fn branch_ref_name(branch: &str) -> String {
    if branch.starts_with(BRANCH_REF_PREFIX) {
        branch.to_string()
    } else {
        format!("{}{}", BRANCH_REF_PREFIX, branch)
    }
}

/// Identifier of a remote repository, resolved once per session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Repository owner/organization
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl RepositoryRef {
    /// Create a repository identifier
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parse `owner/repo`, an HTTPS URL or an SSH URL
    pub fn parse(input: &str) -> Result<Self> {
        Ok(RepoUrl::parse(input)?.into())
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl From<RepoUrl> for RepositoryRef {
    fn from(url: RepoUrl) -> Self {
        Self {
            owner: url.owner,
            name: url.repo,
        }
    }
}

/// A branch on the remote and the commit it points to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Fully qualified name, e.g. `refs/heads/feature-x`
    pub name: String,
    /// Commit SHA the branch points to
    pub commit: String,
}

impl BranchRef {
    /// Create a branch reference, qualifying the name if needed
    pub fn new(name: &str, commit: impl Into<String>) -> Self {
        Self {
            name: branch_ref_name(name),
            commit: commit.into(),
        }
    }

    /// Branch name without the `refs/heads/` prefix
    pub fn short_name(&self) -> &str {
        self.name
            .strip_prefix(BRANCH_REF_PREFIX)
            .unwrap_or(&self.name)
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = &self.commit[..self.commit.len().min(8)];
        write!(f, "{} ({})", self.name, short)
    }
}

/// Opaque token identifying one version of a file's content
///
/// On GitHub this is the blob SHA of the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionMarker(String);

impl RevisionMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self(marker.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file as observed on a branch, owned for one read-modify-write cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRevision {
    /// Path of the file inside the repository
    pub path: String,
    /// Current content
    pub content: Vec<u8>,
    /// Marker of the observed version
    pub marker: RevisionMarker,
}

/// A conditional write submitted to a [`ContentStore`](crate::ContentStore)
#[derive(Debug, Clone)]
pub struct FileWrite<'a> {
    /// Path of the file inside the repository
    pub path: &'a str,
    /// New content
    pub content: &'a [u8],
    /// Marker observed immediately before this write; `None` creates the file
    pub expected: Option<&'a RevisionMarker>,
    /// Commit message for the write
    pub message: &'a str,
}

/// What a successful upsert did to the file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOutcome {
    /// The file did not exist and was created
    Created,
    /// The file existed and its content was replaced
    Updated,
    /// The transform produced identical content, nothing was written
    Unchanged,
}

/// Result of [`ContentMutator::upsert_file`](crate::ContentMutator::upsert_file)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    /// Path of the file inside the repository
    pub path: String,
    /// Branch the file lives on
    pub branch: String,
    /// Marker of the version now on the branch
    pub marker: RevisionMarker,
    /// What happened to the file
    pub outcome: WriteOutcome,
    /// Number of read-modify-write cycles it took
    pub attempts: u32,
}
