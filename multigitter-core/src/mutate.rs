//! Conflict-safe read-modify-write of files on a remote branch
//!
//! Every write is conditioned on the revision marker read immediately before
//! it. When the remote rejects the write because the file moved on, the whole
//! cycle (read, transform, write) is repeated up to a bounded number of times.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{
    BranchRef, FileWrite, RepositoryRef, RevisionMarker, WriteOutcome, WriteResult,
};
use crate::remote::ContentStore;
use crate::{Error, Result};

/// Default number of read-modify-write cycles before giving up with [`Error::Conflict`]
pub const DEFAULT_WRITE_ATTEMPTS: u32 = 5;

/// Applies pure content transforms to files on a branch
#[derive(Debug)]
pub struct ContentMutator<'a, S: ?Sized> {
    store: &'a S,
    max_attempts: u32,
    commit_message: Option<String>,
    cancel: CancellationToken,
}

impl<'a, S: ContentStore + ?Sized> ContentMutator<'a, S> {
    /// Create a mutator backed by `store` with default settings
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_WRITE_ATTEMPTS,
            commit_message: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the number of read-modify-write cycles (at least one is always made)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Use a fixed commit message instead of `Create <path>` / `Update <path>`
    pub fn with_commit_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }

    /// Abort between attempts once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Create or update `path` on `branch` with the output of `transform`
    ///
    /// `transform` receives the current content (empty when the file does not
    /// exist) and its marker (`None` when it does not exist). It must be pure:
    /// it may run once per attempt.
    ///
    /// If `transform` returns the existing content of an existing file, nothing
    /// is written and the outcome is [`WriteOutcome::Unchanged`].
    ///
    /// # Errors
    /// * [`Error::Conflict`] if every attempt lost the race against another writer
    /// * [`Error::Cancelled`] if cancellation was requested between attempts
    /// * any other remote failure, unchanged
    pub async fn upsert_file<F>(
        &self,
        repo: &RepositoryRef,
        branch: &BranchRef,
        path: &str,
        transform: F,
    ) -> Result<WriteResult>
    where
        F: Fn(&[u8], Option<&RevisionMarker>) -> Vec<u8> + Send + Sync,
    {
        for attempt in 1..=self.max_attempts {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let current = match self.store.get_file(repo, branch, path).await {
                Ok(file) => Some(file),
                Err(Error::NotFound(_)) => None,
                Err(e) => return Err(e),
            };

            let (content, marker) = match &current {
                Some(file) => (file.content.as_slice(), Some(&file.marker)),
                None => (&[][..], None),
            };

            debug!(
                repo = %repo,
                branch = %branch.name,
                path,
                attempt,
                marker = ?marker,
                "Read file"
            );

            let new_content = transform(content, marker);

            if let Some(file) = &current {
                if new_content == file.content {
                    info!(
                        repo = %repo,
                        branch = %branch.name,
                        path,
                        "Content unchanged, skipping write"
                    );
                    return Ok(WriteResult {
                        path: path.to_string(),
                        branch: branch.name.clone(),
                        marker: file.marker.clone(),
                        outcome: WriteOutcome::Unchanged,
                        attempts: attempt,
                    });
                }
            }

            let message = self.message_for(path, marker.is_some());
            let write = FileWrite {
                path,
                content: &new_content,
                expected: marker,
                message: &message,
            };

            match self.store.put_file(repo, branch, write).await {
                Ok(new_marker) => {
                    let outcome = if marker.is_some() {
                        WriteOutcome::Updated
                    } else {
                        WriteOutcome::Created
                    };
                    info!(
                        repo = %repo,
                        branch = %branch.name,
                        path,
                        marker = %new_marker,
                        ?outcome,
                        attempt,
                        "Wrote file"
                    );
                    return Ok(WriteResult {
                        path: path.to_string(),
                        branch: branch.name.clone(),
                        marker: new_marker,
                        outcome,
                        attempts: attempt,
                    });
                }
                Err(Error::MarkerMismatch { .. }) => {
                    warn!(
                        repo = %repo,
                        branch = %branch.name,
                        path,
                        attempt,
                        max_attempts = self.max_attempts,
                        "File changed since it was read, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Conflict {
            path: path.to_string(),
            attempts: self.max_attempts,
        })
    }

    fn message_for(&self, path: &str, exists: bool) -> String {
        match &self.commit_message {
            Some(message) => message.clone(),
            None if exists => format!("Update {}", path),
            None => format!("Create {}", path),
        }
    }
}
