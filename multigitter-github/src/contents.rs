//! File reads and conditional writes through the contents API
//!
//! The revision marker of a file is its blob SHA. Updates send the SHA that
//! was read; GitHub rejects the write when the file has moved on since.

use async_trait::async_trait;
use base64::prelude::BASE64_STANDARD;
use base64::Engine as _;
use multigitter_core::{
    BranchRef, ContentStore, Error, FileRevision, FileWrite, RepositoryRef, Result,
    RevisionMarker,
};
use tracing::debug;

use crate::classify::{into_core, Operation};
use crate::GitHubClient;

/// Decode the base64 payload of a contents response, which GitHub wraps in lines
fn decode_content(encoded: &str) -> Option<Vec<u8>> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    BASE64_STANDARD.decode(compact).ok()
}

#[async_trait]
impl ContentStore for GitHubClient {
    async fn get_file(
        &self,
        repo: &RepositoryRef,
        branch: &BranchRef,
        path: &str,
    ) -> Result<FileRevision> {
        debug!(repo = %repo, branch = %branch.name, path, "Fetching file");
        let what = format!("{} on {} in {}", path, branch.short_name(), repo);

        let mut items = self
            .client()
            .repos(&repo.owner, &repo.name)
            .get_content()
            .path(path)
            .r#ref(branch.short_name())
            .send()
            .await
            .map_err(|e| into_core(Operation::GetFile, e, &what))?
            .items;

        // A directory answers with a listing, even when it holds a single file
        let requested = path.trim_start_matches('/');
        if items.len() != 1 || items[0].r#type != "file" || items[0].path != requested {
            return Err(Error::InvalidConfiguration(format!(
                "{} is not a regular file",
                what
            )));
        }
        let item = items.remove(0);

        let content = match item.encoding.as_deref() {
            Some("base64") | None => decode_content(item.content.as_deref().unwrap_or(""))
                .ok_or_else(|| Error::Remote(format!("{} has malformed base64 content", what)))?,
            Some(other) => {
                return Err(Error::Remote(format!(
                    "{} is served with unsupported encoding '{}'",
                    what, other
                )))
            }
        };

        Ok(FileRevision {
            path: path.to_string(),
            content,
            marker: RevisionMarker::new(item.sha),
        })
    }

    async fn put_file(
        &self,
        repo: &RepositoryRef,
        branch: &BranchRef,
        write: FileWrite<'_>,
    ) -> Result<RevisionMarker> {
        debug!(
            repo = %repo,
            branch = %branch.name,
            path = write.path,
            expected = ?write.expected,
            "Writing file"
        );

        let repos = self.client().repos(&repo.owner, &repo.name);
        let update = match write.expected {
            Some(marker) => {
                repos
                    .update_file(write.path, write.message, write.content, marker.as_str())
                    .branch(branch.short_name())
                    .send()
                    .await
            }
            None => {
                repos
                    .create_file(write.path, write.message, write.content)
                    .branch(branch.short_name())
                    .send()
                    .await
            }
        }
        .map_err(|e| into_core(Operation::PutFile, e, write.path))?;

        Ok(RevisionMarker::new(update.content.sha))
    }
}
