//! Repository lookup through the search API

use async_trait::async_trait;
use multigitter_core::{Error, RepositoryDirectory, RepositoryRef, Result};
use tracing::{debug, info};

use crate::classify::{into_core, Operation};
use crate::GitHubClient;

/// Require exactly one search hit
fn single_match(query: &str, mut hits: Vec<RepositoryRef>) -> Result<RepositoryRef> {
    match hits.len() {
        1 => Ok(hits.remove(0)),
        0 => Err(Error::InvalidConfiguration(format!(
            "no repository matches '{}'",
            query
        ))),
        n => Err(Error::InvalidConfiguration(format!(
            "unexpected number of repositories for '{}': {} ({})",
            query,
            n,
            hits.iter()
                .map(|r| r.full_name())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

#[async_trait]
impl RepositoryDirectory for GitHubClient {
    async fn find_repository(&self, query: &str) -> Result<RepositoryRef> {
        debug!(query, "Searching repositories");

        let page = self
            .client()
            .search()
            .repositories(query)
            .send()
            .await
            .map_err(|e| into_core(Operation::Search, e, query))?;

        let hits: Vec<RepositoryRef> = page
            .items
            .into_iter()
            .filter_map(|repo| {
                let owner = repo.owner?.login;
                Some(RepositoryRef::new(owner, repo.name))
            })
            .collect();

        let found = single_match(query, hits)?;
        info!(query, repo = %found, "Found repository");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hit_is_returned() {
        let repo = RepositoryRef::new("alainrk", "multigitter-test-1");
        assert_eq!(
            single_match("multigitter-test-1", vec![repo.clone()]).unwrap(),
            repo
        );
    }

    #[test]
    fn test_no_hit_is_invalid_configuration() {
        let err = single_match("nothing", vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_ambiguous_hits_name_every_candidate() {
        let err = single_match(
            "multigitter-test",
            vec![
                RepositoryRef::new("alainrk", "multigitter-test-1"),
                RepositoryRef::new("alainrk", "multigitter-test-2"),
            ],
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains(": 2 ("));
        assert!(message.contains("alainrk/multigitter-test-2"));
    }
}
