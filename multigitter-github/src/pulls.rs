//! Opening pull requests for working branches

use crate::{Error, GitHubClient, Result};
use chrono::{DateTime, Utc};
use multigitter_core::RepositoryRef;
use octocrab::models::pulls::PullRequest as OctocrabPR;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Pull request representation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR title
    pub title: String,
    /// Web URL of the PR
    pub url: Option<String>,
    /// Current state (open, closed)
    pub state: PrState,
    /// When the PR was created
    pub created_at: DateTime<Utc>,
    /// Head branch name
    pub head_branch: String,
    /// Base branch name
    pub base_branch: String,
}

/// PR state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrState {
    Open,
    Closed,
}

impl From<octocrab::models::IssueState> for PrState {
    fn from(state: octocrab::models::IssueState) -> Self {
        match state {
            octocrab::models::IssueState::Closed => PrState::Closed,
            _ => PrState::Open,
        }
    }
}

impl From<OctocrabPR> for PullRequest {
    fn from(pr: OctocrabPR) -> Self {
        PullRequest {
            number: pr.number,
            title: pr.title.unwrap_or_default(),
            url: pr.html_url.map(|u| u.to_string()),
            state: pr.state.map(|s| s.into()).unwrap_or(PrState::Open),
            created_at: pr.created_at.unwrap_or_else(Utc::now),
            head_branch: pr.head.ref_field,
            base_branch: pr.base.ref_field,
        }
    }
}

/// What to open
#[derive(Debug, Clone)]
pub struct NewPullRequest<'a> {
    /// Branch carrying the change
    pub head: &'a str,
    /// Branch to merge into
    pub base: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// Whether [`GitHubClient::open_pull_request`] created a PR or found one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrOutcome {
    Opened,
    Existing,
}

impl GitHubClient {
    /// Find the open PR whose head is `branch`, if any
    pub async fn find_open_pull_request(
        &self,
        repo: &RepositoryRef,
        branch: &str,
    ) -> Result<Option<PullRequest>> {
        debug!(repo = %repo, branch, "Looking for open pull request");

        let prs = self
            .client()
            .pulls(&repo.owner, &repo.name)
            .list()
            .state(octocrab::params::State::Open)
            .head(format!("{}:{}", repo.owner, branch))
            .send()
            .await
            .map_err(Error::Api)?;

        Ok(prs
            .items
            .into_iter()
            .map(PullRequest::from)
            .find(|pr| pr.head_branch == branch))
    }

    /// Open a PR from `new.head` into `new.base`
    ///
    /// Idempotent: if an open PR already exists for the head branch it is
    /// returned instead of opening a duplicate.
    pub async fn open_pull_request(
        &self,
        repo: &RepositoryRef,
        new: &NewPullRequest<'_>,
    ) -> Result<(PullRequest, PrOutcome)> {
        if new.head == new.base {
            return Err(Error::Core(multigitter_core::Error::InvalidConfiguration(
                format!("cannot open a pull request from '{}' into itself", new.head),
            )));
        }

        if let Some(existing) = self.find_open_pull_request(repo, new.head).await? {
            info!(
                repo = %repo,
                number = existing.number,
                head = new.head,
                "Pull request already open"
            );
            return Ok((existing, PrOutcome::Existing));
        }

        let pr: PullRequest = self
            .client()
            .pulls(&repo.owner, &repo.name)
            .create(new.title, new.head, new.base)
            .body(new.body)
            .send()
            .await
            .map_err(Error::Api)?
            .into();

        info!(
            repo = %repo,
            number = pr.number,
            head = new.head,
            base = new.base,
            "Opened pull request"
        );

        Ok((pr, PrOutcome::Opened))
    }
}
