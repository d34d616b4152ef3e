//! Apply command - change one file on the working branch

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::{ArgGroup, Args};
use multigitter_core::{
    transform, BranchResolver, Config, ContentMutator, RefStore, RepositoryRef, RevisionMarker,
    WriteOutcome, WriteResult,
};
use multigitter_github::{NewPullRequest, PrOutcome, PullRequest};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::{github_client, resolve_repository};

/// Arguments for the apply command
#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("change")
        .required(true)
        .args(["append_line", "stamp", "set_from", "ensure_exists"])
))]
pub struct ApplyArgs {
    /// Repository (owner/repo, URL, or a search query matching one repository)
    #[arg(required = true)]
    pub repo: String,

    /// Path of the file inside the repository
    #[arg(required = true)]
    pub path: String,

    /// Append a line of text
    #[arg(long, value_name = "TEXT")]
    pub append_line: Option<String>,

    /// Append an "Updated from API at <time>" line
    #[arg(long)]
    pub stamp: bool,

    /// Replace the content with a local file
    #[arg(long, value_name = "FILE")]
    pub set_from: Option<PathBuf>,

    /// Create the file empty if it is missing, otherwise leave it alone
    #[arg(long)]
    pub ensure_exists: bool,

    /// Commit message (defaults to "Create <path>" / "Update <path>")
    #[arg(short, long)]
    pub message: Option<String>,

    /// Read-modify-write attempts before giving up on a contended file
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: Option<u32>,

    /// Open a pull request from the working branch into the base branch
    #[arg(long)]
    pub pr: bool,

    /// Pull request title
    #[arg(long, requires = "pr")]
    pub title: Option<String>,

    /// Pull request body
    #[arg(long, requires = "pr")]
    pub body: Option<String>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// The content change selected on the command line
///
/// Everything is resolved up front so that applying it is pure and can be
/// repeated on every write attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Change {
    AppendLine(String),
    Replace(Vec<u8>),
    EnsureExists,
}

impl Change {
    fn apply(&self, content: &[u8], marker: Option<&RevisionMarker>) -> Vec<u8> {
        match self {
            Change::AppendLine(line) => transform::append_line(content, line),
            Change::Replace(bytes) => bytes.clone(),
            Change::EnsureExists => transform::ensure_exists(content, marker),
        }
    }
}

/// Whether a pull request would be empty: nothing was written and the
/// working branch still sits on the base commit
fn nothing_to_propose(outcome: WriteOutcome, head_commit: &str, base_commit: &str) -> bool {
    outcome == WriteOutcome::Unchanged && head_commit == base_commit
}

#[derive(Debug, Serialize)]
struct ApplyReport<'a> {
    repository: &'a RepositoryRef,
    write: &'a WriteResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pull_request: Option<PullRequestReport<'a>>,
}

#[derive(Debug, Serialize)]
struct PullRequestReport<'a> {
    outcome: PrOutcome,
    #[serde(flatten)]
    pull_request: &'a PullRequest,
}

impl ApplyArgs {
    /// Resolve the selected change, reading local files and the clock once
    fn change(&self, now: DateTime<Utc>) -> anyhow::Result<Change> {
        if let Some(line) = &self.append_line {
            return Ok(Change::AppendLine(line.clone()));
        }
        if self.stamp {
            let timestamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
            return Ok(Change::AppendLine(transform::stamp_line(&timestamp)));
        }
        if let Some(source) = &self.set_from {
            let bytes = std::fs::read(source).map_err(|e| {
                anyhow::anyhow!("Failed to read {}: {}", source.display(), e)
            })?;
            return Ok(Change::Replace(bytes));
        }
        if self.ensure_exists {
            return Ok(Change::EnsureExists);
        }

        anyhow::bail!(
            "No change selected. Use --append-line, --stamp, --set-from or --ensure-exists"
        )
    }

    /// Execute the apply command
    pub async fn execute(&self, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
        let change = self.change(Utc::now())?;

        let client = github_client()?;
        let repo = resolve_repository(&client, config, &self.repo).await?;

        let branch = BranchResolver::new(&client)
            .resolve(&repo, &config.branch.name, &config.branch.base)
            .await?;

        let mut mutator = ContentMutator::new(&client)
            .with_max_attempts(config.mutation.max_attempts)
            .with_cancellation(cancel);
        if let Some(message) = &config.mutation.commit_message {
            mutator = mutator.with_commit_message(message.clone());
        }

        let result = mutator
            .upsert_file(&repo, &branch, &self.path, |content, marker| {
                change.apply(content, marker)
            })
            .await?;

        let mut pr_skipped = false;
        if self.pr && result.outcome == WriteOutcome::Unchanged {
            let base = client.get_ref(&repo, &config.branch.base).await?;
            pr_skipped = nothing_to_propose(result.outcome, &branch.commit, &base.commit);
            if pr_skipped {
                tracing::warn!(
                    repo = %repo,
                    branch = %branch.short_name(),
                    "Branch has no changes, not opening a pull request"
                );
            }
        }

        let pull_request = if self.pr && !pr_skipped {
            let title = self
                .title
                .clone()
                .unwrap_or_else(|| format!("multigitter: update {}", self.path));
            let body = self.body.clone().unwrap_or_default();
            let new = NewPullRequest {
                head: branch.short_name(),
                base: &config.branch.base,
                title: &title,
                body: &body,
            };
            Some(client.open_pull_request(&repo, &new).await?)
        } else {
            None
        };

        if self.json {
            let report = ApplyReport {
                repository: &repo,
                write: &result,
                pull_request: pull_request.as_ref().map(|(pr, outcome)| PullRequestReport {
                    outcome: *outcome,
                    pull_request: pr,
                }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        let verb = match result.outcome {
            WriteOutcome::Created => "Created",
            WriteOutcome::Updated => "Updated",
            WriteOutcome::Unchanged => "Unchanged",
        };
        println!("{} {} on {} in {}", verb, result.path, branch.short_name(), repo);
        println!("  revision: {}", result.marker);
        if result.attempts > 1 {
            println!("  attempts: {}", result.attempts);
        }

        if pr_skipped {
            println!(
                "No pull request: {} has no changes over {}",
                branch.short_name(),
                config.branch.base
            );
        }

        if let Some((pr, outcome)) = &pull_request {
            let label = match outcome {
                PrOutcome::Opened => "Opened",
                PrOutcome::Existing => "Existing",
            };
            println!(
                "{} pull request #{}: {}",
                label,
                pr.number,
                pr.url.as_deref().unwrap_or(&pr.title)
            );
        }

        Ok(())
    }
}
