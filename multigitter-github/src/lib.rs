//! multigitter GitHub - GitHub backend for multigitter
//!
//! Implements the core capability traits on top of the GitHub REST API:
//! branch refs, file contents with SHA-conditioned writes, and repository
//! search. Also opens pull requests for the working branch.

mod classify;
mod client;
mod contents;
mod error;
mod pulls;
mod refs;
mod search;

pub use client::GitHubClient;
pub use error::{Error, Result};
pub use pulls::{NewPullRequest, PrOutcome, PrState, PullRequest};
