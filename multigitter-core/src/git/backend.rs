//! Clone backends
//!
//! ```text
//! GitCli   spawns `git clone --progress`, streams stderr
//! Libgit2  git2::build::RepoBuilder on a blocking thread
//! ```
//!
//! Both report progress lines to a [`ProgressSink`] and classify failures as
//! transient (worth retrying) or fatal (will fail the same way every time).

use std::collections::VecDeque;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use git2::build::RepoBuilder;
use git2::{ErrorClass, ErrorCode, FetchOptions, RemoteCallbacks};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

/// Number of stderr lines kept for error reporting
const STDERR_TAIL_LINES: usize = 20;

/// Output fragments that mean retrying will not help
const FATAL_PATTERNS: &[&str] = &[
    "Authentication failed",
    "Permission denied",
    "could not read Username",
    "Repository not found",
    "does not exist",
    "not found",
    "already exists and is not an empty directory",
    "not a valid repository",
];

/// Receives textual progress while a clone runs
pub trait ProgressSink: Send + Sync {
    fn progress(&self, line: &str);
}

/// Forwards progress to `tracing` under the `multigitter::clone` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn progress(&self, line: &str) {
        info!(target: "multigitter::clone", "{}", line);
    }
}

/// Whether a failed clone is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Network hiccup, likely to succeed on retry
    Transient,
    /// Deterministic failure (bad credentials, missing remote)
    Fatal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => f.write_str("transient"),
            FailureKind::Fatal => f.write_str("fatal"),
        }
    }
}

/// Why a single clone attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl CloneFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Fatal,
            message: message.into(),
        }
    }

    /// Classify the output of a failed `git clone`
    pub fn from_output(output: &str) -> Self {
        let message = output.trim().to_string();
        if is_fatal_message(&message) {
            Self::fatal(message)
        } else {
            Self::transient(message)
        }
    }

    fn from_git2(err: git2::Error) -> Self {
        let message = err.message().to_string();
        if is_fatal_message(&message) {
            return Self::fatal(message);
        }

        match (err.code(), err.class()) {
            (
                ErrorCode::Auth | ErrorCode::Certificate | ErrorCode::NotFound | ErrorCode::Exists,
                _,
            ) => {
                Self::fatal(message)
            }
            (
                _,
                ErrorClass::Net
                | ErrorClass::Os
                | ErrorClass::Ssl
                | ErrorClass::Http
                | ErrorClass::Ssh,
            ) => {
                Self::transient(message)
            }
            _ => Self::fatal(message),
        }
    }
}

impl fmt::Display for CloneFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}): {}", self.kind, self.message)
    }
}

fn is_fatal_message(message: &str) -> bool {
    FATAL_PATTERNS.iter().any(|p| message.contains(p))
}

/// Last non-empty `\r`/`\n` separated segment of a progress chunk
fn last_segment(chunk: &str) -> Option<&str> {
    chunk
        .split(|c| c == '\r' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .last()
}

/// A mechanism able to clone a remote into a local directory
#[async_trait]
pub trait CloneBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Clone `url` into `destination`, which is absent or an empty directory
    async fn fetch_into(
        &self,
        url: &str,
        destination: &Path,
        sink: Arc<dyn ProgressSink>,
    ) -> std::result::Result<(), CloneFailure>;
}

/// Clones by spawning the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    git_path: String,
}

impl GitCli {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self {
            git_path: "git".to_string(),
        }
    }

    /// Use a specific git executable
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.git_path = path.into();
        self
    }

    /// `git clone` invocation; `--` keeps a URL starting with `-` from being read as an option
    fn clone_command(&self, url: &str, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.git_path);
        cmd.arg("clone")
            .arg("--progress")
            .arg("--")
            .arg(url)
            .arg(destination)
            .env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloneBackend for GitCli {
    fn name(&self) -> &'static str {
        "git"
    }

    async fn fetch_into(
        &self,
        url: &str,
        destination: &Path,
        sink: Arc<dyn ProgressSink>,
    ) -> std::result::Result<(), CloneFailure> {
        let mut child = self
            .clone_command(url, destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CloneFailure::fatal(format!(
                        "git executable not found at '{}'. Is git installed?",
                        self.git_path
                    ))
                } else {
                    CloneFailure::fatal(format!("Failed to run git clone: {}", e))
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| CloneFailure::fatal("git clone stderr was not captured"))?;

        let mut reader = BufReader::new(stderr);
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut chunk = Vec::new();

        loop {
            chunk.clear();
            let read = reader
                .read_until(b'\n', &mut chunk)
                .await
                .map_err(|e| CloneFailure::transient(format!("Failed to read git output: {}", e)))?;
            if read == 0 {
                break;
            }

            let text = String::from_utf8_lossy(&chunk);
            if let Some(line) = last_segment(&text) {
                sink.progress(line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CloneFailure::transient(format!("Failed to wait for git clone: {}", e)))?;

        if status.success() {
            return Ok(());
        }

        let output = tail.into_iter().collect::<Vec<_>>().join("\n");
        if output.is_empty() {
            Err(CloneFailure::transient(format!("git clone exited with {}", status)))
        } else {
            Err(CloneFailure::from_output(&output))
        }
    }
}

/// Clones in-process with libgit2
#[derive(Debug, Clone, Copy, Default)]
pub struct Libgit2;

#[async_trait]
impl CloneBackend for Libgit2 {
    fn name(&self) -> &'static str {
        "libgit2"
    }

    async fn fetch_into(
        &self,
        url: &str,
        destination: &Path,
        sink: Arc<dyn ProgressSink>,
    ) -> std::result::Result<(), CloneFailure> {
        let url = url.to_string();
        let destination = destination.to_path_buf();

        tokio::task::spawn_blocking(move || clone_blocking(&url, &destination, sink.as_ref()))
            .await
            .map_err(|e| CloneFailure::fatal(format!("Clone task failed: {}", e)))?
    }
}

fn clone_blocking(
    url: &str,
    destination: &Path,
    sink: &dyn ProgressSink,
) -> std::result::Result<(), CloneFailure> {
    let mut last_percent = None;

    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(|stats| {
        let total = stats.total_objects();
        if total > 0 {
            let received = stats.received_objects();
            let percent = received * 100 / total;
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                sink.progress(&format!(
                    "Receiving objects: {:>3}% ({}/{})",
                    percent, received, total
                ));
            }
        }
        true
    });
    callbacks.sideband_progress(|data| {
        if let Some(line) = last_segment(&String::from_utf8_lossy(data)) {
            sink.progress(line);
        }
        true
    });

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options);
    let result = builder.clone(url, destination);

    result.map(|_| ()).map_err(CloneFailure::from_git2)
}
