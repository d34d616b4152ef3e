//! Repository URL parsing and cloning with bounded retries

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backend::{CloneBackend, CloneFailure, ProgressSink, TracingSink};
use crate::{Error, Result};

/// Parsed repository information
#[derive(Debug, Clone)]
pub struct RepoUrl {
    /// Repository owner/organization
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Full clone URL
    pub clone_url: String,
    /// Host (e.g., "github.com")
    pub host: String,
}

impl RepoUrl {
    /// Parse a repository URL or shorthand
    ///
    /// Supports:
    /// - `https://github.com/owner/repo`
    /// - `https://github.com/owner/repo.git`
    /// - `git@github.com:owner/repo.git`
    /// - `owner/repo` (assumes GitHub)
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if !input.contains("://") && !input.contains('@') && input.contains('/') {
            let parts: Vec<&str> = input.split('/').collect();
            if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
                let owner = parts[0].to_string();
                let repo = parts[1].trim_end_matches(".git").to_string();
                return Ok(Self {
                    clone_url: format!("https://github.com/{}/{}.git", owner, repo),
                    owner,
                    repo,
                    host: "github.com".to_string(),
                });
            }
        }

        if let Some(rest) = input.strip_prefix("git@") {
            if let Some((host, path)) = rest.split_once(':') {
                let path = path.trim_end_matches(".git");
                let parts: Vec<&str> = path.split('/').collect();
                if parts.len() >= 2 {
                    return Ok(Self {
                        owner: parts[0].to_string(),
                        repo: parts[1].to_string(),
                        clone_url: input.to_string(),
                        host: host.to_string(),
                    });
                }
            }
        }

        if input.starts_with("https://") || input.starts_with("http://") {
            if let Ok(url) = url::Url::parse(input) {
                let host = url.host_str().unwrap_or("").to_string();
                let path = url.path().trim_start_matches('/').trim_end_matches(".git");
                let parts: Vec<&str> = path.split('/').collect();

                if parts.len() >= 2 {
                    let clone_url = if input.ends_with(".git") {
                        input.to_string()
                    } else {
                        format!("{}.git", input)
                    };

                    return Ok(Self {
                        owner: parts[0].to_string(),
                        repo: parts[1].to_string(),
                        clone_url,
                        host,
                    });
                }
            }
        }

        Err(Error::Config(format!(
            "Invalid repository URL: {}. Expected format: owner/repo, https://github.com/owner/repo, or git@github.com:owner/repo.git",
            input
        )))
    }

    /// SSH clone URL for the same repository
    pub fn ssh_url(&self) -> String {
        format!("git@{}:{}/{}.git", self.host, self.owner, self.repo)
    }
}

/// Get the default repos cache directory
///
/// Returns `~/.cache/multigitter/repos`
pub fn default_repos_cache_dir() -> Result<PathBuf> {
    let cache_dir = dirs::cache_dir()
        .ok_or_else(|| Error::Config("Could not determine cache directory".to_string()))?;

    Ok(cache_dir.join("multigitter").join("repos"))
}

/// Get the local checkout path for a repository (`<cache>/<owner>/<repo>`)
pub fn cached_repo_path(repo_url: &RepoUrl, cache_dir: Option<&Path>) -> Result<PathBuf> {
    let base_dir = match cache_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_repos_cache_dir()?,
    };

    Ok(base_dir.join(&repo_url.owner).join(&repo_url.repo))
}

/// Outcome of one clone attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum CloneOutcome {
    Success,
    Failed(CloneFailure),
}

/// Record of one clone attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneAttempt {
    /// Remote being cloned
    pub url: String,
    /// Local target directory
    pub destination: PathBuf,
    /// 1-based attempt index
    pub attempt: u32,
    pub outcome: CloneOutcome,
}

impl CloneAttempt {
    /// The failure of this attempt, if it failed
    pub fn failure(&self) -> Option<&CloneFailure> {
        match &self.outcome {
            CloneOutcome::Failed(failure) => Some(failure),
            CloneOutcome::Success => None,
        }
    }
}

impl fmt::Display for CloneAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            CloneOutcome::Success => write!(f, "attempt {} succeeded", self.attempt),
            CloneOutcome::Failed(failure) => write!(f, "attempt {} {}", self.attempt, failure),
        }
    }
}

/// Clones repositories, retrying failed attempts from a clean destination
pub struct RepoFetcher<B> {
    backend: B,
    sink: Arc<dyn ProgressSink>,
    retry_delay: Duration,
    cancel: CancellationToken,
}

impl<B> fmt::Debug for RepoFetcher<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoFetcher")
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl<B: CloneBackend> RepoFetcher<B> {
    /// Create a fetcher that logs progress through `tracing` and retries immediately
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            sink: Arc::new(TracingSink),
            retry_delay: Duration::ZERO,
            cancel: CancellationToken::new(),
        }
    }

    /// Send clone progress somewhere other than the log
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Wait this long between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Abort between attempts (and during the retry delay) once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The backend in use
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Clone `url` into `destination`, making at most `max_attempts` attempts
    ///
    /// `destination` must be absent or an empty directory. After a failed
    /// attempt it is removed entirely so the next attempt starts clean.
    ///
    /// # Errors
    /// * [`Error::InvalidConfiguration`] if `max_attempts` is zero or the
    ///   destination already holds files
    /// * [`Error::FetchExhausted`] with every attempt's failure, in order
    /// * [`Error::Cancelled`] if cancellation was requested between attempts
    pub async fn clone(&self, url: &str, destination: &Path, max_attempts: u32) -> Result<()> {
        if max_attempts == 0 {
            return Err(Error::InvalidConfiguration(
                "clone attempts must be at least 1".to_string(),
            ));
        }

        if !is_empty_or_absent(destination).await? {
            return Err(Error::InvalidConfiguration(format!(
                "clone destination {} already exists and is not empty",
                destination.display()
            )));
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut attempts = Vec::new();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                self.wait_before_retry().await?;
            } else if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            debug!(
                url,
                destination = %destination.display(),
                attempt,
                max_attempts,
                backend = self.backend.name(),
                "Cloning repository"
            );

            match self
                .backend
                .fetch_into(url, destination, Arc::clone(&self.sink))
                .await
            {
                Ok(()) => {
                    info!(url, destination = %destination.display(), attempt, "Cloned repository");
                    return Ok(());
                }
                Err(failure) => {
                    warn!(
                        url,
                        attempt,
                        max_attempts,
                        kind = %failure.kind,
                        error = %failure.message,
                        "Clone attempt failed"
                    );
                    attempts.push(CloneAttempt {
                        url: url.to_string(),
                        destination: destination.to_path_buf(),
                        attempt,
                        outcome: CloneOutcome::Failed(failure),
                    });
                    if let Err(e) = remove_destination(destination).await {
                        return Err(Error::CleanupFailed {
                            destination: destination.to_path_buf(),
                            reason: e.to_string(),
                            attempts,
                        });
                    }
                }
            }
        }

        Err(Error::FetchExhausted {
            url: url.to_string(),
            attempts,
        })
    }

    async fn wait_before_retry(&self) -> Result<()> {
        if self.retry_delay.is_zero() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            return Ok(());
        }

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(self.retry_delay) => Ok(()),
        }
    }
}

async fn is_empty_or_absent(path: &Path) -> Result<bool> {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => Ok(entries.next_entry().await?.is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(Error::Io(e)),
    }
}

async fn remove_destination(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::git::{FailureKind, GitRepo, Libgit2};

    /// Backend that plays back a script of results, leaving debris on failure
    #[derive(Default)]
    struct ScriptedBackend {
        script: Mutex<VecDeque<std::result::Result<(), CloneFailure>>>,
        calls: AtomicUsize,
        /// Whether the destination was clean when each attempt started
        clean_on_entry: Mutex<Vec<bool>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<std::result::Result<(), CloneFailure>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        fn always_failing() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl CloneBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch_into(
            &self,
            _url: &str,
            destination: &Path,
            sink: Arc<dyn ProgressSink>,
        ) -> std::result::Result<(), CloneFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.clean_on_entry.lock().unwrap().push(!destination.exists());

            sink.progress("Cloning into 'repo'...");
            std::fs::create_dir_all(destination.join(".git")).unwrap();
            std::fs::write(destination.join("partial"), b"half a pack").unwrap();

            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(CloneFailure::transient("Connection reset by peer")))
        }
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<String>>);

    impl ProgressSink for CollectingSink {
        fn progress(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    /// Backend that fails after leaving a plain file where the checkout should be
    struct FileLeavingBackend;

    #[async_trait]
    impl CloneBackend for FileLeavingBackend {
        fn name(&self) -> &'static str {
            "file-leaving"
        }

        async fn fetch_into(
            &self,
            _url: &str,
            destination: &Path,
            _sink: Arc<dyn ProgressSink>,
        ) -> std::result::Result<(), CloneFailure> {
            std::fs::write(destination, b"not a directory").unwrap();
            Err(CloneFailure::transient("early EOF"))
        }
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_attempt_history() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("repo");
        let fetcher = RepoFetcher::new(FileLeavingBackend);

        let err = fetcher
            .clone("https://github.com/owner/repo.git", &dest, 3)
            .await
            .unwrap_err();

        match err {
            Error::CleanupFailed {
                destination,
                attempts,
                ..
            } => {
                assert_eq!(destination, dest);
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].failure().unwrap().message, "early EOF");
            }
            other => panic!("expected CleanupFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retry_exhaustion_reports_every_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("owner").join("repo");
        let fetcher = RepoFetcher::new(ScriptedBackend::always_failing());

        let err = fetcher
            .clone("https://github.com/owner/repo.git", &dest, 3)
            .await
            .unwrap_err();

        match err {
            Error::FetchExhausted { url, attempts } => {
                assert_eq!(url, "https://github.com/owner/repo.git");
                assert_eq!(attempts.len(), 3);
                let indices: Vec<u32> = attempts.iter().map(|a| a.attempt).collect();
                assert_eq!(indices, vec![1, 2, 3]);
                assert!(attempts
                    .iter()
                    .all(|a| a.failure().unwrap().kind == FailureKind::Transient));
            }
            other => panic!("expected FetchExhausted, got {other:?}"),
        }

        assert!(!dest.exists());
        assert_eq!(fetcher.backend().calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *fetcher.backend().clean_on_entry.lock().unwrap(),
            vec![true, true, true]
        );
    }

    #[tokio::test]
    async fn test_first_success_stops_retrying() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("repo");
        let fetcher = RepoFetcher::new(ScriptedBackend::new(vec![Ok(())]));

        fetcher
            .clone("https://github.com/owner/repo.git", &dest, 3)
            .await
            .unwrap();

        assert_eq!(fetcher.backend().calls.load(Ordering::SeqCst), 1);
        assert!(dest.join("partial").exists());
    }

    #[tokio::test]
    async fn test_success_after_transient_failure() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("repo");
        let fetcher = RepoFetcher::new(ScriptedBackend::new(vec![
            Err(CloneFailure::transient("early EOF")),
            Ok(()),
        ]));

        fetcher
            .clone("https://github.com/owner/repo.git", &dest, 3)
            .await
            .unwrap();

        assert_eq!(fetcher.backend().calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *fetcher.backend().clean_on_entry.lock().unwrap(),
            vec![true, true]
        );
    }

    #[tokio::test]
    async fn test_fatal_failures_are_distinguishable() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("repo");
        let auth = || Err(CloneFailure::fatal("Authentication failed"));
        let fetcher = RepoFetcher::new(ScriptedBackend::new(vec![auth(), auth()]));

        let err = fetcher
            .clone("https://github.com/owner/repo.git", &dest, 2)
            .await
            .unwrap_err();

        let Error::FetchExhausted { attempts, .. } = err else {
            panic!("expected FetchExhausted");
        };
        assert!(attempts
            .iter()
            .all(|a| a.failure().unwrap().kind == FailureKind::Fatal));
    }

    #[tokio::test]
    async fn test_progress_goes_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(CollectingSink::default());
        let fetcher = RepoFetcher::new(ScriptedBackend::new(vec![Ok(())])).with_sink(sink.clone());

        fetcher
            .clone("https://github.com/owner/repo.git", &dir.path().join("repo"), 1)
            .await
            .unwrap();

        assert_eq!(*sink.0.lock().unwrap(), vec!["Cloning into 'repo'...".to_string()]);
    }

    #[tokio::test]
    async fn test_zero_attempts_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = RepoFetcher::new(ScriptedBackend::always_failing());

        let err = fetcher
            .clone("https://github.com/owner/repo.git", &dir.path().join("repo"), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(fetcher.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_empty_destination_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"user data").unwrap();
        let fetcher = RepoFetcher::new(ScriptedBackend::always_failing());

        let err = fetcher
            .clone("https://github.com/owner/repo.git", dir.path(), 2)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert!(dir.path().join("keep.txt").exists());
        assert_eq!(fetcher.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_during_retry_delay() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("repo");
        let token = CancellationToken::new();
        let fetcher = RepoFetcher::new(ScriptedBackend::always_failing())
            .with_retry_delay(Duration::from_secs(3600))
            .with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let err = fetcher
            .clone("https://github.com/owner/repo.git", &dest, 5)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(fetcher.backend().calls.load(Ordering::SeqCst), 1);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let fetcher = RepoFetcher::new(ScriptedBackend::always_failing()).with_cancellation(token);

        let err = fetcher
            .clone("https://github.com/owner/repo.git", &dir.path().join("repo"), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(fetcher.backend().calls.load(Ordering::SeqCst), 0);
    }

    fn init_origin(path: &Path) {
        let repo = git2::Repository::init(path).unwrap();
        std::fs::write(path.join("README.md"), b"# origin\n").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();

        let sig = git2::Signature::now("multigitter", "multigitter@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "Initial commit", &tree, &[])
            .unwrap();
    }

    #[tokio::test]
    async fn test_libgit2_clones_local_repository() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        init_origin(&origin);
        let dest = dir.path().join("checkout").join("repo");

        RepoFetcher::new(Libgit2)
            .clone(origin.to_str().unwrap(), &dest, 2)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dest.join("README.md")).unwrap(),
            "# origin\n"
        );
        let checkout = GitRepo::open(&dest).unwrap();
        assert!(checkout.head_commit().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_libgit2_missing_remote_exhausts_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let dest = dir.path().join("repo");

        let err = RepoFetcher::new(Libgit2)
            .clone(missing.to_str().unwrap(), &dest, 2)
            .await
            .unwrap_err();

        let Error::FetchExhausted { attempts, .. } = err else {
            panic!("expected FetchExhausted");
        };
        assert_eq!(attempts.len(), 2);
        assert!(!dest.exists());
    }

    #[test]
    fn test_parse_shorthand() {
        let url = RepoUrl::parse("owner/repo").unwrap();
        assert_eq!(url.owner, "owner");
        assert_eq!(url.repo, "repo");
        assert_eq!(url.host, "github.com");
        assert_eq!(url.clone_url, "https://github.com/owner/repo.git");
    }

    #[test]
    fn test_parse_https() {
        let url = RepoUrl::parse("https://github.com/owner/repo").unwrap();
        assert_eq!(url.owner, "owner");
        assert_eq!(url.repo, "repo");
        assert_eq!(url.clone_url, "https://github.com/owner/repo.git");
    }

    #[test]
    fn test_parse_git_ssh() {
        let url = RepoUrl::parse("git@github.com:owner/repo.git").unwrap();
        assert_eq!(url.owner, "owner");
        assert_eq!(url.repo, "repo");
        assert_eq!(url.host, "github.com");
        assert_eq!(url.ssh_url(), "git@github.com:owner/repo.git");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(RepoUrl::parse("invalid").is_err());
        assert!(RepoUrl::parse("").is_err());
        assert!(RepoUrl::parse("/repo").is_err());
    }

    #[test]
    fn test_cached_repo_path() {
        let url = RepoUrl::parse("owner/repo").unwrap();
        let path = cached_repo_path(&url, Some(Path::new("/cache"))).unwrap();
        assert_eq!(path, PathBuf::from("/cache/owner/repo"));
    }
}
