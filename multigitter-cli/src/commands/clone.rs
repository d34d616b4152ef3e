//! Clone command - clone a repository with bounded retries

use std::path::{Path, PathBuf};

use clap::Args;
use multigitter_core::{
    cached_repo_path, CloneBackend, CloneBackendKind, Config, GitCli, GitRepo, Libgit2,
    RepoFetcher, RepoUrl,
};
use tokio_util::sync::CancellationToken;

/// Arguments for the clone command
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Repository (owner/repo or URL)
    #[arg(required = true)]
    pub repo: String,

    /// Destination directory (defaults to ~/.cache/multigitter/repos/<owner>/<repo>)
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Attempts before giving up
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub attempts: Option<u32>,

    /// Clone mechanism: git or libgit2 (overrides config)
    #[arg(long)]
    pub backend: Option<CloneBackendKind>,

    /// Clone over SSH instead of HTTPS
    #[arg(long)]
    pub ssh: bool,
}

impl CloneArgs {
    fn destination(&self, url: &RepoUrl, config: &Config) -> anyhow::Result<PathBuf> {
        match &self.dest {
            Some(dest) => Ok(dest.clone()),
            None => Ok(cached_repo_path(url, config.clone.cache_dir.as_deref())?),
        }
    }

    /// Execute the clone command
    pub async fn execute(&self, config: &Config, cancel: CancellationToken) -> anyhow::Result<()> {
        let url = RepoUrl::parse(&self.repo)?;
        let dest = self.destination(&url, config)?;
        let clone_url = if self.ssh { url.ssh_url() } else { url.clone_url.clone() };

        if GitRepo::is_checkout(&dest) {
            println!("Already cloned: {}", dest.display());
            return print_head(&dest);
        }

        match self.backend.unwrap_or(config.clone.backend) {
            CloneBackendKind::Git => {
                let backend = GitCli::new().with_path(&config.clone.git_path);
                run(backend, &clone_url, &dest, config, cancel).await?;
            }
            CloneBackendKind::Libgit2 => {
                run(Libgit2, &clone_url, &dest, config, cancel).await?;
            }
        }

        println!("Cloned {} into {}", clone_url, dest.display());
        print_head(&dest)
    }
}

async fn run<B: CloneBackend>(
    backend: B,
    url: &str,
    dest: &Path,
    config: &Config,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    tracing::debug!(backend = backend.name(), url, dest = %dest.display(), "Cloning");

    RepoFetcher::new(backend)
        .with_retry_delay(config.clone.retry_delay)
        .with_cancellation(cancel)
        .clone(url, dest, config.clone.max_attempts)
        .await?;

    Ok(())
}

fn print_head(dest: &Path) -> anyhow::Result<()> {
    let repo = GitRepo::open(dest)?;
    let branch = repo.current_branch()?;
    let commit = repo.head_commit()?;

    println!("  path:   {}", repo.root().display());
    println!("  branch: {}", branch.as_deref().unwrap_or("(detached)"));
    println!("  commit: {}", commit.as_deref().unwrap_or("(none)"));

    Ok(())
}
