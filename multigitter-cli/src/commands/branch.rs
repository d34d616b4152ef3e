//! Branch command - get or create the working branch

use clap::Args;
use multigitter_core::{BranchResolver, Config};

use super::{github_client, resolve_repository};

/// Arguments for the branch command
#[derive(Args, Debug)]
pub struct BranchArgs {
    /// Repository (owner/repo, URL, or a search query matching one repository)
    #[arg(required = true)]
    pub repo: String,
}

impl BranchArgs {
    /// Execute the branch command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = github_client()?;
        let repo = resolve_repository(&client, config, &self.repo).await?;

        let branch = BranchResolver::new(&client)
            .resolve(&repo, &config.branch.name, &config.branch.base)
            .await?;

        println!("Repository: {}", repo);
        println!("Branch:     {}", branch.short_name());
        println!("Commit:     {}", branch.commit);

        Ok(())
    }
}
