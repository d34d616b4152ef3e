//! Find command - search for exactly one repository

use clap::Args;
use multigitter_core::RepositoryDirectory;

use super::github_client;

/// Arguments for the find command
#[derive(Args, Debug)]
pub struct FindArgs {
    /// GitHub search query (e.g. "multigitter-test-1 user:alainrk")
    #[arg(required = true)]
    pub query: String,
}

impl FindArgs {
    /// Execute the find command
    pub async fn execute(&self) -> anyhow::Result<()> {
        let client = github_client()?;
        let repo = client.find_repository(&self.query).await?;
        println!("{}", repo);
        Ok(())
    }
}
