//! Secrets file management

use clap::{Args, Subcommand};
use multigitter_core::Secrets;

/// Secrets file commands
#[derive(Args, Debug)]
pub struct SecretsArgs {
    #[command(subcommand)]
    pub command: SecretsCommand,
}

#[derive(Subcommand, Debug)]
pub enum SecretsCommand {
    /// Create ~/.config/multigitter/secrets.toml with safe permissions
    Init,
}

impl SecretsArgs {
    /// Execute the secrets command
    pub fn execute(&self) -> anyhow::Result<()> {
        match self.command {
            SecretsCommand::Init => {
                let path = Secrets::create_template()?;
                println!("Created secrets file: {}", path.display());
                println!("Add your GitHub token to it, or set GITHUB_TOKEN instead.");
                Ok(())
            }
        }
    }
}
