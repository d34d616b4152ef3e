//! multigitter CLI - Command line interface for multigitter
//!
//! Applies the same file change to GitHub repositories on a working branch,
//! without clobbering concurrent edits.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use multigitter_core::{Config, Overrides};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{ApplyArgs, BranchArgs, CloneArgs, FindArgs, SecretsArgs};

/// multigitter: bulk changes across GitHub repositories
#[derive(Parser, Debug)]
#[command(name = "multigitter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/multigitter/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Working branch (overrides config and env)
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Base branch the working branch is created from (overrides config and env)
    #[arg(long, global = true)]
    base: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Get or create the working branch in a repository
    #[command(visible_alias = "b")]
    Branch(BranchArgs),

    /// Apply a change to a file on the working branch
    #[command(visible_alias = "a")]
    Apply(ApplyArgs),

    /// Find exactly one repository by search query
    Find(FindArgs),

    /// Clone a repository with retries
    Clone(CloneArgs),

    /// Show current configuration
    Config,

    /// Manage the secrets file
    Secrets(SecretsArgs),
}

impl Cli {
    /// Flags that override configuration values
    fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            branch: self.branch.clone(),
            base: self.base.clone(),
            ..Default::default()
        };

        match &self.command {
            Some(Commands::Apply(args)) => {
                overrides.write_attempts = args.attempts;
                overrides.commit_message = args.message.clone();
            }
            Some(Commands::Clone(args)) => {
                overrides.clone_attempts = args.attempts;
            }
            _ => {}
        }

        overrides
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = Config::load_with_overrides(cli.config.as_deref(), cli.overrides())?;

    if cli.verbose {
        tracing::info!(
            branch = %config.branch.name,
            base = %config.branch.base,
            write_attempts = config.mutation.max_attempts,
            clone_attempts = config.clone.max_attempts,
            "Configuration loaded"
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Received Ctrl+C, cancelling...");
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Some(Commands::Version) => {
            println!("multigitter {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Branch(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Apply(args)) => {
            args.execute(&config, cancel).await?;
        }
        Some(Commands::Find(args)) => {
            args.execute().await?;
        }
        Some(Commands::Clone(args)) => {
            args.execute(&config, cancel).await?;
        }
        Some(Commands::Config) => {
            print_config(&config, cli.config.as_deref());
        }
        Some(Commands::Secrets(args)) => {
            args.execute()?;
        }
        None => {
            println!("multigitter - bulk changes across GitHub repositories");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}

fn print_config(config: &Config, explicit: Option<&std::path::Path>) {
    println!("multigitter Configuration");
    println!("=========================");
    println!();
    println!("Branch:");
    println!("  name: {}", config.branch.name);
    println!("  base: {}", config.branch.base);
    println!();
    println!("Mutation:");
    println!("  max_attempts: {}", config.mutation.max_attempts);
    println!(
        "  commit_message: {}",
        config
            .mutation
            .commit_message
            .as_deref()
            .unwrap_or("(Create/Update <path>)")
    );
    println!();
    println!("Clone:");
    println!("  max_attempts: {}", config.clone.max_attempts);
    println!("  retry_delay: {:?}", config.clone.retry_delay);
    println!("  backend: {:?}", config.clone.backend);
    match &config.clone.cache_dir {
        Some(dir) => println!("  cache_dir: {}", dir.display()),
        None => println!("  cache_dir: (default)"),
    }
    println!("  git_path: {}", config.clone.git_path);
    println!();
    println!("GitHub:");
    println!(
        "  username: {}",
        config.github.username.as_deref().unwrap_or("(token owner)")
    );
    println!();

    let path = explicit
        .map(|p| p.to_path_buf())
        .or_else(Config::default_config_path);
    if let Some(path) = path {
        println!("Config file: {}", path.display());
        if path.exists() {
            println!("  (exists)");
        } else {
            println!("  (not found - using defaults)");
        }
    }
}
