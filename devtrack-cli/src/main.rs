use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod commands;
mod terminal;

use commands::{commit, diff, init, log, start, status};

#[derive(Parser)]
#[command(name = "devtrack")]
#[command(version, about = "Passive coding-activity log pushed to a Git remote", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare a workspace: ignore rules, config, remote repository
    Init {
        /// Workspace to track (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Name of the remote activity repository
        #[arg(long)]
        repo_name: Option<String>,

        /// Use this remote URL instead of looking it up on GitHub
        #[arg(long)]
        remote: Option<String>,

        /// GitHub token used to find or create the remote repository
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Create the remote repository as public
        #[arg(long)]
        public: bool,
    },

    /// Watch a workspace and commit changes periodically
    Start {
        /// Workspace to track (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Minutes between commits (overrides the config file)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Commit without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Commit changes made since the last commit right away
    Commit {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Commit without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show project and pending-change status
    Status {
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show line diffs against the cached baseline
    Diff {
        /// Single workspace-relative file to diff
        file: Option<PathBuf>,

        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },

    /// List generated changelogs
    Log {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Number of changelogs to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init {
            path,
            repo_name,
            remote,
            token,
            public,
        } => {
            init::run(path, repo_name, remote, token, public).await?;
        }
        Commands::Start {
            path,
            interval,
            yes,
        } => {
            start::run(path, interval, yes).await?;
        }
        Commands::Commit { path, yes } => {
            commit::run(path, yes).await?;
        }
        Commands::Status { path } => {
            status::run(path)?;
        }
        Commands::Diff { file, path } => {
            diff::run(path, file)?;
        }
        Commands::Log { path, limit } => {
            log::run(path, limit)?;
        }
    }

    Ok(())
}
