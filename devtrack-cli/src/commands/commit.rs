use crate::terminal::{Spinner, TerminalNotifier};
use anyhow::Result;
use colored::Colorize;
use devtrack_agent::{DevTrackService, TickOutcome};
use devtrack_core::Overrides;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run(path: PathBuf, yes: bool) -> Result<()> {
    let root = super::workspace(&path)?;
    if !super::is_initialized(&root) {
        anyhow::bail!("Workspace is not set up. Run 'devtrack init' first.");
    }

    let overrides = Overrides {
        confirm_before_commit: yes.then_some(false),
        ..Overrides::default()
    };
    let (config, settings) = super::load_settings_with(&root, overrides)?;

    let vcs = super::git_client(&root, &settings);
    let service = DevTrackService::new(root, settings, config, vcs, Arc::new(TerminalNotifier))?;

    if service.pending_changes() == 0 {
        println!("{}", "No changes since the last commit".green());
        return Ok(());
    }

    let outcome = {
        let _spinner = yes.then(|| Spinner::start("Committing and pushing..."));
        service.commit_now().await
    };

    match outcome {
        TickOutcome::Committed { files, message } => {
            println!("{} {} file(s)", "✓ Committed".green().bold(), files);
            println!("  {}", message.dimmed());
        }
        TickOutcome::Declined => println!("{}", "Commit cancelled".yellow()),
        TickOutcome::NoChanges => println!("{}", "No changes since the last commit".green()),
        TickOutcome::Deferred => println!("{}", "Another commit is in progress".yellow()),
        TickOutcome::Failed(e) => anyhow::bail!("Commit failed: {}", e),
    }

    Ok(())
}
