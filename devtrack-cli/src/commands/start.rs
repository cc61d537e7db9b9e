use crate::terminal::TerminalNotifier;
use anyhow::Result;
use colored::Colorize;
use devtrack_agent::scheduler::TickReport;
use devtrack_agent::{DevTrackService, TickOutcome};
use devtrack_core::Overrides;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

pub async fn run(path: PathBuf, interval: Option<u64>, yes: bool) -> Result<()> {
    let root = super::workspace(&path)?;
    let overrides = Overrides {
        commit_frequency: interval,
        confirm_before_commit: yes.then_some(false),
    };
    let (config, settings) = super::load_settings_with(&root, overrides)?;

    if !super::is_initialized(&root) {
        println!(
            "{} run {} first to set up the remote repository",
            "Warning:".yellow().bold(),
            "devtrack init".cyan()
        );
    }

    let vcs = super::git_client(&root, &settings);
    let service = DevTrackService::new(root.clone(), settings, config, vcs, Arc::new(TerminalNotifier))?;

    println!("{}", "🚀 Starting devtrack...".bold().cyan());
    println!("   {}: {:?}", "Watching".bold(), root);
    println!(
        "   {}: every {} minute(s)",
        "Commits".bold(),
        service.settings().commit_frequency
    );
    println!(
        "   {}: {}",
        "Pending".bold(),
        service.pending_changes().to_string().yellow()
    );
    println!();
    println!("{}", "Press Ctrl+C to stop".dimmed());
    println!();

    tokio::spawn(print_reports(service.scheduler().subscribe()));

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        on_signal.cancel();
    });

    service.run(shutdown).await
}

async fn print_reports(mut reports: mpsc::UnboundedReceiver<TickReport>) {
    while let Some(report) = reports.recv().await {
        let at = report.at.with_timezone(&chrono::Local).format("%H:%M:%S");
        match report.outcome {
            TickOutcome::Committed { files, message } => {
                println!(
                    "{} {} {} file(s): {}",
                    at.to_string().dimmed(),
                    "committed".green().bold(),
                    files,
                    message
                );
            }
            TickOutcome::Failed(e) => {
                println!("{} {} {}", at.to_string().dimmed(), "failed".red().bold(), e);
            }
            TickOutcome::Declined => {
                println!("{} {}", at.to_string().dimmed(), "skipped".yellow());
            }
            TickOutcome::NoChanges | TickOutcome::Deferred => {}
        }
    }
}
