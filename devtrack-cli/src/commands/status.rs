use anyhow::Result;
use colored::Colorize;
use devtrack_core::{ChangeKind, ContentCache, ContentCipher, ProjectStore, WorkspaceSource};
use std::path::PathBuf;
use std::sync::Arc;

pub fn run(path: PathBuf) -> Result<()> {
    let root = super::workspace(&path)?;

    if !super::is_initialized(&root) {
        println!("{}", "This workspace is not tracked by devtrack".red());
        println!("Run {} to start tracking", "devtrack init".cyan());
        return Ok(());
    }

    let (_, settings) = super::load_settings(&root)?;
    let store = ProjectStore::open_existing(&root)?;
    let meta = store.meta();

    let mut cache = ContentCache::new(
        store.clone(),
        ContentCipher::local()?,
        Arc::new(WorkspaceSource::new(&root)),
    );
    cache.load();

    println!("{}", "Project Status".bold().cyan());
    println!("  {}: {}", "Project".bold(), meta.name);
    println!("  {}: {}", "Project ID".bold(), meta.id);
    println!("  {}: {}", "Root".bold(), root.display());
    println!(
        "  {}: {}",
        "Created".bold(),
        meta.created.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  {}: {}", "Cached files".bold(), cache.len());
    println!(
        "  {}: every {} minute(s) to {} ({})",
        "Commits".bold(),
        settings.commit_frequency,
        settings.repo_name,
        settings.branch
    );
    println!();

    let ledger = super::changes_since_last_commit(&root, &settings, &store)?;
    let changes = ledger.current_changes();

    if changes.is_empty() {
        println!("{}", "No changes since the last commit".green());
        return Ok(());
    }

    println!(
        "{} {}",
        "Changed since last commit:".bold(),
        format!("({})", changes.len()).yellow()
    );
    println!();

    for change in changes.iter().take(10) {
        let icon = match change.kind {
            ChangeKind::Added => "+".green(),
            ChangeKind::Modified => "~".yellow(),
            ChangeKind::Deleted => "-".red(),
        };
        println!("  {} {}", icon, change.path.display());
    }

    if changes.len() > 10 {
        println!();
        println!(
            "  {} and {} more...",
            "...".dimmed(),
            (changes.len() - 10).to_string().yellow()
        );
    }

    println!();
    println!("Run {} to commit them now", "devtrack commit".cyan());

    Ok(())
}
