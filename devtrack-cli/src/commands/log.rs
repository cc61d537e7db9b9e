use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

pub fn run(path: PathBuf, limit: Option<usize>) -> Result<()> {
    let root = super::workspace(&path)?;
    let (_, settings) = super::load_settings(&root)?;

    let logs = changelogs(&root.join(&settings.changelog_dir))?;
    if logs.is_empty() {
        println!("{}", "No changelogs yet".yellow());
        return Ok(());
    }

    println!("{}", "Changelog History".bold().cyan());
    println!();

    let to_show = limit.unwrap_or(logs.len()).min(logs.len());
    for log in logs.iter().take(to_show) {
        let name = log
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("{} {}", "changelog".yellow().bold(), name.yellow());

        let text = std::fs::read_to_string(log).unwrap_or_default();
        for line in overview(&text) {
            println!("    {}", line);
        }
        println!();
    }

    if logs.len() > to_show {
        println!(
            "{}",
            format!("... and {} more changelogs", logs.len() - to_show).dimmed()
        );
        println!("Use {} to see more", "--limit N".cyan());
    }

    Ok(())
}

/// Markdown changelogs in `dir`, newest first.
fn changelogs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut logs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == "md").unwrap_or(false))
        .collect();
    logs.sort();
    logs.reverse();
    Ok(logs)
}

/// The bullet lines of a changelog's overview section.
fn overview(document: &str) -> Vec<&str> {
    document
        .lines()
        .skip_while(|l| l.trim() != "## Overview")
        .skip(1)
        .filter(|l| l.starts_with("- **"))
        .filter(|l| !l.starts_with("- **Timestamp**"))
        .collect()
}
