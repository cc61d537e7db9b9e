use crate::terminal::Spinner;
use anyhow::{Context, Result};
use colored::Colorize;
use devtrack_agent::hosting::{resolve_remote, GitHubDirectory};
use devtrack_core::storage::STORE_DIR;
use devtrack_core::ProjectStore;
use std::path::{Path, PathBuf};

pub async fn run(
    path: PathBuf,
    repo_name: Option<String>,
    remote: Option<String>,
    token: Option<String>,
    public: bool,
) -> Result<()> {
    let root = super::workspace(&path)?;
    let (config, mut settings) = super::load_settings(&root)?;
    if let Some(name) = repo_name {
        settings.repo_name = name;
    }
    settings.validate()?;

    if ensure_gitignore(&root)? {
        println!("  {} {} to .gitignore", "Added".green(), format!("{}/", STORE_DIR).cyan());
    }

    let store = ProjectStore::open(&root)?;
    config.save(&settings)?;
    println!(
        "  {} project {} ({})",
        "Tracking".green(),
        store.meta().name.bold(),
        store.meta().id
    );

    let remote = match remote {
        Some(url) => url,
        None => {
            let token = token.context(
                "A GitHub token is required to find or create the remote. \
                 Pass --token, set GITHUB_TOKEN or use --remote <url>.",
            )?;
            let directory = GitHubDirectory::new(token);
            resolve_remote(&directory, &settings.repo_name, !public).await?
        }
    };

    let vcs = super::git_client(&root, &settings);
    {
        let _spinner = Spinner::start("Initializing repository...");
        vcs.initialize_repository(&remote).await?;
    }

    println!();
    println!("{} pushing to {}", "✓ Ready:".green().bold(), remote.cyan());
    println!("Run {} to start tracking", "devtrack start".cyan());
    Ok(())
}

/// Appends the store directory to `.gitignore` unless it is already listed.
/// Returns whether the file changed.
fn ensure_gitignore(root: &Path) -> Result<bool> {
    let path = root.join(".gitignore");
    let existing = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).context("Failed to read .gitignore"),
    };

    let listed = existing.lines().any(|line| {
        let line = line.trim().trim_start_matches('/').trim_end_matches('/');
        line == STORE_DIR
    });
    if listed {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&format!("{}/\n", STORE_DIR));
    std::fs::write(&path, updated).context("Failed to write .gitignore")?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_gitignore_is_created() {
        let dir = TempDir::new().unwrap();
        assert!(ensure_gitignore(dir.path()).unwrap());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".gitignore")).unwrap(),
            ".devtrack/\n"
        );
    }

    #[test]
    fn test_gitignore_is_appended_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target").unwrap();

        assert!(ensure_gitignore(dir.path()).unwrap());
        assert!(!ensure_gitignore(dir.path()).unwrap());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(".gitignore")).unwrap(),
            "target\n.devtrack/\n"
        );
    }

    #[test]
    fn test_existing_entry_variants_are_recognized() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "/.devtrack\n").unwrap();
        assert!(!ensure_gitignore(dir.path()).unwrap());
    }
}
