use anyhow::Result;
use colored::Colorize;
use devtrack_core::{
    ChangeKind, ContentCache, ContentCipher, ContentSource, DiffEngine, EditKind, ProjectStore,
    WorkspaceSource,
};
use std::path::PathBuf;
use std::sync::Arc;

pub fn run(path: PathBuf, file: Option<PathBuf>) -> Result<()> {
    let root = super::workspace(&path)?;
    if !super::is_initialized(&root) {
        anyhow::bail!("Workspace is not set up. Run 'devtrack init' first.");
    }

    let (_, settings) = super::load_settings(&root)?;
    let store = ProjectStore::open_existing(&root)?;
    let source = Arc::new(WorkspaceSource::new(&root));
    let mut cache = ContentCache::new(store.clone(), ContentCipher::local()?, source.clone());
    cache.load();

    let targets: Vec<(PathBuf, ChangeKind)> = match file {
        Some(file) => {
            let kind = if root.join(&file).exists() {
                ChangeKind::Modified
            } else {
                ChangeKind::Deleted
            };
            vec![(file, kind)]
        }
        None => super::changes_since_last_commit(&root, &settings, &store)?
            .current_changes()
            .into_iter()
            .map(|c| (c.path, c.kind))
            .collect(),
    };

    if targets.is_empty() {
        println!("{}", "No changes since the last commit".green());
        return Ok(());
    }

    let engine = DiffEngine::new(settings.blank_lines());
    for (path, kind) in targets {
        println!("{}", "━".repeat(80).bright_black());

        let status = match kind {
            ChangeKind::Added => "NEW".green(),
            ChangeKind::Modified => "MOD".yellow(),
            ChangeKind::Deleted => "DEL".red(),
        };
        println!("{} {}", status, path.display().to_string().white().bold());
        println!();

        let before = cache.get(&path).unwrap_or_default();
        let after = match kind {
            ChangeKind::Deleted => String::new(),
            _ => match source.read(&path) {
                Ok(content) => content,
                Err(e) => {
                    println!("  {}", format!("[unable to read file: {}]", e).dimmed());
                    continue;
                }
            },
        };

        let result = engine.diff(before, &after);
        for edit in &result.edits {
            match edit.kind {
                EditKind::Added => println!("{}", format!("+{}", edit.line).green()),
                EditKind::Removed => println!("{}", format!("-{}", edit.line).red()),
            }
        }
        println!();
        println!(
            "  {} {}",
            format!("+{}", result.additions).green(),
            format!("-{}", result.deletions).red()
        );
    }

    Ok(())
}
