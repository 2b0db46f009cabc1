use super::{open_repository, print_warnings};
use crate::cli::CommonArgs;
use crate::git::GitRepo;
use anyhow::Context;
use console::style;
use std::collections::HashMap;
use std::path::PathBuf;

pub fn exec(
    common: &CommonArgs,
    repo: Option<PathBuf>,
    limit: usize,
    output: Option<PathBuf>,
    import: bool,
) -> anyhow::Result<()> {
    let git = GitRepo::open(repo.as_ref()).context("Failed to open git repository")?;
    let snapshot = git
        .collect_snapshot(limit)
        .context("Failed to read commits from repository")?;

    let text = serde_json::to_string_pretty(&snapshot)?;
    match &output {
        Some(path) => {
            std::fs::write(path, &text)
                .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        }
        None => println!("{text}"),
    }

    if output.is_some() {
        println!("{}", style("Snapshot Summary").bold());
        println!("{}", "─".repeat(50));
        println!("Repository: {}", style(&snapshot.repository).cyan());
        println!("Commits analysed: {}", style(snapshot.commits.len()).cyan());
        let added: u64 = snapshot.commits.iter().map(|c| c.lines_added).sum();
        let removed: u64 = snapshot.commits.iter().map(|c| c.lines_removed).sum();
        println!("Lines added: {}", style(added).green());
        println!("Lines removed: {}", style(removed).red());

        let mut authors: HashMap<&str, usize> = HashMap::new();
        for c in &snapshot.commits {
            *authors.entry(c.author.as_str()).or_insert(0) += 1;
        }
        let mut top: Vec<_> = authors.into_iter().collect();
        top.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        if !top.is_empty() {
            println!("\n{}", style("Top contributors").bold());
            for (author, count) in top.into_iter().take(5) {
                println!("  {author}: {count} commits");
            }
        }
    }

    if import {
        let repository = open_repository(common)?;
        let outcome = repository
            .import_snapshot(&snapshot)
            .context("Failed to import snapshot")?;
        print_warnings(&outcome.warnings);
        eprintln!(
            "Imported {} new metric(s), {} new developer(s)",
            outcome.new_metrics, outcome.new_developers
        );
    }
    Ok(())
}
