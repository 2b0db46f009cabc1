use super::{open_repository, print_warnings};
use crate::cli::CommonArgs;
use anyhow::Context;
use console::style;
use std::path::Path;

pub fn exec(common: &CommonArgs, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read snapshot file {}", file.display()))?;

    let repository = open_repository(common)?;
    let outcome = repository
        .import_snapshot_json(&text)
        .context("Failed to import snapshot")?;

    print_warnings(&outcome.warnings);
    println!(
        "Imported {} new metric(s) and {} new developer(s)",
        style(outcome.new_metrics).green(),
        style(outcome.new_developers).green()
    );
    Ok(())
}
