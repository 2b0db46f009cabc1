use super::open_repository;
use crate::cli::CommonArgs;
use crate::sample::SampleGenerator;
use anyhow::Context;
use console::style;
use std::path::{Path, PathBuf};

pub fn export(common: &CommonArgs, output: Option<PathBuf>) -> anyhow::Result<()> {
    let repository = open_repository(common)?;
    let text = repository.export_data().context("Failed to export data")?;
    match output {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            eprintln!("Export written to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

pub fn restore(common: &CommonArgs, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read export file {}", file.display()))?;
    let repository = open_repository(common)?;
    let outcome = repository
        .restore_backup(&text)
        .context("Failed to restore backup")?;
    println!(
        "Restored {} developer(s) and {} metric(s)",
        style(outcome.new_developers).green(),
        style(outcome.new_metrics).green()
    );
    Ok(())
}

pub fn sample(common: &CommonArgs, days: u32, seed: u64) -> anyhow::Result<()> {
    let repository = open_repository(common)?;
    let generator = SampleGenerator {
        days,
        seed,
        ..SampleGenerator::default()
    };
    let seeded = repository
        .initialize_with_dummy_data(&generator)
        .context("Failed to generate sample data")?;
    if seeded {
        let developers = repository.get_developers()?;
        let metrics: usize = developers.iter().map(|d| d.metrics.len()).sum();
        println!(
            "Generated sample data: {} developer(s), {} metric(s)",
            style(developers.len()).green(),
            style(metrics).green()
        );
    } else {
        println!("Store already contains data; sample data not generated");
    }
    Ok(())
}

pub fn clear(common: &CommonArgs) -> anyhow::Result<()> {
    let repository = open_repository(common)?;
    repository.clear_all_data().context("Failed to clear data")?;
    println!("All stored data removed");
    Ok(())
}

pub fn info(common: &CommonArgs, json: bool) -> anyhow::Result<()> {
    let repository = open_repository(common)?;
    let info = repository
        .get_storage_info()
        .context("Failed to read storage info")?;
    let is_dummy = repository.is_dummy_data()?;

    if json {
        let value = serde_json::json!({
            "usedBytes": info.used_bytes,
            "remainingBytes": info.remaining_bytes,
            "percentUsed": info.percent_used,
            "isDummyData": is_dummy,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", style("Storage").bold());
    println!("{}", "─".repeat(50));
    println!("Store: {}", common.store_path()?.display());
    println!("Namespace: {}", common.namespace);
    println!("Used: {} bytes", style(info.used_bytes).cyan());
    println!("Remaining: {} bytes", style(info.remaining_bytes).cyan());
    println!("Usage: {}%", style(format!("{:.2}", info.percent_used)).yellow());
    println!("Sample data: {}", if is_dummy { "yes" } else { "no" });
    Ok(())
}
