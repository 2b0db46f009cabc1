use super::open_repository;
use crate::cli::{Bucket, CommonArgs};
use crate::metrics::{aggregate_by_day, aggregate_by_week, calculate_moving_average, calculate_summary};
use crate::model::{CodeMetric, DateRange, MetricsSummary};
use crate::util::parse_date_bound;
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use console::style;

pub struct MetricsQuery {
    pub developer: String,
    pub since: Option<String>,
    pub until: Option<String>,
    pub by: Option<Bucket>,
    pub moving_average: Option<i64>,
}

impl MetricsQuery {
    fn range(&self) -> anyhow::Result<Option<DateRange>> {
        if self.since.is_none() && self.until.is_none() {
            return Ok(None);
        }
        let now = Utc::now();
        let bound = |input: &Option<String>, end_of_day: bool, fallback: DateTime<Utc>| match input {
            Some(s) => parse_date_bound(s, end_of_day, now)
                .with_context(|| format!("Invalid date '{s}'")),
            None => Ok(fallback),
        };
        let start = bound(&self.since, false, DateTime::<Utc>::MIN_UTC)?;
        let end = bound(&self.until, true, DateTime::<Utc>::MAX_UTC)?;
        Ok(Some(DateRange::new(start, end)))
    }
}

pub fn developers(common: &CommonArgs, json: bool) -> anyhow::Result<()> {
    let repository = open_repository(common)?;
    let developers = repository
        .get_developers()
        .context("Failed to load developers")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&developers)?);
        return Ok(());
    }

    if developers.is_empty() {
        println!("No developers stored");
        return Ok(());
    }

    println!(
        "{:<10} {:<28} {:<36} {:>8} {:>10}",
        style("Id").bold(),
        style("Name").bold(),
        style("Email").bold(),
        style("Commits").bold(),
        style("Ratio").bold()
    );
    println!("{}", "─".repeat(96));
    for d in &developers {
        println!(
            "{:<10} {:<28} {:<36} {:>8} {:>10.2}",
            d.id,
            d.name,
            d.email,
            d.metrics.len(),
            crate::metrics::calculate_lines_per_file_ratio(&d.metrics)
        );
    }
    if repository.is_dummy_data().unwrap_or(false) {
        println!("\n{}", style("(sample data)").dim());
    }
    Ok(())
}

pub fn metrics(common: &CommonArgs, query: &MetricsQuery, json: bool) -> anyhow::Result<()> {
    let range = query.range()?;
    let repository = open_repository(common)?;
    let mut metrics = repository
        .get_metrics(&query.developer, range)
        .context("Failed to load metrics")?;

    metrics = match query.by {
        Some(Bucket::Day) => aggregate_by_day(&metrics),
        Some(Bucket::Week) => aggregate_by_week(&metrics),
        None => metrics,
    };
    if let Some(days) = query.moving_average {
        if days <= 0 {
            bail!("--moving-average must be a positive number of days");
        }
        metrics = calculate_moving_average(&metrics, days);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        output_metrics_table(&metrics);
        output_summary(&calculate_summary(&metrics));
    }
    Ok(())
}

pub fn summary(common: &CommonArgs, developer: Option<&str>, json: bool) -> anyhow::Result<()> {
    let repository = open_repository(common)?;
    let summary = repository
        .summary(developer)
        .context("Failed to compute summary")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        output_summary(&summary);
    }
    Ok(())
}

fn output_metrics_table(metrics: &[CodeMetric]) {
    if metrics.is_empty() {
        println!("No metrics in range");
        return;
    }
    println!(
        "{:<22} {:>8} {:>8} {:>6}  {:<12}",
        style("Timestamp").bold(),
        style("Added").bold(),
        style("Removed").bold(),
        style("Files").bold(),
        style("Commit").bold()
    );
    println!("{}", "─".repeat(62));
    for m in metrics {
        let hash: String = m.commit_hash.as_deref().unwrap_or("-").chars().take(12).collect();
        println!(
            "{:<22} {:>8} {:>8} {:>6}  {:<12}",
            m.timestamp.format("%Y-%m-%d %H:%M"),
            style(m.lines_added).green(),
            style(m.lines_removed).red(),
            m.files_modified,
            hash
        );
    }
}

fn output_summary(summary: &MetricsSummary) {
    println!("\n{}", style("Summary").bold());
    println!("{}", "─".repeat(50));
    println!("Lines added: {}", style(summary.total_lines_added).green());
    println!("Lines removed: {}", style(summary.total_lines_removed).red());
    println!("Net lines changed: {}", style(summary.net_lines_changed).cyan());
    println!("Files modified: {}", style(summary.total_files_modified).cyan());
    println!("Lines per file: {}", style(format!("{:.2}", summary.lines_per_file_ratio)).yellow());
    println!(
        "Date range: {} to {}",
        style(summary.time_range.start.format("%Y-%m-%d")).dim(),
        style(summary.time_range.end.format("%Y-%m-%d")).dim()
    );
}
