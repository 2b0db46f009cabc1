use crate::git::DEFAULT_COMMIT_LIMIT;
use crate::storage::{DEFAULT_NAMESPACE, DEFAULT_QUOTA_BYTES};
use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devmetrics")]
#[command(about = "Developer code-change metrics: import git snapshots, deduplicate and summarise")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, global = true, env = "DEVMETRICS_STORE", help = "Path to the metrics store database")]
    pub store: Option<PathBuf>,

    #[arg(long, global = true, default_value = DEFAULT_NAMESPACE, help = "Key namespace inside the store")]
    pub namespace: String,

    #[arg(long, global = true, default_value_t = DEFAULT_QUOTA_BYTES, help = "Storage capacity in bytes used for usage reports")]
    pub quota: u64,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?.join(".devmetrics").join("store.db")),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Bucket {
    Day,
    Week,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read commit history from a git repository into a snapshot file
    Snapshot {
        #[arg(long, help = "Path to git repository")]
        repo: Option<PathBuf>,

        #[arg(long, default_value_t = DEFAULT_COMMIT_LIMIT, help = "Maximum number of commits to read")]
        limit: usize,

        #[arg(short, long, help = "Write the snapshot to this file instead of stdout")]
        output: Option<PathBuf>,

        #[arg(long, help = "Also import the snapshot into the store")]
        import: bool,
    },
    /// Import a snapshot JSON file into the store
    Import {
        #[arg(help = "Snapshot file")]
        file: PathBuf,
    },
    /// List stored developers
    Developers {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Show one developer's metrics
    Metrics {
        #[arg(help = "Developer id")]
        developer: String,

        #[arg(long, help = "Only metrics at or after this date (RFC3339, YYYY-MM-DD, or 'N days ago')")]
        since: Option<String>,

        #[arg(long, help = "Only metrics at or before this date (RFC3339, YYYY-MM-DD, or 'N days ago')")]
        until: Option<String>,

        #[arg(long, value_enum, help = "Sum metrics per day or per ISO week")]
        by: Option<Bucket>,

        #[arg(long, help = "Moving average over this many days")]
        moving_average: Option<i64>,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Totals and lines-per-file ratio
    Summary {
        #[arg(long, help = "Restrict to one developer id")]
        developer: Option<String>,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Write a versioned export of all developers and metrics
    Export {
        #[arg(short, long, help = "Write to this file instead of stdout")]
        output: Option<PathBuf>,
    },
    /// Replace the store contents with an export file
    Restore {
        #[arg(help = "Export file")]
        file: PathBuf,
    },
    /// Fill an empty store with generated sample data
    Sample {
        #[arg(long, default_value_t = 90, help = "Days of history to generate")]
        days: u32,

        #[arg(long, default_value_t = 42, help = "Random seed")]
        seed: u64,
    },
    /// Remove all stored data
    Clear,
    /// Show storage usage
    Info {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        let common = self.common;
        match self.command {
            Commands::Snapshot { repo, limit, output, import } => {
                crate::commands::snapshot::exec(&common, repo, limit, output, import)
            }
            Commands::Import { file } => crate::commands::import::exec(&common, &file),
            Commands::Developers { json } => crate::commands::query::developers(&common, json),
            Commands::Metrics { developer, since, until, by, moving_average, json } => {
                let query = crate::commands::query::MetricsQuery {
                    developer,
                    since,
                    until,
                    by,
                    moving_average,
                };
                crate::commands::query::metrics(&common, &query, json)
            }
            Commands::Summary { developer, json } => {
                crate::commands::query::summary(&common, developer.as_deref(), json)
            }
            Commands::Export { output } => crate::commands::admin::export(&common, output),
            Commands::Restore { file } => crate::commands::admin::restore(&common, &file),
            Commands::Sample { days, seed } => crate::commands::admin::sample(&common, days, seed),
            Commands::Clear => crate::commands::admin::clear(&common),
            Commands::Info { json } => crate::commands::admin::info(&common, json),
        }
    }
}
