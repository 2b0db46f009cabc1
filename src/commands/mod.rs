pub mod admin;
pub mod import;
pub mod query;
pub mod snapshot;

use crate::cli::CommonArgs;
use crate::repository::Repository;
use crate::storage::Storage;
use crate::store::SqliteStore;
use anyhow::Context;
use console::style;

pub fn open_repository(common: &CommonArgs) -> anyhow::Result<Repository<SqliteStore>> {
    let path = common.store_path()?;
    let store = SqliteStore::open(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    let storage = Storage::with_namespace(store, common.namespace.as_str()).with_quota(common.quota);
    Ok(Repository::new(storage))
}

pub(crate) fn print_warnings(warnings: &[String]) {
    if warnings.is_empty() {
        return;
    }
    eprintln!("{} {} warning(s):", style("!").yellow().bold(), warnings.len());
    for w in warnings {
        eprintln!("  - {w}");
    }
}
