//! The stateful front door to the metric store.
//!
//! A [`Repository`] owns a [`Storage`] plus an in-memory copy of the dataset
//! that is loaded lazily and expires after `cache_ttl`. Every mutating call
//! drops the cached copy. Mutations are serialized per repository, so the
//! read-merge-write of an import cannot interleave with another mutation.

mod merge;

pub use merge::{merge_dataset, MergeStats};

use crate::error::{DevMetricsError, Result};
use crate::metrics::calculate_summary;
use crate::model::{
    CodeMetric, DateRange, Developer, DeveloperDataset, MetricsSummary, SnapshotData, StorageInfo,
};
use crate::sample::{DummyDataSource, DummyDataset};
use crate::storage::{export_to_json, import_from_json, Storage};
use crate::store::KeyValueStore;
use crate::transform::transform_snapshot;
use crate::validate::validate_snapshot;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy)]
pub struct RepositoryConfig {
    pub cache_ttl: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub new_developers: usize,
    pub new_metrics: usize,
    pub warnings: Vec<String>,
}

#[derive(Default)]
struct CacheState {
    data: DeveloperDataset,
    loaded_at: Option<Instant>,
}

impl CacheState {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.is_some_and(|at| at.elapsed() < ttl)
    }
}

pub struct Repository<S> {
    storage: Storage<S>,
    config: RepositoryConfig,
    cache: RwLock<CacheState>,
    write_lock: Mutex<()>,
}

impl<S: KeyValueStore> Repository<S> {
    pub fn new(storage: Storage<S>) -> Self {
        Self::with_config(storage, RepositoryConfig::default())
    }

    pub fn with_config(storage: Storage<S>, config: RepositoryConfig) -> Self {
        Self {
            storage,
            config,
            cache: RwLock::new(CacheState::default()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn storage(&self) -> &Storage<S> {
        &self.storage
    }

    pub fn invalidate_cache(&self) {
        *self.cache.write() = CacheState::default();
    }

    pub fn get_developers(&self) -> Result<Vec<Developer>> {
        self.read_cache("Unable to retrieve developers", |data| data.developers.clone())
    }

    /// `Ok(None)` when no developer has this id.
    pub fn get_developer(&self, id: &str) -> Result<Option<Developer>> {
        require_id(id, "developer id")?;
        self.read_cache("Unable to retrieve developer", |data| {
            data.developers.iter().find(|d| d.id == id).cloned()
        })
    }

    /// Metrics of one developer, oldest first, optionally limited to an inclusive range.
    pub fn get_metrics(&self, developer_id: &str, range: Option<DateRange>) -> Result<Vec<CodeMetric>> {
        require_id(developer_id, "developer id")?;
        if let Some(range) = &range {
            if !range.is_ordered() {
                return Err(DevMetricsError::Parameter(format!(
                    "date range start ({}) is after end ({})",
                    range.start, range.end
                )));
            }
        }

        let mut metrics = self.read_cache("Unable to retrieve metrics", |data| {
            data.metrics
                .iter()
                .filter(|m| m.developer_id == developer_id)
                .filter(|m| range.map_or(true, |r| r.contains(&m.timestamp)))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        metrics.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(metrics)
    }

    pub fn get_all_metrics(&self) -> Result<Vec<CodeMetric>> {
        let mut metrics =
            self.read_cache("Unable to retrieve metrics", |data| data.metrics.clone())?;
        metrics.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(metrics)
    }

    pub fn summary(&self, developer_id: Option<&str>) -> Result<MetricsSummary> {
        let metrics = match developer_id {
            Some(id) => self.get_metrics(id, None)?,
            None => self.get_all_metrics()?,
        };
        Ok(calculate_summary(&metrics))
    }

    pub fn import_snapshot(&self, snapshot: &SnapshotData) -> Result<ImportOutcome> {
        let value = serde_json::to_value(snapshot)?;
        self.import_snapshot_value(&value)
    }

    pub fn import_snapshot_json(&self, text: &str) -> Result<ImportOutcome> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DevMetricsError::Validation(vec![format!("snapshot is not valid JSON: {e}")]))?;
        self.import_snapshot_value(&value)
    }

    /// Validates, transforms and merges a raw snapshot. Nothing is written
    /// unless validation passes; duplicates of stored metrics are dropped.
    pub fn import_snapshot_value(&self, data: &Value) -> Result<ImportOutcome> {
        let warnings = validate_snapshot(data).into_result()?;
        for warning in &warnings {
            warn!(%warning, "snapshot warning");
        }

        let snapshot: SnapshotData = serde_json::from_value(data.clone())
            .map_err(|e| DevMetricsError::Validation(vec![e.to_string()]))?;
        let incoming = transform_snapshot(&snapshot);

        let _guard = self.write_lock.lock();
        let existing = self.read_cache("Unable to import snapshot", Clone::clone)?;
        let (merged, stats) = merge_dataset(existing, incoming);
        self.persist("Unable to import snapshot", &merged, false)?;

        info!(
            repository = %snapshot.repository,
            commits = snapshot.commits.len(),
            new_developers = stats.new_developers,
            new_metrics = stats.new_metrics,
            "snapshot imported"
        );
        Ok(ImportOutcome {
            new_developers: stats.new_developers,
            new_metrics: stats.new_metrics,
            warnings,
        })
    }

    /// Seeds an empty store from `source`. Returns `false` without touching
    /// anything when developers or metrics are already present.
    pub fn initialize_with_dummy_data(&self, source: &dyn DummyDataSource) -> Result<bool> {
        const OP: &str = "Unable to initialize sample data";
        let _guard = self.write_lock.lock();
        if !self.read_cache(OP, DeveloperDataset::is_empty)? {
            debug!("store already holds data, skipping sample data");
            return Ok(false);
        }

        let generated = match source.generate() {
            DummyDataset::Dataset(data) => data,
            DummyDataset::Snapshot(snapshot) => {
                let value = serde_json::to_value(&snapshot)?;
                validate_snapshot(&value).into_result()?;
                transform_snapshot(&snapshot)
            }
        };
        let (data, stats) = merge_dataset(DeveloperDataset::default(), generated);
        self.persist(OP, &data, true)?;
        info!(
            developers = stats.new_developers,
            metrics = stats.new_metrics,
            "sample data stored"
        );
        Ok(true)
    }

    /// Replaces the stored dataset with the contents of an export envelope.
    pub fn restore_backup(&self, text: &str) -> Result<ImportOutcome> {
        const OP: &str = "Unable to restore backup";
        let imported = import_from_json(text).map_err(|e| self.failure(OP, e))?;

        let _guard = self.write_lock.lock();
        let (data, stats) = merge_dataset(DeveloperDataset::default(), imported);
        self.persist(OP, &data, false)?;
        Ok(ImportOutcome {
            new_developers: stats.new_developers,
            new_metrics: stats.new_metrics,
            warnings: Vec::new(),
        })
    }

    pub fn clear_all_data(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        let result = self.storage.clear_all_data();
        self.invalidate_cache();
        result.map_err(|e| self.failure("Unable to clear data", e))
    }

    pub fn is_dummy_data(&self) -> Result<bool> {
        self.storage
            .is_dummy_data()
            .map_err(|e| self.failure("Unable to read sample data flag", e))
    }

    pub fn get_storage_info(&self) -> Result<StorageInfo> {
        self.storage
            .storage_info()
            .map_err(|e| self.failure("Unable to read storage info", e))
    }

    pub fn export_data(&self) -> Result<String> {
        const OP: &str = "Unable to export data";
        let data = self.read_cache(OP, Clone::clone)?;
        export_to_json(&data.developers, &data.metrics).map_err(|e| self.failure(OP, e))
    }

    fn persist(&self, operation: &str, data: &DeveloperDataset, is_dummy: bool) -> Result<()> {
        let result = self
            .storage
            .save_complete_dataset(&data.developers, &data.metrics, is_dummy);
        self.invalidate_cache();
        result.map_err(|e| self.failure(operation, e))
    }

    fn failure(&self, operation: &str, err: DevMetricsError) -> DevMetricsError {
        error!(operation, error = %err, "storage operation failed");
        DevMetricsError::storage(operation, err)
    }

    fn read_cache<T>(&self, operation: &str, read: impl FnOnce(&DeveloperDataset) -> T) -> Result<T> {
        let ttl = self.config.cache_ttl;
        {
            let cache = self.cache.read();
            if cache.is_fresh(ttl) {
                return Ok(read(&cache.data));
            }
        }

        let mut cache = self.cache.write();
        if !cache.is_fresh(ttl) {
            debug!("loading dataset into cache");
            match self.load_dataset() {
                Ok(data) => {
                    *cache = CacheState {
                        data,
                        loaded_at: Some(Instant::now()),
                    };
                }
                Err(e) => {
                    *cache = CacheState::default();
                    return Err(self.failure(operation, e));
                }
            }
        }
        Ok(read(&cache.data))
    }

    fn load_dataset(&self) -> Result<DeveloperDataset> {
        let developers = self.storage.load_developers()?;
        let mut metrics = self.storage.load_metrics()?;

        let before = metrics.len();
        metrics.retain(|m| developers.iter().any(|d| d.id == m.developer_id));
        if metrics.len() != before {
            warn!(
                dropped = before - metrics.len(),
                "dropping stored metrics whose developer is missing"
            );
        }
        Ok(DeveloperDataset { developers, metrics })
    }
}

fn require_id(id: &str, what: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(DevMetricsError::Parameter(format!("{what} must be a non-empty string")));
    }
    Ok(())
}
