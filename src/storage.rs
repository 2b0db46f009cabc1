//! Persistence of the developer and metric collections.
//!
//! Three keys live under the configured namespace: `developers`, `metrics`
//! and `isDummyData`. Loads are forgiving: a record that no longer matches
//! the expected shape is dropped with a warning, and an unreadable payload
//! reads back as an empty collection. Only failures of the medium itself are
//! returned as errors.

use crate::error::Result;
use crate::model::{
    CodeMetric, Developer, DeveloperDataset, ExportEnvelope, StorageInfo, StoredDataset,
    EXPORT_VERSION,
};
use crate::store::KeyValueStore;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_NAMESPACE: &str = "devmetrics";
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

const DEVELOPERS_KEY: &str = "developers";
const METRICS_KEY: &str = "metrics";
const DUMMY_FLAG_KEY: &str = "isDummyData";

pub struct Storage<S> {
    store: S,
    namespace: String,
    quota_bytes: u64,
}

impl<S: KeyValueStore> Storage<S> {
    pub fn new(store: S) -> Self {
        Self::with_namespace(store, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(store: S, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }

    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{}", self.namespace, name)
    }

    pub fn save_developers(&self, developers: &[Developer]) -> Result<()> {
        self.store
            .set(&self.key(DEVELOPERS_KEY), &serde_json::to_string(developers)?)
    }

    pub fn load_developers(&self) -> Result<Vec<Developer>> {
        let raw = self.store.get(&self.key(DEVELOPERS_KEY))?;
        Ok(decode_collection(raw.as_deref(), DEVELOPERS_KEY, check_developer))
    }

    pub fn save_metrics(&self, metrics: &[CodeMetric]) -> Result<()> {
        self.store
            .set(&self.key(METRICS_KEY), &serde_json::to_string(metrics)?)
    }

    pub fn load_metrics(&self) -> Result<Vec<CodeMetric>> {
        let raw = self.store.get(&self.key(METRICS_KEY))?;
        Ok(decode_collection(raw.as_deref(), METRICS_KEY, check_metric))
    }

    pub fn save_dummy_flag(&self, is_dummy: bool) -> Result<()> {
        self.store
            .set(&self.key(DUMMY_FLAG_KEY), &serde_json::to_string(&is_dummy)?)
    }

    pub fn is_dummy_data(&self) -> Result<bool> {
        let raw = self.store.get(&self.key(DUMMY_FLAG_KEY))?;
        Ok(raw
            .and_then(|text| serde_json::from_str::<bool>(&text).ok())
            .unwrap_or(false))
    }

    /// Writes both collections and the flag. Each key is written on its own;
    /// a failure part-way can leave the keys out of step with each other.
    pub fn save_complete_dataset(
        &self,
        developers: &[Developer],
        metrics: &[CodeMetric],
        is_dummy: bool,
    ) -> Result<()> {
        self.save_developers(developers)?;
        self.save_metrics(metrics)?;
        self.save_dummy_flag(is_dummy)?;
        debug!(
            developers = developers.len(),
            metrics = metrics.len(),
            is_dummy,
            "dataset saved"
        );
        Ok(())
    }

    pub fn load_complete_dataset(&self) -> Result<StoredDataset> {
        Ok(StoredDataset {
            developers: self.load_developers()?,
            metrics: self.load_metrics()?,
            is_dummy_data: self.is_dummy_data()?,
        })
    }

    pub fn clear_all_data(&self) -> Result<()> {
        for name in [DEVELOPERS_KEY, METRICS_KEY, DUMMY_FLAG_KEY] {
            self.store.remove(&self.key(name))?;
        }
        Ok(())
    }

    /// Usage of this namespace only; other keys in the medium are ignored.
    pub fn storage_info(&self) -> Result<StorageInfo> {
        let prefix = format!("{}:", self.namespace);
        let used_bytes: u64 = self
            .store
            .entries()?
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| (key.len() + value.len()) as u64)
            .sum();

        let percent_used = if self.quota_bytes == 0 {
            100.0
        } else {
            crate::util::round2(used_bytes as f64 / self.quota_bytes as f64 * 100.0)
        };

        Ok(StorageInfo {
            used_bytes,
            remaining_bytes: self.quota_bytes.saturating_sub(used_bytes),
            percent_used,
        })
    }
}

pub fn export_to_json(developers: &[Developer], metrics: &[CodeMetric]) -> Result<String> {
    let envelope = ExportEnvelope {
        version: EXPORT_VERSION.to_string(),
        export_date: Utc::now(),
        developers: developers.to_vec(),
        metrics: metrics.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

#[derive(Deserialize)]
struct ImportEnvelope {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    developers: Vec<Value>,
    #[serde(default)]
    metrics: Vec<Value>,
}

/// Reads an export envelope, keeping only the records that still decode.
pub fn import_from_json(text: &str) -> Result<DeveloperDataset> {
    let envelope: ImportEnvelope = serde_json::from_str(text)?;
    match envelope.version.as_deref() {
        Some(EXPORT_VERSION) => {}
        Some(other) => warn!(version = other, "importing export with unknown version"),
        None => warn!("importing export without a version tag"),
    }

    Ok(DeveloperDataset {
        developers: decode_records(envelope.developers, DEVELOPERS_KEY, check_developer),
        metrics: decode_records(envelope.metrics, METRICS_KEY, check_metric),
    })
}

fn decode_collection<T, F>(raw: Option<&str>, label: &str, check: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: Fn(T) -> std::result::Result<T, String>,
{
    let Some(raw) = raw else {
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Value>>(raw) {
        Ok(values) => decode_records(values, label, check),
        Err(e) => {
            warn!(collection = label, error = %e, "stored payload is unreadable, treating as empty");
            Vec::new()
        }
    }
}

fn decode_records<T, F>(values: Vec<Value>, label: &str, check: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: Fn(T) -> std::result::Result<T, String>,
{
    let total = values.len();
    let records: Vec<T> = values
        .into_iter()
        .enumerate()
        .filter_map(|(i, value)| {
            let decoded = serde_json::from_value::<T>(value)
                .map_err(|e| e.to_string())
                .and_then(&check);
            match decoded {
                Ok(record) => Some(record),
                Err(reason) => {
                    warn!(collection = label, index = i, %reason, "dropping invalid record");
                    None
                }
            }
        })
        .collect();

    if records.len() != total {
        warn!(
            collection = label,
            kept = records.len(),
            dropped = total - records.len(),
            "some stored records were invalid"
        );
    }
    records
}

fn check_metric(metric: CodeMetric) -> std::result::Result<CodeMetric, String> {
    if metric.id.trim().is_empty() {
        return Err("metric id is empty".to_string());
    }
    if metric.developer_id.trim().is_empty() {
        return Err(format!("metric {} has no developerId", metric.id));
    }
    Ok(metric)
}

fn check_developer(mut developer: Developer) -> std::result::Result<Developer, String> {
    if developer.id.trim().is_empty() {
        return Err("developer id is empty".to_string());
    }
    if developer.email.trim().is_empty() {
        return Err(format!("developer {} has no email", developer.id));
    }
    let before = developer.metrics.len();
    developer.metrics.retain(|m| {
        !m.id.trim().is_empty() && m.developer_id == developer.id
    });
    if developer.metrics.len() != before {
        warn!(
            developer = %developer.id,
            dropped = before - developer.metrics.len(),
            "dropping nested metrics that do not belong to their developer"
        );
    }
    Ok(developer)
}
