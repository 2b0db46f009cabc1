use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const EXPORT_VERSION: &str = "1.0";
pub const NO_HASH: &str = "no-hash";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeMetric {
    pub id: String,
    pub developer_id: String,
    #[serde(deserialize_with = "stored_date")]
    pub timestamp: DateTime<Utc>,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub files_modified: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Developer {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub metrics: Vec<CodeMetric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub repository: String,
    pub commits: Vec<CommitData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitData {
    pub hash: String,
    pub author: String,
    pub email: String,
    #[serde(
        serialize_with = "snapshot_date::serialize",
        deserialize_with = "snapshot_date::deserialize"
    )]
    pub timestamp: DateTime<Utc>,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub files_modified: Vec<String>,
}

/// A developer collection together with the flat metric list it owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeveloperDataset {
    pub developers: Vec<Developer>,
    pub metrics: Vec<CodeMetric>,
}

impl DeveloperDataset {
    pub fn is_empty(&self) -> bool {
        self.developers.is_empty() && self.metrics.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredDataset {
    pub developers: Vec<Developer>,
    pub metrics: Vec<CodeMetric>,
    pub is_dummy_data: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope<D, M> {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub developers: Vec<D>,
    pub metrics: Vec<M>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub used_bytes: u64,
    pub remaining_bytes: u64,
    pub percent_used: f64,
}

/// Inclusive `[start, end]` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        timestamp >= &self.start && timestamp <= &self.end
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub total_lines_added: u64,
    pub total_lines_removed: u64,
    pub total_files_modified: u64,
    pub net_lines_changed: i64,
    pub lines_per_file_ratio: f64,
    pub time_range: DateRange,
}

/// Identity used to recognise a metric that is already stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub email: String,
    pub commit_hash: String,
    pub timestamp_millis: i64,
    pub lines_added: u64,
    pub lines_removed: u64,
}

impl DedupKey {
    pub fn new(email: &str, metric: &CodeMetric) -> Self {
        Self {
            email: email.to_string(),
            commit_hash: metric
                .commit_hash
                .clone()
                .unwrap_or_else(|| NO_HASH.to_string()),
            timestamp_millis: metric.timestamp.timestamp_millis(),
            lines_added: metric.lines_added,
            lines_removed: metric.lines_removed,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDate {
    Plain(DateTime<Utc>),
    Tagged {
        #[serde(rename = "__type")]
        kind: String,
        value: DateTime<Utc>,
    },
}

/// Accepts RFC 3339 strings as well as the older `{"__type":"Date","value":..}` wrapper.
fn stored_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    match StoredDate::deserialize(deserializer)? {
        StoredDate::Plain(dt) => Ok(dt),
        StoredDate::Tagged { kind, value } if kind == "Date" => Ok(value),
        StoredDate::Tagged { kind, .. } => Err(serde::de::Error::custom(format!(
            "unsupported tagged value type '{kind}'"
        ))),
    }
}

mod snapshot_date {
    use crate::util::{format_timestamp, parse_timestamp};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(timestamp))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}
