use crate::error::{DevMetricsError, Result};
use crate::util::parse_timestamp;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

const SHORT_HASH_LEN: usize = 7;
const LARGE_LINE_COUNT: u64 = 10_000;
const MAX_FILES_PER_COMMIT: usize = 100;
const MAX_COMMIT_AGE_DAYS: i64 = 730;
const MAX_SNAPSHOT_SPAN_DAYS: i64 = 365;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Outcome of checking a snapshot: `errors` block an import, `warnings` do not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts to a `Result`, handing back the warnings on success.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(DevMetricsError::Validation(self.errors))
        }
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

pub fn validate_snapshot(data: &Value) -> ValidationReport {
    validate_snapshot_at(data, Utc::now())
}

/// Checks a raw snapshot, judging timestamp recency against `now`.
pub fn validate_snapshot_at(data: &Value, now: DateTime<Utc>) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some((repository, commits)) = snapshot_shape(data) else {
        report.error("Invalid snapshot structure: expected an object with a string 'repository' and an array 'commits'");
        return report;
    };

    if repository.trim().is_empty() {
        report.error("repository must be a non-empty string");
    }
    if commits.is_empty() {
        report.error("commits must be a non-empty array");
    }

    let mut seen_hashes: HashSet<&str> = HashSet::new();
    let mut duplicate_hashes: Vec<&str> = Vec::new();
    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();

    for (index, commit) in commits.iter().enumerate() {
        let Some(fields) = commit.as_object() else {
            report.error(format!("commits[{index}] must be an object"));
            continue;
        };

        if let Some(hash) = required_string(&mut report, fields, index, "hash") {
            if hash.len() < SHORT_HASH_LEN {
                report.warn(format!(
                    "commits[{index}].hash '{hash}' is shorter than {SHORT_HASH_LEN} characters"
                ));
            }
            if !seen_hashes.insert(hash) && !duplicate_hashes.contains(&hash) {
                duplicate_hashes.push(hash);
            }
        }

        required_string(&mut report, fields, index, "author");

        if let Some(email) = required_string(&mut report, fields, index, "email") {
            if !EMAIL_PATTERN.is_match(email) {
                report.warn(format!(
                    "commits[{index}].email '{email}' does not look like an email address"
                ));
            }
        }

        if let Some(ts) = check_timestamp(&mut report, fields, index, now) {
            timestamps.push(ts);
        }

        check_line_count(&mut report, fields, index, "linesAdded");
        check_line_count(&mut report, fields, index, "linesRemoved");
        check_files(&mut report, fields, index);
    }

    for hash in duplicate_hashes {
        report.warn(format!("Duplicate commit hash '{hash}' appears more than once"));
    }

    if let (Some(first), Some(last)) = (timestamps.iter().min(), timestamps.iter().max()) {
        let span = *last - *first;
        if span > Duration::days(MAX_SNAPSHOT_SPAN_DAYS) {
            report.warn(format!(
                "Commits span {} days, more than {MAX_SNAPSHOT_SPAN_DAYS}",
                span.num_days()
            ));
        }
    }

    report
}

fn snapshot_shape(data: &Value) -> Option<(&str, &Vec<Value>)> {
    let obj = data.as_object()?;
    let repository = obj.get("repository")?.as_str()?;
    let commits = obj.get("commits")?.as_array()?;
    Some((repository, commits))
}

fn required_string<'a>(
    report: &mut ValidationReport,
    fields: &'a Map<String, Value>,
    index: usize,
    name: &str,
) -> Option<&'a str> {
    match fields.get(name).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Some(value),
        _ => {
            report.error(format!("commits[{index}].{name} is required and must be a string"));
            None
        }
    }
}

fn check_timestamp(
    report: &mut ValidationReport,
    fields: &Map<String, Value>,
    index: usize,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let Some(ts) = fields
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
    else {
        report.error(format!("commits[{index}].timestamp must be a valid date"));
        return None;
    };

    if ts > now {
        report.warn(format!("commits[{index}].timestamp {ts} is in the future"));
    } else if now - ts > Duration::days(MAX_COMMIT_AGE_DAYS) {
        report.warn(format!("commits[{index}].timestamp {ts} is more than 2 years old"));
    }
    Some(ts)
}

fn check_line_count(report: &mut ValidationReport, fields: &Map<String, Value>, index: usize, name: &str) {
    let raw = fields.get(name);
    if let Some(count) = raw.and_then(Value::as_u64) {
        if count > LARGE_LINE_COUNT {
            report.warn(format!("commits[{index}].{name} is unusually large ({count})"));
        }
        return;
    }
    // `5.0` and `1.5` both land here; counts are stored as integers
    match raw {
        Some(value @ Value::Number(n)) if n.as_f64().is_some_and(|v| v >= 0.0) => {
            report.error(format!("commits[{index}].{name} must be a whole number, got {value}"));
        }
        _ => report.error(format!("commits[{index}].{name} must be a non-negative number")),
    }
}

fn check_files(report: &mut ValidationReport, fields: &Map<String, Value>, index: usize) {
    let Some(files) = fields.get("filesModified").and_then(Value::as_array) else {
        report.error(format!("commits[{index}].filesModified must be an array of strings"));
        return;
    };

    if files.iter().any(|f| !f.is_string()) {
        report.error(format!("commits[{index}].filesModified must contain only strings"));
    }
    if files.is_empty() {
        report.warn(format!("commits[{index}] has no modified files"));
    } else if files.len() > MAX_FILES_PER_COMMIT {
        report.warn(format!(
            "commits[{index}] modifies {} files, more than {MAX_FILES_PER_COMMIT}",
            files.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn commit() -> Value {
        json!({
            "hash": "abcdef1234",
            "author": "Alice",
            "email": "alice@example.com",
            "timestamp": "2024-05-01T10:00:00Z",
            "linesAdded": 10,
            "linesRemoved": 4,
            "filesModified": ["src/lib.rs"]
        })
    }

    fn snapshot(commits: Vec<Value>) -> Value {
        json!({ "repository": "demo", "commits": commits })
    }

    #[test]
    fn clean_snapshot_has_no_findings() {
        let report = validate_snapshot_at(&snapshot(vec![commit()]), now());
        assert!(report.is_valid());
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn wrong_shape_short_circuits_with_single_error() {
        for data in [json!(null), json!({"repository": 5, "commits": []}), json!({"repository": "x"})] {
            let report = validate_snapshot_at(&data, now());
            assert_eq!(report.errors.len(), 1);
            assert!(report.warnings.is_empty());
        }
    }

    #[test]
    fn empty_repository_and_commits_are_errors() {
        let report = validate_snapshot_at(&json!({"repository": " ", "commits": []}), now());
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn every_violation_is_reported() {
        let mut bad = commit();
        bad["hash"] = json!(12);
        bad["linesAdded"] = json!(-1);
        bad["linesRemoved"] = json!("many");
        bad["timestamp"] = json!("yesterday-ish");
        bad["filesModified"] = json!("src/lib.rs");
        let report = validate_snapshot_at(&snapshot(vec![commit(), bad]), now());
        assert_eq!(report.errors.len(), 5, "{:?}", report.errors);
        assert!(report.errors.iter().all(|e| e.starts_with("commits[1]")));
        assert!(report.clone().into_result().is_err());
    }

    #[test]
    fn advisory_findings_are_warnings() {
        let mut c = commit();
        c["hash"] = json!("abc");
        c["email"] = json!("not-an-email");
        c["linesAdded"] = json!(20_000);
        c["filesModified"] = json!([]);
        let report = validate_snapshot_at(&snapshot(vec![c]), now());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert_eq!(report.warnings.len(), 4, "{:?}", report.warnings);
    }

    #[test]
    fn timestamp_recency_warnings() {
        let mut future = commit();
        future["timestamp"] = json!("2024-07-01T00:00:00Z");
        let mut ancient = commit();
        ancient["hash"] = json!("1234567890");
        ancient["timestamp"] = json!("2021-01-01T00:00:00Z");
        let report = validate_snapshot_at(&snapshot(vec![future, ancient]), now());
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("in the future")));
        assert!(report.warnings.iter().any(|w| w.contains("more than 2 years old")));
        assert!(report.warnings.iter().any(|w| w.contains("span")));
    }

    #[test]
    fn duplicate_hash_and_too_many_files_warn() {
        let mut many = commit();
        let files: Vec<String> = (0..101).map(|i| format!("f{i}.rs")).collect();
        many["filesModified"] = json!(files);
        let report = validate_snapshot_at(&snapshot(vec![commit(), many]), now());
        assert!(report.is_valid());
        assert_eq!(
            report
                .warnings
                .iter()
                .filter(|w| w.contains("Duplicate commit hash"))
                .count(),
            1
        );
        assert!(report.warnings.iter().any(|w| w.contains("101 files")));
    }

    #[test]
    fn fractional_line_counts_are_rejected() {
        let mut c = commit();
        c["linesRemoved"] = json!(1.5);
        let report = validate_snapshot_at(&snapshot(vec![c]), now());
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn float_encoded_counts_are_reported_by_validator() {
        let mut c = commit();
        c["linesAdded"] = json!(5.0);
        c["linesRemoved"] = json!(1e20);
        let report = validate_snapshot_at(&snapshot(vec![c]), now());
        assert_eq!(report.errors.len(), 2, "{:?}", report.errors);
        assert!(report.errors[0].contains("linesAdded must be a whole number, got 5.0"));
        assert!(report.errors[1].starts_with("commits[0].linesRemoved"));
    }

    #[test]
    fn thresholds_are_exclusive() {
        let mut first = commit();
        first["hash"] = json!("abcdef1");
        first["linesAdded"] = json!(10_000);
        first["linesRemoved"] = json!(10_000);
        first["timestamp"] = json!("2023-06-01T00:00:00Z");
        let files: Vec<String> = (0..100).map(|i| format!("f{i}.rs")).collect();
        first["filesModified"] = json!(files);

        let mut last = commit();
        last["timestamp"] = json!("2024-05-31T00:00:00Z");

        let report = validate_snapshot_at(&snapshot(vec![first, last]), now());
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);

        let mut over = commit();
        over["timestamp"] = json!("2023-05-31T23:59:59Z");
        over["hash"] = json!("1234567890");
        let mut last = commit();
        last["timestamp"] = json!("2024-05-31T00:00:00Z");
        let report = validate_snapshot_at(&snapshot(vec![over, last]), now());
        assert_eq!(report.warnings.len(), 1, "{:?}", report.warnings);
        assert!(report.warnings[0].contains("span"));
    }

    #[test]
    fn into_result_returns_warnings_when_valid() {
        let mut c = commit();
        c["hash"] = json!("abc");
        let warnings = validate_snapshot_at(&snapshot(vec![c]), now())
            .into_result()
            .unwrap();
        assert_eq!(warnings.len(), 1);
    }
}
