use crate::model::{CodeMetric, CommitData, Developer, DeveloperDataset, SnapshotData};
use std::collections::HashMap;

pub fn developer_id(ordinal: usize) -> String {
    format!("dev-{ordinal}")
}

fn metric_id(commit: &CommitData, ordinal: usize) -> String {
    let short: String = commit.hash.chars().take(12).collect();
    format!("metric-{ordinal}-{short}")
}

/// Maps an already validated snapshot onto developers and metrics.
///
/// Commits are grouped by `(author, email)`; each group gets a `dev-N` id in
/// first-seen order and every commit becomes exactly one metric.
pub fn transform_snapshot(snapshot: &SnapshotData) -> DeveloperDataset {
    let mut developers: Vec<Developer> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut metrics = Vec::with_capacity(snapshot.commits.len());

    for (i, commit) in snapshot.commits.iter().enumerate() {
        let slot = *index
            .entry((commit.author.as_str(), commit.email.as_str()))
            .or_insert_with(|| {
                developers.push(Developer {
                    id: developer_id(developers.len() + 1),
                    name: commit.author.clone(),
                    email: commit.email.clone(),
                    metrics: Vec::new(),
                });
                developers.len() - 1
            });

        let metric = CodeMetric {
            id: metric_id(commit, i + 1),
            developer_id: developers[slot].id.clone(),
            timestamp: commit.timestamp,
            lines_added: commit.lines_added,
            lines_removed: commit.lines_removed,
            files_modified: commit.files_modified.len() as u64,
            commit_hash: Some(commit.hash.clone()),
            repository: Some(snapshot.repository.clone()),
        };
        developers[slot].metrics.push(metric.clone());
        metrics.push(metric);
    }

    DeveloperDataset { developers, metrics }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn commit(hash: &str, author: &str, email: &str, day: u32, files: &[&str]) -> CommitData {
        CommitData {
            hash: hash.to_string(),
            author: author.to_string(),
            email: email.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
            lines_added: 10 * u64::from(day),
            lines_removed: u64::from(day),
            files_modified: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn groups_by_author_and_email_in_first_seen_order() {
        let snapshot = SnapshotData {
            repository: "demo".to_string(),
            commits: vec![
                commit("aaaaaaa1", "Bob", "bob@example.com", 1, &["a.rs"]),
                commit("aaaaaaa2", "Alice", "alice@example.com", 2, &["b.rs", "c.rs"]),
                commit("aaaaaaa3", "Bob", "bob@example.com", 3, &[]),
            ],
        };

        let data = transform_snapshot(&snapshot);
        assert_eq!(data.developers.len(), 2);
        assert_eq!(data.developers[0].id, "dev-1");
        assert_eq!(data.developers[0].name, "Bob");
        assert_eq!(data.developers[0].metrics.len(), 2);
        assert_eq!(data.developers[1].id, "dev-2");
        assert_eq!(data.metrics.len(), 3);
        assert_eq!(data.metrics[2].developer_id, "dev-1");
    }

    #[test]
    fn metric_carries_counts_hash_and_repository() {
        let snapshot = SnapshotData {
            repository: "demo".to_string(),
            commits: vec![commit("abcdef1234", "Alice", "alice@example.com", 2, &["b.rs", "c.rs"])],
        };
        let metric = &transform_snapshot(&snapshot).metrics[0];
        assert_eq!(metric.files_modified, 2);
        assert_eq!(metric.lines_added, 20);
        assert_eq!(metric.lines_removed, 2);
        assert_eq!(metric.commit_hash.as_deref(), Some("abcdef1234"));
        assert_eq!(metric.repository.as_deref(), Some("demo"));
    }

    #[test]
    fn same_email_different_author_names_are_separate_groups() {
        let snapshot = SnapshotData {
            repository: "demo".to_string(),
            commits: vec![
                commit("aaaaaaa1", "Bob", "bob@example.com", 1, &["a.rs"]),
                commit("aaaaaaa2", "Bobby", "bob@example.com", 2, &["a.rs"]),
            ],
        };
        assert_eq!(transform_snapshot(&snapshot).developers.len(), 2);
    }
}
