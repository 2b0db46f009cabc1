use crate::model::{CodeMetric, DedupKey, Developer, DeveloperDataset};
use crate::transform::developer_id;
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub new_developers: usize,
    pub new_metrics: usize,
}

struct MergeState {
    developers: Vec<Developer>,
    metrics: Vec<CodeMetric>,
    slot_by_email: HashMap<String, usize>,
    slot_by_id: HashMap<String, usize>,
    metric_ids: HashSet<String>,
    keys: HashSet<DedupKey>,
}

impl MergeState {
    fn new(existing: DeveloperDataset) -> Self {
        let DeveloperDataset { developers, metrics } = existing;

        let mut slot_by_email = HashMap::new();
        let mut slot_by_id = HashMap::new();
        for (slot, dev) in developers.iter().enumerate() {
            slot_by_email.entry(dev.email.clone()).or_insert(slot);
            slot_by_id.entry(dev.id.clone()).or_insert(slot);
        }

        let keys = metrics
            .iter()
            .filter_map(|m| {
                slot_by_id
                    .get(&m.developer_id)
                    .map(|&slot| DedupKey::new(&developers[slot].email, m))
            })
            .collect();
        let metric_ids = metrics.iter().map(|m| m.id.clone()).collect();

        Self {
            developers,
            metrics,
            slot_by_email,
            slot_by_id,
            metric_ids,
            keys,
        }
    }

    fn free_developer_id(&self, wanted: &str) -> String {
        if !self.slot_by_id.contains_key(wanted) {
            return wanted.to_string();
        }
        (self.developers.len() + 1..)
            .map(developer_id)
            .find(|id| !self.slot_by_id.contains_key(id))
            .unwrap_or_else(|| format!("{wanted}-{}", self.developers.len()))
    }

    fn free_metric_id(&self, wanted: &str) -> String {
        if !self.metric_ids.contains(wanted) {
            return wanted.to_string();
        }
        (2..)
            .map(|n| format!("{wanted}-{n}"))
            .find(|id| !self.metric_ids.contains(id))
            .unwrap_or_else(|| wanted.to_string())
    }

    /// Returns the slot the incoming developer lands in, creating one for a new email.
    fn place_developer(&mut self, incoming: &Developer) -> (usize, bool) {
        if let Some(&slot) = self.slot_by_email.get(&incoming.email) {
            return (slot, false);
        }
        let id = self.free_developer_id(&incoming.id);
        let slot = self.developers.len();
        self.developers.push(Developer {
            id: id.clone(),
            name: incoming.name.clone(),
            email: incoming.email.clone(),
            metrics: Vec::new(),
        });
        self.slot_by_email.insert(incoming.email.clone(), slot);
        self.slot_by_id.insert(id, slot);
        (slot, true)
    }

    fn accept_metric(&mut self, slot: usize, mut metric: CodeMetric) -> bool {
        let key = DedupKey::new(&self.developers[slot].email, &metric);
        if !self.keys.insert(key) {
            return false;
        }
        metric.id = self.free_metric_id(&metric.id);
        metric.developer_id = self.developers[slot].id.clone();
        self.metric_ids.insert(metric.id.clone());
        self.developers[slot].metrics.push(metric.clone());
        self.metrics.push(metric);
        true
    }
}

/// Folds `incoming` into `existing`.
///
/// Developers are matched on email. Incoming metrics are re-pointed at the
/// developer they land on and dropped when their dedup key is already present.
pub fn merge_dataset(
    existing: DeveloperDataset,
    incoming: DeveloperDataset,
) -> (DeveloperDataset, MergeStats) {
    let mut state = MergeState::new(existing);
    let mut stats = MergeStats::default();

    let mut target: HashMap<&str, usize> = HashMap::new();
    for dev in &incoming.developers {
        let (slot, created) = state.place_developer(dev);
        if created {
            stats.new_developers += 1;
        }
        target.entry(dev.id.as_str()).or_insert(slot);
    }

    for metric in incoming.metrics {
        let Some(&slot) = target.get(metric.developer_id.as_str()) else {
            warn!(metric = %metric.id, developer = %metric.developer_id, "skipping metric without a developer");
            continue;
        };
        if state.accept_metric(slot, metric) {
            stats.new_metrics += 1;
        }
    }

    let merged = DeveloperDataset {
        developers: state.developers,
        metrics: state.metrics,
    };
    (merged, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn metric(id: &str, dev: &str, hash: Option<&str>, day: u32, added: u64) -> CodeMetric {
        CodeMetric {
            id: id.to_string(),
            developer_id: dev.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 10, 0, 0).unwrap(),
            lines_added: added,
            lines_removed: 1,
            files_modified: 1,
            commit_hash: hash.map(str::to_string),
            repository: Some("demo".to_string()),
        }
    }

    fn dataset(devs: &[(&str, &str)], metrics: Vec<CodeMetric>) -> DeveloperDataset {
        let developers = devs
            .iter()
            .map(|(id, email)| Developer {
                id: id.to_string(),
                name: id.to_string(),
                email: email.to_string(),
                metrics: metrics
                    .iter()
                    .filter(|m| m.developer_id == *id)
                    .cloned()
                    .collect(),
            })
            .collect();
        DeveloperDataset { developers, metrics }
    }

    #[test]
    fn merging_into_empty_keeps_everything() {
        let incoming = dataset(
            &[("dev-1", "a@example.com")],
            vec![metric("m1", "dev-1", Some("h1"), 1, 5), metric("m2", "dev-1", Some("h2"), 2, 7)],
        );
        let (merged, stats) = merge_dataset(DeveloperDataset::default(), incoming.clone());
        assert_eq!(stats, MergeStats { new_developers: 1, new_metrics: 2 });
        assert_eq!(merged, incoming);
    }

    #[test]
    fn existing_email_absorbs_incoming_metrics() {
        let existing = dataset(&[("dev-1", "a@example.com")], vec![metric("m1", "dev-1", Some("h1"), 1, 5)]);
        // a second snapshot numbers its developers from dev-1 again
        let incoming = dataset(
            &[("dev-1", "b@example.com"), ("dev-2", "a@example.com")],
            vec![metric("m1", "dev-2", Some("h2"), 2, 9), metric("m2", "dev-1", Some("h3"), 3, 4)],
        );

        let (merged, stats) = merge_dataset(existing, incoming);
        assert_eq!(stats, MergeStats { new_developers: 1, new_metrics: 2 });
        assert_eq!(merged.developers.len(), 2);

        let alice = &merged.developers[0];
        assert_eq!(alice.id, "dev-1");
        assert_eq!(alice.metrics.len(), 2);

        let bob = &merged.developers[1];
        assert_eq!(bob.email, "b@example.com");
        assert_eq!(bob.id, "dev-2");
        assert_eq!(bob.metrics.len(), 1);

        let ids: HashSet<&str> = merged.metrics.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids.len(), merged.metrics.len());
        for m in &merged.metrics {
            assert!(merged.developers.iter().any(|d| d.id == m.developer_id));
        }
    }

    #[test]
    fn duplicate_keys_are_dropped_silently() {
        let existing = dataset(&[("dev-1", "a@example.com")], vec![metric("m1", "dev-1", Some("h1"), 1, 5)]);
        let incoming = dataset(
            &[("dev-7", "a@example.com")],
            vec![metric("x", "dev-7", Some("h1"), 1, 5), metric("y", "dev-7", Some("h1"), 1, 6)],
        );
        let (merged, stats) = merge_dataset(existing, incoming);
        assert_eq!(stats.new_metrics, 1);
        assert_eq!(merged.metrics.len(), 2);
        assert_eq!(merged.metrics[1].lines_added, 6);
        assert_eq!(merged.metrics[1].developer_id, "dev-1");
    }

    #[test]
    fn missing_hashes_share_the_placeholder_key() {
        let incoming = dataset(
            &[("dev-1", "a@example.com")],
            vec![metric("m1", "dev-1", None, 1, 5), metric("m2", "dev-1", None, 1, 5)],
        );
        let (merged, _) = merge_dataset(DeveloperDataset::default(), incoming);
        assert_eq!(merged.metrics.len(), 1);
    }

    #[test]
    fn orphan_metrics_are_skipped() {
        let incoming = dataset(&[("dev-1", "a@example.com")], vec![metric("m1", "ghost", Some("h1"), 1, 5)]);
        let (merged, stats) = merge_dataset(DeveloperDataset::default(), incoming);
        assert_eq!(stats.new_metrics, 0);
        assert!(merged.metrics.is_empty());
    }
}
