//! Pure statistics over metric lists.

use crate::model::{CodeMetric, DateRange, MetricsSummary};
use crate::util::{noon_utc, round2, week_key, week_start};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};

/// `sum(lines_added) / sum(files_modified)` to two decimals, or 0 when no files were touched.
pub fn calculate_lines_per_file_ratio(metrics: &[CodeMetric]) -> f64 {
    let files = total(metrics, |m| m.files_modified);
    if files == 0 {
        return 0.0;
    }
    let added = total(metrics, |m| m.lines_added);
    round2(added as f64 / files as f64)
}

/// Counts are unbounded on import, so totals saturate at `u64::MAX`.
fn total(metrics: &[CodeMetric], field: impl Fn(&CodeMetric) -> u64) -> u64 {
    metrics.iter().map(field).fold(0, u64::saturating_add)
}

fn net_change(added: u64, removed: u64) -> i64 {
    let net = i128::from(added) - i128::from(removed);
    i64::try_from(net).unwrap_or(if net < 0 { i64::MIN } else { i64::MAX })
}

pub fn calculate_summary(metrics: &[CodeMetric]) -> MetricsSummary {
    let total_lines_added = total(metrics, |m| m.lines_added);
    let total_lines_removed = total(metrics, |m| m.lines_removed);
    let total_files_modified = total(metrics, |m| m.files_modified);

    let now = Utc::now();
    let start = metrics.iter().map(|m| m.timestamp).min().unwrap_or(now);
    let end = metrics.iter().map(|m| m.timestamp).max().unwrap_or(now);

    MetricsSummary {
        total_lines_added,
        total_lines_removed,
        total_files_modified,
        net_lines_changed: net_change(total_lines_added, total_lines_removed),
        lines_per_file_ratio: calculate_lines_per_file_ratio(metrics),
        time_range: DateRange::new(start, end),
    }
}

pub fn aggregate_by_time_range(metrics: &[CodeMetric], range: &DateRange) -> Vec<CodeMetric> {
    metrics
        .iter()
        .filter(|m| range.contains(&m.timestamp))
        .cloned()
        .collect()
}

pub fn aggregate_by_day(metrics: &[CodeMetric]) -> Vec<CodeMetric> {
    bucketize(metrics, |m| m.timestamp.date_naive(), |date| {
        format!("day-{}", date.format("%Y-%m-%d"))
    })
}

/// Buckets by ISO week; each bucket is stamped at noon UTC on its Monday.
pub fn aggregate_by_week(metrics: &[CodeMetric]) -> Vec<CodeMetric> {
    bucketize(metrics, |m| week_start(m.timestamp.date_naive()), |date| {
        format!("week-{}", week_key(&noon_utc(date)))
    })
}

fn bucketize(
    metrics: &[CodeMetric],
    bucket_of: impl Fn(&CodeMetric) -> NaiveDate,
    label: impl Fn(NaiveDate) -> String,
) -> Vec<CodeMetric> {
    let mut buckets: BTreeMap<NaiveDate, CodeMetric> = BTreeMap::new();
    for metric in metrics {
        let date = bucket_of(metric);
        let entry = buckets.entry(date).or_insert_with(|| CodeMetric {
            id: label(date),
            developer_id: metric.developer_id.clone(),
            timestamp: noon_utc(date),
            lines_added: 0,
            lines_removed: 0,
            files_modified: 0,
            commit_hash: None,
            repository: metric.repository.clone(),
        });
        entry.lines_added = entry.lines_added.saturating_add(metric.lines_added);
        entry.lines_removed = entry.lines_removed.saturating_add(metric.lines_removed);
        entry.files_modified = entry.files_modified.saturating_add(metric.files_modified);
    }
    buckets.into_values().collect()
}

/// For each metric, in time order, the mean of every metric within the
/// preceding `window_days` (inclusive on both ends), rounded per field.
pub fn calculate_moving_average(metrics: &[CodeMetric], window_days: i64) -> Vec<CodeMetric> {
    if window_days <= 0 || metrics.is_empty() {
        return Vec::new();
    }

    let mut sorted = metrics.to_vec();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    // a window reaching past the earliest representable date covers everything
    let window = Duration::try_days(window_days);

    sorted
        .iter()
        .map(|current| {
            let from = window
                .and_then(|w| current.timestamp.checked_sub_signed(w))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            let in_window: Vec<&CodeMetric> = sorted
                .iter()
                .filter(|m| m.timestamp >= from && m.timestamp <= current.timestamp)
                .collect();
            let n = in_window.len() as f64;
            let mean = |field: fn(&CodeMetric) -> u64| -> u64 {
                (in_window.iter().map(|m| field(m) as f64).sum::<f64>() / n).round() as u64
            };

            CodeMetric {
                lines_added: mean(|m| m.lines_added),
                lines_removed: mean(|m| m.lines_removed),
                files_modified: mean(|m| m.files_modified),
                ..current.clone()
            }
        })
        .collect()
}

/// Metrics keyed by developer id, each list in source order.
pub fn group_metrics_by_developer(metrics: &[CodeMetric]) -> HashMap<String, Vec<CodeMetric>> {
    let mut groups: HashMap<String, Vec<CodeMetric>> = HashMap::new();
    for metric in metrics {
        groups
            .entry(metric.developer_id.clone())
            .or_default()
            .push(metric.clone());
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn metric(id: &str, dev: &str, ts: DateTime<Utc>, added: u64, removed: u64, files: u64) -> CodeMetric {
        CodeMetric {
            id: id.to_string(),
            developer_id: dev.to_string(),
            timestamp: ts,
            lines_added: added,
            lines_removed: removed,
            files_modified: files,
            commit_hash: Some(format!("{id}-hash")),
            repository: Some("demo".to_string()),
        }
    }

    #[test]
    fn ratio_is_zero_without_files() {
        assert_eq!(calculate_lines_per_file_ratio(&[]), 0.0);
        let m = [metric("a", "d", at(1, 9), 50, 0, 0)];
        assert_eq!(calculate_lines_per_file_ratio(&m), 0.0);
    }

    #[test]
    fn ratio_rounds_to_two_places() {
        let m = [
            metric("a", "d", at(1, 9), 10, 0, 2),
            metric("b", "d", at(2, 9), 0, 0, 1),
        ];
        assert_eq!(calculate_lines_per_file_ratio(&m), 3.33);
    }

    #[test]
    fn summary_totals_and_range() {
        let m = [
            metric("a", "d", at(3, 9), 30, 40, 3),
            metric("b", "d", at(1, 9), 10, 5, 1),
        ];
        let s = calculate_summary(&m);
        assert_eq!(s.total_lines_added, 40);
        assert_eq!(s.total_lines_removed, 45);
        assert_eq!(s.total_files_modified, 4);
        assert_eq!(s.net_lines_changed, -5);
        assert_eq!(s.lines_per_file_ratio, 10.0);
        assert_eq!(s.time_range, DateRange::new(at(1, 9), at(3, 9)));
    }

    #[test]
    fn empty_summary_is_zeroed() {
        let s = calculate_summary(&[]);
        assert_eq!(s.total_lines_added, 0);
        assert_eq!(s.net_lines_changed, 0);
        assert_eq!(s.lines_per_file_ratio, 0.0);
        assert_eq!(s.time_range.start, s.time_range.end);
    }

    #[test]
    fn time_range_filter_is_inclusive() {
        let m = [
            metric("a", "d", at(1, 0), 1, 0, 1),
            metric("b", "d", at(2, 0), 1, 0, 1),
            metric("c", "d", at(3, 0), 1, 0, 1),
        ];
        let got = aggregate_by_time_range(&m, &DateRange::new(at(1, 0), at(2, 0)));
        let ids: Vec<&str> = got.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn daily_buckets_sum_and_sort() {
        let m = [
            metric("a", "d", at(2, 18), 5, 1, 1),
            metric("b", "d", at(1, 9), 10, 2, 2),
            metric("c", "d", at(2, 7), 1, 1, 1),
        ];
        let days = aggregate_by_day(&m);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].timestamp, at(1, 12));
        assert_eq!(days[0].lines_added, 10);
        assert_eq!(days[1].timestamp, at(2, 12));
        assert_eq!(days[1].lines_added, 6);
        assert_eq!(days[1].lines_removed, 2);
        assert_eq!(days[1].files_modified, 2);
        assert_eq!(days[1].repository.as_deref(), Some("demo"));
        assert_eq!(days[1].id, "day-2024-01-02");
    }

    #[test]
    fn weekly_buckets_start_monday() {
        // 2024-01-01 is a Monday; the 7th a Sunday, the 8th the next Monday
        let m = [
            metric("a", "d", at(7, 23), 1, 0, 1),
            metric("b", "d", at(1, 1), 2, 0, 1),
            metric("c", "d", at(8, 0), 4, 0, 1),
        ];
        let weeks = aggregate_by_week(&m);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].timestamp, at(1, 12));
        assert_eq!(weeks[0].lines_added, 3);
        assert_eq!(weeks[0].id, "week-2024-W01");
        assert_eq!(weeks[1].timestamp, at(8, 12));
        assert_eq!(weeks[1].lines_added, 4);
    }

    #[test]
    fn moving_average_windows_back_in_time() {
        let m = [
            metric("c", "d", at(10, 0), 30, 3, 3),
            metric("a", "d", at(1, 0), 10, 1, 1),
            metric("b", "d", at(2, 0), 15, 2, 2),
        ];
        let avg = calculate_moving_average(&m, 2);
        let ids: Vec<&str> = avg.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(avg[0].lines_added, 10);
        assert_eq!(avg[1].lines_added, 13); // (10 + 15) / 2 = 12.5
        assert_eq!(avg[1].lines_removed, 2); // 1.5
        assert_eq!(avg[2].lines_added, 30);
    }

    #[test]
    fn moving_average_rejects_empty_window() {
        let m = [metric("a", "d", at(1, 0), 10, 1, 1)];
        assert!(calculate_moving_average(&m, 0).is_empty());
        assert!(calculate_moving_average(&m, -3).is_empty());
        assert!(calculate_moving_average(&[], 7).is_empty());
    }

    #[test]
    fn moving_average_accepts_huge_window() {
        let m = [
            metric("a", "d", at(1, 0), 10, 0, 1),
            metric("b", "d", at(2, 0), 20, 0, 1),
        ];
        for window in [1_000_000_000, i64::MAX] {
            let avg = calculate_moving_average(&m, window);
            assert_eq!(avg.len(), 2);
            assert_eq!(avg[1].lines_added, 15);
        }
    }

    #[test]
    fn oversized_counts_saturate() {
        let big = 10_000_000_000_000_000_000;
        let m = [
            metric("a", "d", at(1, 0), big, 0, 1),
            metric("b", "d", at(1, 5), big, 0, 1),
        ];
        let s = calculate_summary(&m);
        assert_eq!(s.total_lines_added, u64::MAX);
        assert_eq!(s.net_lines_changed, i64::MAX);
        assert!(s.lines_per_file_ratio > 0.0);

        let one = calculate_summary(&m[..1]);
        assert_eq!(one.net_lines_changed, i64::MAX);
        let removed = calculate_summary(&[metric("c", "d", at(1, 0), 0, big, 1)]);
        assert_eq!(removed.net_lines_changed, i64::MIN);

        assert_eq!(aggregate_by_day(&m)[0].lines_added, u64::MAX);
        assert_eq!(calculate_moving_average(&m, 1)[1].lines_added, big);
    }

    #[test]
    fn groups_keep_source_order() {
        let m = [
            metric("a", "d1", at(3, 0), 1, 0, 1),
            metric("b", "d2", at(1, 0), 1, 0, 1),
            metric("c", "d1", at(2, 0), 1, 0, 1),
        ];
        let groups = group_metrics_by_developer(&m);
        assert_eq!(groups.len(), 2);
        let d1: Vec<&str> = groups["d1"].iter().map(|m| m.id.as_str()).collect();
        assert_eq!(d1, vec!["a", "c"]);
    }
}
