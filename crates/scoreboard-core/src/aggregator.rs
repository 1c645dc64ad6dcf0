//! Aggregation of behavior logs into counts, rankings, rates and daily trends
//!
//! Uses rayon for parallel map-reduce; every reduction is followed by an explicit
//! sort so output order never depends on thread scheduling.

use crate::calendar;
use crate::{
    round_to, BehaviorCount, BehaviorCountWithPercent, BehaviorLogRecord, DailyTrendPoint,
    DateRange, PerformerEntry,
};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashMap;

/// Count logs per behavior, most frequent first. Ties keep the order in which each
/// behavior first appears in `logs`.
pub fn aggregate_behavior_counts(logs: &[BehaviorLogRecord]) -> Vec<BehaviorCount> {
    tally_by(logs, behavior_key)
        .into_iter()
        .map(|(id, tally)| BehaviorCount {
            behavior_id: id.to_string(),
            behavior_name: tally.label.to_string(),
            count: tally.count,
        })
        .collect()
}

/// [`aggregate_behavior_counts`] plus each behavior's share of all logs.
pub fn aggregate_behavior_counts_with_percent(
    logs: &[BehaviorLogRecord],
) -> Vec<BehaviorCountWithPercent> {
    if logs.is_empty() {
        return Vec::new();
    }

    let total = logs.len() as f64;
    aggregate_behavior_counts(logs)
        .into_iter()
        .map(|c| BehaviorCountWithPercent {
            percent: (c.count as f64 / total) * 100.0,
            behavior_id: c.behavior_id,
            behavior_name: c.behavior_name,
            count: c.count,
        })
        .collect()
}

/// Count logs per user, most active first, ties in first-appearance order.
pub fn aggregate_performer_counts(logs: &[BehaviorLogRecord]) -> Vec<PerformerEntry> {
    tally_by(logs, performer_key)
        .into_iter()
        .map(|(id, tally)| PerformerEntry {
            user_id: id.to_string(),
            user_name: tally.label.to_string(),
            count: tally.count,
        })
        .collect()
}

/// Bucket logs by UTC calendar day, oldest first.
pub fn daily_trend(logs: &[BehaviorLogRecord]) -> Vec<DailyTrendPoint> {
    if logs.is_empty() {
        return Vec::new();
    }

    let daily_map: HashMap<String, u64> = logs
        .par_iter()
        .fold(HashMap::new, |mut acc: HashMap<String, u64>, log| {
            *acc.entry(calendar::date_key(&log.timestamp)).or_default() += 1;
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (date, count) in b {
                *a.entry(date).or_default() += count;
            }
            a
        });

    let mut trend: Vec<DailyTrendPoint> = daily_map
        .into_iter()
        .map(|(date, count)| DailyTrendPoint { date, count })
        .collect();

    trend.sort_by(|a, b| a.date.cmp(&b.date));
    trend
}

/// One point per calendar day in `[start, end]`, zero where `trend` has no entry.
pub fn fill_trend_gaps(
    trend: &[DailyTrendPoint],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailyTrendPoint> {
    let mut counts: HashMap<&str, u64> = HashMap::with_capacity(trend.len());
    for point in trend {
        *counts.entry(point.date.as_str()).or_default() += point.count;
    }

    calendar::days_between(start, end)
        .map(|day| {
            let date = day.format(calendar::DATE_KEY_FORMAT).to_string();
            let count = counts.get(date.as_str()).copied().unwrap_or(0);
            DailyTrendPoint { date, count }
        })
        .collect()
}

pub fn logs_in_range(logs: &[BehaviorLogRecord], range: &DateRange) -> Vec<BehaviorLogRecord> {
    logs.iter()
        .filter(|log| range.contains(&log.timestamp))
        .cloned()
        .collect()
}

pub fn verified_count(logs: &[BehaviorLogRecord]) -> u64 {
    logs.iter().filter(|log| log.verified).count() as u64
}

// =============================================================================
// Rates
// =============================================================================

pub fn verification_rate(verified_count: u64, total_count: u64) -> f64 {
    rate(verified_count, total_count)
}

pub fn attendance_rate(attended_count: u64, total_count: u64) -> f64 {
    rate(attended_count, total_count)
}

pub fn completion_rate(completed_count: u64, total_count: u64) -> f64 {
    rate(completed_count, total_count)
}

fn rate(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64) * 100.0
}

/// Rounded to one decimal.
pub fn average_per_day(total: f64, days: u32) -> f64 {
    if days == 0 {
        return 0.0;
    }
    round_to(total / f64::from(days), 1)
}

pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }

    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

// =============================================================================
// Rankings
// =============================================================================

pub fn top_performers(entries: &[PerformerEntry], limit: usize) -> Vec<PerformerEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

pub fn bottom_performers(entries: &[PerformerEntry], limit: usize) -> Vec<PerformerEntry> {
    let mut ranked = entries.to_vec();
    ranked.sort_by(|a, b| a.count.cmp(&b.count));
    ranked.truncate(limit);
    ranked
}

// =============================================================================
// Internal helpers
// =============================================================================

struct Tally<'a> {
    first_index: usize,
    label: &'a str,
    count: u64,
}

impl<'a> Tally<'a> {
    fn merge(&mut self, other: Tally<'a>) {
        if other.first_index < self.first_index {
            self.first_index = other.first_index;
            self.label = other.label;
        }
        self.count += other.count;
    }
}

fn behavior_key(log: &BehaviorLogRecord) -> (&str, &str) {
    (&log.behavior_id, &log.behavior_name)
}

fn performer_key(log: &BehaviorLogRecord) -> (&str, &str) {
    (&log.user_id, &log.user_name)
}

fn tally_by<'a, F>(logs: &'a [BehaviorLogRecord], key: F) -> Vec<(&'a str, Tally<'a>)>
where
    F: Fn(&'a BehaviorLogRecord) -> (&'a str, &'a str) + Sync + Send,
{
    let tallies: HashMap<&'a str, Tally<'a>> = logs
        .par_iter()
        .enumerate()
        .fold(HashMap::new, |mut acc: HashMap<&'a str, Tally<'a>>, (index, log)| {
            let (id, label) = key(log);
            acc.entry(id)
                .and_modify(|t| t.count += 1)
                .or_insert(Tally {
                    first_index: index,
                    label,
                    count: 1,
                });
            acc
        })
        .reduce(HashMap::new, |mut a, b| {
            for (id, tally) in b {
                match a.get_mut(id) {
                    Some(existing) => existing.merge(tally),
                    None => {
                        a.insert(id, tally);
                    }
                }
            }
            a
        });

    let mut ordered: Vec<(&'a str, Tally<'a>)> = tallies.into_iter().collect();
    ordered.sort_by(|(_, a), (_, b)| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.first_index.cmp(&b.first_index))
    });
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn mock_log(behavior: &str, user: &str, timestamp: &str) -> BehaviorLogRecord {
        BehaviorLogRecord {
            behavior_id: behavior.to_string(),
            behavior_name: format!("Behavior {}", behavior),
            user_id: user.to_string(),
            user_name: format!("User {}", user),
            timestamp: timestamp.parse::<DateTime<Utc>>().unwrap(),
            verified: false,
        }
    }

    fn performer(user: &str, count: u64) -> PerformerEntry {
        PerformerEntry {
            user_id: user.to_string(),
            user_name: format!("User {}", user),
            count,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_aggregate_behavior_counts_empty() {
        assert!(aggregate_behavior_counts(&[]).is_empty());
        assert!(aggregate_behavior_counts_with_percent(&[]).is_empty());
    }

    #[test]
    fn test_aggregate_behavior_counts_sorted() {
        let logs = vec![
            mock_log("b1", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b2", "u1", "2024-01-01T11:00:00Z"),
            mock_log("b1", "u2", "2024-01-02T10:00:00Z"),
            mock_log("b1", "u2", "2024-01-02T12:00:00Z"),
        ];

        let counts = aggregate_behavior_counts(&logs);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].behavior_id, "b1");
        assert_eq!(counts[0].count, 3);
        assert_eq!(counts[0].behavior_name, "Behavior b1");
        assert_eq!(counts[1].behavior_id, "b2");
        assert_eq!(counts[1].count, 1);
    }

    #[test]
    fn test_aggregate_behavior_counts_ties_keep_encounter_order() {
        let logs = vec![
            mock_log("c", "u1", "2024-01-01T10:00:00Z"),
            mock_log("a", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b", "u1", "2024-01-01T10:00:00Z"),
            mock_log("a", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b", "u1", "2024-01-01T10:00:00Z"),
            mock_log("c", "u1", "2024-01-01T10:00:00Z"),
        ];

        let ids: Vec<String> = aggregate_behavior_counts(&logs)
            .into_iter()
            .map(|c| c.behavior_id)
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_aggregate_behavior_counts_large_dataset_deterministic() {
        // Enough records for rayon to split the work across threads.
        let mut logs = Vec::new();
        for i in 0..10_000 {
            let behavior = format!("b{}", i % 7);
            logs.push(mock_log(&behavior, "u1", "2024-01-01T10:00:00Z"));
        }

        let counts = aggregate_behavior_counts(&logs);
        assert_eq!(counts.len(), 7);
        // 10_000 = 7 * 1428 + 4, so b0..b3 have one extra and lead in encounter order.
        let ids: Vec<&str> = counts.iter().map(|c| c.behavior_id.as_str()).collect();
        assert_eq!(ids, vec!["b0", "b1", "b2", "b3", "b4", "b5", "b6"]);
        assert_eq!(counts[0].count, 1429);
        assert_eq!(counts[6].count, 1428);
        assert_eq!(counts.iter().map(|c| c.count).sum::<u64>(), 10_000);
    }

    #[test]
    fn test_aggregate_behavior_counts_with_percent() {
        let logs = vec![
            mock_log("b1", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b1", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b1", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b2", "u1", "2024-01-01T10:00:00Z"),
        ];

        let counts = aggregate_behavior_counts_with_percent(&logs);
        assert_eq!(counts[0].percent, 75.0);
        assert_eq!(counts[1].percent, 25.0);
        let total: f64 = counts.iter().map(|c| c.percent).sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_performer_counts() {
        let logs = vec![
            mock_log("b1", "u2", "2024-01-01T10:00:00Z"),
            mock_log("b1", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b2", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b1", "u3", "2024-01-01T10:00:00Z"),
        ];

        let performers = aggregate_performer_counts(&logs);
        assert_eq!(performers.len(), 3);
        assert_eq!(performers[0], performer("u1", 2));
        assert_eq!(performers[1].user_id, "u2");
        assert_eq!(performers[2].user_id, "u3");
    }

    #[test]
    fn test_daily_trend() {
        let logs = vec![
            mock_log("b1", "u1", "2024-01-03T10:00:00Z"),
            mock_log("b1", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b1", "u1", "2024-01-01T23:59:59Z"),
            mock_log("b1", "u1", "2024-01-02T00:00:00Z"),
        ];

        let trend = daily_trend(&logs);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].date, "2024-01-01");
        assert_eq!(trend[0].count, 2);
        assert_eq!(trend[1].date, "2024-01-02");
        assert_eq!(trend[2].date, "2024-01-03");
        assert!(daily_trend(&[]).is_empty());
    }

    #[test]
    fn test_fill_trend_gaps() {
        let trend = vec![DailyTrendPoint {
            date: "2024-01-02".to_string(),
            count: 5,
        }];

        let filled = fill_trend_gaps(&trend, ymd(2024, 1, 1), ymd(2024, 1, 3));
        assert_eq!(filled.len(), 3);
        assert_eq!(filled[0].date, "2024-01-01");
        assert_eq!(filled[0].count, 0);
        assert_eq!(filled[1].count, 5);
        assert_eq!(filled[2].date, "2024-01-03");
        assert_eq!(filled[2].count, 0);
    }

    #[test]
    fn test_fill_trend_gaps_ignores_points_outside_window() {
        let trend = vec![
            DailyTrendPoint {
                date: "2023-12-31".to_string(),
                count: 9,
            },
            DailyTrendPoint {
                date: "2024-02-29".to_string(),
                count: 2,
            },
        ];

        let filled = fill_trend_gaps(&trend, ymd(2024, 2, 28), ymd(2024, 3, 1));
        assert_eq!(filled.len(), 3);
        assert_eq!(filled[1].date, "2024-02-29");
        assert_eq!(filled[1].count, 2);
        assert_eq!(filled.iter().map(|p| p.count).sum::<u64>(), 2);

        assert!(fill_trend_gaps(&trend, ymd(2024, 3, 2), ymd(2024, 3, 1)).is_empty());
    }

    #[test]
    fn test_logs_in_range_and_verified_count() {
        let mut logs = vec![
            mock_log("b1", "u1", "2024-01-01T10:00:00Z"),
            mock_log("b1", "u1", "2024-01-05T10:00:00Z"),
            mock_log("b1", "u1", "2024-01-09T10:00:00Z"),
        ];
        logs[1].verified = true;
        logs[2].verified = true;

        let range = DateRange {
            start: calendar::start_of_day(ymd(2024, 1, 2)),
            end: calendar::end_of_day(ymd(2024, 1, 9)),
        };
        let in_range = logs_in_range(&logs, &range);
        assert_eq!(in_range.len(), 2);
        assert_eq!(verified_count(&logs), 2);
        assert!((verification_rate(verified_count(&logs), logs.len() as u64) - 66.666_666_666)
            .abs()
            < 1e-6);
    }

    #[test]
    fn test_rates() {
        assert_eq!(verification_rate(3, 4), 75.0);
        assert_eq!(attendance_rate(9, 10), 90.0);
        assert_eq!(completion_rate(0, 5), 0.0);
        assert_eq!(verification_rate(5, 0), 0.0);
        assert_eq!(attendance_rate(0, 0), 0.0);
        assert_eq!(completion_rate(7, 0), 0.0);
    }

    #[test]
    fn test_average_per_day() {
        assert_eq!(average_per_day(10.0, 3), 3.3);
        assert_eq!(average_per_day(20.0, 3), 6.7);
        assert_eq!(average_per_day(10.0, 0), 0.0);
        assert_eq!(average_per_day(0.0, 7), 0.0);
    }

    #[test]
    fn test_moving_average() {
        assert_eq!(
            moving_average(&[10.0, 20.0, 30.0, 40.0, 50.0], 3),
            vec![20.0, 30.0, 40.0]
        );
        assert_eq!(moving_average(&[1.0, 2.0], 3), Vec::<f64>::new());
        assert_eq!(moving_average(&[1.0, 2.0, 3.0], 3), vec![2.0]);
        assert_eq!(moving_average(&[4.0, 8.0], 1), vec![4.0, 8.0]);
        assert!(moving_average(&[1.0, 2.0], 0).is_empty());
        assert!(moving_average(&[], 1).is_empty());
    }

    #[test]
    fn test_top_and_bottom_performers() {
        let entries = vec![
            performer("a", 5),
            performer("b", 12),
            performer("c", 1),
            performer("d", 7),
        ];

        let top = top_performers(&entries, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, "b");
        assert_eq!(top[1].user_id, "d");

        let bottom = bottom_performers(&entries, 2);
        assert_eq!(bottom[0].user_id, "c");
        assert_eq!(bottom[1].user_id, "a");

        assert_eq!(top_performers(&entries, 10).len(), 4);
        assert!(bottom_performers(&entries, 0).is_empty());
        assert!(top_performers(&[], 3).is_empty());
    }

    #[test]
    fn test_performers_ties_are_stable() {
        let entries = vec![performer("a", 3), performer("b", 3), performer("c", 3)];
        let top: Vec<String> = top_performers(&entries, 3)
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(top, vec!["a", "b", "c"]);
    }
}
