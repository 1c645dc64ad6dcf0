//! Winning and activity streaks
//!
//! Result-based streaks read an already ordered series (oldest first). Activity
//! streaks work on sets of `YYYY-MM-DD` day keys and walk real calendar days, so
//! month and leap-day boundaries need no special handling.

use crate::calendar;
use crate::{BehaviorLogRecord, DailyResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
}

/// Consecutive wins ending at the most recent result.
pub fn winning_streak(results: &[DailyResult]) -> u32 {
    results
        .iter()
        .rev()
        .take_while(|r| r.is_win())
        .count() as u32
}

/// Longest run of consecutive wins anywhere in the series.
pub fn longest_streak(results: &[DailyResult]) -> u32 {
    let mut longest = 0u32;
    let mut streak = 0u32;

    for result in results {
        if result.is_win() {
            streak += 1;
            longest = longest.max(streak);
        } else {
            streak = 0;
        }
    }

    longest
}

pub fn summarize_streaks(results: &[DailyResult]) -> StreakSummary {
    StreakSummary {
        current: winning_streak(results),
        longest: longest_streak(results),
    }
}

/// Consecutive active days walking backward from `anchor`, which counts itself.
pub fn activity_streak(date_keys: &HashSet<String>, anchor: &str) -> u32 {
    let Some(mut day) = calendar::parse_date_key(anchor) else {
        tracing::warn!(anchor, "activity streak anchor is not a valid day key");
        return 0;
    };

    let mut streak = 0u32;
    while date_keys.contains(&day.format(calendar::DATE_KEY_FORMAT).to_string()) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }

    streak
}

/// Longest run of consecutive calendar days present in the set.
pub fn longest_activity_streak(date_keys: &HashSet<String>) -> u32 {
    let days = parse_day_keys(date_keys);

    let mut longest = 0u32;
    let mut streak = 0u32;
    let mut previous: Option<NaiveDate> = None;

    for day in days {
        streak = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => streak + 1,
            _ => 1,
        };
        longest = longest.max(streak);
        previous = Some(day);
    }

    longest
}

pub fn summarize_activity(date_keys: &HashSet<String>, anchor: &str) -> StreakSummary {
    StreakSummary {
        current: activity_streak(date_keys, anchor),
        longest: longest_activity_streak(date_keys),
    }
}

/// Distinct UTC day keys on which anything was logged.
pub fn activity_date_keys(logs: &[BehaviorLogRecord]) -> HashSet<String> {
    logs.iter()
        .map(|log| calendar::date_key(&log.timestamp))
        .collect()
}

fn parse_day_keys(date_keys: &HashSet<String>) -> BTreeSet<NaiveDate> {
    date_keys
        .iter()
        .filter_map(|key| {
            let parsed = calendar::parse_date_key(key);
            if parsed.is_none() {
                tracing::warn!(key = %key, "skipping invalid activity day key");
            }
            parsed
        })
        .collect()
}
