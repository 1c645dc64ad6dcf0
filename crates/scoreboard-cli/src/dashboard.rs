//! Dashboard snapshot assembly
//!
//! Ties the engine modules together the way a dashboard page would: one clock
//! reading, one settings value, everything else derived from the input file.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use scoreboard_core::calendar::{self, DateStyle};
use scoreboard_core::clock::Clock;
use scoreboard_core::game_state::{lag_measure_change, percent_change};
use scoreboard_core::streak::activity_date_keys;
use scoreboard_core::{
    aggregate_behavior_counts_with_percent, aggregate_performer_counts, attendance_rate,
    average_per_day, bottom_performers, build_game_state_with, completion_rate,
    daily_results_from_revenue, daily_trend, fill_trend_gaps, logs_in_range, moving_average,
    round_to, summarize_activity, summarize_streaks, top_performers, verification_rate,
    verified_count, Benchmark, BehaviorCountWithPercent, BehaviorLogRecord, DailyResult,
    DailyTrendPoint, GameStateResult, PerformerEntry, StreakSummary,
};

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub count: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueDay {
    pub date: NaiveDate,
    pub revenue: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardInput {
    pub benchmark: Benchmark,
    pub ytd_revenue: f64,
    #[serde(default)]
    pub daily_results: Vec<DailyResult>,
    /// Raw revenue per day, scored against the benchmark when `dailyResults` is empty.
    #[serde(default)]
    pub daily_revenue: Vec<RevenueDay>,
    #[serde(default)]
    pub behavior_logs: Vec<BehaviorLogRecord>,
    #[serde(default)]
    pub attendance: Option<Tally>,
    #[serde(default)]
    pub completion: Option<Tally>,
    #[serde(default)]
    pub average_check: Option<f64>,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    pub days: u32,
    pub current_count: u64,
    pub previous_count: u64,
    pub change_percent: f64,
    pub average_per_day: f64,
    pub this_week_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LagMeasures {
    pub average_check: Option<f64>,
    pub average_check_change: Option<f64>,
    pub rating: Option<f64>,
    pub rating_change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub reference_date: String,
    pub display_date: String,
    pub game_state: GameStateResult,
    pub expected_progress: f64,
    pub winning_streak: StreakSummary,
    pub activity_streak: StreakSummary,
    pub behavior_counts: Vec<BehaviorCountWithPercent>,
    pub top_performers: Vec<PerformerEntry>,
    pub bottom_performers: Vec<PerformerEntry>,
    pub daily_trend: Vec<DailyTrendPoint>,
    pub moving_average: Vec<f64>,
    pub period: PeriodComparison,
    pub verification_rate: f64,
    pub attendance_rate: Option<f64>,
    pub completion_rate: Option<f64>,
    pub lag_measures: LagMeasures,
    pub last_activity: Option<String>,
}

/// Trend window for `days`: gap-filled counts from the window start through today.
pub fn trend_window(
    logs: &[BehaviorLogRecord],
    days: u32,
    now: DateTime<Utc>,
) -> (Vec<BehaviorLogRecord>, Vec<DailyTrendPoint>) {
    let range = calendar::date_range(days, now);
    let in_range = logs_in_range(logs, &range);
    let trend = fill_trend_gaps(
        &daily_trend(&in_range),
        range.start.date_naive(),
        range.end.date_naive(),
    );
    (in_range, trend)
}

pub fn trend_moving_average(trend: &[DailyTrendPoint], window: usize) -> Vec<f64> {
    let counts: Vec<f64> = trend.iter().map(|p| p.count as f64).collect();
    moving_average(&counts, window)
}

pub fn build_snapshot(
    input: &DashboardInput,
    settings: &Settings,
    clock: &dyn Clock,
) -> DashboardSnapshot {
    let now = clock.now();
    let today = clock.today();
    let days = settings.trend_days();
    let limit = settings.leaderboard_limit();

    let game_state = build_game_state_with(
        input.ytd_revenue,
        input.benchmark.yearly_target,
        &today,
        &settings.thresholds(),
    );

    let results = if input.daily_results.is_empty() {
        let revenue: Vec<(NaiveDate, f64)> = input
            .daily_revenue
            .iter()
            .map(|d| (d.date, d.revenue))
            .collect();
        daily_results_from_revenue(&revenue, &input.benchmark)
    } else {
        input.daily_results.clone()
    };

    let logs = &input.behavior_logs;
    let (current_logs, trend) = trend_window(logs, days, now);
    let previous_logs = logs_in_range(logs, &calendar::previous_period(days, now));
    let this_week = logs_in_range(logs, &calendar::week_range(today, settings.week_start));

    let performers = aggregate_performer_counts(&current_logs);
    let current_count = current_logs.len() as u64;
    let previous_count = previous_logs.len() as u64;

    let last_activity = logs
        .iter()
        .map(|log| log.timestamp)
        .filter(|ts| !calendar::is_future_date(ts, &now))
        .max()
        .map(|ts| calendar::relative_time(&ts, &now, settings.locale));

    tracing::debug!(
        logs = logs.len(),
        in_window = current_count,
        days,
        "assembled dashboard"
    );

    DashboardSnapshot {
        reference_date: today.format(calendar::DATE_KEY_FORMAT).to_string(),
        display_date: calendar::format_date(&now, DateStyle::Long, settings.locale),
        expected_progress: round_to(calendar::expected_progress(&today), 2),
        game_state,
        winning_streak: summarize_streaks(&results),
        activity_streak: summarize_activity(
            &activity_date_keys(logs),
            &today.format(calendar::DATE_KEY_FORMAT).to_string(),
        ),
        behavior_counts: aggregate_behavior_counts_with_percent(&current_logs),
        top_performers: top_performers(&performers, limit),
        bottom_performers: bottom_performers(&performers, limit),
        moving_average: trend_moving_average(&trend, settings.moving_average_window()),
        daily_trend: trend,
        period: PeriodComparison {
            days,
            current_count,
            previous_count,
            change_percent: percent_change(current_count as f64, previous_count as f64),
            average_per_day: average_per_day(current_count as f64, days + 1),
            this_week_count: this_week.len() as u64,
        },
        verification_rate: verification_rate(verified_count(&current_logs), current_count),
        attendance_rate: input.attendance.map(|t| attendance_rate(t.count, t.total)),
        completion_rate: input.completion.map(|t| completion_rate(t.count, t.total)),
        lag_measures: LagMeasures {
            average_check: input.average_check,
            average_check_change: input
                .average_check
                .and_then(|v| lag_measure_change(v, input.benchmark.baseline_avg_check)),
            rating: input.rating,
            rating_change: input
                .rating
                .and_then(|v| lag_measure_change(v, input.benchmark.baseline_rating)),
        },
        last_activity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreboard_core::clock::FixedClock;
    use scoreboard_core::GameStatus;

    fn log(user: &str, behavior: &str, ts: &str, verified: bool) -> BehaviorLogRecord {
        BehaviorLogRecord {
            behavior_id: behavior.to_lowercase(),
            behavior_name: behavior.to_string(),
            user_id: user.to_lowercase(),
            user_name: user.to_string(),
            timestamp: ts.parse().unwrap(),
            verified,
        }
    }

    fn input() -> DashboardInput {
        DashboardInput {
            benchmark: Benchmark {
                yearly_target: 1_000_000.0,
                days_open: 360,
                baseline_avg_check: Some(40.0),
                baseline_rating: None,
            },
            ytd_revenue: 600_000.0,
            daily_results: Vec::new(),
            daily_revenue: vec![
                RevenueDay {
                    date: NaiveDate::from_ymd_opt(2024, 6, 29).unwrap(),
                    revenue: 2000.0,
                },
                RevenueDay {
                    date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
                    revenue: 3000.0,
                },
                RevenueDay {
                    date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
                    revenue: 2800.0,
                },
            ],
            behavior_logs: vec![
                log("Sam", "Upsell", "2024-07-01T10:00:00Z", true),
                log("Sam", "Upsell", "2024-06-30T11:00:00Z", false),
                log("Alex", "Dessert", "2024-06-30T12:00:00Z", true),
                log("Alex", "Upsell", "2024-05-01T12:00:00Z", true),
            ],
            attendance: Some(Tally { count: 9, total: 10 }),
            completion: None,
            average_check: Some(46.0),
            rating: Some(4.6),
        }
    }

    fn settings() -> Settings {
        Settings {
            trend_days: 6,
            moving_average_window: 3,
            ..Settings::default()
        }
    }

    #[test]
    fn test_snapshot_game_state_and_streaks() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        let snapshot = build_snapshot(&input(), &settings(), &clock);

        assert_eq!(snapshot.reference_date, "2024-07-01");
        assert_eq!(snapshot.display_date, "July 1, 2024");
        assert_eq!(snapshot.game_state.status, GameStatus::Winning);
        assert_eq!(snapshot.expected_progress, 50.0);
        // Daily target is 1_000_000 / 360 = 2777.78; 2000 loses, the last two win.
        assert_eq!(snapshot.winning_streak, StreakSummary { current: 2, longest: 2 });
        assert_eq!(snapshot.activity_streak, StreakSummary { current: 2, longest: 2 });
    }

    #[test]
    fn test_snapshot_expected_progress_is_a_percent() {
        // 2023-02-15 is day 46 of 365: 12.602...%
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2023, 2, 15).unwrap());
        let snapshot = build_snapshot(&input(), &Settings::default(), &clock);
        assert_eq!(snapshot.expected_progress, 12.6);

        let year_end = FixedClock::on(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        let snapshot = build_snapshot(&input(), &Settings::default(), &year_end);
        assert_eq!(snapshot.expected_progress, 100.0);
    }

    #[test]
    fn test_snapshot_window_and_rates() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        let snapshot = build_snapshot(&input(), &settings(), &clock);

        assert_eq!(snapshot.period.current_count, 3);
        assert_eq!(snapshot.period.previous_count, 0);
        assert_eq!(snapshot.period.change_percent, 100.0);
        assert_eq!(snapshot.daily_trend.len(), 7);
        assert_eq!(snapshot.daily_trend[6].count, 1);
        assert_eq!(snapshot.moving_average.len(), 5);
        assert_eq!(snapshot.behavior_counts[0].behavior_name, "Upsell");
        assert_eq!(snapshot.behavior_counts[0].count, 2);
        assert_eq!(snapshot.top_performers[0].user_name, "Sam");
        assert_eq!(snapshot.bottom_performers[0].user_name, "Alex");
        assert!((snapshot.verification_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(snapshot.attendance_rate, Some(90.0));
        assert_eq!(snapshot.completion_rate, None);
        assert_eq!(snapshot.last_activity.as_deref(), Some("2 hours ago"));
    }

    #[test]
    fn test_snapshot_lag_measures() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        let snapshot = build_snapshot(&input(), &settings(), &clock);

        assert_eq!(snapshot.lag_measures.average_check_change, Some(15.0));
        assert_eq!(snapshot.lag_measures.rating, Some(4.6));
        assert_eq!(snapshot.lag_measures.rating_change, None);
    }

    #[test]
    fn test_snapshot_week_count_follows_week_start() {
        // 2024-06-30 is a Sunday.
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());

        let monday = build_snapshot(&input(), &settings(), &clock);
        assert_eq!(monday.period.this_week_count, 1);

        let sunday_settings = Settings {
            week_start: scoreboard_core::calendar::WeekStart::Sunday,
            ..settings()
        };
        let sunday = build_snapshot(&input(), &sunday_settings, &clock);
        assert_eq!(sunday.period.this_week_count, 3);
    }

    #[test]
    fn test_explicit_daily_results_take_priority() {
        let mut input = input();
        input.daily_results = vec![DailyResult {
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            revenue: 10.0,
            target: 100.0,
        }];
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        let snapshot = build_snapshot(&input, &settings(), &clock);
        assert_eq!(snapshot.winning_streak, StreakSummary::default());
    }
}
