#![deny(clippy::all)]

mod aggregator;
pub mod calendar;
pub mod clock;
mod error;
pub mod game_state;
mod stats;
pub mod streak;

pub use aggregator::*;
pub use error::{EngineError, Result};
pub use game_state::{
    build_game_state, build_game_state_with, determine_game_state, determine_game_state_custom,
    GameStateInput, GameThresholds,
};
pub use stats::*;
pub use streak::{
    activity_streak, longest_activity_streak, longest_streak, summarize_activity,
    summarize_streaks, winning_streak, StreakSummary,
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Inclusive span between two instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant <= self.end
    }

    /// Calendar days covered, counting both ends.
    pub fn day_count(&self) -> i64 {
        (self.end.date_naive() - self.start.date_naive()).num_days() + 1
    }
}

/// One day's actual vs. expected revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyResult {
    pub date: NaiveDate,
    pub revenue: f64,
    pub target: f64,
}

impl DailyResult {
    /// Meeting the target exactly counts as a win.
    pub fn is_win(&self) -> bool {
        self.revenue >= self.target
    }
}

/// Owner-supplied yearly goal plus the baselines lag measures are compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Benchmark {
    pub yearly_target: f64,
    pub days_open: u32,
    #[serde(default)]
    pub baseline_avg_check: Option<f64>,
    #[serde(default)]
    pub baseline_rating: Option<f64>,
}

impl Benchmark {
    /// Revenue expected on a single trading day. Zero when `days_open` is zero.
    pub fn daily_target(&self) -> f64 {
        if self.days_open == 0 {
            return 0.0;
        }
        self.yearly_target / f64::from(self.days_open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Neutral,
    Winning,
    Losing,
    Celebrating,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Neutral => "neutral",
            GameStatus::Winning => "winning",
            GameStatus::Losing => "losing",
            GameStatus::Celebrating => "celebrating",
        }
    }
}

impl std::fmt::Display for GameStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResult {
    pub status: GameStatus,
    pub current_score: f64,
    pub target_score: f64,
    pub percent_complete: f64,
    pub days_remaining: u32,
}

/// A single logged staff action, as handed over by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorLogRecord {
    pub behavior_id: String,
    pub behavior_name: String,
    pub user_id: String,
    pub user_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTrendPoint {
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformerEntry {
    pub user_id: String,
    pub user_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorCount {
    pub behavior_id: String,
    pub behavior_name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorCountWithPercent {
    pub behavior_id: String,
    pub behavior_name: String,
    pub count: u64,
    pub percent: f64,
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Turn raw daily revenue into results scored against the benchmark's daily target.
pub fn daily_results_from_revenue(
    revenue_by_day: &[(NaiveDate, f64)],
    benchmark: &Benchmark,
) -> Vec<DailyResult> {
    let target = benchmark.daily_target();
    let mut results: Vec<DailyResult> = revenue_by_day
        .iter()
        .map(|(date, revenue)| DailyResult {
            date: *date,
            revenue: revenue.max(0.0),
            target,
        })
        .collect();

    results.sort_by(|a, b| a.date.cmp(&b.date));
    results
}
