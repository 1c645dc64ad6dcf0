//! Target proration and win/lose classification
//!
//! Degenerate goals (zero or negative targets) classify as neutral instead of
//! failing, so a half-configured organization still gets a status.

use crate::calendar;
use crate::{round_to, GameStateResult, GameStatus};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

pub const WINNING_RATIO: f64 = 1.05;
pub const LOSING_RATIO: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateInput {
    pub ytd_revenue: f64,
    pub target_to_date: f64,
    pub yearly_target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameThresholds {
    pub winning_ratio: f64,
    pub losing_ratio: f64,
}

impl Default for GameThresholds {
    fn default() -> Self {
        Self {
            winning_ratio: WINNING_RATIO,
            losing_ratio: LOSING_RATIO,
        }
    }
}

impl GameThresholds {
    /// Thresholds only make sense with a gap between them.
    pub fn is_valid(&self) -> bool {
        self.winning_ratio.is_finite()
            && self.losing_ratio.is_finite()
            && self.losing_ratio < self.winning_ratio
    }
}

/// Classify year-to-date revenue with the fixed 1.05 / 0.95 thresholds.
pub fn determine_game_state(input: &GameStateInput) -> GameStatus {
    determine_game_state_custom(input, WINNING_RATIO, LOSING_RATIO)
}

/// Same rules as [`determine_game_state`] with caller-chosen thresholds.
pub fn determine_game_state_custom(
    input: &GameStateInput,
    winning_ratio: f64,
    losing_ratio: f64,
) -> GameStatus {
    if input.target_to_date <= 0.0 || input.yearly_target <= 0.0 {
        return GameStatus::Neutral;
    }

    // Hitting the whole year's goal wins regardless of pace.
    if input.ytd_revenue >= input.yearly_target {
        return GameStatus::Celebrating;
    }

    let progress = input.ytd_revenue / input.target_to_date;
    if progress >= winning_ratio {
        GameStatus::Winning
    } else if progress <= losing_ratio {
        GameStatus::Losing
    } else {
        GameStatus::Neutral
    }
}

/// Full scoreboard snapshot for `reference_date` using the default thresholds.
pub fn build_game_state<D: Datelike>(
    ytd_revenue: f64,
    yearly_target: f64,
    reference_date: &D,
) -> GameStateResult {
    build_game_state_with(
        ytd_revenue,
        yearly_target,
        reference_date,
        &GameThresholds::default(),
    )
}

pub fn build_game_state_with<D: Datelike>(
    ytd_revenue: f64,
    yearly_target: f64,
    reference_date: &D,
    thresholds: &GameThresholds,
) -> GameStateResult {
    let target_to_date = calendar::target_to_date(yearly_target, reference_date);
    let input = GameStateInput {
        ytd_revenue,
        target_to_date,
        yearly_target,
    };
    let status =
        determine_game_state_custom(&input, thresholds.winning_ratio, thresholds.losing_ratio);

    let result = GameStateResult {
        status,
        current_score: ytd_revenue.round(),
        target_score: target_to_date.round(),
        percent_complete: round_to(calendar::progress_percent(ytd_revenue, yearly_target), 2),
        days_remaining: calendar::days_remaining(reference_date),
    };

    tracing::debug!(
        status = %result.status,
        current = result.current_score,
        target = result.target_score,
        percent = result.percent_complete,
        "computed game state"
    );

    result
}

/// Percent change from `previous` to `current`. A rise from zero counts as 100%.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    ((current - previous) / previous.abs()) * 100.0
}

/// Percent change of a lag measure (average check, rating) against its baseline.
/// `None` when no usable baseline was configured.
pub fn lag_measure_change(current: f64, baseline: Option<f64>) -> Option<f64> {
    match baseline {
        Some(b) if b != 0.0 && b.is_finite() => Some(round_to(percent_change(current, b), 2)),
        _ => None,
    }
}
