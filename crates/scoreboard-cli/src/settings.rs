use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use scoreboard_core::calendar::{DisplayLocale, WeekStart};
use scoreboard_core::game_state::{LOSING_RATIO, WINNING_RATIO};
use scoreboard_core::GameThresholds;

const DEFAULT_TREND_DAYS: u32 = 30;
const MIN_TREND_DAYS: u32 = 1;
const MAX_TREND_DAYS: u32 = 366;

const DEFAULT_LEADERBOARD_LIMIT: usize = 5;
const MAX_LEADERBOARD_LIMIT: usize = 100;

const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 7;
const MAX_MOVING_AVERAGE_WINDOW: usize = 90;

pub const SETTINGS_PATH_ENV: &str = "SCOREBOARD_SETTINGS";
pub const TREND_DAYS_ENV: &str = "SCOREBOARD_TREND_DAYS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub winning_ratio: f64,
    pub losing_ratio: f64,
    pub week_start: WeekStart,
    pub locale: DisplayLocale,
    pub trend_days: u32,
    pub leaderboard_limit: usize,
    pub moving_average_window: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            winning_ratio: WINNING_RATIO,
            losing_ratio: LOSING_RATIO,
            week_start: WeekStart::Monday,
            locale: DisplayLocale::EnUs,
            trend_days: DEFAULT_TREND_DAYS,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
        }
    }
}

impl Settings {
    /// `SCOREBOARD_SETTINGS` wins over `<config_dir>/scoreboard/settings.json`.
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(SETTINGS_PATH_ENV) {
            if !path.trim().is_empty() {
                return Ok(PathBuf::from(path));
            }
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("scoreboard");

        Ok(config_dir.join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or unreadable files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "ignoring corrupt settings file"
                );
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Configured ratios, or the defaults when they overlap or are not finite.
    pub fn thresholds(&self) -> GameThresholds {
        let configured = GameThresholds {
            winning_ratio: self.winning_ratio,
            losing_ratio: self.losing_ratio,
        };

        if configured.is_valid() {
            configured
        } else {
            tracing::warn!(
                winning = self.winning_ratio,
                losing = self.losing_ratio,
                "invalid game thresholds, using defaults"
            );
            GameThresholds::default()
        }
    }

    /// Priority: SCOREBOARD_TREND_DAYS env var > settings.json > default (30)
    pub fn trend_days(&self) -> u32 {
        let days = match std::env::var(TREND_DAYS_ENV) {
            Ok(env_val) => env_val.trim().parse::<u32>().unwrap_or(self.trend_days),
            Err(_) => self.trend_days,
        };

        days.clamp(MIN_TREND_DAYS, MAX_TREND_DAYS)
    }

    pub fn leaderboard_limit(&self) -> usize {
        self.leaderboard_limit.clamp(1, MAX_LEADERBOARD_LIMIT)
    }

    pub fn moving_average_window(&self) -> usize {
        self.moving_average_window
            .clamp(1, MAX_MOVING_AVERAGE_WINDOW)
    }
}
