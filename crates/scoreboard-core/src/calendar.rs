//! Calendar math for target proration and reporting windows
//!
//! Instants are `DateTime<Utc>` and calendar-day keys are always derived in UTC.
//! Ordinal helpers are generic over [`Datelike`] and use whatever calendar fields the
//! value carries, so a `DateTime<Local>` is counted in local time.
//!
//! Nothing here reads the system clock; every "relative to now" helper takes the
//! reference instant as an argument.

use crate::error::{EngineError, Result};
use crate::DateRange;
use chrono::{
    DateTime, Datelike, Days, Duration, Locale, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

const MILLIS_PER_DAY: i64 = 86_400_000;

// =============================================================================
// Year arithmetic
// =============================================================================

/// 1-based ordinal day within the value's calendar year.
pub fn day_of_year<D: Datelike>(date: &D) -> u32 {
    date.ordinal()
}

pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub fn days_in_year(year: i32) -> u32 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

/// Days left in the year after `date`. Zero on Dec 31.
pub fn days_remaining<D: Datelike>(date: &D) -> u32 {
    days_in_year(date.year()).saturating_sub(day_of_year(date))
}

/// Share of the yearly target already reached, in percent. Not clamped at 100.
pub fn progress_percent(current: f64, yearly_target: f64) -> f64 {
    if yearly_target <= 0.0 {
        return 0.0;
    }
    (current / yearly_target) * 100.0
}

/// Share of the year elapsed by the end of `date`, in percent.
pub fn expected_progress<D: Datelike>(date: &D) -> f64 {
    year_fraction(date) * 100.0
}

/// Prorated target: the part of `yearly_target` expected to be earned by `date`.
pub fn target_to_date<D: Datelike>(yearly_target: f64, date: &D) -> f64 {
    yearly_target * year_fraction(date)
}

fn year_fraction<D: Datelike>(date: &D) -> f64 {
    f64::from(day_of_year(date)) / f64::from(days_in_year(date.year()))
}

// =============================================================================
// Range builders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    #[default]
    Monday,
}

impl WeekStart {
    /// 0 = Sunday, 1 = Monday.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(WeekStart::Sunday),
            1 => Some(WeekStart::Monday),
            _ => None,
        }
    }
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// 23:59:59.999 of `date`.
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date)
        .checked_add_signed(Duration::milliseconds(MILLIS_PER_DAY - 1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn day_range(first: NaiveDate, last: NaiveDate) -> DateRange {
    DateRange {
        start: start_of_day(first),
        end: end_of_day(last),
    }
}

fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Window from `days_back` days before `reference` through the end of its day.
pub fn date_range(days_back: u32, reference: DateTime<Utc>) -> DateRange {
    let today = reference.date_naive();
    day_range(days_before(today, days_back), today)
}

/// Whole calendar month, `month` being 1-indexed. `None` for an invalid month.
pub fn month_range(year: i32, month: u32) -> Option<DateRange> {
    let first_day = NaiveDate::from_ymd_opt(year, month, 1)?;
    let first_day_next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let last_day = first_day_next_month.and_then(|d| d.pred_opt())?;

    Some(day_range(first_day, last_day))
}

/// Seven-day week containing `date`.
pub fn week_range(date: NaiveDate, week_start: WeekStart) -> DateRange {
    let offset = match week_start {
        WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        WeekStart::Monday => date.weekday().num_days_from_monday(),
    };
    let first = days_before(date, offset);
    let last = first
        .checked_add_days(Days::new(6))
        .unwrap_or(NaiveDate::MAX);

    day_range(first, last)
}

/// The equal-length window that ends right where `date_range(days_back, reference)`
/// begins.
pub fn previous_period(days_back: u32, reference: DateTime<Utc>) -> DateRange {
    let current = date_range(days_back, reference);
    let last = current
        .start
        .date_naive()
        .pred_opt()
        .unwrap_or(NaiveDate::MIN);

    day_range(days_before(last, days_back), last)
}

/// Every calendar day from `start` through `end`, inclusive. Empty when `start > end`.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

// =============================================================================
// Predicates
// =============================================================================

pub fn is_today(date: &DateTime<Utc>, now: &DateTime<Utc>) -> bool {
    is_same_day(date, now)
}

pub fn is_yesterday(date: &DateTime<Utc>, now: &DateTime<Utc>) -> bool {
    now.date_naive().pred_opt() == Some(date.date_naive())
}

pub fn is_past_date(date: &DateTime<Utc>, now: &DateTime<Utc>) -> bool {
    date < now
}

pub fn is_future_date(date: &DateTime<Utc>, now: &DateTime<Utc>) -> bool {
    date > now
}

pub fn is_same_day(a: &DateTime<Utc>, b: &DateTime<Utc>) -> bool {
    a.date_naive() == b.date_naive()
}

/// Inclusive on both ends.
pub fn is_within_range(date: &DateTime<Utc>, range: &DateRange) -> bool {
    range.contains(date)
}

// =============================================================================
// Parsing and day keys
// =============================================================================

/// Strict parser. Accepts RFC 3339, `YYYY-MM-DDTHH:MM:SS[.fff]`,
/// `YYYY-MM-DD HH:MM:SS[.fff]` (both read as UTC) and `YYYY-MM-DD` (midnight UTC).
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    try_parse_date(input).ok_or_else(|| EngineError::InvalidDateFormat(input.to_string()))
}

/// Like [`parse_date`] but yields `None` on bad input.
pub fn try_parse_date(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    parse_date_key(trimmed).map(start_of_day)
}

/// UTC calendar-day key, `YYYY-MM-DD`.
pub fn date_key(instant: &DateTime<Utc>) -> String {
    instant.format(DATE_KEY_FORMAT).to_string()
}

pub fn parse_date_key(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT).ok()
}

// =============================================================================
// Formatting
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    Long,
    Medium,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayLocale {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "en-GB")]
    EnGb,
    #[serde(rename = "de-DE")]
    DeDe,
    #[serde(rename = "fr-FR")]
    FrFr,
    #[serde(rename = "ja-JP")]
    JaJp,
}

impl DisplayLocale {
    pub const ALL: [DisplayLocale; 5] = [
        DisplayLocale::EnUs,
        DisplayLocale::EnGb,
        DisplayLocale::DeDe,
        DisplayLocale::FrFr,
        DisplayLocale::JaJp,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            DisplayLocale::EnUs => "en-US",
            DisplayLocale::EnGb => "en-GB",
            DisplayLocale::DeDe => "de-DE",
            DisplayLocale::FrFr => "fr-FR",
            DisplayLocale::JaJp => "ja-JP",
        }
    }

    /// Case-insensitive; accepts `en_US` as well as `en-US`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let normalized = tag.trim().replace('_', "-");
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.tag().eq_ignore_ascii_case(&normalized))
    }

    fn chrono_locale(&self) -> Locale {
        match self {
            DisplayLocale::EnUs => Locale::en_US,
            DisplayLocale::EnGb => Locale::en_GB,
            DisplayLocale::DeDe => Locale::de_DE,
            DisplayLocale::FrFr => Locale::fr_FR,
            DisplayLocale::JaJp => Locale::ja_JP,
        }
    }

    fn date_pattern(&self, style: DateStyle) -> &'static str {
        match (self, style) {
            (DisplayLocale::EnUs, DateStyle::Long) => "%B %-d, %Y",
            (DisplayLocale::EnUs, DateStyle::Medium) => "%b %-d, %Y",
            (DisplayLocale::EnUs, DateStyle::Short) => "%-m/%-d/%Y",
            (DisplayLocale::EnGb, DateStyle::Long) => "%-d %B %Y",
            (DisplayLocale::EnGb, DateStyle::Medium) => "%-d %b %Y",
            (DisplayLocale::EnGb, DateStyle::Short) => "%d/%m/%Y",
            (DisplayLocale::DeDe, DateStyle::Long) => "%-d. %B %Y",
            (DisplayLocale::DeDe, DateStyle::Medium) => "%-d. %b %Y",
            (DisplayLocale::DeDe, DateStyle::Short) => "%d.%m.%Y",
            (DisplayLocale::FrFr, DateStyle::Long) => "%-d %B %Y",
            (DisplayLocale::FrFr, DateStyle::Medium) => "%-d %b %Y",
            (DisplayLocale::FrFr, DateStyle::Short) => "%d/%m/%Y",
            (DisplayLocale::JaJp, DateStyle::Long | DateStyle::Medium) => "%Y年%-m月%-d日",
            (DisplayLocale::JaJp, DateStyle::Short) => "%Y/%m/%d",
        }
    }

    fn time_pattern(&self) -> &'static str {
        match self {
            DisplayLocale::EnUs => "%-I:%M %p",
            _ => "%H:%M",
        }
    }
}

impl fmt::Display for DisplayLocale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

pub fn format_date<Tz: TimeZone>(
    date: &DateTime<Tz>,
    style: DateStyle,
    locale: DisplayLocale,
) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format_localized(locale.date_pattern(style), locale.chrono_locale())
        .to_string()
}

pub fn format_time<Tz: TimeZone>(date: &DateTime<Tz>, locale: DisplayLocale) -> String
where
    Tz::Offset: fmt::Display,
{
    date.format_localized(locale.time_pattern(), locale.chrono_locale())
        .to_string()
}

/// "just now", "n minutes ago", "n hours ago", "n days ago" (up to a week), then the
/// medium date. Instants after `reference` read as "just now".
pub fn relative_time(
    target: &DateTime<Utc>,
    reference: &DateTime<Utc>,
    locale: DisplayLocale,
) -> String {
    let elapsed = reference.signed_duration_since(*target);

    if elapsed.num_seconds() < 60 {
        return "just now".to_string();
    }

    let minutes = elapsed.num_minutes();
    if minutes < 60 {
        return ago(minutes, "minute");
    }

    let hours = elapsed.num_hours();
    if hours < 24 {
        return ago(hours, "hour");
    }

    let days = elapsed.num_days();
    if days <= 7 {
        return ago(days, "day");
    }

    format_date(target, DateStyle::Medium, locale)
}

fn ago(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
