mod dashboard;
mod settings;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use scoreboard_core::calendar;
use scoreboard_core::clock::{Clock, FixedClock, SystemClock};
use scoreboard_core::{
    aggregate_behavior_counts_with_percent, aggregate_performer_counts, bottom_performers,
    build_game_state_with, describe, percentile_value, round_to, summarize_activity,
    summarize_streaks, top_performers, verification_rate, verified_count, BehaviorLogRecord,
    DailyResult, GameStatus,
};

use settings::Settings;

#[derive(Parser)]
#[command(name = "scoreboard")]
#[command(author, version, about = "Performance gamification and analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable debug logging on stderr")]
    debug: bool,

    #[arg(long, global = true, help = "Pin today's date (YYYY-MM-DD)")]
    date: Option<String>,

    #[arg(long, global = true, help = "Output as JSON")]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Classify year-to-date revenue against the prorated target")]
    Status {
        #[arg(long, help = "Revenue booked so far this year")]
        ytd: f64,
        #[arg(long, help = "Yearly revenue target")]
        target: f64,
    },
    #[command(about = "Show current and longest winning streaks")]
    Streaks {
        #[arg(long, help = "JSON file with daily results")]
        input: PathBuf,
    },
    #[command(about = "Show behavior counts, leaderboards and trends")]
    Behaviors {
        #[arg(long, help = "JSON file with behavior logs")]
        input: PathBuf,
        #[arg(long, help = "Trend window in days")]
        days: Option<u32>,
        #[arg(long, help = "Leaderboard size")]
        limit: Option<usize>,
    },
    #[command(about = "Describe a series of values", allow_negative_numbers = true)]
    Stats {
        #[arg(required = true, num_args = 1..)]
        values: Vec<f64>,
        #[arg(short, long = "percentile", help = "Percentile to report (0-100), repeatable")]
        percentiles: Vec<f64>,
    },
    #[command(about = "Assemble the full dashboard snapshot")]
    Dashboard {
        #[arg(long, help = "JSON file with benchmark, revenue and behavior logs")]
        input: PathBuf,
    },
    #[command(about = "Show or initialize settings")]
    Config {
        #[arg(long, help = "Write default settings if no settings file exists")]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let clock = build_clock(cli.date.as_deref())?;
    let settings = Settings::load();

    match cli.command {
        Commands::Status { ytd, target } => {
            run_status_command(ytd, target, &settings, clock.as_ref(), cli.json)
        }
        Commands::Streaks { input } => run_streaks_command(&input, cli.json),
        Commands::Behaviors { input, days, limit } => {
            run_behaviors_command(&input, days, limit, &settings, clock.as_ref(), cli.json)
        }
        Commands::Stats {
            values,
            percentiles,
        } => run_stats_command(&values, &percentiles, cli.json),
        Commands::Dashboard { input } => {
            run_dashboard_command(&input, &settings, clock.as_ref(), cli.json)
        }
        Commands::Config { init } => run_config_command(&settings, init, cli.json),
    }
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_clock(date: Option<&str>) -> Result<Box<dyn Clock>> {
    let Some(date) = date else {
        return Ok(Box::new(SystemClock));
    };

    if let Some(day) = calendar::parse_date_key(date.trim()) {
        return Ok(Box::new(FixedClock::on(day)));
    }

    let instant = calendar::parse_date(date).context("--date expects YYYY-MM-DD")?;
    Ok(Box::new(FixedClock(instant)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn run_status_command(
    ytd: f64,
    target: f64,
    settings: &Settings,
    clock: &dyn Clock,
    json: bool,
) -> Result<()> {
    let today = clock.today();
    let state = build_game_state_with(ytd, target, &today, &settings.thresholds());
    let expected_progress = round_to(calendar::expected_progress(&today), 2);

    if json {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct StatusJson {
            date: String,
            #[serde(flatten)]
            state: scoreboard_core::GameStateResult,
            expected_progress: f64,
        }

        let output = StatusJson {
            date: today.format(calendar::DATE_KEY_FORMAT).to_string(),
            state,
            expected_progress,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        use comfy_table::{ContentArrangement, Table};

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Metric", "Value"]);
        table.add_row(vec!["Current".to_string(), format_currency(state.current_score)]);
        table.add_row(vec!["Target to date".to_string(), format_currency(state.target_score)]);
        table.add_row(vec!["Complete".to_string(), format!("{:.2}%", state.percent_complete)]);
        table.add_row(vec!["Expected".to_string(), format!("{:.2}%", expected_progress)]);
        table.add_row(vec!["Days remaining".to_string(), state.days_remaining.to_string()]);

        println!("\n  Status: {}\n", paint_status(state.status));
        println!("{table}");
    }

    Ok(())
}

fn run_streaks_command(input: &Path, json: bool) -> Result<()> {
    let mut results: Vec<DailyResult> = read_json(input)?;
    results.sort_by(|a, b| a.date.cmp(&b.date));
    let summary = summarize_streaks(&results);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        use colored::Colorize;

        let wins = results.iter().filter(|r| r.is_win()).count();
        println!(
            "\n  Current streak: {}",
            format!("{} day(s)", summary.current).green()
        );
        println!("  Longest streak: {} day(s)", summary.longest);
        println!(
            "{}",
            format!("  {} of {} days won\n", wins, results.len()).bright_black()
        );
    }

    Ok(())
}

fn run_behaviors_command(
    input: &Path,
    days: Option<u32>,
    limit: Option<usize>,
    settings: &Settings,
    clock: &dyn Clock,
    json: bool,
) -> Result<()> {
    let logs: Vec<BehaviorLogRecord> = read_json(input)?;
    let days = days.unwrap_or_else(|| settings.trend_days());
    let limit = limit.unwrap_or_else(|| settings.leaderboard_limit());
    let now = clock.now();

    let (window_logs, trend) = dashboard::trend_window(&logs, days, now);
    let moving = dashboard::trend_moving_average(&trend, settings.moving_average_window());
    let counts = aggregate_behavior_counts_with_percent(&window_logs);
    let performers = aggregate_performer_counts(&window_logs);
    let top = top_performers(&performers, limit);
    let bottom = bottom_performers(&performers, limit);
    let verification = verification_rate(verified_count(&window_logs), window_logs.len() as u64);
    let anchor = clock.today().format(calendar::DATE_KEY_FORMAT).to_string();
    let activity = summarize_activity(&scoreboard_core::streak::activity_date_keys(&logs), &anchor);

    if json {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct BehaviorsJson {
            days: u32,
            total: usize,
            behaviors: Vec<scoreboard_core::BehaviorCountWithPercent>,
            top_performers: Vec<scoreboard_core::PerformerEntry>,
            bottom_performers: Vec<scoreboard_core::PerformerEntry>,
            verification_rate: f64,
            daily_trend: Vec<scoreboard_core::DailyTrendPoint>,
            moving_average: Vec<f64>,
            activity_streak: scoreboard_core::StreakSummary,
        }

        let output = BehaviorsJson {
            days,
            total: window_logs.len(),
            behaviors: counts,
            top_performers: top,
            bottom_performers: bottom,
            verification_rate: verification,
            daily_trend: trend,
            moving_average: moving,
            activity_streak: activity,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    use colored::Colorize;
    use comfy_table::{ContentArrangement, Table};

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Behavior", "Count", "Share"]);
    for c in &counts {
        table.add_row(vec![
            c.behavior_name.clone(),
            format_number(c.count),
            format!("{:.1}%", c.percent),
        ]);
    }
    println!("{table}");

    let mut board = Table::new();
    board.set_content_arrangement(ContentArrangement::Dynamic);
    board.set_header(vec!["Rank", "Top", "Count", "Bottom", "Count"]);
    for i in 0..top.len().max(bottom.len()) {
        let (top_name, top_count) = performer_cells(top.get(i));
        let (bottom_name, bottom_count) = performer_cells(bottom.get(i));
        board.add_row(vec![(i + 1).to_string(), top_name, top_count, bottom_name, bottom_count]);
    }
    println!("{board}");

    println!(
        "\nLogged: {} in the last {} days | Verified: {:.1}%",
        format_number(window_logs.len() as u64),
        days,
        verification
    );
    println!(
        "Activity streak: {} day(s) (longest {})",
        activity.current, activity.longest
    );
    if let Some(latest) = moving.last() {
        println!(
            "{}",
            format!(
                "  {}-day moving average: {:.1}/day",
                settings.moving_average_window(),
                latest
            )
            .bright_black()
        );
    }

    Ok(())
}

fn run_stats_command(values: &[f64], percentiles: &[f64], json: bool) -> Result<()> {
    let summary = describe(values);
    let requested: Vec<(f64, f64)> = percentiles
        .iter()
        .map(|p| (*p, percentile_value(values, *p)))
        .collect();

    if json {
        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PercentileJson {
            percentile: f64,
            value: f64,
        }

        #[derive(serde::Serialize)]
        #[serde(rename_all = "camelCase")]
        struct StatsJson {
            #[serde(flatten)]
            summary: scoreboard_core::DescriptiveStats,
            percentiles: Vec<PercentileJson>,
        }

        let output = StatsJson {
            summary,
            percentiles: requested
                .into_iter()
                .map(|(percentile, value)| PercentileJson { percentile, value })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        use comfy_table::{ContentArrangement, Table};

        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Statistic", "Value"]);
        table.add_row(vec!["Count".to_string(), summary.count.to_string()]);
        table.add_row(vec!["Mean".to_string(), format!("{:.2}", summary.mean)]);
        table.add_row(vec!["Std dev".to_string(), format!("{:.2}", summary.standard_deviation)]);
        table.add_row(vec![
            "Coeff. of variation".to_string(),
            format!("{:.2}%", summary.coefficient_of_variation),
        ]);
        table.add_row(vec!["Median".to_string(), format!("{:.2}", summary.median)]);
        table.add_row(vec!["Min".to_string(), format!("{:.2}", summary.min)]);
        table.add_row(vec!["Max".to_string(), format!("{:.2}", summary.max)]);
        for (p, value) in &requested {
            table.add_row(vec![format!("P{}", p), format!("{:.2}", value)]);
        }

        println!("{table}");
    }

    Ok(())
}

fn run_dashboard_command(
    input: &Path,
    settings: &Settings,
    clock: &dyn Clock,
    json: bool,
) -> Result<()> {
    let data: dashboard::DashboardInput = read_json(input)?;
    let snapshot = dashboard::build_snapshot(&data, settings, clock);

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    use colored::Colorize;
    use comfy_table::{ContentArrangement, Table};

    let state = &snapshot.game_state;
    println!("\n  {}", snapshot.display_date.bold());
    println!(
        "  {}  {} of {} ({:.2}% of year, {:.2}% expected)\n",
        paint_status(state.status),
        format_currency(state.current_score),
        format_currency(state.target_score),
        state.percent_complete,
        snapshot.expected_progress
    );

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![
        "Winning streak".to_string(),
        format!(
            "{} (longest {})",
            snapshot.winning_streak.current, snapshot.winning_streak.longest
        ),
    ]);
    table.add_row(vec![
        "Activity streak".to_string(),
        format!(
            "{} (longest {})",
            snapshot.activity_streak.current, snapshot.activity_streak.longest
        ),
    ]);
    table.add_row(vec![
        format!("Behaviors, last {} days", snapshot.period.days),
        format!(
            "{} ({:+.1}% vs previous)",
            format_number(snapshot.period.current_count),
            snapshot.period.change_percent
        ),
    ]);
    table.add_row(vec![
        "This week".to_string(),
        format_number(snapshot.period.this_week_count),
    ]);
    table.add_row(vec![
        "Average per day".to_string(),
        format!("{:.1}", snapshot.period.average_per_day),
    ]);
    table.add_row(vec![
        "Verified".to_string(),
        format!("{:.1}%", snapshot.verification_rate),
    ]);
    if let Some(rate) = snapshot.attendance_rate {
        table.add_row(vec!["Attendance".to_string(), format!("{:.1}%", rate)]);
    }
    if let Some(rate) = snapshot.completion_rate {
        table.add_row(vec!["Completion".to_string(), format!("{:.1}%", rate)]);
    }
    if let Some(change) = snapshot.lag_measures.average_check_change {
        table.add_row(vec![
            "Average check".to_string(),
            format!("{:+.2}% vs baseline", change),
        ]);
    }
    if let Some(change) = snapshot.lag_measures.rating_change {
        table.add_row(vec![
            "Rating".to_string(),
            format!("{:+.2}% vs baseline", change),
        ]);
    }
    println!("{table}");

    if !snapshot.top_performers.is_empty() {
        let leaders: Vec<String> = snapshot
            .top_performers
            .iter()
            .map(|p| format!("{} ({})", p.user_name, p.count))
            .collect();
        println!("\nTop performers: {}", leaders.join(", "));
    }
    if let Some(last) = &snapshot.last_activity {
        println!("{}", format!("  Last activity: {}", last).bright_black());
    }

    Ok(())
}

fn run_config_command(settings: &Settings, init: bool, json: bool) -> Result<()> {
    use colored::Colorize;

    let path = Settings::config_path()?;

    if init {
        if path.exists() {
            eprintln!(
                "{}",
                format!("  Settings already exist at {}", path.display()).bright_black()
            );
        } else {
            Settings::default().save()?;
            eprintln!(
                "{}",
                format!("✓ Wrote default settings to {}", path.display()).green()
            );
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
    } else {
        println!("  Settings file: {}", path.display());
        println!(
            "  Thresholds: win >= {:.2}, lose <= {:.2}",
            settings.thresholds().winning_ratio,
            settings.thresholds().losing_ratio
        );
        println!("  Week starts: {:?}", settings.week_start);
        println!("  Locale: {}", settings.locale);
        println!("  Trend days: {}", settings.trend_days());
        println!("  Leaderboard size: {}", settings.leaderboard_limit());
        println!("  Moving average window: {}", settings.moving_average_window());
    }

    Ok(())
}

fn paint_status(status: GameStatus) -> colored::ColoredString {
    use colored::Colorize;

    let label = status.as_str().to_uppercase();
    match status {
        GameStatus::Celebrating => label.magenta().bold(),
        GameStatus::Winning => label.green().bold(),
        GameStatus::Losing => label.red().bold(),
        GameStatus::Neutral => label.yellow(),
    }
}

fn performer_cells(entry: Option<&scoreboard_core::PerformerEntry>) -> (String, String) {
    match entry {
        Some(e) => (e.user_name.clone(), format_number(e.count)),
        None => (String::new(), String::new()),
    }
}

fn format_currency(n: f64) -> String {
    if n.abs() >= 1_000_000.0 {
        format!("${:.2}M", n / 1_000_000.0)
    } else if n.abs() >= 1000.0 {
        format!("${:.2}K", n / 1000.0)
    } else {
        format!("${:.2}", n)
    }
}

fn format_number(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}
