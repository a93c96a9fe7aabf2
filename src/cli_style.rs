/*!
 * Fusion CLI Style System
 *
 * Themed text, status tables and tone colouring for the `fusion` binary.
 */

use chrono::{DateTime, Utc};
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};
use fusion_connect::{AdminState, HealthClass, HealthReport};
use fusion_core_entities::{Kpis, Tone};
use std::time::Duration;

use crate::status::Liveness;
use crate::sync::SyncView;

// ============================================================================
// THEME COLORS
// ============================================================================

/// Brand colors for consistent styling
pub struct Theme;

impl Theme {
    /// Primary accent color (cyan)
    pub fn primary<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan()
    }

    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }

    /// Header style (bold cyan)
    pub fn header<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).cyan().bold()
    }

    /// Text coloured by dashboard tone
    pub fn tone<D: std::fmt::Display>(tone: Tone, text: D) -> StyledObject<D> {
        match tone {
            Tone::Neutral => style(text).dim(),
            Tone::Good => style(text).green(),
            Tone::Warning => style(text).yellow(),
            Tone::Critical => style(text).red().bold(),
        }
    }
}

// ============================================================================
// ICONS
// ============================================================================

/// Unicode icons for visual feedback
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✓";
    pub const ERROR: &'static str = "✗";
    pub const WARNING: &'static str = "⚠";
    pub const INFO: &'static str = "ℹ";
    pub const LIVE: &'static str = "●";
    pub const IDLE: &'static str = "○";
    pub const SATELLITE: &'static str = "🛰";
    pub const ARROW_RIGHT: &'static str = "→";
}

/// Tone of a health classification
pub fn health_tone(class: Option<HealthClass>) -> Tone {
    match class {
        Some(HealthClass::Healthy) => Tone::Good,
        Some(HealthClass::Degraded) => Tone::Critical,
        None => Tone::Neutral,
    }
}

pub fn liveness_tone(liveness: Liveness) -> Tone {
    match liveness {
        Liveness::Live => Tone::Good,
        Liveness::Stale => Tone::Warning,
        Liveness::Offline => Tone::Critical,
    }
}

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Neutral => Color::DarkGrey,
        Tone::Good => Color::Green,
        Tone::Warning => Color::Yellow,
        Tone::Critical => Color::Red,
    }
}

/// Draw a section header with a line
pub fn section_header(title: &str) {
    let line_len = 50 - title.len().min(40);
    println!(
        "\n{} {}",
        Theme::header(title),
        Theme::muted("─".repeat(line_len))
    );
}

// ============================================================================
// TABLES
// ============================================================================

/// Create a styled data table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a minimal table (no outer borders)
pub fn create_minimal_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_NO_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Key-value table
pub fn stats_table(items: &[(&str, String)]) -> Table {
    let mut table = create_minimal_table();

    for (key, value) in items {
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(value)
                .fg(Color::White)
                .add_attribute(Attribute::Bold),
        ]);
    }

    table
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn tone_cell(tone: Tone, text: impl ToString) -> Cell {
    Cell::new(text.to_string()).fg(tone_color(tone))
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// One health report as a two-column table
pub fn health_table(report: &HealthReport) -> Table {
    let mut table = create_table();
    table.set_header(vec![header_cell("API Health"), Cell::new("")]);

    let class = report.classify();
    table.add_row(vec![
        Cell::new("Status"),
        tone_cell(health_tone(Some(class)), class).add_attribute(Attribute::Bold),
    ]);
    table.add_row(vec![Cell::new("Server time"), Cell::new(optional(report.utc.as_deref()))]);
    table.add_row(vec![
        Cell::new("Uptime"),
        Cell::new(optional(
            report
                .uptime_seconds
                .map(|secs| format_duration(secs as f64)),
        )),
    ]);

    if let Some(counts) = report.counts {
        table.add_row(vec![
            Cell::new("Records"),
            Cell::new(format!(
                "{} events / {} assets / {} alerts",
                counts.events, counts.assets, counts.alerts
            )),
        ]);
    }

    table.add_row(vec![
        Cell::new("Stream backlog"),
        Cell::new(optional(report.stream_backlog)),
    ]);
    table.add_row(vec![
        Cell::new("Store"),
        if report.dependencies_ok() {
            tone_cell(Tone::Good, format!("{} ok", Icons::SUCCESS))
        } else {
            tone_cell(Tone::Critical, format!("{} down", Icons::ERROR))
        },
    ]);

    if let Some(latency) = report.latency_ms {
        table.add_row(vec![Cell::new("Latency"), Cell::new(format!("{:.1}ms", latency))]);
    }
    if let Some(ref error) = report.error {
        table.add_row(vec![Cell::new("Error"), tone_cell(Tone::Critical, error)]);
    }

    table
}

/// Freshness and connectivity overview of a view
pub fn status_table(view: &SyncView, now: DateTime<Utc>, silence_threshold: Duration) -> Table {
    let status = &view.status;
    let mut table = create_table();
    table.set_header(vec![header_cell("Sync Status"), Cell::new("")]);

    table.add_row(vec![Cell::new("Source"), Cell::new(status.source.to_string())]);

    let class = status.health_class();
    table.add_row(vec![
        Cell::new("Health"),
        tone_cell(health_tone(class), optional(class)),
    ]);
    table.add_row(vec![
        Cell::new("API reachable"),
        match status.api_reachable {
            Some(true) => tone_cell(Tone::Good, Icons::SUCCESS),
            Some(false) => tone_cell(Tone::Critical, Icons::ERROR),
            None => tone_cell(Tone::Neutral, "-"),
        },
    ]);

    let liveness = view.liveness(now, silence_threshold);
    table.add_row(vec![
        Cell::new("Live channel"),
        tone_cell(
            liveness_tone(liveness),
            format!("{} ({})", status.channel.state, liveness),
        ),
    ]);
    table.add_row(vec![
        Cell::new("Last event"),
        tone_cell(
            view.channel_tone(now, silence_threshold),
            optional(
                status
                    .channel_silence(now)
                    .map(|d| format!("{} ago", format_duration(d.as_secs_f64()))),
            ),
        ),
    ]);
    table.add_row(vec![
        Cell::new("Last full sync"),
        Cell::new(optional(
            status
                .sync_age(now)
                .map(|d| format!("{} ago", format_duration(d.as_secs_f64()))),
        )),
    ]);

    if let Some(ref notice) = status.last_admin_notice {
        table.add_row(vec![Cell::new("Last admin action"), Cell::new(notice.summary())]);
    }

    if let Some(latest) = status.errors.front() {
        table.add_row(vec![
            Cell::new(format!("Errors ({})", status.errors.len())),
            tone_cell(Tone::Warning, format!("{}: {}", latest.context, latest.message)),
        ]);
    }

    table
}

/// KPI cards as a table
pub fn kpi_table(kpis: &Kpis) -> Table {
    let mut table = create_table();
    table.set_header(vec![
        header_cell("Collection"),
        header_cell("Total"),
        header_cell("Breakdown"),
    ]);

    let hot = kpis.severity.high + kpis.severity.critical;
    table.add_row(vec![
        Cell::new("Events"),
        Cell::new(kpis.events),
        tone_cell(
            if kpis.severity.critical > 0 {
                Tone::Critical
            } else if hot > 0 {
                Tone::Warning
            } else {
                Tone::Good
            },
            format!("{} recent, {} high/critical", kpis.events_in_window, hot),
        ),
    ]);

    let availability = kpis.asset_availability();
    table.add_row(vec![
        Cell::new("Assets"),
        Cell::new(kpis.assets),
        tone_cell(
            if availability >= 0.9 {
                Tone::Good
            } else if availability >= 0.7 {
                Tone::Warning
            } else {
                Tone::Critical
            },
            format!(
                "{:.0}% available, {} degraded, {} offline",
                availability * 100.0,
                kpis.asset_status.degraded,
                kpis.asset_status.offline
            ),
        ),
    ]);

    table.add_row(vec![
        Cell::new("Alerts"),
        Cell::new(kpis.alerts),
        tone_cell(
            kpis.alert_tone(),
            format!(
                "{} open, p1 {} / p2 {} / p3 {}",
                kpis.open_alerts, kpis.priority.p1, kpis.priority.p2, kpis.priority.p3
            ),
        ),
    ]);

    table
}

/// Scenario, rates and cooldown
pub fn admin_state_table(state: &AdminState) -> Table {
    stats_table(&[
        ("Scenario", state.scenario.to_string()),
        (
            "Rates (s)",
            format!(
                "event {} / asset {} / alert {}",
                state.rates.event, state.rates.asset, state.rates.alert
            ),
        ),
        (
            "Cooldown",
            if state.cooldown_remaining == 0 {
                "ready".to_string()
            } else {
                format!("{}s remaining", state.cooldown_remaining)
            },
        ),
    ])
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Format seconds into a compact human-readable duration
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours, mins)
    }
}

/// One-line status for `fusion watch`
pub fn status_line(view: &SyncView, now: DateTime<Utc>, silence_threshold: Duration) -> String {
    let status = &view.status;
    let liveness = view.liveness(now, silence_threshold);
    let dot = if liveness == Liveness::Live {
        Icons::LIVE
    } else {
        Icons::IDLE
    };
    let health = status.health_class();

    format!(
        "{} {} | source {} | health {} | {} events · {} assets · {} alerts | errors {}",
        Theme::tone(liveness_tone(liveness), dot),
        Theme::muted(now.format("%H:%M:%S")),
        status.source,
        Theme::tone(health_tone(health), optional(health)),
        view.events.len(),
        view.assets.len(),
        view.alerts.len(),
        status.errors.len()
    )
}

// ============================================================================
// MESSAGES
// ============================================================================

/// Print a formatted error with an optional suggestion
pub fn print_error(message: &str, suggestion: Option<&str>) {
    eprintln!(
        "\n{} {}",
        Theme::error(format!("{} Error:", Icons::ERROR)),
        message
    );

    if let Some(hint) = suggestion {
        eprintln!(
            "  {} {}",
            Theme::muted(Icons::ARROW_RIGHT),
            Theme::muted(hint)
        );
    }
    eprintln!();
}

pub fn print_warning(message: &str) {
    println!("{} {}", Theme::warning(Icons::WARNING), message);
}

pub fn print_success(message: &str) {
    println!("{} {}", Theme::success(Icons::SUCCESS), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", Theme::primary(Icons::INFO), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.25), "250ms");
        assert_eq!(format_duration(12.0), "12.0s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(7260.0), "2h 1m");
    }

    #[test]
    fn test_tones() {
        assert_eq!(health_tone(None), Tone::Neutral);
        assert_eq!(health_tone(Some(HealthClass::Degraded)), Tone::Critical);
        assert_eq!(liveness_tone(Liveness::Stale), Tone::Warning);
    }

    #[test]
    fn test_health_table_renders_error() {
        let report = HealthReport::degraded("connection refused");
        let rendered = health_table(&report).to_string();
        assert!(rendered.contains("degraded"));
        assert!(rendered.contains("connection refused"));
    }

    #[test]
    fn test_status_table_mentions_source() {
        let view = SyncView::default();
        let rendered = status_table(&view, Utc::now(), Duration::from_secs(30)).to_string();
        assert!(rendered.contains("cold_start"));
    }
}
