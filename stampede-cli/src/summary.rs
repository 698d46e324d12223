//! Human-readable end-of-run summary

use colored::*;
use stampede_engine::RunReport;
use stampede_metrics::{DistributionStats, RateStats, SeriesStats};
use std::fmt::Write;

const NAME_WIDTH: usize = 32;

fn fmt_ms(value: Option<f64>) -> String {
    match value {
        Some(ms) if ms >= 1000.0 => format!("{:.2}s", ms / 1000.0),
        Some(ms) => format!("{:.2}ms", ms),
        None => "-".to_string(),
    }
}

fn distribution_line(stats: &DistributionStats) -> String {
    format!(
        "avg={} min={} med={} max={} p(90)={} p(95)={} p(99)={} count={}",
        fmt_ms(stats.mean()),
        fmt_ms(stats.min),
        fmt_ms(stats.median()),
        fmt_ms(stats.max),
        fmt_ms(stats.percentile(90.0)),
        fmt_ms(stats.percentile(95.0)),
        fmt_ms(stats.percentile(99.0)),
        stats.count,
    )
}

fn rate_line(stats: &RateStats) -> String {
    let percent = stats.rate().map(|r| r * 100.0).unwrap_or(0.0);
    format!(
        "{:.2}% {} {} {} {}",
        percent,
        "✓".green(),
        stats.trues,
        "✗".red(),
        stats.falses()
    )
}

/// Render thresholds, run counts and every metric merged across tags
pub fn render_summary(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\n{} run {} ({} mode, seed {})",
        "▶".bright_blue().bold(),
        report.run_id,
        report.mode,
        report.seed
    );
    let tally = &report.tally;
    let _ = writeln!(
        out,
        "  dispatched {}  completed {}  aborted {}  dropped {}  interrupted {}  in {:.1}s{}",
        tally.dispatched,
        tally.completed,
        tally.aborted,
        tally.dropped,
        tally.interrupted,
        report.elapsed.as_secs_f64(),
        if report.cancelled { "  (cancelled)" } else { "" }
    );

    if !report.thresholds.is_empty() {
        let _ = writeln!(out, "\n{}", "Thresholds".bold());
        for outcome in &report.thresholds {
            let mark = if outcome.passed {
                "✓".bright_green().bold()
            } else {
                "✗".bright_red().bold()
            };
            let observed = outcome
                .observed
                .map(|v| format!("{:.2}", v))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = write!(out, "  {} {} {} (observed {})", mark, outcome.metric, outcome.expression, observed);
            if let Some(reason) = &outcome.failure {
                let _ = write!(out, ": {}", reason.bright_red());
            }
            out.push('\n');
        }
    }

    let _ = writeln!(out, "\n{}", "Metrics".bold());
    for (name, stats) in report.metric_totals() {
        let value = match &stats {
            SeriesStats::Counter { value } => format!("{}", value),
            SeriesStats::Rate(rate) => rate_line(rate),
            SeriesStats::Distribution(dist) => distribution_line(dist),
        };
        let dots = ".".repeat(NAME_WIDTH.saturating_sub(name.len()));
        let _ = writeln!(out, "  {}{}: {}", name, dots.dimmed(), value);
    }

    let verdict = if report.thresholds_passed() {
        "✓ all thresholds passed".bright_green().bold()
    } else {
        "✗ some thresholds failed".bright_red().bold()
    };
    let _ = writeln!(out, "\n{}", verdict);
    out
}
