//! Scorecard rendering: a self-contained HTML report plus terminal and JSON views.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;
use std::path::Path;

use super::aggregator::{RunSummary, TestStatus};
use super::leaderboard::LeaderboardRow;
use crate::error::Result;

/// Longest excerpt or error message shown in the detail table
pub const EXCERPT_DISPLAY_CHARS: usize = 160;

/// Truncate on a char boundary, appending an ellipsis when something was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_seconds(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}s", v),
        None => "n/a".to_string(),
    }
}

const STYLE: &str = r#"
        body { background: #07070c; color: #e4e4ef; font-family: sans-serif; padding: 50px; }
        .hero { border: 1px solid #252540; background: linear-gradient(135deg, #6c5ce711, #e8439311); padding: 40px; border-radius: 24px; text-align: center; }
        .grade { font-size: 80px; color: #10b981; font-weight: 800; }
        .banner { margin-top: 20px; padding: 16px; border-radius: 12px; background: #fdcb6e22; border: 1px solid #fdcb6e; color: #fdcb6e; text-align: center; }
        .disclaimer { font-size: 12px; opacity: 0.7; }
        table { width: 100%; margin-top: 20px; border-collapse: collapse; }
        td, th { padding: 12px; border-bottom: 1px solid #252540; text-align: left; vertical-align: top; }
        tr.local { background: #6c5ce733; font-weight: 700; }
        .Success { color: #55efc4; }
        .Timeout { color: #fdcb6e; }
        .Error { color: #ff7675; }
        .muted { opacity: 0.6; font-style: italic; }
"#;

/// Render the scorecard with an explicit generation time.
///
/// Output depends only on the arguments.
pub fn render_at(
    summary: &RunSummary,
    leaderboard: &[LeaderboardRow],
    generated_at: DateTime<Utc>,
) -> Vec<u8> {
    let mut html = String::with_capacity(16 * 1024);

    // Writing into a String cannot fail.
    let _ = write_document(&mut html, summary, leaderboard, generated_at);
    html.into_bytes()
}

/// Render the scorecard stamped with the current time.
pub fn render(summary: &RunSummary, leaderboard: &[LeaderboardRow]) -> Vec<u8> {
    render_at(summary, leaderboard, Utc::now())
}

/// Render and write the scorecard to `path`.
pub fn write_to(path: &Path, summary: &RunSummary, leaderboard: &[LeaderboardRow]) -> Result<()> {
    std::fs::write(path, render(summary, leaderboard))?;
    tracing::info!(path = %path.display(), "Scorecard written");
    Ok(())
}

/// Export the summary as pretty JSON
pub fn to_json(summary: &RunSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

fn write_document(
    out: &mut String,
    summary: &RunSummary,
    leaderboard: &[LeaderboardRow],
    generated_at: DateTime<Utc>,
) -> std::fmt::Result {
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "    <meta charset=\"UTF-8\" />")?;
    writeln!(out, "    <title>Moth-Bench Performance Scorecard</title>")?;
    writeln!(out, "    <style>{}    </style>", STYLE)?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;

    write_hero(out, summary, generated_at)?;

    if summary.cancelled {
        writeln!(
            out,
            "    <div class=\"banner\">Run cancelled after {}/{} tests</div>",
            summary.completed(),
            summary.total_tests
        )?;
    }

    write_leaderboard(out, leaderboard)?;
    write_details(out, summary)?;

    writeln!(out, "</body>")?;
    writeln!(out, "</html>")
}

fn write_hero(
    out: &mut String,
    summary: &RunSummary,
    generated_at: DateTime<Utc>,
) -> std::fmt::Result {
    let grade = summary
        .grade()
        .map(|g| g.to_string())
        .unwrap_or_else(|| "–".to_string());

    writeln!(out, "    <div class=\"hero\">")?;
    writeln!(out, "        <h1>MOTH-BENCH PERFORMANCE SCORECARD</h1>")?;
    writeln!(out, "        <div class=\"grade\">{}</div>", grade)?;
    writeln!(
        out,
        "        <p>Avg latency: {} | Success: {}/{} | Failed: {}</p>",
        format_seconds(summary.mean_latency_seconds),
        summary.success_count,
        summary.total_tests,
        summary.failure_count
    )?;
    if let Some(stats) = summary.latency_stats {
        writeln!(
            out,
            "        <p>Min: {:.2}s | p50: {:.2}s | p95: {:.2}s | Max: {:.2}s</p>",
            stats.min_seconds, stats.p50_seconds, stats.p95_seconds, stats.max_seconds
        )?;
    }
    writeln!(
        out,
        "        <p>Endpoint: {} | Model: {}</p>",
        escape_html(&summary.endpoint_url),
        escape_html(&summary.model)
    )?;
    writeln!(
        out,
        "        <p class=\"disclaimer\">Run {} started {}. Generated {}.</p>",
        summary.run_id,
        summary.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;
    writeln!(
        out,
        "        <p class=\"disclaimer\">Reference times are community-based and illustrative only. \
         They are not official benchmarks for any provider. Your local endpoint is measured in this run.</p>"
    )?;
    writeln!(out, "    </div>")
}

fn write_leaderboard(out: &mut String, leaderboard: &[LeaderboardRow]) -> std::fmt::Result {
    writeln!(out, "    <h2>Leaderboard</h2>")?;
    writeln!(out, "    <table>")?;
    writeln!(
        out,
        "        <tr><th>Rank &amp; Model</th><th>Avg Response Time</th></tr>"
    )?;
    for row in leaderboard {
        let class = if row.is_local { " class=\"local\"" } else { "" };
        writeln!(
            out,
            "        <tr{}><td>#{} {}</td><td>{:.2}s</td></tr>",
            class,
            row.rank,
            escape_html(&row.name),
            row.avg_seconds
        )?;
    }
    if !leaderboard.iter().any(|row| row.is_local) {
        writeln!(
            out,
            "        <tr class=\"muted\"><td>Local endpoint (this run)</td><td>No successful measurement in this run</td></tr>"
        )?;
    }
    writeln!(out, "    </table>")
}

fn write_details(out: &mut String, summary: &RunSummary) -> std::fmt::Result {
    writeln!(out, "    <h2>Test Details</h2>")?;
    writeln!(out, "    <table>")?;
    writeln!(
        out,
        "        <tr><th>#</th><th>Category</th><th>Test</th><th>Status</th><th>Latency</th><th>Excerpt / Error</th></tr>"
    )?;
    for result in &summary.results {
        let detail = match (&result.status, &result.error_message) {
            (TestStatus::Success, _) => &result.response_excerpt,
            (_, Some(message)) => message,
            (_, None) => &result.response_excerpt,
        };
        writeln!(
            out,
            "        <tr><td>{}</td><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{:.2}s</td><td>{}</td></tr>",
            result.test_id,
            result.category,
            escape_html(&result.name),
            result.status,
            result.status,
            result.latency_seconds,
            escape_html(&truncate_chars(detail, EXCERPT_DISPLAY_CHARS))
        )?;
    }
    writeln!(out, "    </table>")
}

/// Print the run as an ASCII table
pub fn print_table(summary: &RunSummary, leaderboard: &[LeaderboardRow]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                     MOTH-BENCH RESULTS                           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    if summary.cancelled {
        println!(
            "  Run cancelled after {}/{} tests",
            summary.completed(),
            summary.total_tests
        );
        println!();
    }

    let grade = summary
        .grade()
        .map(|g| g.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  DONE: {} | AVG: {} | SUCCESS: {}/{}",
        grade,
        format_seconds(summary.mean_latency_seconds),
        summary.success_count,
        summary.total_tests
    );
    if let Some(stats) = summary.latency_stats {
        println!(
            "  min {:.2}s | p50 {:.2}s | p95 {:.2}s | max {:.2}s",
            stats.min_seconds, stats.p50_seconds, stats.p95_seconds, stats.max_seconds
        );
    }
    println!();

    println!("┌──────┬──────────────────────────────────────┬────────────┐");
    println!("│ Rank │ Model                                │  Avg (s)   │");
    println!("├──────┼──────────────────────────────────────┼────────────┤");
    for row in leaderboard {
        let marker = if row.is_local { "*" } else { " " };
        println!(
            "│ {:>3}{} │ {:<36} │ {:>10.2} │",
            row.rank,
            marker,
            truncate_chars(&row.name, 36),
            row.avg_seconds
        );
    }
    if !leaderboard.iter().any(|row| row.is_local) {
        println!(
            "│    - │ {:<36} │ {:>10} │",
            "Local endpoint: no successful run", "n/a"
        );
    }
    println!("└──────┴──────────────────────────────────────┴────────────┘");
    println!();
}
