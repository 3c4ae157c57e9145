//! Terminal output: colored status lines, result tables and progress bars.

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

use crate::export::{CopyStats, SummaryCounts};
use crate::models::MatchStats;

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Scan => "🔍",
        Status::Copy => "⇒",
    }
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Scan,
    Copy,
}

/// Print a styled status message.
pub fn print_status(status: Status, msg: &str) {
    let icon = status_icon(status);
    match status {
        Status::Success => println!("{} {}", icon.green().bold(), msg),
        Status::Error => println!("{} {}", icon.red().bold(), msg),
        Status::Warning => println!("{} {}", icon.yellow().bold(), msg),
        Status::Info => println!("{} {}", icon.cyan().bold(), msg),
        Status::Scan => println!("{} {}", icon.yellow(), msg),
        Status::Copy => println!("{} {}", icon.magenta(), msg),
    }
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", format!("━━━ {} ━━━", title).bold().cyan());
}

/// Print a divider line.
pub fn print_divider() {
    println!("{}", "─".repeat(60).dimmed());
}

/// Format a number with commas.
pub fn format_number(n: usize) -> String {
    n.to_string()
        .chars()
        .rev()
        .collect::<Vec<_>>()
        .chunks(3)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .rev()
        .collect()
}

/// A 0..=1 rate as a percentage with two decimals.
pub fn format_rate(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// One row per batch plus a total row when there is more than one batch.
pub fn batch_table(stats: &[MatchStats]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Source", "Records", "Files", "Matched", "Multi", "Unmatched", "Rate",
        ]);

    for s in stats {
        table.add_row(vec![
            Cell::new(&s.source_name),
            Cell::new(format_number(s.total_records)),
            Cell::new(format_number(s.total_files)),
            Cell::new(format_number(s.matched)).fg(Color::Green),
            Cell::new(format_number(s.multi_matched)).fg(Color::Yellow),
            Cell::new(format_number(s.unmatched)).fg(Color::Red),
            Cell::new(format_rate(s.match_rate)),
        ]);
    }

    if stats.len() > 1 {
        let records: usize = stats.iter().map(|s| s.total_records).sum();
        let matched: usize = stats.iter().map(|s| s.matched).sum();
        let rate = if records == 0 {
            0.0
        } else {
            matched as f64 / records as f64
        };
        table.add_row(vec![
            Cell::new("TOTAL"),
            Cell::new(format_number(records)),
            Cell::new(""),
            Cell::new(format_number(matched)),
            Cell::new(format_number(stats.iter().map(|s| s.multi_matched).sum())),
            Cell::new(format_number(stats.iter().map(|s| s.unmatched).sum())),
            Cell::new(format_rate(rate)),
        ]);
    }

    table
}

/// Plain `key: value` lines for one batch
pub fn batch_lines(s: &MatchStats) -> Vec<String> {
    vec![
        format!("source: {}", s.source_name),
        format!("records: {}", s.total_records),
        format!("files: {}", s.total_files),
        format!("matched: {}", s.matched),
        format!("multi_matched: {}", s.multi_matched),
        format!("unmatched: {}", s.unmatched),
        format!("match_rate: {}", format_rate(s.match_rate)),
    ]
}

/// Print the copy outcome.
pub fn print_copy_stats(stats: &CopyStats) {
    print_status(
        Status::Copy,
        &format!(
            "Copied {} of {} PDFs ({} skipped, {} failed)",
            stats.copied.to_string().green().bold(),
            stats.total,
            stats.skipped.to_string().yellow(),
            stats.failed.to_string().red()
        ),
    );
    for failure in &stats.failures {
        println!(
            "  {} {}: {}",
            status_icon(Status::Error).red(),
            failure.source.display(),
            failure.reason.dimmed()
        );
    }
}

/// Print the summary file counts.
pub fn print_summary_counts(counts: &SummaryCounts) {
    print_status(
        Status::Success,
        &format!(
            "Summaries: {} matched, {} unmatched, {} multi-matched",
            counts.matched.to_string().green(),
            counts.unmatched.to_string().red(),
            counts.multi_matched.to_string().yellow()
        ),
    );
}

/// Spinner shown while a directory is scanned and matched.
pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    /// Create a new spinner with the given message.
    pub fn new(msg: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// Finish with success message.
    pub fn finish_with_success(&self, msg: &str) {
        self.pb
            .finish_with_message(format!("{} {}", status_icon(Status::Success).green(), msg));
    }

    /// Finish with error message.
    pub fn finish_with_error(&self, msg: &str) {
        self.pb
            .finish_with_message(format!("{} {}", status_icon(Status::Error).red(), msg));
    }
}

/// Progress bar for copying matched PDFs; the copier sets its length.
pub fn copy_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::with_template("{msg}: {bar:40.cyan/blue} {pos}/{len} ({percent}%)")
    {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb.set_message("Copying PDFs");
    pb
}
