//! Progress reporting for enumerations and walks
//!
//! Provides a live spinner using indicatif and the header/summary blocks
//! printed around a run.

use crate::walker::WalkStats;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing walk status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        if let Ok(spinner) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the display from walk counters
    pub fn update(&self, stats: &WalkStats) {
        let msg = format!(
            "Nodes: {} | Expanded: {} | Pages: {} | Depth: {} | Failures: {}",
            format_number(stats.nodes),
            format_number(stats.containers_expanded),
            format_number(stats.pages),
            stats.max_depth,
            stats.failures,
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut out = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Totals shown after a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub entries: u64,
    pub pages: u64,
    /// Tree depth reached; None for flat enumerations
    pub depth: Option<usize>,
    pub errors: u64,
    pub duration: Duration,
    pub export: Option<String>,
}

/// Print a summary of the run (to stderr, stdout carries results)
pub fn print_summary(title: &str, summary: &RunSummary) {
    let heading = if summary.errors == 0 {
        style(format!("{} Complete", title)).green().bold()
    } else {
        style(format!("{} Partial", title)).yellow().bold()
    };

    eprintln!();
    eprintln!("{}", heading);
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Entries:").bold(), format_number(summary.entries));
    eprintln!("  {} {}", style("Pages:").bold(), format_number(summary.pages));
    if let Some(depth) = summary.depth {
        eprintln!("  {} {}", style("Depth:").bold(), depth);
    }
    eprintln!(
        "  {} {:.3}s",
        style("Duration:").bold(),
        summary.duration.as_secs_f64()
    );
    if summary.errors > 0 {
        eprintln!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(summary.errors)
        );
    }
    if let Some(path) = &summary.export {
        eprintln!("  {} {}", style("Database:").bold(), path);
    }
    eprintln!();
}

/// Print a header at the start of the run
pub fn print_header(kind: &str, target: &str, snapshot: &str) {
    eprintln!();
    eprintln!(
        "{} {}",
        style("netenum").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("{}", style("─".repeat(50)).dim());
    eprintln!("  {} {}", style("Kind:").bold(), kind);
    eprintln!("  {} {}", style("Target:").bold(), target);
    eprintln!("  {} {}", style("Snapshot:").bold(), snapshot);
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }
}
