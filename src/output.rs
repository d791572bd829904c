//! CLI output formatting for every command.
//!
//! # Document-First Display
//!
//! Output is **document-centric**. The primary display for every entry is the
//! page identity (`blog/my-post/index.html`), with what the gate did to it
//! shown as indented context lines. Read top to bottom, a batch report is an
//! inventory of the staged site.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! posts/rust-tips/index.html → blog/posts/rust-tips/index.html
//!     WARNING paths: 'posts/' belongs under 'blog/'; ...
//!     AUTO-FIX duplicate-ids: id "form" used 3 times; ...
//!     SUMMARY summary: applied 1 auto-fix
//! ```
//!
//! ## Publish
//!
//! ```text
//! 001 blog/a/index.html: published (2 fixes, 1 warning)
//! 002 blog/draft.html: blocked
//!         unresolved template placeholder(s): {{ published_date }}
//! 003 blog/binary.html: skipped
//!         blog/binary.html: content is not valid UTF-8
//!
//! Published 1, blocked 1, skipped 1
//! ```
//!
//! ## Regress
//!
//! ```text
//! Compared against previous snapshot
//!     FAIL sitemap URLs: 118 of 120 (lost 2 URLs)
//!     ok   feed items: 40 of 40
//!
//! Regression check failed: 1 of 5 checks
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::decision_log::LogEntry;
use crate::gate::{BatchSummary, DocumentReport, DocumentStatus, ValidationOutcome};
use crate::regression::{CheckResult, ComparisonMode, RegressionReport, SiteMetrics};
use std::path::PathBuf;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// `1 fix`, `2 fixes`, `0 warnings`.
fn counted(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{} {}", n, singular)
    } else {
        format!("{} {}", n, plural)
    }
}

/// One decision log entry, without timestamp or document.
fn entry_line(entry: &LogEntry) -> String {
    format!("{} {}: {}", entry.severity, entry.stage, entry.message)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

// ============================================================================
// check
// ============================================================================

/// Format the outcome of validating a single document.
///
/// The header names the requested destination and, for published outcomes,
/// where the document will actually be written.
pub fn format_outcome(destination: &str, outcome: &ValidationOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        ValidationOutcome::Fixed { corrected_path, .. } => {
            lines.push(format!("{} \u{2192} {}", destination, corrected_path));
        }
        ValidationOutcome::Blocked { reasons, .. } => {
            lines.push(format!("{} (blocked)", destination));
            for (i, reason) in reasons.iter().enumerate() {
                lines.push(format!("    {} {}", format_index(i + 1), reason));
            }
        }
    }
    lines.extend(
        outcome
            .log()
            .entries()
            .iter()
            .map(|e| format!("    {}", entry_line(e))),
    );
    lines
}

/// Print a single-document outcome to stdout.
pub fn print_outcome(destination: &str, outcome: &ValidationOutcome) {
    print_lines(format_outcome(destination, outcome));
}

// ============================================================================
// publish
// ============================================================================

fn report_line(index: usize, report: &DocumentReport) -> String {
    let header = format!("{} {}", format_index(index), report.destination);
    match report.status {
        DocumentStatus::Published => format!(
            "{}: published ({}, {})",
            header,
            counted(report.fixes, "fix", "fixes"),
            counted(report.warnings, "warning", "warnings")
        ),
        DocumentStatus::Blocked => format!("{}: blocked", header),
        DocumentStatus::Skipped => format!("{}: skipped", header),
    }
}

/// Format a batch summary: one entry per staged document, then totals.
pub fn format_batch_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, report) in summary.reports.iter().enumerate() {
        lines.push(report_line(i + 1, report));
        if let Some(corrected) = &report.corrected_path
            && *corrected != report.destination
        {
            lines.push(format!("        Published as: {}", corrected));
        }
        for reason in &report.reasons {
            lines.push(format!("        {}", reason));
        }
    }
    if !summary.reports.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Published {}, blocked {}, skipped {}",
        summary.published(),
        summary.blocked(),
        summary.skipped()
    ));
    lines
}

/// Print a batch summary to stdout.
pub fn print_batch_summary(summary: &BatchSummary) {
    print_lines(format_batch_summary(summary));
}

// ============================================================================
// regress
// ============================================================================

fn check_line(check: &CheckResult) -> String {
    let status = if check.passed { "ok  " } else { "FAIL" };
    let mut line = format!(
        "    {} {}: {} of {}",
        status, check.name, check.actual, check.expected
    );
    if let Some(detail) = &check.detail {
        line.push_str(&format!(" ({})", detail));
    }
    line
}

fn post_section(lines: &mut Vec<String>, title: &str, posts: &[String]) {
    if posts.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("{} ({})", title, posts.len()));
    lines.extend(posts.iter().map(|p| format!("    {}", p)));
}

/// Format a regression report: itemized checks, post changes, verdict.
pub fn format_regression_report(report: &RegressionReport) -> Vec<String> {
    let mut lines = vec![match report.mode {
        ComparisonMode::Baseline => "Compared against configured baseline".to_string(),
        ComparisonMode::Snapshot => "Compared against previous snapshot".to_string(),
    }];
    lines.extend(report.checks.iter().map(check_line));

    post_section(&mut lines, "Removed posts", &report.removed);
    post_section(&mut lines, "Modified posts", &report.modified);
    post_section(&mut lines, "Added posts", &report.added);

    lines.push(String::new());
    let failed = report.failures().count();
    if failed == 0 {
        lines.push(format!(
            "Regression check passed: {}",
            counted(report.checks.len(), "check", "checks")
        ));
    } else {
        lines.push(format!(
            "Regression check failed: {} of {}",
            failed,
            counted(report.checks.len(), "check", "checks")
        ));
    }
    lines
}

/// Print a regression report to stdout.
pub fn print_regression_report(report: &RegressionReport) {
    print_lines(format_regression_report(report));
}

// ============================================================================
// snapshot
// ============================================================================

/// Format collected site metrics.
pub fn format_metrics(metrics: &SiteMetrics) -> Vec<String> {
    let mut lines = vec![
        format!("Sitemap URLs: {}", metrics.sitemap_urls),
        format!("Feed items: {}", metrics.feed_items),
        format!("Published posts: {}", metrics.published_posts()),
        format!(
            "Required pages: {} of {}",
            metrics.required_pages_present(),
            metrics.required_pages.len()
        ),
    ];
    for (page, present) in &metrics.required_pages {
        if !*present {
            lines.push(format!("    missing: {}", page));
        }
    }
    if metrics.redirect_stubs > 0 {
        lines.push(format!(
            "Redirect stubs: {} (not counted)",
            metrics.redirect_stubs
        ));
    }
    lines
}

/// Print collected site metrics to stdout.
pub fn print_metrics(metrics: &SiteMetrics) {
    print_lines(format_metrics(metrics));
}

// ============================================================================
// sweep-logs
// ============================================================================

/// Format the result of a decision log retention sweep.
pub fn format_sweep_output(removed: &[PathBuf], retention_days: u32) -> Vec<String> {
    let mut lines: Vec<String> = removed
        .iter()
        .map(|p| format!("Removed {}", p.display()))
        .collect();
    lines.push(format!(
        "Removed {} older than {} days",
        counted(removed.len(), "partition", "partitions"),
        retention_days
    ));
    lines
}

/// Print the result of a retention sweep to stdout.
pub fn print_sweep_output(removed: &[PathBuf], retention_days: u32) {
    print_lines(format_sweep_output(removed, retention_days));
}
