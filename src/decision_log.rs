//! Decision log: what the gate did to each document, and why.
//!
//! Every stage records [`LogEntry`] values into a per-document
//! [`DecisionLog`]. The finished entries are returned to the caller inside
//! the validation outcome and appended to a [`LogSink`].
//!
//! ## Persisted format
//!
//! [`FileSink`] writes one human-readable line per entry into a
//! date-partitioned, append-only file:
//!
//! ```text
//! logs/pagegate/decisions-2026-10-15.log
//! 2026-10-15T08:12:03Z AUTO-FIX blog/rust-tips/index.html duplicate-ids: id "form" used 3 times; renamed later occurrences to "form-2", "form-3"
//! 2026-10-15T08:12:03Z BLOCKED blog/draft/index.html blocking: unresolved template placeholder(s): {{ published_date }}
//! ```
//!
//! Partitions older than the retention window are removed by [`sweep`].
//! A single writer at a time is assumed across processes; within a process
//! [`FileSink`] serializes appends.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

const PARTITION_PREFIX: &str = "decisions-";
const PARTITION_SUFFIX: &str = ".log";

#[derive(Error, Debug)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "AUTO-FIX")]
    AutoFix,
    #[serde(rename = "BLOCKED")]
    Blocked,
    #[serde(rename = "WARNING")]
    Warning,
    #[serde(rename = "SUMMARY")]
    Summary,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::AutoFix => "AUTO-FIX",
            Severity::Blocked => "BLOCKED",
            Severity::Warning => "WARNING",
            Severity::Summary => "SUMMARY",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub stage: String,
    pub severity: Severity,
    pub message: String,
}

impl LogEntry {
    pub fn new(stage: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stage: stage.into(),
            severity,
            message: message.into(),
        }
    }

    /// The persisted line for this entry.
    pub fn to_line(&self, document: &str) -> String {
        format!(
            "{} {} {} {}: {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.severity,
            document,
            self.stage,
            self.message
        )
    }
}

/// Ordered entries for one document.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DecisionLog {
    entries: Vec<LogEntry>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: &str, severity: Severity, message: impl Into<String>) {
        self.entries.push(LogEntry::new(stage, severity, message));
    }

    pub fn auto_fix(&mut self, stage: &str, message: impl Into<String>) {
        self.record(stage, Severity::AutoFix, message);
    }

    pub fn warning(&mut self, stage: &str, message: impl Into<String>) {
        self.record(stage, Severity::Warning, message);
    }

    pub fn blocked(&mut self, stage: &str, message: impl Into<String>) {
        self.record(stage, Severity::Blocked, message);
    }

    pub fn summary(&mut self, stage: &str, message: impl Into<String>) {
        self.record(stage, Severity::Summary, message);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }
}

/// Destination for finished decision logs.
///
/// Injected into the gate so tests can substitute [`MemorySink`].
pub trait LogSink: Send + Sync {
    fn append(&self, document: &str, entries: &[LogEntry]) -> Result<(), LogError>;
}

/// Date-partitioned append-only log files in one directory.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(partition_name(date))
    }
}

impl LogSink for FileSink {
    fn append(&self, document: &str, entries: &[LogEntry]) -> Result<(), LogError> {
        if entries.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        fs::create_dir_all(&self.dir)?;

        let mut by_date: BTreeMap<NaiveDate, Vec<&LogEntry>> = BTreeMap::new();
        for entry in entries {
            by_date
                .entry(entry.timestamp.date_naive())
                .or_default()
                .push(entry);
        }
        for (date, day_entries) in by_date {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.partition_path(date))?;
            let mut buf = String::new();
            for entry in day_entries {
                buf.push_str(&entry.to_line(document));
                buf.push('\n');
            }
            file.write_all(buf.as_bytes())?;
        }
        Ok(())
    }
}

/// Keeps persisted lines in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl LogSink for MemorySink {
    fn append(&self, document: &str, entries: &[LogEntry]) -> Result<(), LogError> {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.extend(entries.iter().map(|e| e.to_line(document)));
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn append(&self, _document: &str, _entries: &[LogEntry]) -> Result<(), LogError> {
        Ok(())
    }
}

/// File name of the partition for `date`.
pub fn partition_name(date: NaiveDate) -> String {
    format!(
        "{PARTITION_PREFIX}{}{PARTITION_SUFFIX}",
        date.format("%Y-%m-%d")
    )
}

/// Date of a partition file name, `None` for unrelated files.
pub fn partition_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name
        .strip_prefix(PARTITION_PREFIX)?
        .strip_suffix(PARTITION_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Delete partitions more than `retention_days` days older than `today`.
///
/// Returns the removed paths, oldest first. A missing directory is not an
/// error; unrelated files are never touched.
pub fn sweep(dir: &Path, retention_days: u32, today: NaiveDate) -> Result<Vec<PathBuf>, LogError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut expired = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(date) = partition_date(&name.to_string_lossy()) else {
            continue;
        };
        if (today - date).num_days() > i64::from(retention_days) {
            expired.push((date, entry.path()));
        }
    }
    expired.sort();
    let mut removed = Vec::with_capacity(expired.len());
    for (_, path) in expired {
        fs::remove_file(&path)?;
        removed.push(path);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn entry_at(y: i32, m: u32, d: u32, message: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
            stage: "test".to_string(),
            severity: Severity::Warning,
            message: message.to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn severity_labels() {
        assert_eq!(Severity::AutoFix.to_string(), "AUTO-FIX");
        assert_eq!(Severity::Blocked.to_string(), "BLOCKED");
        assert_eq!(
            serde_json::to_string(&Severity::Summary).unwrap(),
            "\"SUMMARY\""
        );
    }

    #[test]
    fn decision_log_keeps_order() {
        let mut log = DecisionLog::new();
        log.warning("path", "first");
        log.auto_fix("ids", "second");
        log.summary("summary", "third");
        let messages: Vec<&str> = log.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
        assert_eq!(log.count(Severity::AutoFix), 1);
    }

    #[test]
    fn line_format() {
        let line = entry_at(2026, 10, 15, "hello").to_line("blog/a.html");
        assert_eq!(line, "2026-10-15T12:00:00Z WARNING blog/a.html test: hello");
    }

    #[test]
    fn file_sink_appends_across_calls() {
        let tmp = TempDir::new().unwrap();
        let sink = FileSink::new(tmp.path().join("logs"));
        sink.append("a.html", &[entry_at(2026, 10, 15, "one")]).unwrap();
        sink.append("b.html", &[entry_at(2026, 10, 15, "two")]).unwrap();

        let content = fs::read_to_string(sink.partition_path(date(2026, 10, 15))).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("a.html test: one"));
        assert!(lines[1].ends_with("b.html test: two"));
    }

    #[test]
    fn file_sink_partitions_by_entry_date() {
        let tmp = TempDir::new().unwrap();
        let sink = FileSink::new(tmp.path());
        sink.append(
            "a.html",
            &[entry_at(2026, 10, 14, "late"), entry_at(2026, 10, 15, "early")],
        )
        .unwrap();
        assert!(sink.partition_path(date(2026, 10, 14)).exists());
        assert!(sink.partition_path(date(2026, 10, 15)).exists());
    }

    #[test]
    fn partition_names_round_trip() {
        let d = date(2026, 1, 2);
        assert_eq!(partition_name(d), "decisions-2026-01-02.log");
        assert_eq!(partition_date("decisions-2026-01-02.log"), Some(d));
        assert_eq!(partition_date("notes.txt"), None);
    }

    #[test]
    fn sweep_removes_only_expired_partitions() {
        let tmp = TempDir::new().unwrap();
        let today = date(2026, 10, 15);
        for d in [date(2026, 9, 1), date(2026, 9, 15), date(2026, 10, 14)] {
            fs::write(tmp.path().join(partition_name(d)), "x\n").unwrap();
        }
        fs::write(tmp.path().join("README"), "keep").unwrap();

        let removed = sweep(tmp.path(), 30, today).unwrap();
        assert_eq!(removed, vec![tmp.path().join("decisions-2026-09-01.log")]);
        // Exactly 30 days old is kept
        assert!(tmp.path().join("decisions-2026-09-15.log").exists());
        assert!(tmp.path().join("README").exists());
    }

    #[test]
    fn sweep_missing_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let removed = sweep(&tmp.path().join("nope"), 30, date(2026, 1, 1)).unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn memory_sink_collects_lines() {
        let sink = MemorySink::new();
        sink.append("x.html", &[entry_at(2026, 10, 15, "m")]).unwrap();
        assert_eq!(sink.lines().len(), 1);
    }
}
