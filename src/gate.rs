//! Per-document pipeline, batch validation, and publishing.
//!
//! ```text
//! Document ─► paths::normalize ─► facts::extract ─► blocking::evaluate
//!                                                       │
//!                               defects? ── yes ──► Blocked { reasons, log }
//!                                   │
//!                                   no ──► fixes::run_chain ──► Fixed { content, corrected_path, log }
//! ```
//!
//! [`Gate::validate`] is a pure function of the document and configuration,
//! apart from appending the finished log to the injected [`LogSink`]. The
//! only way onto disk is [`publish`], which writes `Fixed` outcomes and
//! ignores `Blocked` ones, so a blocked page can never be deployed.
//!
//! ## Batches
//!
//! [`Gate::run_batch`] walks a staging directory, treats each HTML file's path
//! relative to the staging root as its requested destination, and validates
//! files in parallel on the global rayon pool. Unreadable files, non-UTF-8
//! content, unsafe destinations, and write failures skip that one document
//! with a `WARNING` in the sink; the rest of the batch carries on.

use crate::blocking::{self, BlockingDefect};
use crate::config::GateConfig;
use crate::decision_log::{DecisionLog, LogEntry, LogSink, Severity};
use crate::facts;
use crate::fixes::{self, FixContext};
use crate::paths;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const PATH_STAGE: &str = "paths";
const EXTRACT_STAGE: &str = "extract";
const BLOCKING_STAGE: &str = "blocking";
const PUBLISH_STAGE: &str = "publish";

#[derive(Error, Debug)]
pub enum GateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{0}: content is not valid UTF-8")]
    NotUtf8(PathBuf),
    #[error("Unsafe destination '{0}': must stay inside the site root")]
    UnsafeDestination(String),
}

/// A generated page on its way to the site.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    /// Requested destination identity, e.g. `blog/my-post/index.html`.
    pub destination: String,
}

impl Document {
    pub fn new(content: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            destination: destination.into(),
        }
    }

    /// Read a staged file; `destination` is its identity under the site root.
    pub fn load(path: &Path, destination: impl Into<String>) -> Result<Self, GateError> {
        let bytes = fs::read(path)?;
        let content = String::from_utf8(bytes).map_err(|_| GateError::NotUtf8(path.to_path_buf()))?;
        Ok(Self::new(content, destination))
    }
}

/// Result of validating one document.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// Never written. Every reason is listed.
    Blocked {
        reasons: Vec<BlockingDefect>,
        log: DecisionLog,
    },
    /// Repaired content, ready to write at `corrected_path`.
    Fixed {
        content: String,
        corrected_path: String,
        log: DecisionLog,
    },
}

impl ValidationOutcome {
    pub fn log(&self) -> &DecisionLog {
        match self {
            ValidationOutcome::Blocked { log, .. } | ValidationOutcome::Fixed { log, .. } => log,
        }
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, ValidationOutcome::Blocked { .. })
    }
}

/// The content gate: configuration plus the sink finished logs go to.
pub struct Gate<'a> {
    config: &'a GateConfig,
    sink: &'a dyn LogSink,
}

impl<'a> Gate<'a> {
    pub fn new(config: &'a GateConfig, sink: &'a dyn LogSink) -> Self {
        Self { config, sink }
    }

    /// Validate one document and persist its decision log.
    pub fn validate(&self, document: &Document) -> ValidationOutcome {
        let mut log = DecisionLog::new();

        let normalized = paths::normalize(&document.destination, &self.config.paths);
        for correction in &normalized.corrections {
            log.warning(
                PATH_STAGE,
                format!(
                    "{correction}; '{}' corrected to '{}'",
                    normalized.original, normalized.path
                ),
            );
        }

        let facts = facts::extract(&document.content, &self.config.site);
        for warning in &facts.warnings {
            log.warning(EXTRACT_STAGE, warning.as_str());
        }

        let reasons = blocking::evaluate(&document.content, &facts, &self.config.rules);
        let outcome = if reasons.is_empty() {
            let ctx = FixContext {
                config: self.config,
                destination: &normalized.path,
            };
            let content = fixes::run_chain(&document.content, &ctx, &mut log);
            ValidationOutcome::Fixed {
                content,
                corrected_path: normalized.path.clone(),
                log,
            }
        } else {
            for reason in &reasons {
                log.blocked(BLOCKING_STAGE, reason.to_string());
            }
            log.summary(
                fixes::SUMMARY_STAGE,
                format!("blocked by {} rule(s); not published", reasons.len()),
            );
            ValidationOutcome::Blocked { reasons, log }
        };

        debug!(
            document = %normalized.path,
            blocked = outcome.is_blocked(),
            entries = outcome.log().entries().len(),
            "validated document"
        );
        self.persist(&normalized.path, outcome.log().entries());
        outcome
    }

    fn persist(&self, document: &str, entries: &[LogEntry]) {
        if let Err(e) = self.sink.append(document, entries) {
            warn!(document, error = %e, "failed to persist decision log");
        }
    }

    /// Validate and publish every HTML file under `staging` into `site_root`.
    pub fn run_batch(&self, staging: &Path, site_root: &Path) -> Result<BatchSummary, GateError> {
        let files = staged_files(staging)?;
        info!(
            count = files.len(),
            staging = %staging.display(),
            "validating staged documents"
        );

        let reports: Vec<DocumentReport> = files
            .par_iter()
            .map(|(path, destination)| self.process_file(path, destination, site_root))
            .collect();

        let summary = BatchSummary { reports };
        info!(
            published = summary.published(),
            blocked = summary.blocked(),
            skipped = summary.skipped(),
            "batch complete"
        );
        Ok(summary)
    }

    fn process_file(&self, path: &Path, destination: &str, site_root: &Path) -> DocumentReport {
        let result = Document::load(path, destination).and_then(|document| {
            let outcome = self.validate(&document);
            let written = publish(&outcome, site_root)?;
            Ok(DocumentReport::from_outcome(destination, &outcome, written))
        });
        match result {
            Ok(report) => report,
            Err(e) => {
                warn!(document = destination, error = %e, "skipping document");
                let entry = LogEntry::new(PUBLISH_STAGE, Severity::Warning, format!("skipped: {e}"));
                self.persist(destination, std::slice::from_ref(&entry));
                DocumentReport {
                    destination: destination.to_string(),
                    status: DocumentStatus::Skipped,
                    corrected_path: None,
                    written: None,
                    fixes: 0,
                    warnings: 1,
                    reasons: vec![e.to_string()],
                }
            }
        }
    }
}

/// Write a `Fixed` outcome under `site_root`. `Blocked` writes nothing.
///
/// Returns the written path.
pub fn publish(outcome: &ValidationOutcome, site_root: &Path) -> Result<Option<PathBuf>, GateError> {
    let ValidationOutcome::Fixed {
        content,
        corrected_path,
        ..
    } = outcome
    else {
        return Ok(None);
    };
    let relative = safe_relative(corrected_path)?;
    let target = site_root.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, content)?;
    Ok(Some(target))
}

/// The destination as a relative path, or an error if it could escape the
/// site root. One leading `/` (site-rooted identity) is accepted.
fn safe_relative(destination: &str) -> Result<PathBuf, GateError> {
    let trimmed = destination.strip_prefix('/').unwrap_or(destination);
    let path = Path::new(trimmed);
    let safe = !trimmed.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(path.to_path_buf())
    } else {
        Err(GateError::UnsafeDestination(destination.to_string()))
    }
}

/// HTML files under `staging` with their `/`-separated relative identities,
/// sorted by path.
pub fn staged_files(staging: &Path) -> Result<Vec<(PathBuf, String)>, GateError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(staging).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_html = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
        if !is_html {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(staging) else {
            continue;
        };
        let identity = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), identity));
    }
    Ok(files)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Published,
    Blocked,
    Skipped,
}

/// What happened to one staged document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Requested destination identity.
    pub destination: String,
    pub status: DocumentStatus,
    /// Destination after path correction, for published documents.
    pub corrected_path: Option<String>,
    /// Path written, for published documents.
    pub written: Option<PathBuf>,
    pub fixes: usize,
    pub warnings: usize,
    /// Blocking reasons, or the skip error.
    pub reasons: Vec<String>,
}

impl DocumentReport {
    fn from_outcome(destination: &str, outcome: &ValidationOutcome, written: Option<PathBuf>) -> Self {
        let log = outcome.log();
        let (status, corrected_path, reasons) = match outcome {
            ValidationOutcome::Blocked { reasons, .. } => (
                DocumentStatus::Blocked,
                None,
                reasons.iter().map(ToString::to_string).collect(),
            ),
            ValidationOutcome::Fixed { corrected_path, .. } => (
                DocumentStatus::Published,
                Some(corrected_path.clone()),
                Vec::new(),
            ),
        };
        Self {
            destination: destination.to_string(),
            status,
            corrected_path,
            written,
            fixes: log.count(Severity::AutoFix),
            warnings: log.count(Severity::Warning),
            reasons,
        }
    }
}

/// Per-document reports for one batch, in staging path order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub reports: Vec<DocumentReport>,
}

impl BatchSummary {
    fn count(&self, status: DocumentStatus) -> usize {
        self.reports.iter().filter(|r| r.status == status).count()
    }

    pub fn published(&self) -> usize {
        self.count(DocumentStatus::Published)
    }

    pub fn blocked(&self) -> usize {
        self.count(DocumentStatus::Blocked)
    }

    pub fn skipped(&self) -> usize {
        self.count(DocumentStatus::Skipped)
    }

    /// Nothing was blocked or skipped.
    pub fn is_clean(&self) -> bool {
        self.blocked() == 0 && self.skipped() == 0
    }
}
