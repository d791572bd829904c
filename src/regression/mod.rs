//! Baseline Regression Gate.
//!
//! Runs once per full site build, over the files already written. It never
//! repairs anything; it reports whether the site lost content compared with
//! either a configured floor ([`Baseline`]) or the previous build
//! ([`Snapshot`]).
//!
//! ## Metrics
//!
//! | Metric | Source |
//! |--------|--------|
//! | Sitemap URLs | `<url><loc>` entries, following a sitemap index into local children |
//! | Feed items | RSS `<item>` or Atom `<entry>` elements |
//! | Published posts | files matching the post naming convention, redirect stubs excluded |
//! | Required pages | configured identities that exist and are not redirect stubs |
//!
//! ## Failure semantics
//!
//! Only loss fails. A count below its minimum (baseline mode) or below its
//! previous value (snapshot mode) fails; so does a missing required page (in
//! either mode) and a previously hashed post that no longer exists. A post whose hash changed is reported as `modified` and a
//! new post as `added`; neither fails the gate, since editing and publishing
//! are expected.
//!
//! This is a coarse detector: a page replaced by different but equally long
//! content passes.

pub mod metrics;
pub mod snapshot;

pub use metrics::{SiteMetrics, collect};
pub use snapshot::Snapshot;

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegressionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("XML error in {path}: {message}")]
    Xml { path: PathBuf, message: String },
    #[error("Snapshot format version {found} is not supported (expected {expected})")]
    SnapshotVersion { found: u32, expected: u32 },
}

/// Minimum site metrics, authored in configuration.
///
/// Raise it when content is added; never lower it to get a build through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Baseline {
    pub min_sitemap_urls: usize,
    pub min_feed_items: usize,
    pub min_published_posts: usize,
    /// How many of `required_pages` must exist. Defaults to all of them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_required_pages: Option<usize>,
    /// Page identities relative to the site root.
    pub required_pages: Vec<String>,
}

impl Default for Baseline {
    fn default() -> Self {
        Self {
            min_sitemap_urls: 0,
            min_feed_items: 0,
            min_published_posts: 0,
            min_required_pages: None,
            required_pages: vec![
                "index.html".to_string(),
                "about/index.html".to_string(),
                "blog/index.html".to_string(),
            ],
        }
    }
}

/// What the metrics were compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    Baseline,
    Snapshot,
}

/// One itemized comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub expected: usize,
    pub actual: usize,
    pub passed: bool,
    /// Loss description for failures, e.g. "lost 2 URLs".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionReport {
    pub mode: ComparisonMode,
    pub checks: Vec<CheckResult>,
    /// Previously hashed posts that no longer exist.
    pub removed: Vec<String>,
    /// Posts whose content hash changed.
    pub modified: Vec<String>,
    /// Posts not present in the previous snapshot.
    pub added: Vec<String>,
}

impl RegressionReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

fn plural(noun: &str, n: usize) -> String {
    if n == 1 {
        noun.to_string()
    } else {
        format!("{noun}s")
    }
}

fn count_check(
    mode: ComparisonMode,
    name: &str,
    noun: &str,
    expected: usize,
    actual: usize,
) -> CheckResult {
    let passed = actual >= expected;
    let detail = (!passed).then(|| {
        let gap = expected - actual;
        match mode {
            ComparisonMode::Snapshot => format!("lost {gap} {}", plural(noun, gap)),
            ComparisonMode::Baseline => {
                format!("{gap} {} below the baseline", plural(noun, gap))
            }
        }
    });
    CheckResult {
        name: name.to_string(),
        expected,
        actual,
        passed,
        detail,
    }
}

/// Every page in `pages` is checked for presence; `minimum` defaults to all
/// of them. Failures list the missing identities.
fn required_pages_check<'a>(
    mode: ComparisonMode,
    pages: impl IntoIterator<Item = (&'a str, bool)>,
    minimum: Option<usize>,
) -> CheckResult {
    let mut total = 0;
    let mut missing = Vec::new();
    for (page, present) in pages {
        total += 1;
        if !present {
            missing.push(page);
        }
    }
    let mut check = count_check(
        mode,
        "required pages",
        "page",
        minimum.unwrap_or(total),
        total - missing.len(),
    );
    if !check.passed {
        check.detail = Some(format!("missing: {}", missing.join(", ")));
    }
    check
}

/// Compare metrics against the configured floor.
pub fn check_baseline(metrics: &SiteMetrics, baseline: &Baseline) -> RegressionReport {
    let mode = ComparisonMode::Baseline;
    let pages = required_pages_check(
        mode,
        baseline.required_pages.iter().map(|p| {
            let present = metrics.required_pages.get(p).copied().unwrap_or(false);
            (p.as_str(), present)
        }),
        baseline.min_required_pages,
    );

    RegressionReport {
        mode,
        checks: vec![
            count_check(
                mode,
                "sitemap URLs",
                "URL",
                baseline.min_sitemap_urls,
                metrics.sitemap_urls,
            ),
            count_check(
                mode,
                "feed items",
                "item",
                baseline.min_feed_items,
                metrics.feed_items,
            ),
            count_check(
                mode,
                "published posts",
                "post",
                baseline.min_published_posts,
                metrics.published_posts(),
            ),
            pages,
        ],
        removed: Vec::new(),
        modified: Vec::new(),
        added: Vec::new(),
    }
}

/// Compare metrics against the previous build's snapshot.
pub fn check_snapshot(metrics: &SiteMetrics, previous: &Snapshot) -> RegressionReport {
    let mode = ComparisonMode::Snapshot;
    let mut removed = Vec::new();
    let mut modified = Vec::new();
    for (post, old_hash) in &previous.post_hashes {
        match metrics.post_hashes.get(post) {
            None => removed.push(post.clone()),
            Some(hash) if hash != old_hash => modified.push(post.clone()),
            Some(_) => {}
        }
    }
    let added: Vec<String> = metrics
        .post_hashes
        .keys()
        .filter(|p| !previous.post_hashes.contains_key(*p))
        .cloned()
        .collect();

    let previous_posts = previous.post_hashes.len();
    let mut retained = count_check(
        mode,
        "posts retained",
        "post",
        previous_posts,
        previous_posts - removed.len(),
    );
    if !removed.is_empty() {
        retained.detail = Some(format!(
            "lost {} {}: {}",
            removed.len(),
            plural("post", removed.len()),
            removed.join(", ")
        ));
    }

    RegressionReport {
        mode,
        checks: vec![
            count_check(
                mode,
                "sitemap URLs",
                "URL",
                previous.sitemap_urls,
                metrics.sitemap_urls,
            ),
            count_check(
                mode,
                "feed items",
                "item",
                previous.feed_items,
                metrics.feed_items,
            ),
            count_check(
                mode,
                "published posts",
                "post",
                previous.published_posts,
                metrics.published_posts(),
            ),
            required_pages_check(
                mode,
                metrics
                    .required_pages
                    .iter()
                    .map(|(page, present)| (page.as_str(), *present)),
                None,
            ),
            retained,
        ],
        removed,
        modified,
        added,
    }
}
