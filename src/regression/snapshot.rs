//! Persisted metrics of a previous build.
//!
//! A snapshot is captured after a build and compared against on the next
//! one. It is disposable: deleting it only means the next run falls back to
//! the configured baseline.
//!
//! ## Storage
//!
//! Pretty-printed JSON with a `version` field. Unlike a cache, a snapshot
//! from another format version is an error rather than silently ignored: a
//! regression check that quietly compares against nothing would always pass.

use super::{RegressionError, SiteMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Version of the snapshot format. Bump when fields change meaning.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub captured_at: DateTime<Utc>,
    pub sitemap_urls: usize,
    pub feed_items: usize,
    pub published_posts: usize,
    /// Required pages present at capture time.
    pub required_pages: usize,
    /// Post identity → SHA-256 hex of its content.
    pub post_hashes: BTreeMap<String, String>,
}

/// Reads only the version, so a newer format is reported as such instead of
/// as a field mismatch.
#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

impl Snapshot {
    pub fn from_metrics(metrics: &SiteMetrics) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            captured_at: Utc::now(),
            sitemap_urls: metrics.sitemap_urls,
            feed_items: metrics.feed_items,
            published_posts: metrics.published_posts(),
            required_pages: metrics.required_pages_present(),
            post_hashes: metrics.post_hashes.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, RegressionError> {
        let content = fs::read_to_string(path)?;
        let header: VersionHeader = serde_json::from_str(&content)?;
        if header.version != SNAPSHOT_VERSION {
            return Err(RegressionError::SnapshotVersion {
                found: header.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Load `path` if it exists.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, RegressionError> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), RegressionError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
