//! Gate configuration module.
//!
//! Handles loading, validating, and merging the `pagegate.toml` file. Stock
//! defaults are the base layer; the user file only needs the keys it wants to
//! override.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! base_url = "https://example.com"      # Used to build canonical links
//! # host = "example.com"                # Defaults to the base_url host
//! content_markers = ["post-content", "article-body", "entry-content"]
//! route_prefixes = ["blog", "pages"]    # Collapsed when doubled in link paths
//!
//! [rules]
//! min_words = 200
//! article_required_fields = ["headline", "author", "publisher", "datePublished"]
//! extra_placeholder_patterns = []
//!
//! [metadata]
//! description_min = 150
//! description_max = 160
//!
//! [[paths.routes]]
//! root = "blog"
//! children = ["posts", "tags", "category", "page"]
//!
//! [log]
//! dir = "logs/pagegate"
//! retention_days = 30
//!
//! [regression]
//! sitemap = "sitemap.xml"
//! feed = "feed.xml"
//! post_dir = "blog"
//! redirect_stub_max_bytes = 2048
//!
//! [baseline]
//! min_sitemap_urls = 0
//! min_feed_items = 0
//! min_published_posts = 0
//! required_pages = ["index.html", "about/index.html", "blog/index.html"]
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::markup;
use crate::regression::Baseline;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILENAME: &str = "pagegate.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gate configuration loaded from `pagegate.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Deployment identity and content conventions.
    pub site: SiteSettings,
    /// Blocking rule thresholds.
    pub rules: RulesConfig,
    /// Metadata synthesis settings.
    pub metadata: MetadataConfig,
    /// Destination path correction rules.
    pub paths: PathsConfig,
    /// Persisted decision log settings.
    pub log: LogConfig,
    /// Where the regression gate finds aggregate site files.
    pub regression: RegressionConfig,
    /// Minimum site metrics. Raise it when posts are added; never lower it.
    pub baseline: Baseline,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl GateConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.site.base_url.as_str();
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ConfigError::Validation(
                "site.base_url must be an absolute http(s) URL".into(),
            ));
        }
        if self.site.canonical_host().is_empty() {
            return Err(ConfigError::Validation(
                "site.host could not be derived from site.base_url".into(),
            ));
        }
        if self.rules.min_words == 0 {
            return Err(ConfigError::Validation(
                "rules.min_words must be greater than zero".into(),
            ));
        }
        for pattern in &self.rules.extra_placeholder_patterns {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!(
                    "rules.extra_placeholder_patterns: invalid pattern `{pattern}`: {e}"
                ))
            })?;
        }
        if self.metadata.description_min == 0
            || self.metadata.description_min > self.metadata.description_max
        {
            return Err(ConfigError::Validation(
                "metadata.description_min must be non-zero and <= description_max".into(),
            ));
        }
        if self.paths.routes.iter().any(|r| r.root.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "paths.routes entries must name a root directory".into(),
            ));
        }
        if self.log.retention_days == 0 {
            return Err(ConfigError::Validation(
                "log.retention_days must be greater than zero".into(),
            ));
        }
        if self.regression.post_dir.trim().is_empty() {
            return Err(ConfigError::Validation(
                "regression.post_dir must not be empty".into(),
            ));
        }
        if let Some(min) = self.baseline.min_required_pages
            && min > self.baseline.required_pages.len()
        {
            return Err(ConfigError::Validation(format!(
                "baseline.min_required_pages ({min}) exceeds the number of required_pages ({})",
                self.baseline.required_pages.len()
            )));
        }
        Ok(())
    }
}

/// Deployment identity and content conventions shared by every rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSettings {
    /// Base deployment URL, e.g. `https://example.com`.
    pub base_url: String,
    /// Canonical host used to classify links. Derived from `base_url` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Class names marking the primary content wrapper of long-form pages.
    pub content_markers: Vec<String>,
    /// Route prefixes collapsed when doubled in link targets (`/blog/blog/`).
    pub route_prefixes: Vec<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            base_url: "https://example.com".to_string(),
            host: None,
            content_markers: vec![
                "post-content".to_string(),
                "article-body".to_string(),
                "entry-content".to_string(),
            ],
            route_prefixes: vec!["blog".to_string(), "pages".to_string()],
        }
    }
}

impl SiteSettings {
    /// The host links are compared against: lowercase, without `www.`.
    pub fn canonical_host(&self) -> String {
        let raw = match &self.host {
            Some(h) if !h.trim().is_empty() => h.trim().to_ascii_lowercase(),
            _ => markup::url_host(&self.base_url).unwrap_or_default(),
        };
        markup::bare_host(&raw).to_string()
    }
}

/// Blocking rule thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RulesConfig {
    /// Minimum words in the content region of long-form pages (inclusive).
    pub min_words: usize,
    /// Fields every `Article` structured-data node must carry.
    pub article_required_fields: Vec<String>,
    /// Extra placeholder syntaxes, as regular expressions.
    pub extra_placeholder_patterns: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            min_words: 200,
            article_required_fields: vec![
                "headline".to_string(),
                "author".to_string(),
                "publisher".to_string(),
                "datePublished".to_string(),
            ],
            extra_placeholder_patterns: Vec::new(),
        }
    }
}

/// Metadata synthesis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataConfig {
    /// Lower bound of the synthesized description window, in characters.
    pub description_min: usize,
    /// Upper bound of the synthesized description window, in characters.
    pub description_max: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            description_min: 150,
            description_max: 160,
        }
    }
}

/// A required top-level directory and the directories that only live beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub root: String,
    #[serde(default)]
    pub children: Vec<String>,
}

/// Destination path correction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub routes: Vec<RouteConfig>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            routes: vec![RouteConfig {
                root: "blog".to_string(),
                children: vec![
                    "posts".to_string(),
                    "tags".to_string(),
                    "category".to_string(),
                    "page".to_string(),
                ],
            }],
        }
    }
}

/// Persisted decision log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Directory holding the date-partitioned log files.
    pub dir: PathBuf,
    /// Partitions older than this many days are removed by `sweep-logs`.
    pub retention_days: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs/pagegate"),
            retention_days: 30,
        }
    }
}

/// Locations of the aggregate files inspected by the regression gate,
/// relative to the built site root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegressionConfig {
    pub sitemap: String,
    pub feed: String,
    /// Directory holding published posts.
    pub post_dir: String,
    /// Files at or above this size are never treated as redirect stubs.
    pub redirect_stub_max_bytes: u64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            sitemap: "sitemap.xml".to_string(),
            feed: "feed.xml".to_string(),
            post_dir: "blog".to_string(),
            redirect_stub_max_bytes: 2048,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel validation workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GateConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay (including arrays) replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GateConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GateConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, layered over stock defaults.
///
/// A missing file yields the (validated) defaults.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `pagegate.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# pagegate Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Site identity
# ---------------------------------------------------------------------------
[site]
# Base deployment URL. Canonical links are built from it.
base_url = "https://example.com"

# Host used to tell internal links from external ones.
# Defaults to the host of base_url; a leading "www." is ignored.
# host = "example.com"

# Class names that mark the primary content wrapper of long-form pages.
# Pages without one of these wrappers are exempt from the word-count rule.
content_markers = ["post-content", "article-body", "entry-content"]

# Route prefixes collapsed when doubled in link targets (/blog/blog/ -> /blog/).
route_prefixes = ["blog", "pages"]

# ---------------------------------------------------------------------------
# Blocking rules
# ---------------------------------------------------------------------------
[rules]
# Minimum word count of the content region (inclusive).
min_words = 200

# Fields every Article structured-data node must carry.
article_required_fields = ["headline", "author", "publisher", "datePublished"]

# Extra placeholder syntaxes to block on, as regular expressions.
extra_placeholder_patterns = []

# ---------------------------------------------------------------------------
# Metadata synthesis
# ---------------------------------------------------------------------------
[metadata]
# Target window for synthesized meta descriptions, in characters.
description_min = 150
description_max = 160

# ---------------------------------------------------------------------------
# Destination path correction
# ---------------------------------------------------------------------------
# A path whose first directory is one of `children` is re-rooted under `root`.
[[paths.routes]]
root = "blog"
children = ["posts", "tags", "category", "page"]

# ---------------------------------------------------------------------------
# Decision log
# ---------------------------------------------------------------------------
[log]
dir = "logs/pagegate"
# Partitions older than this are removed by `pagegate sweep-logs`.
retention_days = 30

# ---------------------------------------------------------------------------
# Regression gate (paths relative to the built site)
# ---------------------------------------------------------------------------
[regression]
sitemap = "sitemap.xml"
feed = "feed.xml"
post_dir = "blog"
# Files smaller than this containing a meta refresh are redirect stubs.
redirect_stub_max_bytes = 2048

# ---------------------------------------------------------------------------
# Baseline minimums. Raise when content is added; never lower to pass a build.
# ---------------------------------------------------------------------------
[baseline]
min_sitemap_urls = 0
min_feed_items = 0
min_published_posts = 0
# Defaults to the number of required_pages.
# min_required_pages = 3
required_pages = ["index.html", "about/index.html", "blog/index.html"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel validation workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
