//! Destination path normalization.
//!
//! The upstream pipeline occasionally misroutes pages in two known ways:
//!
//! ```text
//! blog/blog/my-post/index.html   → blog/my-post/index.html    (directory doubled)
//! posts/my-post/index.html       → blog/posts/my-post/index.html (root omitted)
//! ```
//!
//! Normalization runs before anything else so every later stage, and every
//! caller that writes the page, sees the corrected identity. Paths that match
//! neither pattern pass through byte-for-byte.

use crate::config::PathsConfig;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathCorrection {
    /// A directory segment repeated immediately beneath itself.
    DuplicatedDirectory { segment: String },
    /// A directory that only lives under `root` appeared at the top level.
    MissingRoot { root: String, child: String },
}

impl fmt::Display for PathCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathCorrection::DuplicatedDirectory { segment } => {
                write!(f, "duplicated directory '{segment}/{segment}/'")
            }
            PathCorrection::MissingRoot { root, child } => {
                write!(f, "'{child}/' belongs under '{root}/'")
            }
        }
    }
}

/// Result of normalizing one destination identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPath {
    pub original: String,
    pub path: String,
    pub corrections: Vec<PathCorrection>,
}

impl NormalizedPath {
    pub fn changed(&self) -> bool {
        !self.corrections.is_empty()
    }
}

/// Normalize a destination identity against the configured routes.
pub fn normalize(destination: &str, config: &PathsConfig) -> NormalizedPath {
    let leading_slash = destination.starts_with('/');
    let body = destination.trim_start_matches('/');
    let mut segments: Vec<&str> = body.split('/').collect();
    let mut corrections = Vec::new();

    // Only directories are compared; the last segment is the file.
    let mut i = 1;
    while i + 1 < segments.len() {
        if !segments[i].is_empty() && segments[i] == segments[i - 1] {
            corrections.push(PathCorrection::DuplicatedDirectory {
                segment: segments[i].to_string(),
            });
            segments.remove(i);
        } else {
            i += 1;
        }
    }

    if segments.len() > 1 {
        let first = segments[0];
        let route = config
            .routes
            .iter()
            .find(|r| r.root != first && r.children.iter().any(|c| c == first));
        if let Some(route) = route {
            corrections.push(PathCorrection::MissingRoot {
                root: route.root.clone(),
                child: first.to_string(),
            });
            segments.insert(0, route.root.as_str());
        }
    }

    let path = if corrections.is_empty() {
        destination.to_string()
    } else {
        let joined = segments.join("/");
        if leading_slash {
            format!("/{joined}")
        } else {
            joined
        }
    };

    NormalizedPath {
        original: destination.to_string(),
        path,
        corrections,
    }
}
