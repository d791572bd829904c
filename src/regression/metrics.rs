//! Aggregate metrics of a built site.
//!
//! Everything is read from disk under the site root; nothing is written.
//!
//! ## Redirect stubs
//!
//! Moved pages are often left behind as tiny files whose only content is a
//! `<meta http-equiv="refresh">` redirect. They are not content: a stub is
//! neither counted nor hashed as a post, and does not satisfy a required
//! page. Detection is a heuristic (size below
//! `regression.redirect_stub_max_bytes` plus the refresh marker), which is
//! accurate for generated stubs and deliberately ignores hand-written ones.

use super::RegressionError;
use crate::config::RegressionConfig;
use crate::markup;
use crate::naming;
use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::{Html, Selector};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Counts and hashes computed from one built site.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteMetrics {
    pub sitemap_urls: usize,
    pub feed_items: usize,
    /// Published post identity (path under the site root) → SHA-256 hex.
    pub post_hashes: BTreeMap<String, String>,
    /// Required page identity → present (and not a redirect stub).
    pub required_pages: BTreeMap<String, bool>,
    /// Stubs found where posts would be; excluded from everything above.
    pub redirect_stubs: usize,
}

impl SiteMetrics {
    pub fn published_posts(&self) -> usize {
        self.post_hashes.len()
    }

    pub fn required_pages_present(&self) -> usize {
        self.required_pages.values().filter(|present| **present).count()
    }
}

/// Collect every metric for the site at `site_root`.
pub fn collect(
    site_root: &Path,
    settings: &RegressionConfig,
    required_pages: &[String],
) -> Result<SiteMetrics, RegressionError> {
    let mut metrics = SiteMetrics {
        sitemap_urls: count_sitemap_urls(site_root, &settings.sitemap)?,
        feed_items: count_feed_items(&site_root.join(&settings.feed))?,
        ..SiteMetrics::default()
    };

    let post_root = site_root.join(settings.post_dir.trim_matches('/'));
    if post_root.is_dir() {
        for entry in WalkDir::new(&post_root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let identity = identity(site_root, entry.path());
            if naming::post_slug(&identity, &settings.post_dir).is_none() {
                continue;
            }
            if is_redirect_stub(entry.path(), settings.redirect_stub_max_bytes)? {
                debug!(post = %identity, "skipping redirect stub");
                metrics.redirect_stubs += 1;
                continue;
            }
            metrics
                .post_hashes
                .insert(identity, hash_file(entry.path())?);
        }
    } else {
        warn!(dir = %post_root.display(), "post directory not found");
    }

    for page in required_pages {
        let path = site_root.join(page.trim_start_matches('/'));
        let present =
            path.is_file() && !is_redirect_stub(&path, settings.redirect_stub_max_bytes)?;
        metrics.required_pages.insert(page.clone(), present);
    }

    Ok(metrics)
}

/// `/`-separated identity of `path` under `root`.
fn identity(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

static REFRESH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[http-equiv]").expect("valid selector"));

/// A small file whose content is a meta-refresh redirect.
pub fn is_redirect_stub(path: &Path, max_bytes: u64) -> io::Result<bool> {
    if fs::metadata(path)?.len() >= max_bytes {
        return Ok(false);
    }
    let content = String::from_utf8_lossy(&fs::read(path)?).into_owned();
    let document = Html::parse_document(&content);
    Ok(document.select(&REFRESH).any(|meta| {
        meta.value()
            .attr("http-equiv")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
    }))
}

fn xml_error(path: &Path, e: impl fmt::Display) -> RegressionError {
    RegressionError::Xml {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Sitemap URL count, following a sitemap index into local child sitemaps.
/// A missing sitemap counts as zero.
pub fn count_sitemap_urls(site_root: &Path, sitemap: &str) -> Result<usize, RegressionError> {
    let mut pending = vec![site_root.join(sitemap.trim_start_matches('/'))];
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut total = 0;

    while let Some(path) = pending.pop() {
        if !seen.insert(path.clone()) {
            continue;
        }
        if !path.is_file() {
            warn!(sitemap = %path.display(), "sitemap not found; counting zero URLs");
            continue;
        }
        let xml = fs::read_to_string(&path)?;
        let parsed = parse_sitemap(&xml).map_err(|e| xml_error(&path, e))?;
        total += parsed.urls;
        for child in parsed.children {
            match local_path(site_root, &child) {
                Some(child_path) => pending.push(child_path),
                None => warn!(sitemap = %child, "cannot follow child sitemap"),
            }
        }
    }
    Ok(total)
}

#[derive(Debug, Default, PartialEq)]
struct ParsedSitemap {
    /// `<url><loc>` entries.
    urls: usize,
    /// `<sitemap><loc>` targets of a sitemap index.
    children: Vec<String>,
}

fn in_entry_loc(open: &[Vec<u8>]) -> bool {
    match open {
        [.., parent, last] => {
            last.as_slice() == b"loc" && matches!(parent.as_slice(), b"url" | b"sitemap")
        }
        _ => false,
    }
}

fn parse_sitemap(xml: &str) -> Result<ParsedSitemap, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut parsed = ParsedSitemap::default();
    // Local names of the open elements. Only a `loc` whose parent is `url` or
    // `sitemap` counts; `image:loc` and `video:loc` sit deeper.
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut loc = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                open.push(e.local_name().as_ref().to_vec());
                if in_entry_loc(&open) {
                    loc.clear();
                }
            }
            Event::Text(e) if in_entry_loc(&open) => {
                loc.push_str(&e.unescape()?);
            }
            Event::CData(e) if in_entry_loc(&open) => {
                loc.push_str(&String::from_utf8_lossy(&e));
            }
            Event::End(_) => {
                if in_entry_loc(&open) {
                    let target = loc.trim();
                    if !target.is_empty() {
                        match open[open.len() - 2].as_slice() {
                            b"url" => parsed.urls += 1,
                            _ => parsed.children.push(target.to_string()),
                        }
                    }
                }
                open.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(parsed)
}

/// Map a sitemap `<loc>` to a file under the site root. Absolute URLs keep
/// only their path; the host is assumed to be the site's own.
fn local_path(site_root: &Path, loc: &str) -> Option<PathBuf> {
    let url = markup::SITE_BASE.join(loc).ok()?;
    let path = url.path().trim_start_matches('/');
    if path.is_empty() {
        return None;
    }
    // `join` has already resolved dot segments against the root
    Some(site_root.join(path))
}

/// RSS `<item>` or Atom `<entry>` count. A missing feed counts as zero.
pub fn count_feed_items(path: &Path) -> Result<usize, RegressionError> {
    if !path.is_file() {
        warn!(feed = %path.display(), "feed not found; counting zero items");
        return Ok(0);
    }
    let xml = fs::read_to_string(path)?;
    parse_feed(&xml).map_err(|e| xml_error(path, e))
}

fn parse_feed(xml: &str) -> Result<usize, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut count = 0;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e)
                if matches!(e.local_name().as_ref(), b"item" | b"entry") =>
            {
                count += 1;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn urlset(n: usize) -> String {
        let urls: String = (0..n)
            .map(|i| format!("<url><loc>https://example.com/p/{i}/</loc></url>"))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{urls}</urlset>"#
        )
    }

    const STUB: &str = r#"<!DOCTYPE html><meta http-equiv="refresh" content="0; url=/blog/new/">"#;

    #[test]
    fn urlset_counts_loc_entries() {
        let parsed = parse_sitemap(&urlset(3)).unwrap();
        assert_eq!(parsed.urls, 3);
        assert!(parsed.children.is_empty());
    }

    #[test]
    fn image_locs_are_not_urls() {
        let xml = r#"<urlset xmlns:image="http://www.google.com/schemas/sitemap-image/1.1"><url><loc>https://example.com/gallery/</loc><image:image><image:loc>https://example.com/a.jpg</image:loc></image:image><image:image><image:loc>https://example.com/b.jpg</image:loc></image:image></url></urlset>"#;
        assert_eq!(parse_sitemap(xml).unwrap().urls, 1);
    }

    #[test]
    fn child_sitemap_paths() {
        let root = Path::new("/site");
        assert_eq!(
            local_path(root, "https://example.com/sitemaps/posts.xml?v=2"),
            Some(root.join("sitemaps/posts.xml"))
        );
        assert_eq!(
            local_path(root, "/sitemaps/pages.xml"),
            Some(root.join("sitemaps/pages.xml"))
        );
        assert_eq!(
            local_path(root, "../../etc/passwd"),
            Some(root.join("etc/passwd"))
        );
        assert_eq!(local_path(root, "https://example.com/"), None);
    }

    #[test]
    fn url_without_loc_not_counted() {
        let parsed = parse_sitemap("<urlset><url><lastmod>x</lastmod></url><url><loc> </loc></url></urlset>").unwrap();
        assert_eq!(parsed.urls, 0);
    }

    #[test]
    fn sitemap_index_followed() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "sitemap.xml",
            r#"<sitemapindex><sitemap><loc>https://example.com/sitemaps/posts.xml</loc></sitemap><sitemap><loc>/sitemaps/pages.xml</loc></sitemap><sitemap><loc>https://example.com/sitemap.xml</loc></sitemap></sitemapindex>"#,
        );
        write(tmp.path(), "sitemaps/posts.xml", &urlset(5));
        write(tmp.path(), "sitemaps/pages.xml", &urlset(2));
        assert_eq!(count_sitemap_urls(tmp.path(), "sitemap.xml").unwrap(), 7);
    }

    #[test]
    fn missing_sitemap_counts_zero() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(count_sitemap_urls(tmp.path(), "sitemap.xml").unwrap(), 0);
    }

    #[test]
    fn malformed_sitemap_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "sitemap.xml", "<urlset><url><loc>x</url></urlset>");
        assert!(matches!(
            count_sitemap_urls(tmp.path(), "sitemap.xml"),
            Err(RegressionError::Xml { .. })
        ));
    }

    #[test]
    fn rss_and_atom_feeds() {
        assert_eq!(
            parse_feed("<rss><channel><item><title>a</title></item><item/></channel></rss>").unwrap(),
            2
        );
        assert_eq!(
            parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry></entry><entry></entry><entry></entry></feed>"#).unwrap(),
            3
        );
    }

    #[test]
    fn redirect_stub_detection() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "stub.html", STUB);
        write(tmp.path(), "real.html", "<p>real</p>");
        let big = format!("{STUB}{}", "x".repeat(4096));
        write(tmp.path(), "big.html", &big);
        assert!(is_redirect_stub(&tmp.path().join("stub.html"), 2048).unwrap());
        assert!(!is_redirect_stub(&tmp.path().join("real.html"), 2048).unwrap());
        assert!(!is_redirect_stub(&tmp.path().join("big.html"), 2048).unwrap());
    }

    #[test]
    fn collect_counts_posts_and_pages() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "sitemap.xml", &urlset(4));
        write(root, "feed.xml", "<rss><channel><item/><item/></channel></rss>");
        write(root, "index.html", "<p>home</p>");
        write(root, "about/index.html", STUB);
        write(root, "blog/index.html", "<p>listing</p>");
        write(root, "blog/first/index.html", "<p>first</p>");
        write(root, "blog/second.html", "<p>second</p>");
        write(root, "blog/moved/index.html", STUB);
        write(root, "blog/tags/index.html", "<p>tags</p>");
        write(root, "blog/first/cover.jpg", "jpeg");

        let required = vec![
            "index.html".to_string(),
            "about/index.html".to_string(),
            "blog/index.html".to_string(),
        ];
        let m = collect(root, &RegressionConfig::default(), &required).unwrap();

        assert_eq!(m.sitemap_urls, 4);
        assert_eq!(m.feed_items, 2);
        assert_eq!(
            m.post_hashes.keys().collect::<Vec<_>>(),
            vec!["blog/first/index.html", "blog/second.html"]
        );
        assert_eq!(m.redirect_stubs, 1);
        assert!(!m.required_pages["about/index.html"]);
        assert_eq!(m.required_pages_present(), 2);
        assert_eq!(m.post_hashes["blog/second.html"].len(), 64);
    }

    #[test]
    fn hash_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("p.html");
        fs::write(&path, "version 1").unwrap();
        let h1 = hash_file(&path).unwrap();
        fs::write(&path, "version 2").unwrap();
        assert_ne!(h1, hash_file(&path).unwrap());
    }
}
