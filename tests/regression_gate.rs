//! Regression gate against a built site on disk.

use pagegate::config::GateConfig;
use pagegate::regression::{self, SiteMetrics, Snapshot};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sitemap(urls: usize) -> String {
    let entries: String = (0..urls)
        .map(|i| format!("  <url><loc>https://example.com/page-{i}/</loc></url>\n"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n{entries}</urlset>\n"
    )
}

fn feed(items: usize) -> String {
    let entries: String = (0..items)
        .map(|i| format!("<item><title>Post {i}</title><link>https://example.com/blog/post-{i}/</link></item>"))
        .collect();
    format!("<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>Example</title>{entries}</channel></rss>")
}

/// A built site with `urls` sitemap entries, `items` feed items, and `posts`
/// published posts, plus every default required page.
fn build_site(root: &Path, urls: usize, items: usize, posts: usize) {
    write(root, "sitemap.xml", &sitemap(urls));
    write(root, "feed.xml", &feed(items));
    for i in 0..posts {
        write(
            root,
            &format!("blog/post-{i:02}/index.html"),
            &format!("<html><body><h1>Post {i}</h1><p>Body of post {i}.</p></body></html>"),
        );
    }
    write(root, "index.html", "<html><body>Home</body></html>");
    write(root, "about/index.html", "<html><body>About</body></html>");
    write(root, "blog/index.html", "<html><body>All posts</body></html>");
}

fn metrics(root: &Path) -> SiteMetrics {
    let config = GateConfig::default();
    regression::collect(root, &config.regression, &config.baseline.required_pages).unwrap()
}

#[test]
fn collects_counts_from_built_site() {
    let site = TempDir::new().unwrap();
    build_site(site.path(), 12, 5, 4);

    let m = metrics(site.path());
    assert_eq!(m.sitemap_urls, 12);
    assert_eq!(m.feed_items, 5);
    // blog/index.html is a listing page, not a post
    assert_eq!(m.published_posts(), 4);
    assert_eq!(m.required_pages_present(), 3);
}

#[test]
fn lost_sitemap_urls_fail_against_snapshot() {
    let site = TempDir::new().unwrap();
    let state = TempDir::new().unwrap();
    let snapshot_path = state.path().join("pagegate-snapshot.json");

    build_site(site.path(), 120, 40, 38);
    Snapshot::from_metrics(&metrics(site.path()))
        .save(&snapshot_path)
        .unwrap();

    write(site.path(), "sitemap.xml", &sitemap(118));
    let previous = Snapshot::load(&snapshot_path).unwrap();
    let report = regression::check_snapshot(&metrics(site.path()), &previous);

    assert!(!report.passed());
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "sitemap URLs");
    assert_eq!((failures[0].expected, failures[0].actual), (120, 118));
    assert_eq!(failures[0].detail.as_deref(), Some("lost 2 URLs"));
}

#[test]
fn post_replaced_by_redirect_stub_counts_as_removed() {
    let site = TempDir::new().unwrap();
    build_site(site.path(), 10, 3, 3);
    let previous = Snapshot::from_metrics(&metrics(site.path()));

    write(
        site.path(),
        "blog/post-01/index.html",
        r#"<html><head><meta http-equiv="refresh" content="0; url=/blog/post-02/"></head></html>"#,
    );
    let now = metrics(site.path());
    assert_eq!(now.redirect_stubs, 1);

    let report = regression::check_snapshot(&now, &previous);
    assert!(!report.passed());
    assert_eq!(report.removed, vec!["blog/post-01/index.html"]);
}

#[test]
fn edited_and_new_posts_pass() {
    let site = TempDir::new().unwrap();
    build_site(site.path(), 10, 3, 3);
    let previous = Snapshot::from_metrics(&metrics(site.path()));

    write(
        site.path(),
        "blog/post-00/index.html",
        "<html><body><h1>Post 0</h1><p>Rewritten.</p></body></html>",
    );
    write(site.path(), "blog/fresh.html", "<html><body>New</body></html>");
    write(site.path(), "sitemap.xml", &sitemap(11));

    let report = regression::check_snapshot(&metrics(site.path()), &previous);
    assert!(report.passed());
    assert_eq!(report.modified, vec!["blog/post-00/index.html"]);
    assert_eq!(report.added, vec!["blog/fresh.html"]);
}

#[test]
fn missing_required_page_fails_baseline() {
    let site = TempDir::new().unwrap();
    build_site(site.path(), 5, 2, 2);
    fs::remove_file(site.path().join("about/index.html")).unwrap();

    let config = GateConfig::default();
    let report = regression::check_baseline(&metrics(site.path()), &config.baseline);
    let failed: Vec<&str> = report.failures().map(|c| c.name.as_str()).collect();
    assert_eq!(failed, vec!["required pages"]);
}

#[test]
fn required_page_absent_from_both_builds_fails_snapshot() {
    let site = TempDir::new().unwrap();
    build_site(site.path(), 5, 2, 2);
    fs::remove_file(site.path().join("about/index.html")).unwrap();
    let previous = Snapshot::from_metrics(&metrics(site.path()));

    let report = regression::check_snapshot(&metrics(site.path()), &previous);
    assert!(!report.passed());
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].name, "required pages");
    assert_eq!(failures[0].detail.as_deref(), Some("missing: about/index.html"));
}

#[test]
fn image_sitemap_counts_pages_not_images() {
    let site = TempDir::new().unwrap();
    build_site(site.path(), 0, 0, 0);
    write(
        site.path(),
        "sitemap.xml",
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://example.com/gallery/</loc>
    <image:image><image:loc>https://example.com/img/a.jpg</image:loc></image:image>
    <image:image><image:loc>https://example.com/img/b.jpg</image:loc></image:image>
  </url>
</urlset>
"#,
    );
    assert_eq!(metrics(site.path()).sitemap_urls, 1);
}
