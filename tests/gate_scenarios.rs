//! End-to-end gate behavior through the public API.

use pagegate::blocking::BlockingDefect;
use pagegate::config::GateConfig;
use pagegate::decision_log::{MemorySink, NullSink, Severity};
use pagegate::gate::{Document, Gate, ValidationOutcome};
use std::fs;
use tempfile::TempDir;

const VOCABULARY: &[&str] = &[
    "harbor", "lantern", "meadow", "copper", "orchard", "valley", "ribbon", "thunder", "signal",
    "marble", "canvas", "forest",
];

fn words(n: usize) -> String {
    (0..n)
        .map(|i| VOCABULARY[i % VOCABULARY.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

fn article_json() -> &'static str {
    r#"{"@context": "https://schema.org", "@type": "Article", "headline": "Field Notes", "author": {"@type": "Person", "name": "Robin Hale"}, "publisher": {"@type": "Organization", "name": "Example"}, "datePublished": "2025-06-01"}"#
}

/// Three `<h1>`, `id="form"` three times, an `<h1>` → `<h4>` jump, two images
/// without alt text, two bare external links, and an empty description.
fn defective_page(extra_body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>Field Notes</title><meta name="description" content="">
<script type="application/ld+json">{json}</script></head>
<body><article>
<h1>Field Notes</h1>
<h4>Before You Start</h4>
<div class="post-content">
<p>{first}</p>
<form id="form"><input name="q"></form>
<h1>Morning Walk</h1>
<p>{second}</p>
<img src="/img/river-stone.jpg">
<form id="form"><input name="r"></form>
<h1>Evening Return</h1>
<p>{third} See the <a href="https://other.example.org/guide">guide</a> and the <a href="https://maps.example.net/">map</a>.</p>
<img src="/img/copper-lantern.png">
<div id="form"></div>
<p>More in the <a href="/blog/">blog</a> and <a href="/about/">about</a> pages.</p>
{extra_body}
</div>
</article></body></html>
"#,
        json = article_json(),
        first = words(80),
        second = words(70),
        third = words(60),
    )
}

/// A long-form page whose content region holds exactly `n` words.
fn page_with_words(n: usize) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><title>Count</title></head>
<body><h1>Count</h1><div class="article-body"><p>{}</p></div></body></html>
"#,
        words(n)
    )
}

fn fixed_content(outcome: &ValidationOutcome) -> &str {
    match outcome {
        ValidationOutcome::Fixed { content, .. } => content,
        ValidationOutcome::Blocked { reasons, .. } => panic!("unexpectedly blocked: {reasons:?}"),
    }
}

fn meta_description(html: &str) -> &str {
    let marker = r#"name="description" content=""#;
    let start = html.find(marker).expect("description tag") + marker.len();
    let len = html[start..].find('"').expect("closing quote");
    &html[start..start + len]
}

#[test]
fn defective_article_is_repaired() {
    let config = GateConfig::default();
    let sink = MemorySink::new();
    let gate = Gate::new(&config, &sink);
    let outcome = gate.validate(&Document::new(
        defective_page(""),
        "blog/field-notes/index.html",
    ));
    let html = fixed_content(&outcome);

    // One primary heading; later ones demoted in order.
    assert_eq!(html.matches("<h1>").count(), 1);
    assert!(html.contains("<h1>Field Notes</h1>"));
    assert!(html.contains("<h2>Morning Walk</h2>"));
    assert!(html.contains("<h2>Evening Return</h2>"));

    // The skipped level is closed.
    assert!(html.contains("<h2>Before You Start</h2>"));
    assert!(!html.contains("<h4"));

    // First occurrence untouched, later ones renamed.
    assert!(html.contains(r#"<form id="form"><input name="q"></form>"#));
    assert_eq!(html.matches(r#"id="form""#).count(), 1);
    assert_eq!(html.matches(r#"id="form-2""#).count(), 1);
    assert_eq!(html.matches(r#"id="form-3""#).count(), 1);

    assert!(html.contains(r#"alt="River Stone""#));
    assert!(html.contains(r#"alt="Copper Lantern""#));
    assert_eq!(html.matches(r#"rel="noopener noreferrer""#).count(), 2);

    let description = meta_description(html);
    let len = description.chars().count();
    assert!((150..=160).contains(&len), "{len}: {description}");

    assert!(html.contains(r#"<link rel="canonical" href="https://example.com/blog/field-notes/">"#));

    let log = outcome.log();
    assert_eq!(log.count(Severity::Blocked), 0);
    assert!(log.count(Severity::AutoFix) >= 7);
    let last = log.entries().last().unwrap();
    assert_eq!(last.severity, Severity::Summary);
    assert!(last.message.starts_with("applied "), "{}", last.message);
    assert_eq!(sink.lines().len(), log.entries().len());
}

#[test]
fn repaired_output_is_stable() {
    let config = GateConfig::default();
    let gate = Gate::new(&config, &NullSink);
    let destination = "blog/field-notes/index.html";

    let first = gate.validate(&Document::new(defective_page(""), destination));
    let once = fixed_content(&first).to_string();
    let second = gate.validate(&Document::new(once.clone(), destination));
    assert_eq!(fixed_content(&second), once);

    let log = second.log();
    assert_eq!(log.count(Severity::AutoFix), 0);
    let summary = log.entries().last().unwrap();
    assert_eq!(summary.severity, Severity::Summary);
    assert!(!summary.message.starts_with("applied"), "{}", summary.message);
}

#[test]
fn placeholder_blocks_publication() {
    let config = GateConfig::default();
    let sink = MemorySink::new();
    let gate = Gate::new(&config, &sink);
    let outcome = gate.validate(&Document::new(
        defective_page("<p>Published on {{ published_date }}.</p>"),
        "blog/field-notes/index.html",
    ));

    let ValidationOutcome::Blocked { reasons, log } = &outcome else {
        panic!("placeholder page must be blocked");
    };
    assert!(reasons.iter().any(|r| matches!(
        r,
        BlockingDefect::UnresolvedPlaceholder { matches }
            if matches.iter().any(|m| m == "{{ published_date }}")
    )));
    assert!(
        log.entries()
            .iter()
            .any(|e| e.severity == Severity::Blocked && e.message.contains("{{ published_date }}"))
    );
    assert_eq!(log.count(Severity::AutoFix), 0);
}

#[test]
fn word_count_boundary_is_inclusive() {
    let config = GateConfig::default();
    let gate = Gate::new(&config, &NullSink);

    let short = gate.validate(&Document::new(page_with_words(199), "blog/a.html"));
    let ValidationOutcome::Blocked { reasons, .. } = &short else {
        panic!("199 words must be blocked");
    };
    assert_eq!(
        reasons,
        &vec![BlockingDefect::InsufficientContent {
            words: 199,
            minimum: 200,
        }]
    );

    let enough = gate.validate(&Document::new(page_with_words(200), "blog/a.html"));
    assert!(!enough.is_blocked());
}

#[test]
fn double_hierarchy_skip_converges_in_two_passes() {
    let page = format!(
        r#"<html><head><title>Steps</title><meta name="description" content="{}"><link rel="canonical" href="https://example.com/steps.html"></head>
<body><h1>Steps</h1><h3>Gather</h3><p>{}</p><h5>Detail</h5><p><a href="/a/">a</a> <a href="/b/">b</a></p></body></html>
"#,
        words(24),
        words(30)
    );
    let config = GateConfig::default();
    let gate = Gate::new(&config, &NullSink);

    let pass = |content: &str| {
        fixed_content(&gate.validate(&Document::new(content, "steps.html"))).to_string()
    };
    let one = pass(&page);
    assert!(one.contains("<h2>Gather</h2>"));
    assert!(one.contains("<h5>Detail</h5>"));

    let two = pass(&one);
    assert!(two.contains("<h3>Detail</h3>"));

    assert_eq!(pass(&two), two);
}

#[test]
fn batch_publishes_under_corrected_paths() {
    let staging = TempDir::new().unwrap();
    let site = TempDir::new().unwrap();
    fs::create_dir_all(staging.path().join("posts/field-notes")).unwrap();
    fs::write(
        staging.path().join("posts/field-notes/index.html"),
        defective_page(""),
    )
    .unwrap();
    fs::create_dir_all(staging.path().join("blog/draft")).unwrap();
    fs::write(
        staging.path().join("blog/draft/index.html"),
        defective_page("<p>{{ author_bio }}</p>"),
    )
    .unwrap();

    let config = GateConfig::default();
    let sink = MemorySink::new();
    let summary = Gate::new(&config, &sink)
        .run_batch(staging.path(), site.path())
        .unwrap();

    assert_eq!((summary.published(), summary.blocked()), (1, 1));
    assert!(
        site.path()
            .join("blog/posts/field-notes/index.html")
            .is_file()
    );
    assert!(!site.path().join("posts").exists());
    assert!(!site.path().join("blog/draft/index.html").exists());
    assert!(
        sink.lines()
            .iter()
            .any(|l| l.contains("WARNING blog/posts/field-notes/index.html paths:"))
    );
}
