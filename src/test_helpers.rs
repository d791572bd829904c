//! Shared test utilities for the pagegate test suite.
//!
//! Document builders that produce realistic pages with exactly the defects a
//! test asks for, plus the default site settings.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! // A long-form post: JSON-LD in the head, body inside the content wrapper.
//! let doc = long_form_page(&valid_article_json(), &paragraphs(3, 80));
//!
//! // A page with nothing but what the test provides.
//! let bare = page_with("<title>T</title>", "<p>text</p>");
//!
//! // A page whose head and headings need no repair.
//! let clean = complete_page("<p>body</p>");
//! ```

use crate::config::SiteSettings;

const VOCABULARY: &[&str] = &[
    "river", "stone", "garden", "lantern", "harbor", "meadow", "copper", "window", "orchard",
    "signal", "pocket", "valley", "thunder", "ribbon", "canvas", "marble", "forest", "engine",
];

/// A description that sits inside the default 150–160 character window.
pub const DESCRIPTION: &str = "A practical walk through the river garden at dawn, with notes on \
lanterns, stone paths, copper signals and the quiet harbor just beyond the old orchard.";

/// Default site settings (`https://example.com`).
pub fn site() -> SiteSettings {
    SiteSettings::default()
}

/// `n` space-separated plain words, free of markup and braces.
pub fn words(n: usize) -> String {
    (0..n)
        .map(|i| VOCABULARY[i % VOCABULARY.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

/// `count` paragraphs of `words_each` words each, as markup.
pub fn paragraphs(count: usize, words_each: usize) -> String {
    (0..count)
        .map(|_| format!("<p>{}</p>", words(words_each)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A minimal page: charset meta plus `head_extra` in the head, `body` in the body.
pub fn page_with(head_extra: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">{head_extra}</head>\n<body>{body}</body></html>\n"
    )
}

/// A long-form post with `json_ld` as its only structured-data block and
/// `body` as the whole content region. The heading sits outside the wrapper
/// so word counts cover `body` alone.
pub fn long_form_page(json_ld: &str, body: &str) -> String {
    page_with(
        &format!(
            "<title>A Field Guide</title><script type=\"application/ld+json\">{json_ld}</script>"
        ),
        &format!(
            "<article><h1>A Field Guide</h1><div class=\"post-content\">{body}</div>\
             <p><a href=\"/blog/\">Blog</a> <a href=\"/about/\">About</a></p></article>"
        ),
    )
}

/// Structured data for an `Article` with every required field.
pub fn valid_article_json() -> String {
    r#"{"@context": "https://schema.org", "@type": "Article", "headline": "A Field Guide", "author": {"@type": "Person", "name": "Sam Rivera"}, "publisher": {"@type": "Organization", "name": "Example"}, "datePublished": "2024-03-01"}"#
        .to_string()
}

/// A page with title, description, canonical link, and a single `<h1>`, so
/// only defects in `body` trigger fixes.
pub fn complete_page(body: &str) -> String {
    page_with(
        &format!(
            "<title>A Field Guide</title><meta name=\"description\" content=\"{DESCRIPTION}\">\
             <link rel=\"canonical\" href=\"https://example.com/blog/post/\">"
        ),
        &format!("<h1>A Field Guide</h1>{body}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_fits_default_window() {
        let len = DESCRIPTION.chars().count();
        assert!((150..=160).contains(&len), "{len}");
    }
}
