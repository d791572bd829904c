//! Markup and URL plumbing shared by extraction, fixes, and the regression gate.
//!
//! Pages are tokenized by `lol_html`, a streaming rewriter: handlers see
//! elements and text chunks in document order, and every byte no handler
//! changes is copied to the output untouched. Facts and fixes both go
//! through [`rewrite`], so the n-th heading (or id, or link) a fix counts is
//! the n-th one extraction recorded. Generated pages are not guaranteed to be
//! well-formed; the rewriter runs non-strict and never builds a tree.
//!
//! Entities are decoded and encoded with `html_escape`; link targets are
//! parsed with `url`.

use lol_html::errors::RewritingError;
use lol_html::html_content::Element;
use lol_html::{RewriteStrSettings, rewrite_str};
use std::sync::LazyLock;
use url::Url;

/// Base that relative and protocol-relative references are resolved against
/// when only their host or path matters.
pub static SITE_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("https://site.invalid/").expect("static base URL"));

/// Run `settings` over `src` without strict parsing.
pub fn rewrite<'h, 's>(
    src: &str,
    settings: RewriteStrSettings<'h, 's>,
) -> Result<String, RewritingError> {
    rewrite_str(
        src,
        RewriteStrSettings {
            strict: false,
            ..settings
        },
    )
}

/// Lowercased name of an element.
pub fn tag_name(el: &Element<'_, '_>) -> String {
    el.tag_name().to_ascii_lowercase()
}

/// Decoded value of an attribute. `None` when absent.
pub fn attr(el: &Element<'_, '_>, name: &str) -> Option<String> {
    el.get_attribute(name).map(|raw| decode(&raw))
}

/// Whether the `class` attribute contains `class_name` as a token.
pub fn has_class(el: &Element<'_, '_>, class_name: &str) -> bool {
    attr(el, "class").is_some_and(|v| v.split_whitespace().any(|c| c == class_name))
}

/// Decode character references (`&amp;`, `&#39;`, `&nbsp;`, ...).
pub fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Encode text for a double-quoted attribute value.
pub fn encode_attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).into_owned()
}

/// Encode text for element content.
pub fn encode_text(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercased host of an absolute (`scheme://`) or protocol-relative (`//`)
/// URL. Relative references and host-less schemes (`mailto:`) have none.
pub fn url_host(href: &str) -> Option<String> {
    let href = href.trim();
    let url = if href.starts_with("//") {
        SITE_BASE.join(href).ok()?
    } else {
        Url::parse(href).ok()?
    };
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Host without a leading `www.`.
pub fn bare_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
