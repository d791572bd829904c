//! Blocking rules: defects no automatic repair can safely fix.
//!
//! Three independent rules run against every document before any fix:
//!
//! | Rule | Blocks when |
//! |------|-------------|
//! | Unresolved placeholder | `{{ x }}`, `{% x %}`, `{# x #}` or `{x}` survives templating |
//! | Invalid structured data | a JSON-LD block does not parse, or an `Article` lacks required fields |
//! | Insufficient content | the content region has fewer than `rules.min_words` words |
//!
//! All rules are always evaluated so the caller sees every reason at once.

use crate::config::RulesConfig;
use crate::facts::FactSheet;
use crate::markup;
use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, doc_text, element};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cell::Cell;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;
use std::sync::LazyLock;
use tracing::debug;

/// Placeholder syntaxes searched in the full document text.
static TEMPLATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?s)\{\{.{0,200}?\}\}",
        r"(?s)\{%.{0,200}?%\}",
        r"(?s)\{#.{0,200}?#\}",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("placeholder pattern"))
    .collect()
});

/// Generic `{name}` placeholder, searched outside code-like elements only.
static SINGLE_BRACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\s*[A-Za-z_][A-Za-z0-9_]*\s*\}").expect("single-brace pattern")
});

/// Elements whose contents legitimately contain `{name}`.
const CODE_ELEMENTS: &[&str] = &["script", "style", "code", "pre"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BlockingDefect {
    UnresolvedPlaceholder { matches: Vec<String> },
    InvalidStructuredData { index: usize, problem: String },
    InsufficientContent { words: usize, minimum: usize },
}

impl fmt::Display for BlockingDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockingDefect::UnresolvedPlaceholder { matches } => {
                let list: Vec<String> = matches.iter().map(|m| format!("`{m}`")).collect();
                write!(
                    f,
                    "unresolved template placeholder(s): {}",
                    list.join(", ")
                )
            }
            BlockingDefect::InvalidStructuredData { index, problem } => {
                write!(f, "structured data block #{index}: {problem}")
            }
            BlockingDefect::InsufficientContent { words, minimum } => write!(
                f,
                "content region has {words} words; at least {minimum} required"
            ),
        }
    }
}

/// Evaluate every blocking rule. An empty result means the document may proceed.
pub fn evaluate(src: &str, facts: &FactSheet, rules: &RulesConfig) -> Vec<BlockingDefect> {
    let mut defects = Vec::new();

    let extra: Vec<Regex> = rules
        .extra_placeholder_patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();
    let matches = find_placeholders(src, &extra);
    if !matches.is_empty() {
        defects.push(BlockingDefect::UnresolvedPlaceholder { matches });
    }

    defects.extend(structured_data_defects(facts, &rules.article_required_fields));

    if let Some(words) = facts.content_words
        && words < rules.min_words
    {
        defects.push(BlockingDefect::InsufficientContent {
            words,
            minimum: rules.min_words,
        });
    }

    defects
}

/// Every distinct placeholder in `src`, in order of first appearance.
///
/// A match nested inside an earlier, longer match (`{ x }` within `{{ x }}`)
/// is not reported separately.
pub fn find_placeholders(src: &str, extra: &[Regex]) -> Vec<String> {
    let masked = mask_code(src);
    let mut found: Vec<Range<usize>> = Vec::new();
    for re in TEMPLATE_RES.iter().chain(extra) {
        found.extend(re.find_iter(src).map(|m| m.range()));
    }
    found.extend(SINGLE_BRACE_RE.find_iter(&masked).map(|m| m.range()));
    // Longest first at equal starts, so nested matches fall out below.
    found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut kept: Vec<Range<usize>> = Vec::new();
    for range in found {
        let overlaps = kept
            .iter()
            .any(|k| k.start < range.end && range.start < k.end);
        if range.is_empty() || overlaps {
            continue;
        }
        kept.push(range);
    }

    let mut distinct: Vec<String> = Vec::new();
    for range in kept {
        let text = src[range].to_string();
        if !distinct.contains(&text) {
            distinct.push(text);
        }
    }
    distinct
}

/// Copy of `src` with the text inside code-like elements blanked out.
/// Byte offsets are preserved: each masked chunk becomes as many spaces as
/// it had bytes, and markup passes through untouched.
fn mask_code(src: &str) -> String {
    let depth = Rc::new(Cell::new(0usize));
    let on_element = Rc::clone(&depth);
    let on_text = Rc::clone(&depth);

    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", move |el| {
                let name = markup::tag_name(el);
                let is_ld_json = name == "script"
                    && markup::attr(el, "type")
                        .is_some_and(|t| t.to_ascii_lowercase().contains("ld+json"));
                if !CODE_ELEMENTS.contains(&name.as_str()) || is_ld_json {
                    return Ok(());
                }
                // An element that never closes masks the rest of the document.
                if let Some(handlers) = el.end_tag_handlers() {
                    on_element.set(on_element.get() + 1);
                    let depth = Rc::clone(&on_element);
                    handlers.push(Box::new(move |_end| {
                        depth.set(depth.get().saturating_sub(1));
                        Ok(())
                    }));
                }
                Ok(())
            })],
            document_content_handlers: vec![doc_text!(move |chunk| {
                if on_text.get() > 0 && !chunk.as_str().is_empty() {
                    let blank = " ".repeat(chunk.as_str().len());
                    chunk.replace(&blank, ContentType::Text);
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );
    match result {
        Ok(masked) if masked.len() == src.len() => masked,
        Ok(_) | Err(_) => {
            debug!("code masking unavailable; searching the whole document");
            src.to_string()
        }
    }
}

fn structured_data_defects(facts: &FactSheet, required: &[String]) -> Vec<BlockingDefect> {
    let mut defects = Vec::new();
    for block in &facts.structured_data {
        let Some(parsed) = &block.parsed else {
            defects.push(BlockingDefect::InvalidStructuredData {
                index: block.index,
                problem: format!(
                    "not valid JSON: {}",
                    block.error.as_deref().unwrap_or("unparseable")
                ),
            });
            continue;
        };
        let mut articles = Vec::new();
        collect_articles(parsed, &mut articles);
        for article in articles {
            let missing: Vec<&str> = required
                .iter()
                .map(String::as_str)
                .filter(|field| !has_field(article, field))
                .collect();
            if !missing.is_empty() {
                defects.push(BlockingDefect::InvalidStructuredData {
                    index: block.index,
                    problem: format!(
                        "Article is missing required field(s): {}",
                        missing.join(", ")
                    ),
                });
            }
        }
    }
    defects
}

/// Article nodes at the top level, in a top-level array, or in `@graph`.
fn collect_articles<'a>(value: &'a Value, out: &mut Vec<&'a Map<String, Value>>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_articles(item, out);
            }
        }
        Value::Object(obj) => {
            if is_article(obj) {
                out.push(obj);
            }
            if let Some(graph) = obj.get("@graph") {
                collect_articles(graph, out);
            }
        }
        _ => {}
    }
}

fn is_article(obj: &Map<String, Value>) -> bool {
    match obj.get("@type") {
        Some(Value::String(t)) => t == "Article",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Article")),
        _ => false,
    }
}

fn has_field(obj: &Map<String, Value>, field: &str) -> bool {
    match obj.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}
