//! Metadata synthesis: description, canonical link, and title.
//!
//! Existing but empty tags are filled in place. Everything that has to be
//! created is appended to the first `<head>` in one piece, just before its
//! end tag, so new tags land in a stable order (title, description,
//! canonical) no matter which of them were missing.

use super::{FixContext, FixOutcome};
use crate::facts::{self, FactSheet};
use crate::markup;
use lol_html::html_content::ContentType;
use lol_html::{RewriteStrSettings, element};

/// Fill in a missing description, canonical link, and title.
pub fn synthesize_metadata(src: &str, facts: &FactSheet, ctx: &FixContext<'_>) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged();
    let mut title_text: Option<String> = None;
    let mut description_value: Option<String> = None;
    let mut canonical_href: Option<String> = None;
    let mut head_insert = String::new();
    let mut head_missing = Vec::new();

    if blank(facts.title())
        && let Some(h1) = facts.headings_at(1).next()
        && !h1.text.is_empty()
    {
        let text = markup::encode_text(&h1.text);
        if facts.has_title_element {
            title_text = Some(text);
            outcome.fixed(format!("filled empty <title> from <h1> \"{}\"", h1.text));
        } else if facts.head_closed {
            head_insert.push_str(&format!("<title>{text}</title>"));
            outcome.fixed(format!("added <title> from <h1> \"{}\"", h1.text));
        } else {
            head_missing.push("title");
        }
    }

    if blank(facts.description()) {
        let window = &ctx.config.metadata;
        match derive_description(
            &facts.paragraphs,
            window.description_min,
            window.description_max,
        ) {
            None => outcome.warn("no description and no paragraph text to derive one from"),
            Some(description) => {
                let len = description.chars().count();
                let value = markup::encode_attr(&description);
                let placed = if facts.has_description_tag {
                    description_value = Some(value);
                    true
                } else if facts.head_closed {
                    head_insert.push_str(&format!(
                        "<meta name=\"description\" content=\"{value}\">"
                    ));
                    true
                } else {
                    head_missing.push("description");
                    false
                };
                if placed {
                    outcome.fixed(format!(
                        "added meta description ({len} characters) from the first paragraph"
                    ));
                    if len < window.description_min {
                        outcome.warn(format!(
                            "description is {len} characters; not enough text to reach {}",
                            window.description_min
                        ));
                    }
                }
            }
        }
    }

    if blank(facts.canonical()) {
        let url = canonical_url(&ctx.config.site.base_url, ctx.destination);
        let href = markup::encode_attr(&url);
        if facts.has_canonical_tag {
            canonical_href = Some(href);
            outcome.fixed(format!("filled empty canonical link with {url}"));
        } else if facts.head_closed {
            head_insert.push_str(&format!("<link rel=\"canonical\" href=\"{href}\">"));
            outcome.fixed(format!("added canonical link {url}"));
        } else {
            head_missing.push("canonical link");
        }
    }

    if !head_missing.is_empty() {
        outcome.warn(format!(
            "no </head>; could not insert {}",
            head_missing.join(", ")
        ));
    }
    if title_text.is_none()
        && description_value.is_none()
        && canonical_href.is_none()
        && head_insert.is_empty()
    {
        return outcome;
    }

    // Only the first of each tag is touched, matching what extraction reads.
    let (mut title_done, mut description_done, mut canonical_done, mut head_done) =
        (false, false, false, false);
    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("title", |el| {
                    if let Some(text) = &title_text
                        && !title_done
                    {
                        el.set_inner_content(text, ContentType::Html);
                    }
                    title_done = true;
                    Ok(())
                }),
                element!("meta", |el| {
                    if let Some(value) = &description_value
                        && !description_done
                        && facts::meta_key(el).as_deref() == Some("description")
                    {
                        el.set_attribute("content", value)?;
                        description_done = true;
                    }
                    Ok(())
                }),
                element!("link", |el| {
                    if let Some(href) = &canonical_href
                        && !canonical_done
                        && facts::is_canonical_link(el)
                    {
                        el.set_attribute("href", href)?;
                        canonical_done = true;
                    }
                    Ok(())
                }),
                element!("head", |el| {
                    if !head_done && !head_insert.is_empty() {
                        el.append(&head_insert, ContentType::Html);
                    }
                    head_done = true;
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    );
    outcome.rewritten(result);
    outcome
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Canonical URL of a destination under `base_url`.
///
/// `index.html` collapses to its directory: `blog/post/index.html` becomes
/// `https://example.com/blog/post/`.
pub fn canonical_url(base_url: &str, destination: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = destination.trim_start_matches('/');
    let path = if path == "index.html" {
        ""
    } else {
        path.strip_suffix("index.html")
            .filter(|dir| dir.ends_with('/'))
            .unwrap_or(path)
    };
    format!("{base}/{path}")
}

/// Build a description that fits `min..=max` characters when the text allows.
///
/// The first paragraph is used whole when it fits. Shorter text is extended
/// with the following paragraphs; longer text is cut at a word boundary,
/// then at a word boundary with `...`, and only then hard-cut. Text that can
/// never reach `min` is returned as is. `None` when there are no paragraphs.
pub fn derive_description(paragraphs: &[String], min: usize, max: usize) -> Option<String> {
    let first = paragraphs.first()?;
    let fits = |s: &str| (min..=max).contains(&s.chars().count());
    if fits(first) {
        return Some(first.clone());
    }

    let mut text = first.clone();
    for next in &paragraphs[1..] {
        if text.chars().count() >= min {
            break;
        }
        text.push(' ');
        text.push_str(next);
    }
    if fits(&text) || text.chars().count() < min {
        return Some(text);
    }

    if let Some(cut) = take_words(&text, max)
        && fits(&cut)
    {
        return Some(cut);
    }
    let room = max.saturating_sub(3);
    if let Some(cut) = take_words(&text, room).map(|c| format!("{c}..."))
        && fits(&cut)
    {
        return Some(cut);
    }
    let hard: String = text.chars().take(room).collect();
    Some(format!("{}...", hard.trim_end()))
}

/// Longest prefix of whole words within `limit` characters.
fn take_words(text: &str, limit: usize) -> Option<String> {
    let mut out = String::new();
    for word in text.split_whitespace() {
        let extra = word.chars().count() + usize::from(!out.is_empty());
        if out.chars().count() + extra > limit {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    (!out.is_empty()).then_some(out)
}
