//! Link repairs: external link attributes, doubled path segments, and the
//! internal cross-link advisory.

use super::{FixContext, FixOutcome};
use crate::facts::{self, FactSheet, LinkKind};
use crate::markup;
use lol_html::{RewriteStrSettings, element};
use url::{Position, Url};

/// Tokens every external link must carry in `rel`.
const SAFE_REL: [&str; 2] = ["noopener", "noreferrer"];

/// Add `noopener noreferrer` to external links that lack them.
///
/// Existing `rel` tokens are kept, in their original case.
pub fn attribute_external_links(
    src: &str,
    facts: &FactSheet,
    ctx: &FixContext<'_>,
) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged();
    for link in facts
        .links
        .iter()
        .filter(|l| l.kind == LinkKind::External && !l.has_safe_rel())
    {
        outcome.fixed(format!(
            "added rel=\"noopener noreferrer\" to external link {}",
            link.href
        ));
    }
    if outcome.findings.is_empty() {
        return outcome;
    }

    let host = ctx.config.site.canonical_host();
    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![element!("a[href]", |el| {
                let href = markup::attr(el, "href").unwrap_or_default();
                let rel = markup::attr(el, "rel");
                if facts::classify_link(&href, &host) != LinkKind::External
                    || facts::has_safe_rel(rel.as_deref())
                {
                    return Ok(());
                }
                let rel = rel.unwrap_or_default();
                let present: Vec<String> = rel
                    .split_whitespace()
                    .map(|t| t.to_ascii_lowercase())
                    .collect();
                let mut tokens: Vec<&str> = rel.split_whitespace().collect();
                for token in SAFE_REL {
                    if !present.iter().any(|p| p == token) {
                        tokens.push(token);
                    }
                }
                el.set_attribute("rel", &markup::encode_attr(&tokens.join(" ")))?;
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );
    outcome.rewritten(result);
    outcome
}

/// Collapse doubled route prefixes and doubled separators in link paths.
pub fn collapse_link_paths(src: &str, facts: &FactSheet, ctx: &FixContext<'_>) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged();
    let prefixes = &ctx.config.site.route_prefixes;
    let rewritable = |kind: LinkKind| matches!(kind, LinkKind::Internal | LinkKind::External);

    for link in facts.links.iter().filter(|l| rewritable(l.kind)) {
        let collapsed = collapse_path(&link.href, prefixes);
        if collapsed != link.href {
            outcome.fixed(format!("rewrote link {} to {collapsed}", link.href));
        }
    }
    if outcome.findings.is_empty() {
        return outcome;
    }

    let host = ctx.config.site.canonical_host();
    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![element!("a[href]", |el| {
                let href = markup::attr(el, "href").unwrap_or_default();
                if !rewritable(facts::classify_link(&href, &host)) {
                    return Ok(());
                }
                let collapsed = collapse_path(&href, prefixes);
                if collapsed != href {
                    el.set_attribute("href", &markup::encode_attr(&collapsed))?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );
    outcome.rewritten(result);
    outcome
}

/// Collapse `//` and doubled route prefixes in the path part of `href`.
///
/// The scheme, a protocol-relative `//`, the authority, the query, and the
/// fragment are never touched, and an href whose path is already clean is
/// returned exactly as written.
pub fn collapse_path(href: &str, prefixes: &[String]) -> String {
    let protocol_relative = href.starts_with("//");
    let parsed = if protocol_relative {
        markup::SITE_BASE.join(href)
    } else {
        Url::parse(href)
    };
    match parsed {
        Ok(mut url) if url.has_host() => {
            let collapsed = collapse_segments(url.path(), prefixes);
            if collapsed == url.path() {
                return href.to_string();
            }
            url.set_path(&collapsed);
            if protocol_relative {
                format!("//{}", &url[Position::BeforeUsername..])
            } else {
                url.to_string()
            }
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let end = href.find(['?', '#']).unwrap_or(href.len());
            format!("{}{}", collapse_segments(&href[..end], prefixes), &href[end..])
        }
        // Host-less schemes and unparseable targets
        _ => href.to_string(),
    }
}

fn collapse_segments(path: &str, prefixes: &[String]) -> String {
    let count = path.split('/').count();
    let mut segments: Vec<&str> = Vec::new();
    for (i, segment) in path.split('/').enumerate() {
        let last = i + 1 == count;
        // Empty segments survive only at the edges: a leading or trailing `/`.
        if segment.is_empty() && i > 0 && !last {
            continue;
        }
        if let Some(previous) = segments.last()
            && *previous == segment
            && prefixes.iter().any(|p| p == segment)
        {
            continue;
        }
        segments.push(segment);
    }
    segments.join("/")
}

/// Warn when the content links to few other pages of the site.
///
/// Counts internal links inside the content region when there is one, so
/// navigation chrome does not mask a post with no cross-links; without a
/// wrapper the whole document is the content.
pub fn internal_link_advisory(
    _src: &str,
    facts: &FactSheet,
    _ctx: &FixContext<'_>,
) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged();
    let count = facts
        .links
        .iter()
        .filter(|l| l.kind == LinkKind::Internal)
        .filter(|l| l.in_content || !facts.has_content_region)
        .count();
    match count {
        0 => outcome.warn("no internal links in the content; add cross-links to related pages"),
        1 => outcome.warn("only one internal link in the content; consider adding more cross-links"),
        _ => {}
    }
    outcome
}
