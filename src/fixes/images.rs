//! Alternate text for images.

use super::{FixContext, FixOutcome};
use crate::facts::{self, FactSheet};
use crate::markup;
use crate::naming;
use lol_html::{RewriteStrSettings, element};

fn shown_source(source: &str) -> &str {
    if source.len() > 80 || source.starts_with("data:") {
        "inline image"
    } else {
        source
    }
}

/// Give every `<img>` without alternate text one derived from its source.
///
/// A blank `alt` is overwritten in place; a missing one is appended to the tag.
pub fn synthesize_alt_text(src: &str, facts: &FactSheet, _ctx: &FixContext<'_>) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged();
    for image in facts.images.iter().filter(|i| !i.has_alt) {
        let source = image.src.as_deref().unwrap_or_default();
        outcome.fixed(format!(
            "added alt=\"{}\" to <img> {}",
            naming::title_from_path(source),
            shown_source(source)
        ));
    }
    if outcome.findings.is_empty() {
        return outcome;
    }

    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![element!("img", |el| {
                if !facts::has_alt_text(el) {
                    let source = markup::attr(el, "src").unwrap_or_default();
                    let title = naming::title_from_path(&source);
                    el.set_attribute("alt", &markup::encode_attr(&title))?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );
    outcome.rewritten(result);
    outcome
}
