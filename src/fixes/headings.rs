//! Heading repairs: primary heading, hierarchy, and links inside headings.
//!
//! Decisions are made from the fact sheet; the rewrite finds the affected
//! headings again by ordinal (the n-th `<h1>`–`<h6>` element in the stream)
//! and checks the level still matches before touching anything.

use super::{FixContext, FixOutcome};
use crate::facts::{self, FactSheet, Heading};
use crate::markup;
use lol_html::{RewriteStrSettings, element};
use std::collections::HashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Deepest heading level whose links are unwrapped.
const DELINK_MAX_LEVEL: u8 = 4;

/// Rename headings by ordinal: `ordinal → (current level, new level)`.
/// End tags follow the start tag's new name.
fn retag(src: &str, targets: &HashMap<usize, (u8, u8)>, outcome: &mut FixOutcome) {
    let mut ordinal = 0;
    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                let Some(level) = facts::heading_level(&markup::tag_name(el)) else {
                    return Ok(());
                };
                if let Some(&(from, to)) = targets.get(&ordinal)
                    && from == level
                {
                    el.set_tag_name(&format!("h{to}"))?;
                }
                ordinal += 1;
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );
    outcome.rewritten(result);
}

fn quoted(text: &str) -> String {
    format!("\"{text}\"")
}

/// Exactly one `<h1>`: promote the first `<h2>` when there is none, demote
/// every `<h1>` after the first when there are several.
pub fn consolidate_primary_heading(
    src: &str,
    facts: &FactSheet,
    _ctx: &FixContext<'_>,
) -> FixOutcome {
    let primaries: Vec<(usize, &Heading)> = facts
        .headings
        .iter()
        .enumerate()
        .filter(|(_, h)| h.level == 1)
        .collect();
    let mut outcome = FixOutcome::unchanged();

    match primaries.len() {
        0 => {
            if let Some((ordinal, first)) =
                facts.headings.iter().enumerate().find(|(_, h)| h.level == 2)
            {
                outcome.fixed(format!(
                    "no <h1>; promoted first <h2> {} to <h1>",
                    quoted(&first.text)
                ));
                retag(src, &HashMap::from([(ordinal, (2, 1))]), &mut outcome);
            }
        }
        1 => {}
        n => {
            let extra = &primaries[1..];
            let targets = extra.iter().map(|(i, _)| (*i, (1, 2))).collect();
            let titles: Vec<String> = extra.iter().map(|(_, h)| quoted(&h.text)).collect();
            outcome.fixed(format!(
                "{n} <h1> headings; demoted {} to <h2>: {}",
                n - 1,
                titles.join(", ")
            ));
            retag(src, &targets, &mut outcome);
        }
    }
    outcome
}

/// Demote the first heading that skips a level to one below its predecessor.
///
/// One jump per pass: a run like `h1 h4 h6` becomes `h1 h2 h6` here and
/// `h1 h2 h3` on the next pass.
pub fn repair_heading_hierarchy(
    src: &str,
    facts: &FactSheet,
    _ctx: &FixContext<'_>,
) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged();
    let jump = facts
        .headings
        .windows(2)
        .position(|pair| pair[1].level > pair[0].level + 1);

    if let Some(index) = jump {
        let (previous, heading) = (&facts.headings[index], &facts.headings[index + 1]);
        let target = previous.level + 1;
        outcome.fixed(format!(
            "<h{}> {} follows <h{}>; demoted to <h{target}>",
            heading.level,
            quoted(&heading.text),
            previous.level
        ));
        retag(
            src,
            &HashMap::from([(index + 1, (heading.level, target))]),
            &mut outcome,
        );
    }
    outcome
}

/// Replace every `<a>` inside a closed `<h1>`–`<h4>` with its content.
pub fn delink_headings(src: &str, facts: &FactSheet, _ctx: &FixContext<'_>) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged();
    let eligible = |ordinal: usize| {
        facts
            .headings
            .get(ordinal)
            .is_some_and(|h| h.level <= DELINK_MAX_LEVEL && h.closed)
    };
    if !(0..facts.headings.len()).any(eligible) {
        return outcome;
    }

    // Ordinals of eligible headings still open, and (href, ordinal) per unwrapped link.
    let open: Rc<RefCell<Vec<usize>>> = Rc::default();
    let mut removed: Vec<(String, usize)> = Vec::new();
    let mut seen = 0;
    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                let name = markup::tag_name(el);
                if facts::heading_level(&name).is_some() {
                    let ordinal = seen;
                    seen += 1;
                    if eligible(ordinal)
                        && let Some(handlers) = el.end_tag_handlers()
                    {
                        open.borrow_mut().push(ordinal);
                        let open = Rc::clone(&open);
                        handlers.push(Box::new(move |_end| {
                            open.borrow_mut().retain(|&o| o != ordinal);
                            Ok(())
                        }));
                    }
                } else if name == "a"
                    && let Some(&ordinal) = open.borrow().last()
                {
                    removed.push((markup::attr(el, "href").unwrap_or_default(), ordinal));
                    el.remove_and_keep_content();
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );

    if removed.is_empty() {
        return outcome;
    }
    for (target, ordinal) in &removed {
        let heading = &facts.headings[*ordinal];
        outcome.fixed(format!(
            "removed link to {} from <h{}> {}",
            quoted(target),
            heading.level,
            quoted(&heading.text)
        ));
    }
    outcome.rewritten(result);
    outcome
}
