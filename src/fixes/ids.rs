//! Duplicate identifier repair.

use super::{FixContext, FixOutcome};
use crate::facts::{self, FactSheet};
use crate::markup;
use lol_html::{RewriteStrSettings, element};
use std::collections::{HashMap, HashSet};

/// Keep the first occurrence of every id; suffix the rest `-2`, `-3`, ….
///
/// A suffixed value that already exists elsewhere in the document is skipped,
/// so the rewritten set is unique.
pub fn deduplicate_ids(src: &str, facts: &FactSheet, _ctx: &FixContext<'_>) -> FixOutcome {
    let mut outcome = FixOutcome::unchanged();

    // Occurrence ordinals per value, values in first-appearance order.
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
    for (ordinal, value) in facts.ids.iter().enumerate() {
        let group = groups.entry(value.as_str()).or_default();
        if group.is_empty() {
            order.push(value);
        }
        group.push(ordinal);
    }

    let mut taken: HashSet<String> = facts.ids.iter().cloned().collect();
    let mut renames: HashMap<usize, String> = HashMap::new();

    for value in order {
        let occurrences = &groups[value];
        if occurrences.len() < 2 {
            continue;
        }
        let mut suffix = 2;
        let mut renamed = Vec::new();
        for ordinal in &occurrences[1..] {
            let replacement = loop {
                let candidate = format!("{value}-{suffix}");
                suffix += 1;
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            taken.insert(replacement.clone());
            renamed.push(format!("\"{replacement}\""));
            renames.insert(*ordinal, replacement);
        }
        outcome.fixed(format!(
            "id \"{value}\" used {} times; renamed later occurrences to {}",
            occurrences.len(),
            renamed.join(", ")
        ));
    }

    if renames.is_empty() {
        return outcome;
    }
    let mut ordinal = 0;
    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", |el| {
                if facts::element_id(el).is_none() {
                    return Ok(());
                }
                if let Some(replacement) = renames.get(&ordinal) {
                    el.set_attribute("id", &markup::encode_attr(replacement))?;
                }
                ordinal += 1;
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );
    outcome.rewritten(result);
    outcome
}
