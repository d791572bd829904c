//! Auto-fix rule chain.
//!
//! Each step is a pure function of the current content and its fact sheet.
//! Steps decide from the facts, then stream the content through
//! [`markup::rewrite`](crate::markup::rewrite) with handlers that touch only
//! the elements they decided on; the output is a new string and everything
//! else is copied through unchanged. The runner re-extracts facts after every
//! step that changed the content, so ordinals a step relies on always count
//! the text it rewrites.
//!
//! ## Order
//!
//! ```text
//! primary-heading → duplicate-ids → metadata → heading-hierarchy → alt-text
//!   → external-links → heading-links → link-paths → internal-links
//! ```
//!
//! The order is part of the contract. Heading consolidation runs before
//! hierarchy repair so the hierarchy sees a single `<h1>`; metadata runs
//! after consolidation so a synthesized `<title>` uses the surviving `<h1>`.

pub mod headings;
pub mod ids;
pub mod images;
pub mod links;
pub mod metadata;

use crate::config::GateConfig;
use crate::decision_log::{DecisionLog, Severity};
use crate::facts::{self, FactSheet};
use lol_html::errors::RewritingError;

/// Stage name used for the closing summary entry.
pub const SUMMARY_STAGE: &str = "summary";

/// Inputs a step may read besides the document.
#[derive(Debug, Clone, Copy)]
pub struct FixContext<'a> {
    pub config: &'a GateConfig,
    /// Corrected destination identity.
    pub destination: &'a str,
}

/// One log-worthy observation produced by a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

/// What a step returns: new content when it changed something, plus findings.
#[derive(Debug, Clone, Default)]
pub struct FixOutcome {
    pub content: Option<String>,
    pub findings: Vec<Finding>,
}

impl FixOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn fixed(&mut self, message: impl Into<String>) {
        self.findings.push(Finding {
            severity: Severity::AutoFix,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.findings.push(Finding {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    /// Take the result of a rewrite. When it failed the content is left
    /// alone, so the fixes already reported become a single warning.
    pub fn rewritten(&mut self, result: Result<String, RewritingError>) {
        match result {
            Ok(content) => self.content = Some(content),
            Err(e) => {
                self.findings.retain(|f| f.severity != Severity::AutoFix);
                self.warn(format!("markup could not be rewritten: {e}"));
            }
        }
    }
}

pub type FixFn = fn(&str, &FactSheet, &FixContext<'_>) -> FixOutcome;

#[derive(Clone, Copy)]
pub struct FixStep {
    pub name: &'static str,
    pub apply: FixFn,
}

impl std::fmt::Debug for FixStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixStep").field("name", &self.name).finish()
    }
}

pub const CHAIN: &[FixStep] = &[
    FixStep {
        name: "primary-heading",
        apply: headings::consolidate_primary_heading,
    },
    FixStep {
        name: "duplicate-ids",
        apply: ids::deduplicate_ids,
    },
    FixStep {
        name: "metadata",
        apply: metadata::synthesize_metadata,
    },
    FixStep {
        name: "heading-hierarchy",
        apply: headings::repair_heading_hierarchy,
    },
    FixStep {
        name: "alt-text",
        apply: images::synthesize_alt_text,
    },
    FixStep {
        name: "external-links",
        apply: links::attribute_external_links,
    },
    FixStep {
        name: "heading-links",
        apply: headings::delink_headings,
    },
    FixStep {
        name: "link-paths",
        apply: links::collapse_link_paths,
    },
    FixStep {
        name: "internal-links",
        apply: links::internal_link_advisory,
    },
];

/// Run every step of [`CHAIN`] over `src`, recording findings in `log`.
///
/// Returns the final content. Always closes with one `SUMMARY` entry.
pub fn run_chain(src: &str, ctx: &FixContext<'_>, log: &mut DecisionLog) -> String {
    let site = &ctx.config.site;
    let mut content = src.to_string();
    let mut facts = facts::extract(&content, site);
    let mut changed = false;

    for step in CHAIN {
        let outcome = (step.apply)(&content, &facts, ctx);
        for finding in outcome.findings {
            log.record(step.name, finding.severity, finding.message);
        }
        if let Some(next) = outcome.content
            && next != content
        {
            content = next;
            facts = facts::extract(&content, site);
            changed = true;
        }
    }

    if changed {
        let applied = log.count(Severity::AutoFix);
        log.summary(
            SUMMARY_STAGE,
            format!("applied {applied} auto-fix{}", if applied == 1 { "" } else { "es" }),
        );
    } else {
        match log.count(Severity::Warning) {
            0 => log.summary(SUMMARY_STAGE, "no issues found"),
            n => log.summary(
                SUMMARY_STAGE,
                format!("no fixes needed; {n} warning{}", if n == 1 { "" } else { "s" }),
            ),
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;

    fn run(src: &str) -> (String, DecisionLog) {
        let config = GateConfig::default();
        let ctx = FixContext {
            config: &config,
            destination: "blog/post/index.html",
        };
        let mut log = DecisionLog::new();
        let out = run_chain(src, &ctx, &mut log);
        (out, log)
    }

    #[test]
    fn chain_order_is_fixed() {
        let names: Vec<&str> = CHAIN.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "primary-heading",
                "duplicate-ids",
                "metadata",
                "heading-hierarchy",
                "alt-text",
                "external-links",
                "heading-links",
                "link-paths",
                "internal-links",
            ]
        );
    }

    #[test]
    fn clean_document_gets_single_summary() {
        let body = format!(
            "{}<p><a href=\"/blog/\">Blog</a> <a href=\"/about/\">About</a></p>",
            paragraphs(2, 40)
        );
        let src = complete_page(&body);
        let (out, log) = run(&src);
        assert_eq!(out, src);
        assert_eq!(log.count(Severity::AutoFix), 0);
        let last = log.entries().last().unwrap();
        assert_eq!(last.severity, Severity::Summary);
        assert_eq!(last.message, "no issues found");
    }

    #[test]
    fn summary_counts_fixes() {
        let src = complete_page(r#"<img src="/img/a-b.png"><img src="/img/c.png">"#);
        let (_, log) = run(&src);
        assert_eq!(log.count(Severity::AutoFix), 2);
        assert_eq!(log.entries().last().unwrap().message, "applied 2 auto-fixes");
    }

    #[test]
    fn entries_carry_step_names() {
        let src = complete_page(r#"<img src="/img/photo.png">"#);
        let (_, log) = run(&src);
        let fix = log
            .entries()
            .iter()
            .find(|e| e.severity == Severity::AutoFix)
            .unwrap();
        assert_eq!(fix.stage, "alt-text");
    }

    #[test]
    fn second_run_changes_nothing() {
        let src = page_with(
            "",
            r#"<h1>A</h1><h1>B</h1><div id="x"></div><div id="x"></div>
               <img src="/i/sun-set.jpg"><a href="https://other.org/">o</a>
               <h2><a href="/blog/blog/x">Linked</a></h2><p>Body text.</p>"#,
        );
        let (once, _) = run(&src);
        let (twice, log) = run(&once);
        assert_eq!(once, twice);
        assert_eq!(log.count(Severity::AutoFix), 0);
        // The delinked heading held the only internal link.
        assert_eq!(
            log.entries().last().unwrap().message,
            "no fixes needed; 1 warning"
        );
    }

    #[test]
    fn warnings_reported_when_nothing_changes() {
        let src = complete_page(&paragraphs(1, 20));
        let (out, log) = run(&src);
        assert_eq!(out, src);
        assert_eq!(log.entries().last().unwrap().message, "no fixes needed; 1 warning");
    }
}
