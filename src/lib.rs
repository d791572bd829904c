//! # pagegate
//!
//! A publish-time content gate for generated static sites. Every page passes
//! through the gate on its way to the site; every full build passes through
//! the regression gate before it is deployed.
//!
//! # Architecture: Block, Fix, Compare
//!
//! ```text
//! 1. Normalize   destination  →  corrected site identity
//! 2. Extract     markup       →  FactSheet           (one scan, read-only)
//! 3. Block       FactSheet    →  Vec<BlockingDefect> (non-empty = never written)
//! 4. Fix         markup       →  repaired markup     (ordered rule chain)
//! 5. Regress     built site   →  RegressionReport    (counts vs. snapshot/baseline)
//! ```
//!
//! Blocking and fixing are deliberately separate. A page is blocked only when
//! a repair would have to invent content: an unresolved placeholder, too few
//! words, structured data without an author. Everything else is repaired and
//! recorded, so the site is never held back by something a tool can do.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`gate`] | Per-document pipeline, parallel batch validation, publishing |
//! | [`paths`] | Destination correction: doubled directories, missing route roots |
//! | [`facts`] | Structural fact extraction: headings, ids, images, links, metadata, structured data |
//! | [`blocking`] | Blocking rules: placeholders, word count, `Article` fields |
//! | [`fixes`] | The ordered auto-fix chain and its steps |
//! | [`decision_log`] | Per-document decision entries, persisted partitions, retention sweep |
//! | [`regression`] | Site metrics, snapshots, baseline and snapshot comparison |
//! | [`markup`] | Streaming rewriter setup, entity and URL helpers |
//! | [`naming`] | Post naming convention and titles derived from file names |
//! | [`config`] | `pagegate.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Streaming Rewrites, Not a DOM
//!
//! Pages are never parsed into a tree and re-serialized. Each fix is a
//! `lol_html` rewrite pass over the current markup: handlers change the
//! elements they care about and every other byte is copied through, so
//! anything no rule touches stays byte-for-byte identical and diffs of
//! published pages stay reviewable.
//!
//! ## Facts Re-extracted Between Steps
//!
//! Fixes find their targets by ordinal: the n-th heading, id, or link in
//! document order, as extraction counted them with the same tokenizer. A fix
//! that changes the markup can shift those ordinals, so the chain re-extracts
//! after each step that changed something. Steps never share ordinals.
//!
//! ## Idempotent Chain
//!
//! Running the chain on its own output changes nothing. The one exception is
//! heading hierarchy repair, which demotes only the first out-of-order
//! heading per pass and therefore converges over several passes when a page
//! has more than one.
//!
//! ## Loss Only
//!
//! The regression gate fails on lost content and nothing else. Growth and
//! edits are reported but pass.

pub mod blocking;
pub mod config;
pub mod decision_log;
pub mod facts;
pub mod fixes;
pub mod gate;
pub mod markup;
pub mod naming;
pub mod output;
pub mod paths;
pub mod regression;

#[cfg(test)]
pub(crate) mod test_helpers;
