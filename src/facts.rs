//! Structural fact extraction.
//!
//! [`extract`] reads a document once and produces a [`FactSheet`]: headings,
//! identifiers, images, links, metadata, structured-data blocks, container
//! tag balance, and the primary content region. Every rule in the gate reads
//! from a fact sheet instead of re-parsing markup on its own.
//!
//! The read is a single `lol_html` pass with no output changes. Positions are
//! ordinals: `headings[2]` is the third `<h1>`–`<h6>` element the tokenizer
//! reports, and fixes count elements the same way (with the predicates
//! exported here) to find it again.
//!
//! Extraction is total. Malformed markup yields a partial sheet plus entries
//! in [`FactSheet::warnings`]; it never panics and never returns an error, so
//! one bad page cannot abort a batch.

use crate::config::SiteSettings;
use crate::markup;
use lol_html::errors::RewritingError;
use lol_html::html_content::{Element, TextChunk, TextType};
use lol_html::{RewriteStrSettings, doc_text, element};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use url::Url;

/// Container tags whose open/close counts are compared.
pub const BALANCED_CONTAINERS: &[&str] = &["div", "section", "article", "main", "ul", "ol"];

/// Elements whose content is raw text; a missing end tag swallows the rest.
const RAW_TEXT: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    /// Visible text of the heading. Empty when the heading is never closed.
    pub text: String,
    pub closed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageFact {
    pub src: Option<String>,
    /// An `alt` attribute with non-blank text is present.
    pub has_alt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Relative reference or absolute URL on the site's own host.
    Internal,
    /// Absolute or protocol-relative URL on another host.
    External,
    /// `#anchor` within the same page.
    Fragment,
    /// `mailto:`, `tel:`, `javascript:` and similar.
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkFact {
    /// Decoded `href`.
    pub href: String,
    pub kind: LinkKind,
    pub rel: Option<String>,
    /// Inside the primary content wrapper.
    pub in_content: bool,
}

impl LinkFact {
    /// `rel` carries both `noopener` and `noreferrer`.
    pub fn has_safe_rel(&self) -> bool {
        has_safe_rel(self.rel.as_deref())
    }
}

/// An embedded `application/ld+json` block.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredDataBlock {
    /// 1-based position among the document's structured-data blocks.
    pub index: usize,
    pub raw: String,
    pub parsed: Option<Value>,
    pub error: Option<String>,
}

/// Read-only structural summary of one document.
#[derive(Debug, Clone, Default)]
pub struct FactSheet {
    pub headings: Vec<Heading>,
    /// Every non-blank id in document order (a multiset).
    pub ids: Vec<String>,
    pub images: Vec<ImageFact>,
    pub links: Vec<LinkFact>,
    /// `title`, `description`, `canonical`, plus other named meta entries.
    pub metadata: BTreeMap<String, String>,
    /// A closed `<title>` element exists, even an empty one.
    pub has_title_element: bool,
    /// A `<meta name="description">` exists, with or without content.
    pub has_description_tag: bool,
    /// A `<link rel="canonical">` exists, with or without a target.
    pub has_canonical_tag: bool,
    /// The first `<head>` has an end tag to insert before.
    pub head_closed: bool,
    pub structured_data: Vec<StructuredDataBlock>,
    /// Containers opened but never closed, per tag.
    pub tag_balance: BTreeMap<String, usize>,
    /// A content wrapper (an element carrying a content marker class) exists.
    pub has_content_region: bool,
    pub content_words: Option<usize>,
    /// Visible text of paragraphs in the content region (or the whole
    /// document when there is no wrapper), blank ones dropped.
    pub paragraphs: Vec<String>,
    pub warnings: Vec<String>,
}

impl FactSheet {
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").map(String::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").map(String::as_str)
    }

    pub fn canonical(&self) -> Option<&str> {
        self.metadata.get("canonical").map(String::as_str)
    }

    pub fn headings_at(&self, level: u8) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(move |h| h.level == level)
    }

    pub fn internal_link_count(&self) -> usize {
        self.links
            .iter()
            .filter(|l| l.kind == LinkKind::Internal)
            .count()
    }
}

/// Level of an `h1`–`h6` element name.
pub fn heading_level(name: &str) -> Option<u8> {
    match name.as_bytes() {
        [b'h', digit @ b'1'..=b'6'] => Some(digit - b'0'),
        _ => None,
    }
}

/// The element's identifier, when it carries a non-blank one.
pub fn element_id(el: &Element<'_, '_>) -> Option<String> {
    markup::attr(el, "id").filter(|v| !v.trim().is_empty())
}

pub fn has_alt_text(el: &Element<'_, '_>) -> bool {
    markup::attr(el, "alt").is_some_and(|v| !v.trim().is_empty())
}

/// Lowercased `name` (or `property`) of a `<meta>`.
pub fn meta_key(el: &Element<'_, '_>) -> Option<String> {
    markup::attr(el, "name")
        .or_else(|| markup::attr(el, "property"))
        .map(|k| k.trim().to_ascii_lowercase())
}

pub fn is_canonical_link(el: &Element<'_, '_>) -> bool {
    markup::attr(el, "rel").is_some_and(|rel| {
        rel.split_whitespace()
            .any(|t| t.eq_ignore_ascii_case("canonical"))
    })
}

fn is_structured_data(el: &Element<'_, '_>) -> bool {
    markup::attr(el, "type").is_some_and(|t| t.to_ascii_lowercase().contains("ld+json"))
}

pub fn has_safe_rel(rel: Option<&str>) -> bool {
    rel.is_some_and(|rel| {
        let tokens: Vec<String> = rel
            .split_whitespace()
            .map(|t| t.to_ascii_lowercase())
            .collect();
        tokens.iter().any(|t| t == "noopener") && tokens.iter().any(|t| t == "noreferrer")
    })
}

/// Classify a link target relative to the site host.
pub fn classify_link(href: &str, site_host: &str) -> LinkKind {
    let href = href.trim();
    if href.starts_with('#') {
        return LinkKind::Fragment;
    }
    if let Some(host) = markup::url_host(href) {
        return if markup::bare_host(&host) == site_host {
            LinkKind::Internal
        } else {
            LinkKind::External
        };
    }
    match Url::parse(href) {
        Err(url::ParseError::RelativeUrlWithoutBase) => LinkKind::Internal,
        // A scheme without a host, or something unparseable
        _ => LinkKind::Other,
    }
}

/// Extract the fact sheet of `src`.
pub fn extract(src: &str, site: &SiteSettings) -> FactSheet {
    let host = site.canonical_host();
    let markers = site.content_markers.as_slice();
    let state = Rc::new(RefCell::new(Collector::default()));
    let on_element = Rc::clone(&state);
    let on_text = Rc::clone(&state);

    let result = markup::rewrite(
        src,
        RewriteStrSettings {
            element_content_handlers: vec![element!("*", move |el| {
                Collector::element(&on_element, el, &host, markers);
                Ok(())
            })],
            document_content_handlers: vec![doc_text!(move |chunk| {
                on_text.borrow_mut().text(chunk);
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    );

    let collector = state.take();
    collector.finish(result.err())
}

#[derive(Debug, Default, PartialEq)]
enum Region {
    #[default]
    NotSeen,
    Open(String),
    Closed,
}

#[derive(Debug, Default)]
struct Paragraph {
    in_content: bool,
    text: String,
    closed: bool,
}

/// What an end tag settles.
#[derive(Debug)]
enum Closing {
    Heading(usize),
    Paragraph(usize),
    Title,
    StructuredData,
    Head,
    Content,
    Counted(String),
}

#[derive(Debug, Default)]
struct Collector {
    facts: FactSheet,
    open_headings: Vec<usize>,
    paragraphs: Vec<Paragraph>,
    open_paragraphs: Vec<usize>,
    /// Text of the first `<title>` while it is open.
    title: Option<String>,
    seen_title: bool,
    seen_head: bool,
    /// The structured-data block being read: index and raw text.
    script: Option<(usize, String)>,
    region: Region,
    content_text: String,
    /// Raw-text and container elements still waiting for their end tag.
    unclosed: BTreeMap<String, usize>,
    /// Chunks of the current text node.
    pending: String,
}

impl Collector {
    fn element(this: &Rc<RefCell<Self>>, el: &mut Element<'_, '_>, host: &str, markers: &[String]) {
        let name = markup::tag_name(el);
        let can_close = el.can_have_content();
        let mut closing = Vec::new();
        {
            let mut state = this.borrow_mut();
            let state = &mut *state;

            if state.region == Region::NotSeen
                && can_close
                && markers.iter().any(|m| markup::has_class(el, m))
            {
                state.region = Region::Open(name.clone());
                closing.push(Closing::Content);
            }
            let in_content = matches!(state.region, Region::Open(_));

            if let Some(id) = element_id(el) {
                state.facts.ids.push(id);
            }
            if can_close
                && (RAW_TEXT.contains(&name.as_str())
                    || BALANCED_CONTAINERS.contains(&name.as_str()))
            {
                *state.unclosed.entry(name.clone()).or_default() += 1;
                closing.push(Closing::Counted(name.clone()));
            }

            match name.as_str() {
                "img" => state.facts.images.push(ImageFact {
                    src: markup::attr(el, "src"),
                    has_alt: has_alt_text(el),
                }),
                "a" => {
                    if let Some(href) = markup::attr(el, "href") {
                        state.facts.links.push(LinkFact {
                            kind: classify_link(&href, host),
                            href,
                            rel: markup::attr(el, "rel"),
                            in_content,
                        });
                    }
                }
                "p" if can_close => {
                    closing.push(Closing::Paragraph(state.paragraphs.len()));
                    state.open_paragraphs.push(state.paragraphs.len());
                    state.paragraphs.push(Paragraph {
                        in_content,
                        ..Paragraph::default()
                    });
                }
                "title" if !state.seen_title => {
                    state.seen_title = true;
                    if can_close {
                        state.title = Some(String::new());
                        closing.push(Closing::Title);
                    }
                }
                "head" if !state.seen_head => {
                    state.seen_head = true;
                    closing.push(Closing::Head);
                }
                "meta" => {
                    if let Some(key) = meta_key(el) {
                        let value = markup::attr(el, "content")
                            .map(|v| v.trim().to_string())
                            .unwrap_or_default();
                        if key == "description" {
                            state.facts.has_description_tag = true;
                        }
                        state.facts.metadata.entry(key).or_insert(value);
                    }
                }
                "link" if is_canonical_link(el) => {
                    state.facts.has_canonical_tag = true;
                    if let Some(href) = markup::attr(el, "href")
                        && !href.trim().is_empty()
                    {
                        state
                            .facts
                            .metadata
                            .entry("canonical".to_string())
                            .or_insert_with(|| href.trim().to_string());
                    }
                }
                "script" if is_structured_data(el) => {
                    let index = state.facts.structured_data.len() + 1;
                    state.script = Some((index, String::new()));
                    closing.push(Closing::StructuredData);
                }
                other => {
                    if let Some(level) = heading_level(other) {
                        let index = state.facts.headings.len();
                        state.facts.headings.push(Heading {
                            level,
                            text: String::new(),
                            closed: false,
                        });
                        if can_close {
                            state.open_headings.push(index);
                            closing.push(Closing::Heading(index));
                        }
                    }
                }
            }
        }

        if !closing.is_empty()
            && let Some(handlers) = el.end_tag_handlers()
        {
            let this = Rc::clone(this);
            handlers.push(Box::new(move |_end| {
                let mut state = this.borrow_mut();
                for item in closing {
                    state.close(item);
                }
                Ok(())
            }));
        }
    }

    fn close(&mut self, item: Closing) {
        match item {
            Closing::Heading(index) => {
                self.open_headings.retain(|&i| i != index);
                self.facts.headings[index].closed = true;
            }
            Closing::Paragraph(index) => {
                self.open_paragraphs.retain(|&i| i != index);
                self.paragraphs[index].closed = true;
            }
            Closing::Title => {
                if let Some(title) = self.title.take() {
                    self.facts.has_title_element = true;
                    self.facts
                        .metadata
                        .insert("title".to_string(), markup::collapse_whitespace(&title));
                }
            }
            Closing::StructuredData => self.finish_structured_data(),
            Closing::Head => self.facts.head_closed = true,
            Closing::Content => self.region = Region::Closed,
            Closing::Counted(name) => {
                if let Some(open) = self.unclosed.get_mut(&name) {
                    *open = open.saturating_sub(1);
                }
            }
        }
    }

    fn text(&mut self, chunk: &TextChunk<'_>) {
        self.pending.push_str(chunk.as_str());
        if !chunk.last_in_text_node() {
            return;
        }
        let raw = std::mem::take(&mut self.pending);
        match chunk.text_type() {
            TextType::ScriptData => {
                if let Some((_, buf)) = &mut self.script {
                    buf.push_str(&raw);
                }
            }
            TextType::Data | TextType::RCData => {
                let text = markup::decode(&raw);
                if let Some(title) = &mut self.title {
                    title.push_str(&text);
                    return;
                }
                // Tags separate words.
                for &i in &self.open_headings {
                    let heading = &mut self.facts.headings[i];
                    heading.text.push_str(&text);
                    heading.text.push(' ');
                }
                for &i in &self.open_paragraphs {
                    self.paragraphs[i].text.push_str(&text);
                    self.paragraphs[i].text.push(' ');
                }
                if matches!(self.region, Region::Open(_)) {
                    self.content_text.push_str(&text);
                    self.content_text.push(' ');
                }
            }
            _ => {}
        }
    }

    fn finish_structured_data(&mut self) {
        if let Some((index, raw)) = self.script.take() {
            self.facts
                .structured_data
                .push(structured_block(index, raw));
        }
    }

    fn finish(mut self, error: Option<RewritingError>) -> FactSheet {
        if let Some(e) = error {
            self.facts
                .warnings
                .push(format!("markup could not be fully read: {e}"));
        }
        // An unterminated block keeps whatever was read.
        self.finish_structured_data();

        let mut facts = self.facts;
        for heading in &mut facts.headings {
            if heading.closed {
                heading.text = markup::collapse_whitespace(&heading.text);
            } else {
                heading.text.clear();
                facts
                    .warnings
                    .push(format!("unterminated <h{}>", heading.level));
            }
        }

        for name in RAW_TEXT {
            if self.unclosed.get(*name).is_some_and(|n| *n > 0) {
                facts.warnings.push(format!("unterminated <{name}>"));
            }
        }
        for name in BALANCED_CONTAINERS {
            let open = self.unclosed.get(*name).copied().unwrap_or(0);
            if open > 0 {
                facts
                    .warnings
                    .push(format!("unbalanced <{name}>: {open} more opening than closing tags"));
            }
            facts.tag_balance.insert(name.to_string(), open);
        }

        if let Region::Open(name) = &self.region {
            facts
                .warnings
                .push(format!("unterminated content wrapper <{name}>"));
        }
        facts.has_content_region = self.region != Region::NotSeen;
        if facts.has_content_region {
            facts.content_words = Some(self.content_text.split_whitespace().count());
        }

        let has_region = facts.has_content_region;
        facts.paragraphs = self
            .paragraphs
            .into_iter()
            .filter(|p| p.closed && (p.in_content || !has_region))
            .map(|p| markup::collapse_whitespace(&p.text))
            .filter(|text| !text.is_empty())
            .collect();

        facts
    }
}

fn structured_block(index: usize, raw: String) -> StructuredDataBlock {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(parsed) => StructuredDataBlock {
            index,
            raw,
            parsed: Some(parsed),
            error: None,
        },
        Err(e) => StructuredDataBlock {
            index,
            raw,
            parsed: None,
            error: Some(e.to_string()),
        },
    }
}
