//! Inbound references between knowledge files.
//!
//! Every indexed file is parsed once for its relative markdown links. Links
//! are resolved with the same rules the renderer uses, so a backlink exists
//! exactly when the rendered source page carries an in-app link to the
//! target.

use std::collections::{HashMap, HashSet};

use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde::Serialize;

use crate::html::resolve_local_target;
use crate::index::{KnowledgeBase, KnowledgeFile};
use crate::route::KnowledgeQuery;

/// Bytes of source context captured on each side of a link.
const SNIPPET_CONTEXT: usize = 80;
/// Maximum snippet length after markdown stripping.
const SNIPPET_MAX_CHARS: usize = 200;

/// A reference to a file from another file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Backlink {
    /// Id of the file containing the link.
    pub source_id: String,
    /// First H1 of the source, or its file name.
    pub source_display: String,
    /// In-app href of the source file.
    pub href: String,
    /// Plain-text context around the link.
    pub snippet: String,
    /// Fragment of the original link (without `#`), if any.
    pub target_fragment: Option<String>,
}

/// Target file id → files linking to it, in source display order.
pub type BacklinksIndex = HashMap<String, Vec<Backlink>>;

/// A resolved outbound link found in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutboundLink {
    target_id: String,
    target_fragment: Option<String>,
    snippet: String,
}

#[derive(Debug, Default)]
struct Extracted {
    title: Option<String>,
    links: Vec<OutboundLink>,
}

/// Build the backlinks index over every file in `kb`.
///
/// Self-links and repeated source→target pairs are dropped; only links that
/// resolve to an indexed markdown file are kept.
pub fn build_backlinks_index(kb: &KnowledgeBase) -> BacklinksIndex {
    let mut index: BacklinksIndex = HashMap::new();
    let mut edges = 0usize;

    for source in kb.files() {
        let extracted = extract_links(source, kb);
        let source_display = extracted.title.unwrap_or_else(|| source.name.clone());
        let href = KnowledgeQuery::new(&source.module_id, &source.id).to_href();

        let mut seen: HashSet<&str> = HashSet::new();
        for link in &extracted.links {
            if link.target_id == source.id || !seen.insert(link.target_id.as_str()) {
                continue;
            }
            edges += 1;
            index.entry(link.target_id.clone()).or_default().push(Backlink {
                source_id: source.id.clone(),
                source_display: source_display.clone(),
                href: href.clone(),
                snippet: link.snippet.clone(),
                target_fragment: link.target_fragment.clone(),
            });
        }
    }

    tracing::info!(files = kb.file_count(), edges, "indexed backlinks");
    index
}

/// Collect the first H1 title and the resolved markdown links of `file`.
fn extract_links(file: &KnowledgeFile, kb: &KnowledgeBase) -> Extracted {
    let src = file.content_raw.as_str();
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(src, options).into_offset_iter();

    let mut result = Extracted::default();
    let mut in_h1 = false;
    let mut title_buf = String::new();
    let mut pending: Option<(usize, String)> = None;

    for (event, range) in parser {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) if result.title.is_none() => {
                in_h1 = true;
                title_buf.clear();
            }
            Event::Text(ref text) | Event::Code(ref text) if in_h1 => title_buf.push_str(text),
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_h1 => {
                in_h1 = false;
                let title = title_buf.trim();
                if !title.is_empty() {
                    result.title = Some(title.to_owned());
                }
            }
            Event::Start(Tag::Link { ref dest_url, .. }) => {
                pending = Some((range.start, dest_url.to_string()));
            }
            Event::End(TagEnd::Link) => {
                let Some((start, dest)) = pending.take() else {
                    continue;
                };
                let Some((resolved, suffix)) = resolve_local_target(&dest, &file.relative_path) else {
                    continue;
                };
                if !kb.is_markdown_path(&resolved) || kb.file(&resolved).is_none() {
                    continue;
                }
                let target_fragment = suffix
                    .split_once('#')
                    .map(|(_, fragment)| fragment)
                    .filter(|fragment| !fragment.is_empty())
                    .map(str::to_owned);

                result.links.push(OutboundLink {
                    target_id: resolved,
                    target_fragment,
                    snippet: snippet_around(src, start, range.end),
                });
            }
            _ => {}
        }
    }

    result
}

/// Plain-text context around `src[start..end]`, widened to char boundaries.
fn snippet_around(src: &str, start: usize, end: usize) -> String {
    let mut from = start.saturating_sub(SNIPPET_CONTEXT);
    while from > 0 && !src.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = end.saturating_add(SNIPPET_CONTEXT).min(src.len());
    while to < src.len() && !src.is_char_boundary(to) {
        to += 1;
    }
    strip_markdown_to_plain(&src[from..to], SNIPPET_MAX_CHARS)
}

/// Render a markdown fragment to whitespace-collapsed plain text of at most
/// `max_chars` characters.
fn strip_markdown_to_plain(raw: &str, max_chars: usize) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut plain = String::new();
    for event in Parser::new_ext(raw, options) {
        match event {
            Event::Text(t) | Event::Code(t) => {
                plain.push(' ');
                plain.push_str(&t);
            }
            Event::SoftBreak | Event::HardBreak => plain.push(' '),
            _ => {}
        }
    }

    let collapsed = plain.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => collapsed[..cut].to_owned(),
        None => collapsed,
    }
}
