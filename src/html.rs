//! HTML rendering of knowledge files.
//!
//! Converts a file's markdown to HTML using comrak with GFM extensions plus
//! footnotes and task lists, then:
//!
//! - replaces fenced code blocks with a labelled, highlighted code panel;
//! - rewrites relative links between markdown files into in-app navigation
//!   hrefs and relative asset references into asset URLs;
//! - assigns every heading (levels 1–4) a unique anchor id and collects the
//!   table of contents.
//!
//! Rendering is a pure function of the file content and the index it is
//! resolved against.

use std::collections::HashSet;

use comrak::{
    arena_tree::NodeEdge,
    format_html,
    nodes::{AstNode, NodeValue},
    parse_document, Arena, Options,
};
use serde::Serialize;

use crate::config::{KbConfig, Labels};
use crate::highlight::{Highlighter, PlainHighlighter, SyntectHighlighter};
use crate::index::{KnowledgeBase, KnowledgeFile};
use crate::paths::{is_external_or_anchor, is_http_url, resolve_relative_path, safe_decode, split_url};
use crate::route::KnowledgeQuery;

/// Deepest heading level that receives an anchor id and a TOC entry.
pub const MAX_TOC_LEVEL: u8 = 4;

const EXTERNAL_LINK_ATTRS: &str = " target=\"_blank\" rel=\"noopener noreferrer\"";
const IMAGE_ATTRS: &str = " referrerpolicy=\"no-referrer\" loading=\"lazy\" decoding=\"async\"";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    /// Anchor id, unique within the rendered document.
    pub id: String,
    pub text: String,
    /// Heading level (1–4).
    pub level: u8,
}

/// Output of [`RenderEngine::render_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedFile {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// The renderer's long-lived state: the highlighter and UI labels.
///
/// Loading a highlighter is expensive, so build one engine per process and
/// pass it to every render.
pub struct RenderEngine {
    highlighter: Box<dyn Highlighter>,
    labels: Labels,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Build comrak options.
///
/// - GFM extensions: strikethrough, tables, autolinks, task lists; plus
///   footnotes.
/// - Raw HTML in the input is shown as escaped text (`render.escape`), so
///   `List<String>` survives as prose and every `<a>`, `<img>` and `<hN>` in
///   the output comes from markdown.
/// - Task list items render as read-only checkboxes; there is no label
///   wrapping and toggling them has no effect.
fn make_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.footnotes = true;
    options.render.unsafe_ = false;
    options.render.escape = true;
    options.render.hardbreaks = false;
    options
}

/// Minimal HTML entity escaping for text content and attribute values.
pub(crate) fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Convert heading text to an anchor slug.
///
/// Lowercases, keeps letters and digits, turns runs of whitespace and
/// hyphens into a single `-`, drops everything else, and trims hyphens from
/// both ends. Non-ASCII letters are kept.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_owned()
}

/// Pick a heading id not yet in `used` and record it.
///
/// Empty slugs fall back to `section-<index>`. Collisions get `-2`, `-3`, ...
fn unique_heading_id(text: &str, used: &mut HashSet<String>, index: usize) -> String {
    let mut base = slugify(text);
    if base.is_empty() {
        base = format!("section-{index}");
    }

    let mut candidate = base.clone();
    let mut suffix = 2usize;
    while used.contains(&candidate) {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}

/// Recursively collect plain-text content of a heading AST node.
///
/// This is the rendered text, not the raw inline source: link targets,
/// emphasis markers and entity spellings do not reach the slug, so a heading
/// like `[API](api.md) &amp; more` yields `api-more`, not an id built from
/// the markdown source.
fn collect_heading_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(s) => text.push_str(s),
            NodeValue::Code(c) => text.push_str(&c.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => text.push_str(&collect_heading_text(child)),
        }
    }
    text
}

/// Inject `id` attributes into heading elements in the rendered HTML.
///
/// Performs sequential first-occurrence replacements `<hN>` → `<hN id="...">`
/// in document order. Headings deeper than [`MAX_TOC_LEVEL`] are not in the
/// TOC and keep their bare tag.
fn inject_heading_ids(html: &str, toc: &[TocEntry]) -> String {
    let mut result = html.to_owned();
    for entry in toc {
        let tag = format!("<h{}>", entry.level);
        let with_id = format!("<h{} id=\"{}\">", entry.level, html_escape(&entry.id));
        result = result.replacen(&tag, &with_id, 1);
    }
    result
}

/// Add safety attributes to external links and loading hints to images.
fn decorate_links_and_images(html: &str) -> String {
    const ANCHOR_OPEN: &str = "<a href=\"";
    const IMAGE_OPEN: &str = "<img src=\"";

    let mut with_images = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(pos) = rest.find(IMAGE_OPEN) {
        with_images.push_str(&rest[..pos]);
        let src = &rest[pos + IMAGE_OPEN.len()..];
        with_images.push_str("<img");
        // Images without a source are left bare.
        if !src.starts_with('"') {
            with_images.push_str(IMAGE_ATTRS);
        }
        with_images.push_str(" src=\"");
        rest = src;
    }
    with_images.push_str(rest);

    let mut out = String::with_capacity(with_images.len());
    let mut rest = with_images.as_str();
    while let Some(pos) = rest.find(ANCHOR_OPEN) {
        out.push_str(&rest[..pos]);
        let href = &rest[pos + ANCHOR_OPEN.len()..];
        out.push_str("<a");
        if is_http_url(href) {
            out.push_str(EXTERNAL_LINK_ATTRS);
        }
        out.push_str(" href=\"");
        rest = href;
    }
    out.push_str(rest);
    out
}

/// Split a fence info string into `(normalized language, display label)`.
///
/// Only the first whitespace-delimited token counts. The label defaults to
/// `text` when the info string is empty.
fn fence_language(info: &str) -> (String, String) {
    let first = info.split_whitespace().next().unwrap_or("");
    let label = if first.is_empty() { "text" } else { first };
    (first.to_lowercase(), label.to_owned())
}

// ---------------------------------------------------------------------------
// Link resolution
// ---------------------------------------------------------------------------

/// Resolve a relative link target against the file at `from_file`.
///
/// Returns the knowledge-relative target path and the URL's `?`/`#` suffix,
/// or `None` for external and fragment-only URLs and for targets resolving
/// to the knowledge root itself.
pub(crate) fn resolve_local_target<'u>(url: &'u str, from_file: &str) -> Option<(String, &'u str)> {
    if is_external_or_anchor(url) {
        return None;
    }
    let (path, suffix) = split_url(url);
    let decoded = safe_decode(path);
    let resolved = resolve_relative_path(from_file, &decoded);
    if resolved.is_empty() {
        return None;
    }
    Some((resolved, suffix))
}

/// New href for a link in `file`, or `None` to leave it unchanged.
///
/// Links to indexed markdown files become in-app navigation hrefs (the
/// original suffix is dropped); links to known assets become the asset URL
/// with the suffix kept. Everything else is left alone.
fn rewrite_link_href(url: &str, file: &KnowledgeFile, kb: &KnowledgeBase) -> Option<String> {
    if url.is_empty() || is_http_url(url) {
        return None;
    }
    let (resolved, suffix) = resolve_local_target(url, &file.relative_path)?;

    if kb.is_markdown_path(&resolved) {
        let linked = kb.file(&resolved)?;
        return Some(KnowledgeQuery::new(&linked.module_id, &linked.id).to_href());
    }

    kb.asset_url(&resolved).map(|asset| format!("{asset}{suffix}"))
}

/// New src for an image in `file`, or `None` to leave it unchanged.
fn rewrite_image_src(url: &str, file: &KnowledgeFile, kb: &KnowledgeBase) -> Option<String> {
    let (resolved, suffix) = resolve_local_target(url, &file.relative_path)?;
    kb.asset_url(&resolved).map(|asset| format!("{asset}{suffix}"))
}

/// Rewrite link and image URLs in place.
///
/// Links inside code are text, not `Link` nodes, so they are never touched.
///
/// # Returns
/// `(rewritten, skipped)` counts.
fn rewrite_links<'a>(root: &'a AstNode<'a>, file: &KnowledgeFile, kb: &KnowledgeBase) -> (usize, usize) {
    let mut rewritten = 0usize;
    let mut skipped = 0usize;

    for node in root.descendants() {
        let mut data = node.data.borrow_mut();
        let new_url = match &data.value {
            NodeValue::Link(link) => rewrite_link_href(&link.url, file, kb),
            NodeValue::Image(image) => rewrite_image_src(&image.url, file, kb),
            _ => continue,
        };

        match (new_url, &mut data.value) {
            (Some(url), NodeValue::Link(link) | NodeValue::Image(link)) => {
                link.url = url;
                rewritten += 1;
            }
            _ => skipped += 1,
        }
    }

    (rewritten, skipped)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl RenderEngine {
    pub fn new(highlighter: Box<dyn Highlighter>, labels: Labels) -> Self {
        Self { highlighter, labels }
    }

    /// Engine with syntect highlighting, configured aliases and labels.
    pub fn from_config(config: &KbConfig) -> Self {
        let highlighter = SyntectHighlighter::with_aliases(
            config
                .highlight
                .aliases
                .iter()
                .map(|(alias, token)| (alias.as_str(), token.clone())),
        );
        Self::new(Box::new(highlighter), config.labels.clone())
    }

    /// Engine that never highlights.
    pub fn plain() -> Self {
        Self::new(Box::new(PlainHighlighter), Labels::default())
    }

    /// Render `file` against `kb`. A missing file renders to empty output.
    pub fn render_file(&self, file: Option<&KnowledgeFile>, kb: &KnowledgeBase) -> RenderedFile {
        let Some(file) = file else {
            return RenderedFile::default();
        };

        let arena = Arena::new();
        let options = make_options();
        let root = parse_document(&arena, &file.content_raw, &options);

        let fences = self.rewrite_code_fences(root);
        let (rewritten, skipped) = rewrite_links(root, file, kb);
        let toc = self.extract_toc(root);

        let mut html_bytes = Vec::new();
        if let Err(err) = format_html(root, &options, &mut html_bytes) {
            tracing::warn!(file = %file.id, error = %err, "html formatting failed");
            return RenderedFile::default();
        }
        let html = String::from_utf8_lossy(&html_bytes);
        let html = decorate_links_and_images(&inject_heading_ids(&html, &toc));

        tracing::debug!(
            file = %file.id,
            fences,
            rewritten,
            skipped,
            headings = toc.len(),
            "rendered"
        );

        RenderedFile { html, toc }
    }

    /// Wrap a fenced code block in the code panel markup.
    fn render_fence(&self, info: &str, literal: &str) -> String {
        let (language, label) = fence_language(info);
        let safe_label = html_escape(&label.to_uppercase());
        let language_class = if language.is_empty() {
            String::new()
        } else {
            format!(" language-{}", html_escape(&language))
        };
        let body = self
            .highlighter
            .highlight(literal, &language)
            .unwrap_or_else(|| html_escape(literal));
        let copy = html_escape(&self.labels.copy_button);

        format!(
            "<div class=\"kb-code-block\">\
<div class=\"kb-code-toolbar\">\
<span class=\"kb-code-lang\">{safe_label}</span>\
<button class=\"kb-code-copy-btn\" type=\"button\">{copy}</button>\
</div>\
<pre><code class=\"hljs{language_class}\">{body}</code></pre>\
</div>\n"
        )
    }

    /// Replace every fenced code block with pre-rendered panel HTML.
    /// Indented code blocks keep comrak's default rendering.
    fn rewrite_code_fences<'a>(&self, root: &'a AstNode<'a>) -> usize {
        let mut rewritten = 0usize;

        for node in root.descendants() {
            let replacement = {
                let data = node.data.borrow();
                match &data.value {
                    NodeValue::CodeBlock(ncb) if ncb.fenced => {
                        Some(self.render_fence(&ncb.info, &ncb.literal))
                    }
                    _ => None,
                }
            };

            if let Some(raw_html) = replacement {
                node.data.borrow_mut().value = NodeValue::Raw(raw_html);
                rewritten += 1;
            }
        }

        rewritten
    }

    /// Collect TOC entries for headings up to [`MAX_TOC_LEVEL`] in document
    /// order, assigning unique ids.
    fn extract_toc<'a>(&self, root: &'a AstNode<'a>) -> Vec<TocEntry> {
        let mut used: HashSet<String> = HashSet::new();
        let mut toc: Vec<TocEntry> = Vec::new();

        for edge in root.traverse() {
            let NodeEdge::Start(node) = edge else {
                continue;
            };
            let level = match &node.data.borrow().value {
                NodeValue::Heading(nh) => nh.level,
                _ => continue,
            };
            if !(1..=MAX_TOC_LEVEL).contains(&level) {
                continue;
            }

            let position = toc.len() + 1;
            let title = collect_heading_text(node).trim().to_owned();
            let id = unique_heading_id(&title, &mut used, position);
            let text = if title.is_empty() {
                format!("{} {}", self.labels.untitled_heading, position)
            } else {
                title
            };
            toc.push(TocEntry { id, text, level });
        }

        toc
    }
}

impl std::fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderEngine")
            .field("labels", &self.labels)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
