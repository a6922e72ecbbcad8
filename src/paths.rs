//! Path and URL helpers shared by the index builder, the renderer and the
//! backlinks index.
//!
//! All paths handled here are knowledge-relative strings with `/` separators,
//! never filesystem paths: resolution happens purely on strings so the same
//! rules apply to scanned sources and to in-memory ones.

use std::borrow::Cow;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left unescaped by JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Convert backslashes to `/` and strip any leading slashes.
///
/// Idempotent: `normalize_path(&normalize_path(p)) == normalize_path(p)`.
pub fn normalize_path(input: &str) -> String {
    input.replace('\\', "/").trim_start_matches('/').to_owned()
}

/// Strip the knowledge root segment from a source key.
///
/// A key that starts with `<root_segment>/` loses that prefix. Otherwise the
/// key is cut after the last `/<root_segment>/` it contains. Keys with neither
/// are returned normalized. Matching is ASCII case-insensitive.
pub fn knowledge_relative_path(key: &str, root_segment: &str) -> String {
    let normalized = normalize_path(key);
    let lower = normalized.to_ascii_lowercase();
    let segment = root_segment.trim_matches('/').to_ascii_lowercase();
    if segment.is_empty() {
        return normalized;
    }

    let leading = format!("{segment}/");
    if lower.starts_with(&leading) {
        return normalize_path(&normalized[leading.len()..]);
    }

    let embedded = format!("/{segment}/");
    if let Some(idx) = lower.rfind(&embedded) {
        return normalize_path(&normalized[idx + embedded.len()..]);
    }

    normalized
}

/// Directory part of a knowledge-relative path (empty for top-level files).
pub fn dirname(path: &str) -> String {
    let path = normalize_path(path);
    match path.rfind('/') {
        Some(idx) => path[..idx].to_owned(),
        None => String::new(),
    }
}

/// Resolve `target` relative to the file at `from_file`.
///
/// Targets starting with `/` are relative to the knowledge root. `.` and
/// empty segments are ignored; `..` pops one segment and is clamped at the
/// root.
pub fn resolve_relative_path(from_file: &str, target: &str) -> String {
    let raw_target = target.replace('\\', "/");
    if let Some(rooted) = raw_target.strip_prefix('/') {
        return normalize_path(rooted);
    }

    let target = normalize_path(&raw_target);
    let base = dirname(from_file);
    let merged = if base.is_empty() {
        target
    } else {
        format!("{base}/{target}")
    };

    let mut stack: Vec<&str> = Vec::new();
    for segment in merged.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            part => stack.push(part),
        }
    }
    stack.join("/")
}

/// Split a URL into its path and trailing suffix (query string and/or
/// fragment). The suffix starts at the first `?` or `#`, whichever comes
/// first, and may be empty.
pub fn split_url(url: &str) -> (&str, &str) {
    match url.find(|c| c == '?' || c == '#') {
        Some(pos) => (&url[..pos], &url[pos..]),
        None => (url, ""),
    }
}

/// Percent-decode a URI component, returning the input unchanged when the
/// decoded bytes are not valid UTF-8.
pub fn safe_decode(input: &str) -> Cow<'_, str> {
    match percent_decode_str(input).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(input),
    }
}

/// Percent-encode a string the way `encodeURIComponent` does.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// True for URLs that must never be resolved against the knowledge tree:
/// empty, fragment-only, protocol-relative, or carrying a URI scheme.
pub fn is_external_or_anchor(url: &str) -> bool {
    if url.is_empty() || url.starts_with('#') || url.starts_with("//") {
        return true;
    }
    has_scheme(url)
}

/// True for `http://` and `https://` URLs (case-insensitive).
pub fn is_http_url(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Case-insensitive check of a path's extension against `extensions`
/// (given without the leading dot).
pub fn has_extension(path: &str, extensions: &[String]) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// `^[a-zA-Z][a-zA-Z0-9+.-]*:`
fn has_scheme(url: &str) -> bool {
    let mut chars = url.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    for c in chars {
        if c == ':' {
            return true;
        }
        if !(c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_converts_backslashes_and_strips_leading_slashes() {
        assert_eq!(normalize_path("\\\\a\\b.md"), "a/b.md");
        assert_eq!(normalize_path("///a/b.md"), "a/b.md");
        assert_eq!(normalize_path("a/b.md"), "a/b.md");
    }

    #[test]
    fn normalize_is_idempotent() {
        for input in ["", "/", "\\", "a\\b", "//x//y", "/\\/a", "knowledge\\a/../b.md"] {
            let once = normalize_path(input);
            assert_eq!(normalize_path(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn knowledge_prefix_is_stripped() {
        assert_eq!(knowledge_relative_path("knowledge/a/b.md", "knowledge"), "a/b.md");
        assert_eq!(knowledge_relative_path("Knowledge\\a.md", "knowledge"), "a.md");
    }

    #[test]
    fn embedded_knowledge_segment_uses_last_occurrence() {
        assert_eq!(
            knowledge_relative_path("/src/../knowledge/java/x.md", "knowledge"),
            "java/x.md"
        );
        assert_eq!(
            knowledge_relative_path("/a/knowledge/b/knowledge/c.md", "knowledge"),
            "c.md"
        );
    }

    #[test]
    fn leading_segment_wins_over_nested_directory_with_same_name() {
        assert_eq!(
            knowledge_relative_path("knowledge/notes/knowledge/c.md", "knowledge"),
            "notes/knowledge/c.md"
        );
    }

    #[test]
    fn key_without_segment_is_only_normalized() {
        assert_eq!(knowledge_relative_path("/docs/a.md", "knowledge"), "docs/a.md");
    }

    #[test]
    fn dirname_of_nested_and_top_level() {
        assert_eq!(dirname("a/b/c.md"), "a/b");
        assert_eq!(dirname("c.md"), "");
    }

    #[test]
    fn resolve_parent_link() {
        assert_eq!(resolve_relative_path("a/b.md", "../c.md"), "c.md");
    }

    #[test]
    fn resolve_sibling_and_dot_segments() {
        assert_eq!(resolve_relative_path("a/b.md", "./c.md"), "a/c.md");
        assert_eq!(resolve_relative_path("a/b.md", "img//x.png"), "a/img/x.png");
        assert_eq!(resolve_relative_path("top.md", "sub/page.md"), "sub/page.md");
    }

    #[test]
    fn resolve_clamps_at_root() {
        assert_eq!(resolve_relative_path("a/b.md", "../../../c.md"), "c.md");
        assert_eq!(resolve_relative_path("a/b.md", ".."), "");
    }

    #[test]
    fn resolve_rooted_target() {
        assert_eq!(resolve_relative_path("a/b/c.md", "/x/y.md"), "x/y.md");
    }

    #[test]
    fn split_url_at_first_query_or_fragment() {
        assert_eq!(split_url("a.md#s?q"), ("a.md", "#s?q"));
        assert_eq!(split_url("a.md?q=1#s"), ("a.md", "?q=1#s"));
        assert_eq!(split_url("a.md"), ("a.md", ""));
    }

    #[test]
    fn safe_decode_decodes_and_falls_back() {
        assert_eq!(safe_decode("my%20file.md"), "my file.md");
        assert_eq!(safe_decode("%E7%AC%94%E8%AE%B0.md"), "笔记.md");
        assert_eq!(safe_decode("%FF.md"), "%FF.md");
    }

    #[test]
    fn encode_component_matches_encode_uri_component() {
        assert_eq!(encode_component("java/basics 1.md"), "java%2Fbasics%201.md");
        assert_eq!(encode_component("a-b_c.d!~*'()"), "a-b_c.d!~*'()");
        assert_eq!(encode_component("笔记"), "%E7%AC%94%E8%AE%B0");
    }

    #[test]
    fn external_and_anchor_detection() {
        assert!(is_external_or_anchor(""));
        assert!(is_external_or_anchor("#top"));
        assert!(is_external_or_anchor("//cdn.example.com/x.png"));
        assert!(is_external_or_anchor("mailto:a@b.c"));
        assert!(is_external_or_anchor("HTTPS://example.com"));
        assert!(!is_external_or_anchor("a/b.md"));
        assert!(!is_external_or_anchor("../b.md"));
        assert!(!is_external_or_anchor("1:2.md"));
    }

    #[test]
    fn http_detection_is_case_insensitive() {
        assert!(is_http_url("http://x"));
        assert!(is_http_url("HTTPS://x"));
        assert!(!is_http_url("ftp://x"));
        assert!(!is_http_url("http"));
    }

    #[test]
    fn extension_match_ignores_case() {
        let exts = vec!["md".to_owned(), "markdown".to_owned()];
        assert!(has_extension("a/B.MD", &exts));
        assert!(has_extension("notes.markdown", &exts));
        assert!(!has_extension("a/b.mdx", &exts));
        assert!(!has_extension("md", &exts));
    }
}
