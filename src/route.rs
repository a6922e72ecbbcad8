//! Hash-route resolution for the viewer's navigation.
//!
//! Routes are `/`, `/about` and `/knowledge`; the legacy `/blog` and
//! `/blogs/...` paths redirect to `/knowledge`. The knowledge route carries
//! the `module` and `file` query parameters that select what to show.

use serde::Serialize;

use crate::paths::{encode_component, safe_decode};

/// Path of the knowledge view.
pub const KNOWLEDGE_PATH: &str = "/knowledge";

/// Query parameters understood by the knowledge view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeQuery {
    pub module: Option<String>,
    pub file: Option<String>,
}

/// A resolved navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    Home,
    About,
    Knowledge(KnowledgeQuery),
    NotFound { path: String },
}

impl KnowledgeQuery {
    pub fn new(module: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            module: Some(module.into()),
            file: Some(file.into()),
        }
    }

    /// In-app href for this query, e.g. `#/knowledge?module=java&file=java%2Fa.md`.
    pub fn to_href(&self) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(module) = &self.module {
            params.push(format!("module={}", encode_component(module)));
        }
        if let Some(file) = &self.file {
            params.push(format!("file={}", encode_component(file)));
        }
        if params.is_empty() {
            format!("#{KNOWLEDGE_PATH}")
        } else {
            format!("#{KNOWLEDGE_PATH}?{}", params.join("&"))
        }
    }

    /// Parse a query string (without the leading `?`). Unknown parameters are
    /// ignored, later duplicates win, `+` decodes to a space.
    pub fn parse(query: &str) -> Self {
        let mut parsed = Self::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_query_value(value);
            match decode_query_value(key).as_str() {
                "module" => parsed.module = Some(value),
                "file" => parsed.file = Some(value),
                _ => {}
            }
        }
        parsed
    }
}

fn decode_query_value(raw: &str) -> String {
    safe_decode(&raw.replace('+', " ")).into_owned()
}

impl Route {
    /// Resolve a location such as `#/knowledge?module=a&file=a%2Fb.md`,
    /// `/about` or `blog`.
    pub fn resolve(location: &str) -> Self {
        let location = location.trim();
        let location = location.strip_prefix('#').unwrap_or(location);
        let (path, query) = match location.split_once('?') {
            Some((path, query)) => (path, query),
            None => (location, ""),
        };
        let query = query.split('#').next().unwrap_or("");

        let trimmed = path.trim_matches('/');
        let normalized = format!("/{trimmed}");

        match normalized.as_str() {
            "/" => Self::Home,
            "/about" => Self::About,
            KNOWLEDGE_PATH => Self::Knowledge(KnowledgeQuery::parse(query)),
            "/blog" | "/blogs" => Self::Knowledge(KnowledgeQuery::default()),
            p if p.starts_with("/blogs/") => Self::Knowledge(KnowledgeQuery::default()),
            _ => Self::NotFound { path: normalized },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_static_routes() {
        assert_eq!(Route::resolve("#/"), Route::Home);
        assert_eq!(Route::resolve(""), Route::Home);
        assert_eq!(Route::resolve("#/about"), Route::About);
        assert_eq!(Route::resolve("/about/"), Route::About);
    }

    #[test]
    fn knowledge_route_parses_query() {
        let route = Route::resolve("#/knowledge?module=java&file=java%2Fbasics%201.md");
        assert_eq!(route, Route::Knowledge(KnowledgeQuery::new("java", "java/basics 1.md")));
    }

    #[test]
    fn plus_decodes_to_space_and_unknown_params_ignored() {
        let query = KnowledgeQuery::parse("file=a+b.md&x=1&module");
        assert_eq!(query.file.as_deref(), Some("a b.md"));
        assert_eq!(query.module.as_deref(), Some(""));
    }

    #[test]
    fn legacy_blog_paths_redirect_without_query() {
        let expected = Route::Knowledge(KnowledgeQuery::default());
        assert_eq!(Route::resolve("#/blog"), expected);
        assert_eq!(Route::resolve("#/blogs"), expected);
        assert_eq!(Route::resolve("#/blogs/2023/post?file=x.md"), expected);
    }

    #[test]
    fn unknown_path_is_not_found() {
        assert_eq!(
            Route::resolve("#/blogger"),
            Route::NotFound {
                path: "/blogger".to_owned()
            }
        );
    }

    #[test]
    fn href_round_trips_through_resolve() {
        let query = KnowledgeQuery::new("数据库", "数据库/索引 & 锁.md");
        let href = query.to_href();
        assert!(href.starts_with("#/knowledge?module=%E6"), "got: {href}");
        assert_eq!(Route::resolve(&href), Route::Knowledge(query));
    }

    #[test]
    fn empty_query_href() {
        assert_eq!(KnowledgeQuery::default().to_href(), "#/knowledge");
    }
}
