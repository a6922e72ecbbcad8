//! Knowledge index: modules, files and assets.
//!
//! Built once from [`KnowledgeSources`]; afterwards it is read-only and is
//! what the renderer resolves links against.

use std::cmp::Ordering;
use std::collections::HashMap;

use icu_collator::{Collator, CollatorOptions};
use icu_locid::Locale;
use serde::Serialize;

use crate::config::IndexConfig;
use crate::paths::{has_extension, knowledge_relative_path, normalize_path};
use crate::route::KnowledgeQuery;
use crate::scan::KnowledgeSources;

/// Module id for files that live directly in the knowledge root.
pub const UNCATEGORIZED_MODULE_ID: &str = "__uncategorized__";

/// A markdown document in the knowledge tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeFile {
    /// Knowledge-relative path, unique across the index.
    pub id: String,
    pub module_id: String,
    /// Last path segment.
    pub name: String,
    pub relative_path: String,
    /// Path below the module directory (the full path for uncategorized files).
    pub path_in_module: String,
    /// Number of directories between the module and the file.
    pub depth: usize,
    #[serde(skip)]
    pub content_raw: String,
}

/// A top-level grouping of files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    pub id: String,
    pub name: String,
    /// File ids in display order.
    pub files: Vec<String>,
    pub count: usize,
}

/// The in-memory knowledge index.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    modules: Vec<Module>,
    file_index: HashMap<String, KnowledgeFile>,
    asset_index: HashMap<String, String>,
    /// Asset paths in display order.
    asset_order: Vec<String>,
    markdown_extensions: Vec<String>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
            file_index: HashMap::new(),
            asset_index: HashMap::new(),
            asset_order: Vec::new(),
            markdown_extensions: IndexConfig::default().markdown_extensions,
        }
    }
}

/// Module a knowledge-relative path belongs to: its first segment, or
/// [`UNCATEGORIZED_MODULE_ID`] for top-level files.
pub fn top_module_id(relative_path: &str) -> String {
    let normalized = normalize_path(relative_path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() <= 1 {
        UNCATEGORIZED_MODULE_ID.to_owned()
    } else {
        segments[0].to_owned()
    }
}

/// Path of a file below its module directory.
pub fn path_in_module(relative_path: &str, module_id: &str) -> String {
    let normalized = normalize_path(relative_path);
    if module_id == UNCATEGORIZED_MODULE_ID {
        return normalized;
    }
    match normalized.strip_prefix(&format!("{module_id}/")) {
        Some(rest) => rest.to_owned(),
        None => normalized,
    }
}

/// Locale-aware string ordering for display lists.
///
/// Backed by an ICU collator for the configured locale, so `zh` orders Han
/// names by pinyin. When no collator can be built for the locale, strings
/// are compared by their lower-cased characters, lower case first on ties.
/// Strings the collator considers equal fall back to code-point order.
pub struct Collation {
    collator: Option<Collator>,
}

impl Collation {
    pub fn new(locale: &str) -> Self {
        let collator = match locale.parse::<Locale>() {
            Ok(parsed) => match Collator::try_new(&parsed.into(), CollatorOptions::new()) {
                Ok(collator) => Some(collator),
                Err(err) => {
                    tracing::warn!(locale, error = %err, "no collator for locale, using case-folded order");
                    None
                }
            },
            Err(err) => {
                tracing::warn!(locale, error = %err, "invalid locale, using case-folded order");
                None
            }
        };
        Self { collator }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let primary = match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => case_folded_cmp(a, b),
        };
        primary.then_with(|| a.cmp(b))
    }
}

impl std::fmt::Debug for Collation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collation")
            .field("icu", &self.collator.is_some())
            .finish()
    }
}

fn case_folded_cmp(a: &str, b: &str) -> Ordering {
    let primary = a.chars().flat_map(char::to_lowercase);
    let other = b.chars().flat_map(char::to_lowercase);
    primary.cmp(other).then_with(|| {
        let case_a = a.chars().map(|c| c.is_uppercase());
        let case_b = b.chars().map(|c| c.is_uppercase());
        case_a.cmp(case_b)
    })
}

impl KnowledgeBase {
    /// Build the index from scanned (or in-memory) sources.
    ///
    /// Source keys are normalized and stripped of the knowledge root segment.
    /// Sources whose path ends up empty are ignored; the first source wins
    /// when two keys normalize to the same path.
    pub fn build(sources: &KnowledgeSources, config: &IndexConfig) -> Self {
        let mut modules: Vec<Module> = Vec::new();
        let mut module_pos: HashMap<String, usize> = HashMap::new();
        let mut file_index: HashMap<String, KnowledgeFile> = HashMap::new();
        let mut asset_index: HashMap<String, String> = HashMap::new();

        for doc in &sources.documents {
            let relative_path = knowledge_relative_path(&doc.key, &config.root_segment);
            if relative_path.is_empty() {
                continue;
            }
            if file_index.contains_key(&relative_path) {
                tracing::warn!(id = %relative_path, key = %doc.key, "duplicate document id, keeping first");
                continue;
            }

            let module_id = top_module_id(&relative_path);
            let in_module = path_in_module(&relative_path, &module_id);
            let segments: Vec<&str> = in_module.split('/').filter(|s| !s.is_empty()).collect();
            let depth = segments.len().saturating_sub(1);
            let name = segments
                .last()
                .map(|s| (*s).to_owned())
                .unwrap_or_else(|| relative_path.clone());

            let file = KnowledgeFile {
                id: relative_path.clone(),
                module_id: module_id.clone(),
                name,
                relative_path: relative_path.clone(),
                path_in_module: in_module,
                depth,
                content_raw: doc.content.clone(),
            };

            let pos = *module_pos.entry(module_id.clone()).or_insert_with(|| {
                let name = if module_id == UNCATEGORIZED_MODULE_ID {
                    config.uncategorized_label.clone()
                } else {
                    module_id.clone()
                };
                modules.push(Module {
                    id: module_id.clone(),
                    name,
                    files: Vec::new(),
                    count: 0,
                });
                modules.len() - 1
            });
            modules[pos].files.push(file.id.clone());
            file_index.insert(file.id.clone(), file);
        }

        for asset in &sources.assets {
            let relative_path = knowledge_relative_path(&asset.key, &config.root_segment);
            if relative_path.is_empty() {
                continue;
            }
            if has_extension(&relative_path, &config.markdown_extensions) {
                tracing::warn!(path = %relative_path, "asset has a markdown extension, ignoring");
                continue;
            }
            asset_index
                .entry(relative_path)
                .or_insert_with(|| asset.url.clone());
        }

        let collation = Collation::new(&config.locale);
        for module in &mut modules {
            module.files.sort_by(|a, b| collation.compare(a, b));
            module.count = module.files.len();
        }
        modules.sort_by(|a, b| collation.compare(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));

        let mut asset_order: Vec<String> = asset_index.keys().cloned().collect();
        asset_order.sort_by(|a, b| collation.compare(a, b));

        tracing::info!(
            modules = modules.len(),
            files = file_index.len(),
            assets = asset_index.len(),
            "built knowledge index"
        );

        Self {
            modules,
            file_index,
            asset_index,
            asset_order,
            markdown_extensions: config.markdown_extensions.clone(),
        }
    }

    /// Modules in display order.
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, id: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.id == id)
    }

    /// Files of `module` in display order.
    pub fn module_files<'a>(&'a self, module: &'a Module) -> impl Iterator<Item = &'a KnowledgeFile> + 'a {
        module.files.iter().filter_map(|id| self.file_index.get(id))
    }

    /// All files, module by module, in display order.
    pub fn files(&self) -> impl Iterator<Item = &KnowledgeFile> + '_ {
        self.modules.iter().flat_map(|m| self.module_files(m))
    }

    pub fn file(&self, id: &str) -> Option<&KnowledgeFile> {
        self.file_index.get(id)
    }

    pub fn file_count(&self) -> usize {
        self.file_index.len()
    }

    /// Whether `path` names a markdown document (by extension), indexed or not.
    pub fn is_markdown_path(&self, path: &str) -> bool {
        has_extension(path, &self.markdown_extensions)
    }

    pub fn asset_url(&self, relative_path: &str) -> Option<&str> {
        self.asset_index.get(relative_path).map(String::as_str)
    }

    /// Assets sorted by path.
    pub fn assets(&self) -> Vec<(&str, &str)> {
        self.asset_order
            .iter()
            .filter_map(|path| {
                self.asset_index
                    .get(path)
                    .map(|url| (path.as_str(), url.as_str()))
            })
            .collect()
    }

    /// Pick the file a knowledge view should show for `query`.
    ///
    /// The `file` parameter wins when it names an indexed file. Otherwise
    /// the first file of the `module` parameter's module is used, and failing
    /// that the first file of the first module.
    pub fn select(&self, query: &KnowledgeQuery) -> Option<&KnowledgeFile> {
        if let Some(file) = query.file.as_deref().and_then(|id| self.file(id)) {
            return Some(file);
        }
        if let Some(module) = query.module.as_deref().and_then(|id| self.module(id)) {
            if let Some(first) = self.module_files(module).next() {
                return Some(first);
            }
        }
        self.files().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sources(docs: &[&str], assets: &[(&str, &str)]) -> KnowledgeSources {
        let mut sources = KnowledgeSources::default();
        for key in docs {
            sources.push_document(*key, format!("content of {key}"));
        }
        for (key, url) in assets {
            sources.push_asset(*key, *url);
        }
        sources
    }

    fn build(docs: &[&str], assets: &[(&str, &str)]) -> KnowledgeBase {
        KnowledgeBase::build(&sources(docs, assets), &IndexConfig::default())
    }

    #[test]
    fn groups_files_by_first_segment() {
        let kb = build(
            &[
                "knowledge/java/basics.md",
                "knowledge/java/advanced/generics.md",
                "knowledge/python/intro.md",
                "knowledge/readme.md",
            ],
            &[],
        );

        let ids: Vec<&str> = kb.modules().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["java", "python", UNCATEGORIZED_MODULE_ID]);

        let java = kb.module("java").unwrap();
        assert_eq!(java.files, vec!["java/advanced/generics.md", "java/basics.md"]);
        assert_eq!(java.count, 2);

        let readme = kb.file("readme.md").unwrap();
        assert_eq!(readme.module_id, UNCATEGORIZED_MODULE_ID);
        assert_eq!(readme.path_in_module, "readme.md");
        assert_eq!(readme.depth, 0);
        assert_eq!(kb.module(UNCATEGORIZED_MODULE_ID).unwrap().name, "Uncategorized");
    }

    #[test]
    fn file_record_fields() {
        let kb = build(&["knowledge\\java\\advanced\\generics.md"], &[]);
        let file = kb.file("java/advanced/generics.md").unwrap();
        assert_eq!(file.module_id, "java");
        assert_eq!(file.name, "generics.md");
        assert_eq!(file.relative_path, "java/advanced/generics.md");
        assert_eq!(file.path_in_module, "advanced/generics.md");
        assert_eq!(file.depth, 1);
        assert_eq!(file.content_raw, "content of knowledge\\java\\advanced\\generics.md");
    }

    #[test]
    fn duplicate_ids_keep_first_source() {
        let kb = build(&["knowledge/a/b.md", "knowledge\\a\\b.md"], &[]);
        assert_eq!(kb.file_count(), 1);
        assert_eq!(kb.module("a").unwrap().count, 1);
        assert_eq!(kb.file("a/b.md").unwrap().content_raw, "content of knowledge/a/b.md");
    }

    #[test]
    fn empty_relative_path_is_skipped() {
        let kb = build(&["knowledge/", "/"], &[]);
        assert_eq!(kb.file_count(), 0);
        assert!(kb.modules().is_empty());
    }

    #[test]
    fn assets_are_indexed_by_relative_path() {
        let kb = build(
            &[],
            &[("knowledge/java/img/a.png", "/kb/java/img/a.png"), ("/knowledge/b.pdf", "/kb/b.pdf")],
        );
        assert_eq!(kb.asset_url("java/img/a.png"), Some("/kb/java/img/a.png"));
        assert_eq!(kb.asset_url("b.pdf"), Some("/kb/b.pdf"));
        assert_eq!(kb.asset_url("missing.png"), None);
        assert_eq!(kb.assets(), vec![("b.pdf", "/kb/b.pdf"), ("java/img/a.png", "/kb/java/img/a.png")]);
    }

    #[test]
    fn modules_sorted_case_insensitively() {
        let kb = build(
            &["knowledge/beta/x.md", "knowledge/Alpha/x.md", "knowledge/gamma/x.md"],
            &[],
        );
        let names: Vec<&str> = kb.modules().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "gamma"]);
    }

    #[test]
    fn collation_orders_deterministically() {
        let zh = Collation::new("zh");
        assert_eq!(zh.compare("apple", "Banana"), Ordering::Less);
        assert_eq!(zh.compare("a", "A"), Ordering::Less);
        assert_eq!(zh.compare("A", "a"), Ordering::Greater);
        assert_eq!(zh.compare("same", "same"), Ordering::Equal);
        assert_eq!(zh.compare("a/b.md", "a/c.md"), Ordering::Less);
    }

    #[test]
    fn zh_collation_orders_han_by_pinyin() {
        let zh = Collation::new("zh");
        let mut names = vec!["中文", "阿里", "bar"];
        names.sort_by(|a, b| zh.compare(a, b));
        assert_eq!(names, vec!["阿里", "中文", "bar"]);
    }

    #[test]
    fn cjk_modules_sort_by_configured_locale() {
        let kb = build(&["knowledge/数据库/索引.md", "knowledge/笔记/a.md"], &[]);
        let ids: Vec<&str> = kb.modules().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["笔记", "数据库"]);
    }

    #[test]
    fn invalid_locale_falls_back_to_case_folded_order() {
        let fallback = Collation::new("not a locale!");
        assert_eq!(fallback.compare("apple", "Banana"), Ordering::Less);
        assert_eq!(fallback.compare("a", "A"), Ordering::Less);
        assert_eq!(fallback.compare("中文", "阿里"), Ordering::Less);
    }

    #[test]
    fn build_is_deterministic_regardless_of_source_order() {
        let forward = build(&["knowledge/m/b.md", "knowledge/m/a.md", "knowledge/n/c.md"], &[]);
        let backward = build(&["knowledge/n/c.md", "knowledge/m/a.md", "knowledge/m/b.md"], &[]);
        assert_eq!(forward.modules(), backward.modules());
    }

    #[test]
    fn select_prefers_file_then_module_then_first() {
        let kb = build(&["knowledge/m/b.md", "knowledge/m/a.md", "knowledge/n/c.md"], &[]);

        let by_file = KnowledgeQuery {
            module: Some("m".to_owned()),
            file: Some("n/c.md".to_owned()),
        };
        assert_eq!(kb.select(&by_file).unwrap().id, "n/c.md");

        let by_module = KnowledgeQuery {
            module: Some("n".to_owned()),
            file: Some("missing.md".to_owned()),
        };
        assert_eq!(kb.select(&by_module).unwrap().id, "n/c.md");

        assert_eq!(kb.select(&KnowledgeQuery::default()).unwrap().id, "m/a.md");
        assert!(KnowledgeBase::default().select(&KnowledgeQuery::default()).is_none());
    }
}
