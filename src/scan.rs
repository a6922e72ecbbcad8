//! Knowledge tree discovery.
//!
//! Walks the knowledge root and collects every markdown document (with its
//! text) and every linkable asset (with its resolved URL). Nothing is
//! interpreted here: grouping into modules and link resolution happen in
//! [`crate::index`] and [`crate::html`].
//!
//! Each source carries a key of the form `<root_segment>/<relative path>`,
//! which the index builder strips back to the knowledge-relative path.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::config::ScanConfig;
use crate::paths::{encode_component, has_extension, normalize_path};

/// Maximum markdown file size that will be read (16 MiB).
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Knowledge root not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Knowledge root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A markdown document discovered during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSource {
    pub key: String,
    pub content: String,
}

/// A non-markdown resource discovered during the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSource {
    pub key: String,
    pub url: String,
}

/// Everything the index builder needs, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeSources {
    pub documents: Vec<DocumentSource>,
    pub assets: Vec<AssetSource>,
}

impl KnowledgeSources {
    /// Add an in-memory document.
    pub fn push_document(&mut self, key: impl Into<String>, content: impl Into<String>) {
        self.documents.push(DocumentSource {
            key: key.into(),
            content: content.into(),
        });
    }

    /// Add an in-memory asset.
    pub fn push_asset(&mut self, key: impl Into<String>, url: impl Into<String>) {
        self.assets.push(AssetSource {
            key: key.into(),
            url: url.into(),
        });
    }
}

/// Build the URL of an asset from the configured base and its
/// knowledge-relative path. Each path segment is percent-encoded.
pub fn asset_url(base: &str, relative_path: &str) -> String {
    let encoded: Vec<String> = normalize_path(relative_path)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(encode_component)
        .collect();
    if base.ends_with('/') {
        format!("{}{}", base, encoded.join("/"))
    } else {
        format!("{}/{}", base, encoded.join("/"))
    }
}

/// Directories never descended into.
fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_str().unwrap_or("");
    matches!(name, "node_modules") || name.starts_with('.')
}

/// Walk `root` and collect markdown documents and assets.
///
/// Unreadable entries and oversized or non-UTF-8 documents are skipped with
/// a warning; only a missing or non-directory root is an error.
pub fn scan_knowledge_dir(root: &Path, config: &ScanConfig) -> Result<KnowledgeSources, ScanError> {
    let metadata = match fs::metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        Err(e) => return Err(ScanError::Io(e)),
    };
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut sources = KnowledgeSources::default();
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        let rel = normalize_path(&rel.to_string_lossy());
        let key = format!("{}/{}", config.root_segment.trim_matches('/'), rel);

        if has_extension(&rel, &config.markdown_extensions) {
            if let Some(content) = read_document(path) {
                sources.documents.push(DocumentSource { key, content });
            }
        } else if has_extension(&rel, &config.asset_extensions) {
            let url = asset_url(&config.asset_base_url, &rel);
            sources.assets.push(AssetSource { key, url });
        }
    }

    tracing::info!(
        root = %root.display(),
        documents = sources.documents.len(),
        assets = sources.assets.len(),
        "scanned knowledge root"
    );
    Ok(sources)
}

fn read_document(path: &Path) -> Option<String> {
    match fs::metadata(path) {
        Ok(m) if m.len() > MAX_FILE_SIZE => {
            tracing::warn!(path = %path.display(), size = m.len(), "skipping oversized document");
            return None;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping document");
            return None;
        }
    }
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping document");
            None
        }
    }
}
