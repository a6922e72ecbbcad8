//! kbview: the core of a markdown knowledge-base viewer.
//!
//! A knowledge tree on disk is scanned ([`scan`]), grouped into modules
//! ([`index`]) and rendered file by file to HTML with a table of contents
//! ([`html`]). Hash routes select what to show ([`route`]) and
//! [`backlinks`] lists which files link to a given one.

pub mod backlinks;
pub mod config;
pub mod highlight;
pub mod html;
pub mod index;
pub mod paths;
pub mod route;
pub mod scan;

use std::path::Path;

use thiserror::Error;

use config::{ConfigError, KbConfig};
use index::KnowledgeBase;
use scan::ScanError;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown file: {0}")]
    UnknownFile(String),
}

/// Scan `root` and build the knowledge index with `config`'s settings.
pub fn load_knowledge_base(root: &Path, config: &KbConfig) -> Result<KnowledgeBase, Error> {
    let sources = scan::scan_knowledge_dir(root, &config.scan_config())?;
    Ok(KnowledgeBase::build(&sources, &config.index_config()))
}
