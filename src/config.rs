//! Configuration for kbview.
//!
//! Parses `kbview.toml` with serde. Every field has a default, so a config
//! file only needs the values it changes. Without an explicit path the file
//! is discovered in the current directory or its parents.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Configuration filename to search for.
pub const CONFIG_FILENAME: &str = "kbview.toml";

/// Collation locale used when none is configured.
pub const DEFAULT_LOCALE: &str = "zh";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KbConfig {
    /// Directory holding the knowledge tree. Relative paths are resolved
    /// against the directory containing the config file.
    pub root: PathBuf,
    /// Leading path segment stripped from every source key.
    pub root_segment: String,
    /// Prefix prepended to asset paths to form their URLs.
    pub asset_base_url: String,
    /// Extensions (without dot) treated as markdown documents.
    pub markdown_extensions: Vec<String>,
    /// Extensions (without dot) treated as linkable assets.
    pub asset_extensions: Vec<String>,
    /// BCP 47 locale used to order modules, files and assets.
    pub locale: String,
    pub labels: Labels,
    pub highlight: HighlightConfig,

    /// Path to the file this config was loaded from.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

/// User-visible strings emitted by the index and the renderer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Labels {
    /// Display name of the module holding top-level files.
    pub uncategorized: String,
    /// Text of the copy button in code block toolbars.
    pub copy_button: String,
    /// Prefix of the TOC text for headings without text.
    pub untitled_heading: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            uncategorized: "Uncategorized".to_owned(),
            copy_button: "Copy".to_owned(),
            untitled_heading: "Untitled heading".to_owned(),
        }
    }
}

/// Syntax highlighting options.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HighlightConfig {
    /// Extra fence-language aliases, e.g. `{ rs = "rust" }`. Keys are matched
    /// case-insensitively; values are syntax names or file extensions.
    pub aliases: BTreeMap<String, String>,
}

impl Default for KbConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("knowledge"),
            root_segment: "knowledge".to_owned(),
            asset_base_url: "/knowledge/".to_owned(),
            markdown_extensions: vec!["md".to_owned(), "markdown".to_owned()],
            asset_extensions: [
                "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "pdf", "zip", "doc", "docx",
                "xls", "xlsx", "ppt", "pptx",
            ]
            .iter()
            .map(|ext| (*ext).to_owned())
            .collect(),
            locale: DEFAULT_LOCALE.to_owned(),
            labels: Labels::default(),
            highlight: HighlightConfig::default(),
            config_path: None,
        }
    }
}

impl KbConfig {
    /// Load configuration.
    ///
    /// If `config_path` is provided it must exist. Otherwise `kbview.toml` is
    /// searched for in the current directory and its parents, and defaults
    /// are used when none is found.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            return Self::load_from_file(path);
        }

        match Self::discover_config() {
            Some(discovered) => Self::load_from_file(&discovered),
            None => Ok(Self::default()),
        }
    }

    /// Search for the config file in the current directory and parents.
    pub fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Parse a TOML string and validate the result.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if config.root.is_relative() {
            if let Some(base) = path.parent() {
                config.root = base.join(&config.root);
            }
        }
        config.config_path = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), root = %config.root.display(), "loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.root_segment.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "root_segment must not be empty".to_owned(),
            ));
        }
        if let Err(err) = self.locale.parse::<icu_locid::Locale>() {
            return Err(ConfigError::Validation(format!(
                "invalid locale '{}': {err}",
                self.locale
            )));
        }
        if self.markdown_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "markdown_extensions must list at least one extension".to_owned(),
            ));
        }
        let overlap = self.markdown_extensions.iter().find(|md| {
            self.asset_extensions
                .iter()
                .any(|asset| asset.eq_ignore_ascii_case(md))
        });
        if let Some(ext) = overlap {
            return Err(ConfigError::Validation(format!(
                "extension '{ext}' is listed as both markdown and asset"
            )));
        }
        Ok(())
    }

    /// Settings consumed by the directory scanner.
    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            root_segment: self.root_segment.clone(),
            asset_base_url: self.asset_base_url.clone(),
            markdown_extensions: self.markdown_extensions.clone(),
            asset_extensions: self.asset_extensions.clone(),
        }
    }

    /// Settings consumed by the index builder.
    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            root_segment: self.root_segment.clone(),
            markdown_extensions: self.markdown_extensions.clone(),
            uncategorized_label: self.labels.uncategorized.clone(),
            locale: self.locale.clone(),
        }
    }
}

/// Scanner settings derived from [`KbConfig`].
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub root_segment: String,
    pub asset_base_url: String,
    pub markdown_extensions: Vec<String>,
    pub asset_extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        KbConfig::default().scan_config()
    }
}

/// Index builder settings derived from [`KbConfig`].
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub root_segment: String,
    pub markdown_extensions: Vec<String>,
    pub uncategorized_label: String,
    pub locale: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        KbConfig::default().index_config()
    }
}
