//! Code-fence syntax highlighting.
//!
//! The renderer only sees the [`Highlighter`] trait; [`SyntectHighlighter`]
//! is the default implementation and [`PlainHighlighter`] disables
//! highlighting entirely.

use std::collections::HashMap;

use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// CSS class prefix for highlighted spans.
pub const CLASS_PREFIX: &str = "hl-";

/// Fence languages registered by default, mapped to syntect lookup tokens.
///
/// syntect ships no TypeScript grammar, so TypeScript falls back to the
/// JavaScript one.
const DEFAULT_ALIASES: &[(&str, &str)] = &[
    ("bash", "bash"),
    ("sh", "bash"),
    ("css", "css"),
    ("java", "java"),
    ("javascript", "js"),
    ("js", "js"),
    ("json", "json"),
    ("markdown", "md"),
    ("md", "md"),
    ("python", "py"),
    ("py", "py"),
    ("sql", "sql"),
    ("typescript", "js"),
    ("ts", "js"),
    ("xml", "xml"),
    ("html", "html"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
];

/// Turns code into highlighted HTML.
pub trait Highlighter: Send + Sync {
    /// Highlight `code` written in `lang` (already lower-cased).
    ///
    /// Returns `None` when the language is not recognized; the caller then
    /// falls back to escaped plain text. Returned markup must already be
    /// HTML-escaped.
    fn highlight(&self, code: &str, lang: &str) -> Option<String>;
}

/// Highlighter that recognizes no language.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, _code: &str, _lang: &str) -> Option<String> {
        None
    }
}

/// syntect-backed highlighter emitting classed `<span>` markup.
pub struct SyntectHighlighter {
    syntax_set: SyntaxSet,
    aliases: HashMap<String, String>,
}

impl SyntectHighlighter {
    /// Load syntect's bundled syntaxes with the default alias table.
    pub fn new() -> Self {
        Self::with_aliases(std::iter::empty::<(String, String)>())
    }

    /// Load syntect's bundled syntaxes; `extra` aliases override the defaults.
    pub fn with_aliases<I, K, V>(extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut aliases: HashMap<String, String> = DEFAULT_ALIASES
            .iter()
            .map(|(alias, token)| ((*alias).to_owned(), (*token).to_owned()))
            .collect();
        for (alias, token) in extra {
            aliases.insert(alias.as_ref().to_lowercase(), token.into());
        }
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            aliases,
        }
    }

    fn find_syntax(&self, lang: &str) -> Option<&SyntaxReference> {
        if lang.is_empty() {
            return None;
        }
        let token = self.aliases.get(lang).map(String::as_str).unwrap_or(lang);
        self.syntax_set.find_syntax_by_token(token)
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyntectHighlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntectHighlighter")
            .field("syntaxes", &self.syntax_set.syntaxes().len())
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(&self, code: &str, lang: &str) -> Option<String> {
        let syntax = self.find_syntax(lang)?;
        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntax_set,
            ClassStyle::SpacedPrefixed {
                prefix: CLASS_PREFIX,
            },
        );
        for line in LinesWithEndings::from(code) {
            if let Err(err) = generator.parse_html_for_line_which_includes_newline(line) {
                tracing::debug!(lang, error = %err, "highlighting failed, falling back to plain text");
                return None;
            }
        }
        Some(generator.finalize())
    }
}
