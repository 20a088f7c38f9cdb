//! Code block highlighting backed by syntect's bundled syntaxes and themes.

use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::render::CodeBlock;

pub const DEFAULT_THEME: &str = "base16-ocean.dark";

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HighlightedSpan {
    pub text: String,
    pub color: Rgb,
    pub bold: bool,
    pub italic: bool,
}

pub type HighlightedLine = Vec<HighlightedSpan>;

pub struct Highlighter {
    theme: Theme,
}

impl Highlighter {
    /// Falls back to the default theme, then to any bundled theme, when the
    /// name is unknown.
    pub fn new(theme_name: &str) -> Self {
        let theme = THEME_SET
            .themes
            .get(theme_name)
            .or_else(|| {
                log::warn!("Unknown highlight theme {:?}, using {}", theme_name, DEFAULT_THEME);
                THEME_SET.themes.get(DEFAULT_THEME)
            })
            .or_else(|| THEME_SET.themes.values().next())
            .cloned()
            .unwrap_or_default();

        Highlighter { theme }
    }

    /// Background color of the active theme, if it defines one.
    pub fn background(&self) -> Option<Rgb> {
        self.theme.settings.background.map(|c| Rgb {
            r: c.r,
            g: c.g,
            b: c.b,
        })
    }

    fn find_syntax(&self, lang: &str) -> &'static SyntaxReference {
        let lang_lower = lang.to_lowercase();
        let token = match lang_lower.as_str() {
            "js" | "jsx" => "javascript",
            "ts" | "tsx" => "typescript",
            "py" => "python",
            "rb" => "ruby",
            "rs" => "rust",
            "sh" | "bash" | "zsh" | "shell" | "console" => "bash",
            "yml" => "yaml",
            "md" => "markdown",
            "c++" => "cpp",
            other => other,
        };

        if token.is_empty() {
            return SYNTAX_SET.find_syntax_plain_text();
        }

        SYNTAX_SET
            .find_syntax_by_token(token)
            .or_else(|| SYNTAX_SET.find_syntax_by_extension(token))
            .or_else(|| SYNTAX_SET.find_syntax_by_name(lang))
            .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
    }

    pub fn highlight_code(&self, code: &str, lang: &str) -> Vec<HighlightedLine> {
        let syntax = self.find_syntax(lang);
        let mut lines = HighlightLines::new(syntax, &self.theme);

        LinesWithEndings::from(code)
            .map(|line| match lines.highlight_line(line, &SYNTAX_SET) {
                Ok(ranges) => ranges
                    .into_iter()
                    .map(|(style, text)| to_span(style, text))
                    .filter(|span| !span.text.is_empty())
                    .collect(),
                Err(e) => {
                    log::debug!("highlighting failed, showing plain line: {}", e);
                    vec![to_span(Style::default(), line)]
                }
            })
            .collect()
    }

    /// Highlight a block in place. Returns false when it was already done.
    pub fn highlight_block(&self, block: &mut CodeBlock) -> bool {
        if block.highlighted.is_some() {
            return false;
        }
        block.highlighted = Some(self.highlight_code(&block.code, &block.lang));
        true
    }
}

fn to_span(style: Style, text: &str) -> HighlightedSpan {
    HighlightedSpan {
        text: text.trim_end_matches(['\n', '\r']).to_string(),
        color: Rgb {
            r: style.foreground.r,
            g: style.foreground.g,
            b: style.foreground.b,
        },
        bold: style.font_style.contains(FontStyle::BOLD),
        italic: style.font_style.contains(FontStyle::ITALIC),
    }
}
