//! Syntax highlighting module using syntect-assets (bat themes)
//!
//! Highlights full files into HTML markup, one line of markup per source line.

use anyhow::Result;
use regex::Regex;
use std::sync::OnceLock;
use syntect::easy::HighlightLines;
use syntect::highlighting::FontStyle;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect_assets::assets::HighlightingAssets;

/// Language tag meaning "no highlighting"
pub const PLAIN_LANGUAGE: &str = "clean";

/// File extensions and the language tag each one maps to
pub const LANGUAGES: &[(&str, &str)] = &[
    ("js", "javascript"),
    ("ts", "typescript"),
    ("java", "java"),
    ("proto", "protobuf"),
    ("md", "markdown"),
    ("json", "json"),
    ("css", "css"),
    ("scss", "scss"),
    ("html", "html"),
    ("sh", "bash"),
    ("xml", "xml"),
    ("py", "python"),
];

/// Renders code as markup. Output must have the same number of lines as input.
pub trait Highlighter {
    fn highlight(&self, code: &str, language: &str) -> String;
}

/// Escapes HTML special characters and adds no styling
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, code: &str, _language: &str) -> String {
        escape_html(code)
    }
}

/// A simple style used for highlighting (foreground + modifiers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextStyle {
    pub fg: (u8, u8, u8),
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl TextStyle {
    fn css(&self) -> String {
        let (r, g, b) = self.fg;
        let mut css = format!("color:#{:02x}{:02x}{:02x}", r, g, b);
        if self.bold {
            css.push_str(";font-weight:bold");
        }
        if self.italic {
            css.push_str(";font-style:italic");
        }
        if self.underline {
            css.push_str(";text-decoration:underline");
        }
        css
    }
}

/// Syntax highlighter using syntect parsers and themes
pub struct SyntectHighlighter {
    assets: HighlightingAssets,
    theme_name: String,
}

impl SyntectHighlighter {
    pub fn new(theme_name: Option<&str>) -> Result<Self> {
        let assets = HighlightingAssets::from_binary();
        let theme_name = theme_name
            .map(|s| s.to_string())
            .or_else(|| std::env::var("BAT_THEME").ok())
            .unwrap_or_else(|| HighlightingAssets::default_theme().to_string());
        Ok(Self { assets, theme_name })
    }

    /// Tags that name no syntax (e.g. `protobuf`) fall back to their extension
    fn find_syntax<'a>(syntax_set: &'a SyntaxSet, language: &str) -> &'a SyntaxReference {
        if language == PLAIN_LANGUAGE {
            return syntax_set.find_syntax_plain_text();
        }
        syntax_set
            .find_syntax_by_token(language)
            .or_else(|| syntax_set.find_syntax_by_name(language))
            .or_else(|| {
                LANGUAGES
                    .iter()
                    .find(|(_, tag)| *tag == language)
                    .and_then(|(extension, _)| syntax_set.find_syntax_by_extension(extension))
            })
            .unwrap_or_else(|| syntax_set.find_syntax_plain_text())
    }

    fn to_text_style(style: syntect::highlighting::Style) -> TextStyle {
        let fg = (style.foreground.r, style.foreground.g, style.foreground.b);
        TextStyle {
            fg,
            bold: style.font_style.contains(FontStyle::BOLD),
            italic: style.font_style.contains(FontStyle::ITALIC),
            underline: style.font_style.contains(FontStyle::UNDERLINE),
        }
    }
}

impl Highlighter for SyntectHighlighter {
    /// Each line is closed on its own, spans never cross a line break
    fn highlight(&self, code: &str, language: &str) -> String {
        let theme = self.assets.get_theme(&self.theme_name);
        let Ok(syntax_set) = self.assets.get_syntax_set() else {
            return escape_html(code);
        };
        let syntax = Self::find_syntax(syntax_set, language);
        let mut highlighter = HighlightLines::new(syntax, theme);

        let mut per_line: Vec<String> = Vec::new();
        for line in code.split('\n') {
            let text = format!("{}\n", line);
            let ranges = match highlighter.highlight_line(&text, syntax_set) {
                Ok(r) => r,
                Err(_) => {
                    per_line.push(escape_html(line));
                    continue;
                }
            };

            let mut markup = String::with_capacity(line.len() * 2);
            for (style, segment) in ranges {
                let segment = segment.trim_end_matches(['\n', '\r']);
                if segment.is_empty() {
                    continue;
                }
                markup.push_str(&format!(
                    "<span style=\"{}\">{}</span>",
                    Self::to_text_style(style).css(),
                    escape_html(segment)
                ));
            }
            per_line.push(markup);
        }

        per_line.join("\n")
    }
}

/// Replace HTML special chars with entities
pub fn escape_html(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    for c in code.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '/' => out.push_str("&#x2F;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            _ => out.push(c),
        }
    }
    out
}

fn extension_regex() -> &'static Regex {
    static EXTENSION: OnceLock<Regex> = OnceLock::new();
    EXTENSION.get_or_init(|| Regex::new(r"(?:\.([^./\\]+))?$").expect("valid extension regex"))
}

/// Language tag for a file name, e.g. `filename.js` -> `javascript`
pub fn language_for_path(filename: &str) -> &'static str {
    let extension = extension_regex()
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    extension
        .and_then(|ext| LANGUAGES.iter().find(|(known, _)| *known == ext))
        .map(|(_, tag)| *tag)
        .unwrap_or(PLAIN_LANGUAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path("foo.py"), "python");
        assert_eq!(language_for_path("src/app/main.ts"), "typescript");
        assert_eq!(language_for_path("build.sh"), "bash");
        assert_eq!(language_for_path("style.scss"), "scss");
        assert_eq!(language_for_path("foo.unknownext"), "clean");
        assert_eq!(language_for_path("Makefile"), "clean");
        assert_eq!(language_for_path("dir.d/README"), "clean");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("x > y && a='b'"), "x &gt; y &amp;&amp; a&#x3D;&#39;b&#39;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_plain_highlighter_keeps_line_count() {
        let code = "fn main() {\n    let x = 1 < 2;\n}\n";
        let markup = PlainHighlighter.highlight(code, "clean");
        assert_eq!(markup.split('\n').count(), code.split('\n').count());
    }

    #[test]
    fn test_syntect_highlighter_keeps_line_count() {
        let highlighter = SyntectHighlighter::new(None).unwrap();
        let code = "/* multi\n   line */\nconst s = \"a\";\n";
        let markup = highlighter.highlight(code, "javascript");
        assert_eq!(markup.split('\n').count(), 4);
        assert!(markup.contains("<span"));

        // Every span closes on the line it opened
        for line in markup.split('\n') {
            assert_eq!(line.matches("<span").count(), line.matches("</span>").count());
        }
        assert_eq!(markup.matches("&quot;").count(), code.matches('"').count());
    }

    #[test]
    fn test_every_language_tag_has_a_syntax() {
        let highlighter = SyntectHighlighter::new(None).unwrap();
        let syntax_set = highlighter.assets.get_syntax_set().unwrap();
        let plain = syntax_set.find_syntax_plain_text().name.clone();

        for (_, tag) in LANGUAGES {
            let syntax = SyntectHighlighter::find_syntax(syntax_set, tag);
            assert_ne!(syntax.name, plain, "no syntax for {}", tag);
        }
        assert_eq!(
            SyntectHighlighter::find_syntax(syntax_set, PLAIN_LANGUAGE).name,
            plain
        );
    }
}
