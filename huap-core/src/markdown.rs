use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

#[derive(Debug, thiserror::Error)]
pub enum MarkdownError {
    #[error("unknown syntax highlighting theme: {0}")]
    UnknownTheme(String),
    #[error("markdown rendering failed: {0}")]
    Render(String),
}

/// Converts preprocessed markdown into an HTML fragment.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> Result<String, MarkdownError>;
}

/// GitHub-flavoured CommonMark via pulldown-cmark, with optional syntect
/// highlighting of fenced blocks that name a language.
#[derive(Default)]
pub struct CommonMark {
    theme: Option<&'static Theme>,
}

impl CommonMark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_highlight_theme(theme: &str) -> Result<Self, MarkdownError> {
        let theme = THEME_SET
            .themes
            .get(theme)
            .ok_or_else(|| MarkdownError::UnknownTheme(theme.to_string()))?;
        Ok(Self { theme: Some(theme) })
    }

    fn options() -> Options {
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS
    }
}

impl MarkdownRenderer for CommonMark {
    fn render(&self, markdown: &str) -> Result<String, MarkdownError> {
        let parser = Parser::new_ext(markdown, Self::options());
        let mut out = String::with_capacity(markdown.len() * 3 / 2);

        match self.theme {
            None => html::push_html(&mut out, parser),
            Some(theme) => html::push_html(&mut out, highlight_code_blocks(parser, theme).into_iter()),
        }

        Ok(out)
    }
}

fn highlight_code_blocks<'a>(parser: Parser<'a>, theme: &Theme) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    let mut code: Option<(String, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref lang))) if !lang.is_empty() => {
                code = Some((lang.to_string(), String::new()));
            }
            Event::Text(ref text) if code.is_some() => {
                if let Some((_, body)) = code.as_mut() {
                    body.push_str(text);
                }
            }
            Event::End(TagEnd::CodeBlock) if code.is_some() => {
                if let Some((lang, body)) = code.take() {
                    events.push(Event::Html(highlight(&lang, &body, theme).into()));
                }
            }
            event => events.push(event),
        }
    }

    events
}

fn highlight(lang: &str, code: &str, theme: &Theme) -> String {
    let syntax = SYNTAX_SET.find_syntax_by_token(lang).or_else(|| {
        // Fallback mappings for unsupported languages
        match lang {
            "nix" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
            "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
            _ => None,
        }
    });

    let plain = || format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(code));
    match syntax {
        Some(syntax) => highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).unwrap_or_else(|_| plain()),
        None => plain(),
    }
}

/// Rewrites links to sibling markdown documents so they match the output
/// tree: every `.md"` becomes `"`.
///
/// This is a plain substring rewrite. It assumes `.md"` only ever closes a
/// quoted attribute value such as `href="page.md"`.
pub fn strip_md_links(html: &str) -> String {
    html.replace(".md\"", "\"")
}
