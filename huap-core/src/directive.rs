//! Authoring directives layered on top of markdown.
//!
//! Directives occupy a whole line and are rewritten before the markdown
//! renderer sees the document:
//!
//! ```text
//! [sidenote]                 ->  <div class="sidenote">
//! [/sidenote]                ->  </div>
//! $code path/to/file.c demo  ->  fenced block with the `demo` snippet
//! ```

use std::path::Path;

use tracing::debug;

use crate::arena::{Arena, ArenaError, Region, Span};
use crate::buffer::Buffer;
use crate::lines::{line_at, split_token, trim, trim_start};
use crate::snippet;

pub const SIDENOTE_OPEN: &str = "[sidenote]";
pub const SIDENOTE_CLOSE: &str = "[/sidenote]";
pub const SIDENOTE_OPEN_HTML: &str = "<div class=\"sidenote\">";
pub const SIDENOTE_CLOSE_HTML: &str = "</div>";
pub const CODE_COMMAND: &str = "$code ";

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    SidenoteOpen,
    SidenoteClose,
    Code(CodeInclude),
    Text,
}

/// A parsed `$code <path> [<snippet>]` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeInclude {
    pub path: String,
    pub snippet: Option<String>,
}

impl CodeInclude {
    /// Parses everything after the command prefix. The snippet is either
    /// `[name]` or a bare token; `[]` counts as no snippet.
    pub fn parse(args: &[u8]) -> Self {
        let (path, rest) = split_token(trim_start(args));
        let rest = trim_start(rest);

        let name = match rest {
            [] => None,
            [b'[', inner @ ..] if rest.len() >= 2 => match memchr::memchr(b']', inner) {
                Some(close) => Some(&inner[..close]),
                None => Some(split_token(rest).0),
            },
            _ => Some(split_token(rest).0),
        };

        Self {
            path: String::from_utf8_lossy(path).into_owned(),
            snippet: name
                .filter(|n| !n.is_empty())
                .map(|n| String::from_utf8_lossy(n).into_owned()),
        }
    }
}

/// Classifies one raw line (without its newline).
pub fn classify(line: &[u8]) -> Directive {
    let trimmed = trim(line);
    if trimmed == SIDENOTE_OPEN.as_bytes() {
        Directive::SidenoteOpen
    } else if trimmed == SIDENOTE_CLOSE.as_bytes() {
        Directive::SidenoteClose
    } else if let Some(args) = trimmed.strip_prefix(CODE_COMMAND.as_bytes()) {
        Directive::Code(CodeInclude::parse(args))
    } else {
        Directive::Text
    }
}

/// Rewrites every directive in the document held by `source`.
///
/// Included files are read into the arena's temporary region, which is
/// reset after each `$code` line. `include_root` anchors relative include
/// paths. Only arena exhaustion is an error; missing files and snippets
/// degrade to inline markers.
pub fn preprocess(arena: &mut Arena, source: Span, include_root: &Path) -> Result<Buffer, ArenaError> {
    let mut out = Buffer::new();
    let mut offset = 0;

    loop {
        let text = arena.get(source);
        let Some(line) = line_at(text, offset) else {
            break;
        };
        offset = line.next;

        match classify(line.content(text)) {
            Directive::SidenoteOpen => {
                out.push_str(SIDENOTE_OPEN_HTML);
                out.push_byte(b'\n');
            }
            Directive::SidenoteClose => {
                out.push_str(SIDENOTE_CLOSE_HTML);
                out.push_byte(b'\n');
            }
            Directive::Code(include) => {
                include_code(arena, &include, include_root, &mut out)?;
                out.push_byte(b'\n');
            }
            Directive::Text => out.push_bytes(line.raw(text)),
        }
    }

    Ok(out)
}

fn include_code(
    arena: &mut Arena,
    include: &CodeInclude,
    include_root: &Path,
    out: &mut Buffer,
) -> Result<(), ArenaError> {
    if include.path.is_empty() {
        return Ok(());
    }

    let result = arena.read_file(include_root.join(&include.path), Region::Temporary);
    let result = match result {
        Ok(file) => {
            emit_fenced(out, arena.get(file), include.snippet.as_deref());
            Ok(())
        }
        Err(ArenaError::Io(e)) => {
            debug!("Code include {} unreadable: {}", include.path, e);
            out.push_str("`[Code file not found: ");
            out.push_str(&include.path);
            out.push_str("]`");
            Ok(())
        }
        Err(e) => Err(e),
    };

    arena.reset_temp();
    result
}

fn emit_fenced(out: &mut Buffer, file: &[u8], snippet_name: Option<&str>) {
    out.push_byte(b'\n');
    out.push_str(FENCE);
    out.push_byte(b'\n');

    match snippet_name {
        Some(name) => match snippet::extract(file, name.as_bytes()) {
            Some(body) => out.push_bytes(body),
            None => out.push_str(snippet::SNIPPET_NOT_FOUND),
        },
        None => snippet::append_without_markers(out, file),
    }

    if !out.as_bytes().ends_with(b"\n") {
        out.push_byte(b'\n');
    }
    out.push_str(FENCE);
    out.push_byte(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn run(markdown: &str, root: &Path) -> String {
        let mut arena = Arena::with_capacity(64 * 1024);
        let source = arena.alloc_perm(markdown.len()).unwrap();
        arena.get_mut(source).copy_from_slice(markdown.as_bytes());
        let out = preprocess(&mut arena, source, root).unwrap();
        out.to_string_lossy().into_owned()
    }

    #[test]
    fn test_classify_exact_sidenote_lines() {
        assert_eq!(classify(b"[sidenote]"), Directive::SidenoteOpen);
        assert_eq!(classify(b"  [sidenote]\t\r"), Directive::SidenoteOpen);
        assert_eq!(classify(b"[/sidenote]"), Directive::SidenoteClose);
        assert_eq!(classify(b"see [sidenote] here"), Directive::Text);
        assert_eq!(classify(b"[sidenote] trailing"), Directive::Text);
    }

    #[test]
    fn test_classify_code_lines() {
        assert_eq!(
            classify(b"  $code src/foo.c [demo]"),
            Directive::Code(CodeInclude {
                path: "src/foo.c".into(),
                snippet: Some("demo".into()),
            })
        );
        assert_eq!(
            classify(b"$code foo.c demo extra"),
            Directive::Code(CodeInclude {
                path: "foo.c".into(),
                snippet: Some("demo".into()),
            })
        );
        assert_eq!(
            classify(b"$code foo.c"),
            Directive::Code(CodeInclude {
                path: "foo.c".into(),
                snippet: None,
            })
        );
        assert_eq!(classify(b"$code foo.c []"), classify(b"$code foo.c"));
        // Trailing whitespace is trimmed first, so a bare command is text.
        assert_eq!(classify(b"$code   "), Directive::Text);
        assert_eq!(classify(b"run $code foo.c"), Directive::Text);
    }

    #[test]
    fn test_bracket_name_may_contain_spaces() {
        let include = CodeInclude::parse(b"foo.c [two words]");
        assert_eq!(include.snippet.as_deref(), Some("two words"));

        let include = CodeInclude::parse(b"foo.c [open");
        assert_eq!(include.snippet.as_deref(), Some("[open"));
    }

    #[test]
    fn test_sidenote_rewrite() {
        let dir = TempDir::new().unwrap();
        let out = run("[sidenote]\nText\n[/sidenote]", dir.path());
        assert_eq!(out, "<div class=\"sidenote\">\nText\n</div>\n");
    }

    #[test]
    fn test_plain_lines_pass_through() {
        let dir = TempDir::new().unwrap();
        let text = "# Title\r\n\nA [sidenote] inline.\nno newline";
        assert_eq!(run(text, dir.path()), text);
        assert_eq!(run("", dir.path()), "");
    }

    #[test]
    fn test_code_snippet_include() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("foo.c"), "//snippet demo\nint x;\n//endsnippet\n").unwrap();

        let out = run("Before\n$code foo.c [demo]\nAfter\n", dir.path());
        assert_eq!(out, "Before\n\n```\nint x;\n```\n\nAfter\n");
    }

    #[test]
    fn test_code_whole_file_strips_markers() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("foo.c"),
            "int a;\n//snippet demo\nint x;\n//endsnippet\nint b;",
        )
        .unwrap();

        let out = run("$code foo.c\n", dir.path());
        assert_eq!(out, "\n```\nint a;\n\nint x;\n\nint b;\n```\n\n");
    }

    #[test]
    fn test_missing_snippet_placeholder() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("foo.c"), "int x;\n").unwrap();

        let out = run("$code foo.c [nope]\n", dir.path());
        assert_eq!(out, "\n```\nSNIPPET NOT FOUND\n```\n\n");
    }

    #[test]
    fn test_missing_file_marker() {
        let dir = TempDir::new().unwrap();
        let out = run("$code missing.c\ntext\n", dir.path());
        assert_eq!(out, "`[Code file not found: missing.c]`\ntext\n");
    }

    #[test]
    fn test_repeated_includes_share_scratch() {
        let dir = TempDir::new().unwrap();
        let body = "x".repeat(3000);
        fs::write(dir.path().join("big.txt"), &body).unwrap();

        // Each include needs more than a third of the arena; without the
        // temporary reset the third one would not fit.
        let markdown = "$code big.txt\n$code big.txt\n$code big.txt\n";
        let mut arena = Arena::with_capacity(8 * 1024);
        let source = arena.alloc_perm(markdown.len()).unwrap();
        arena.get_mut(source).copy_from_slice(markdown.as_bytes());

        let out = preprocess(&mut arena, source, dir.path()).unwrap();
        assert_eq!(out.to_string_lossy().matches(&body).count(), 3);
        assert_eq!(arena.used_temporary(), 0);
    }

    #[test]
    fn test_oversized_include_exhausts_arena() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(4096)).unwrap();

        let markdown = "$code big.txt\n";
        let mut arena = Arena::with_capacity(1024);
        let source = arena.alloc_perm(markdown.len()).unwrap();
        arena.get_mut(source).copy_from_slice(markdown.as_bytes());

        let err = preprocess(&mut arena, source, dir.path()).unwrap_err();
        assert!(matches!(err, ArenaError::Exhausted { .. }));
    }
}
