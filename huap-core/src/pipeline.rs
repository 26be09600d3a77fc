//! The preprocess → render → wrap path shared by builds and the server.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::arena::{Arena, ArenaError, Region};
use crate::buffer::Buffer;
use crate::config::SiteConfig;
use crate::directive::preprocess;
use crate::layout::wrap;
use crate::markdown::{CommonMark, MarkdownError, MarkdownRenderer, strip_md_links};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Arena(#[from] ArenaError),
    #[error(transparent)]
    Markdown(#[from] MarkdownError),
}

/// Everything needed to turn one markdown file into a finished page.
///
/// Immutable once built, so a single context is shared by every build
/// worker or request handler.
pub struct RenderContext {
    root: PathBuf,
    layout: Option<PathBuf>,
    arena_capacity: usize,
    renderer: Box<dyn MarkdownRenderer>,
}

impl RenderContext {
    pub fn new<P: AsRef<Path>>(root: P, renderer: Box<dyn MarkdownRenderer>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            layout: None,
            arena_capacity: crate::arena::DEFAULT_CAPACITY,
            renderer,
        }
    }

    /// Context for the site at `root`, with the layout looked up under it.
    pub fn from_config<P: AsRef<Path>>(root: P, config: &SiteConfig) -> Result<Self, RenderError> {
        let renderer = match &config.highlight_theme {
            Some(theme) => CommonMark::with_highlight_theme(theme)?,
            None => CommonMark::new(),
        };
        let root = root.as_ref();

        Ok(Self::new(root, Box::new(renderer))
            .layout(root.join(&config.layout))
            .arena_capacity(config.arena_capacity))
    }

    /// Layout candidate. It is checked for on every render, so it may
    /// appear or disappear while a server is running.
    pub fn layout<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.layout = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn arena_capacity(mut self, capacity: usize) -> Self {
        self.arena_capacity = capacity;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Renders `source` using a fresh arena that is dropped on return.
    pub fn render_file(&self, source: &Path) -> Result<Buffer, RenderError> {
        let mut arena = Arena::with_capacity(self.arena_capacity);
        self.render_in(&mut arena, source)
    }

    pub fn render_in(&self, arena: &mut Arena, source: &Path) -> Result<Buffer, RenderError> {
        let layout = match self.layout.as_deref().filter(|p| p.is_file()) {
            Some(path) => match arena.read_file(path, Region::Permanent) {
                Ok(span) => Some(span),
                Err(ArenaError::Io(e)) => {
                    warn!("Ignoring unreadable layout {}: {}", path.display(), e);
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let document = arena.read_file(source, Region::Permanent).map_err(|e| match e {
            ArenaError::Io(source_err) => RenderError::Read {
                path: source.to_path_buf(),
                source: source_err,
            },
            e => RenderError::Arena(e),
        })?;

        let markdown = preprocess(arena, document, &self.root)?;
        arena.reset_temp();

        debug!(
            "{}: {} of {} arena bytes held",
            source.display(),
            arena.used_permanent(),
            arena.capacity()
        );

        let text = markdown.to_string_lossy();
        if let Cow::Owned(_) = text {
            warn!("{} has invalid UTF-8; rendering with replacement characters", source.display());
        }
        let html = self.renderer.render(&text)?;
        let html = strip_md_links(&html);

        Ok(wrap(html.as_bytes(), layout.map(|span| arena.get(span))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("foo.c"), "//snippet demo\nint x;\n//endsnippet\n").unwrap();
        fs::write(
            dir.path().join("page.md"),
            "# Page\n\n$code foo.c [demo]\n\n[sidenote]\nAside\n[/sidenote]\n\n[next](other.md)\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_render_without_layout() {
        let dir = site();
        let ctx = RenderContext::from_config(dir.path(), &SiteConfig::default()).unwrap();
        let html = ctx.render_file(&dir.path().join("page.md")).unwrap();
        let html = html.to_string_lossy();

        assert!(html.starts_with("<h1>Page</h1>"));
        assert!(html.contains("<pre><code>int x;\n</code></pre>"));
        assert!(html.contains("<div class=\"sidenote\">"));
        assert!(html.contains("<a href=\"other\">next</a>"));
        assert!(!html.contains("//snippet"));
    }

    #[test]
    fn test_render_with_layout() {
        let dir = site();
        fs::write(dir.path().join("layout.html"), "<html><body>{{Body}}</body></html>").unwrap();

        let ctx = RenderContext::from_config(dir.path(), &SiteConfig::default()).unwrap();
        let html = ctx.render_file(&dir.path().join("page.md")).unwrap();
        let html = html.to_string_lossy();

        assert!(html.starts_with("<html><body><h1>Page</h1>"));
        assert!(html.ends_with("</body></html>"));
    }

    #[test]
    fn test_missing_document() {
        let dir = site();
        let ctx = RenderContext::from_config(dir.path(), &SiteConfig::default()).unwrap();
        let err = ctx.render_file(&dir.path().join("nope.md")).unwrap_err();
        assert!(matches!(err, RenderError::Read { .. }));
    }

    #[test]
    fn test_document_larger_than_arena() {
        let dir = site();
        let config = SiteConfig {
            arena_capacity: 16,
            ..SiteConfig::default()
        };
        let ctx = RenderContext::from_config(dir.path(), &config).unwrap();
        let err = ctx.render_file(&dir.path().join("page.md")).unwrap_err();
        assert!(matches!(err, RenderError::Arena(ArenaError::Exhausted { .. })));
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_invalid_utf8_is_reported() {
        let dir = site();
        fs::write(dir.path().join("latin1.md"), b"caf\xe9\n").unwrap();
        let ctx = RenderContext::from_config(dir.path(), &SiteConfig::default()).unwrap();

        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let html = tracing::subscriber::with_default(subscriber, || {
            ctx.render_file(&dir.path().join("latin1.md")).unwrap()
        });

        assert_eq!(html.to_string_lossy(), "<p>caf\u{FFFD}</p>\n");
        let logs = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(logs.contains("WARN"));
        assert!(logs.contains("latin1.md has invalid UTF-8"));
    }

    #[test]
    fn test_valid_utf8_is_not_reported() {
        let dir = site();
        fs::write(dir.path().join("utf8.md"), "café\n").unwrap();
        let ctx = RenderContext::from_config(dir.path(), &SiteConfig::default()).unwrap();

        let logs = Captured::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let html = tracing::subscriber::with_default(subscriber, || {
            ctx.render_file(&dir.path().join("utf8.md")).unwrap()
        });

        assert_eq!(html.to_string_lossy(), "<p>café</p>\n");
        assert!(!String::from_utf8(logs.0.lock().clone()).unwrap().contains("WARN"));
    }

    struct Shouting;

    impl MarkdownRenderer for Shouting {
        fn render(&self, markdown: &str) -> Result<String, MarkdownError> {
            Ok(markdown.to_uppercase())
        }
    }

    #[test]
    fn test_custom_renderer() {
        let dir = site();
        fs::write(dir.path().join("plain.md"), "see link.md\"").unwrap();
        let ctx = RenderContext::new(dir.path(), Box::new(Shouting));
        let html = ctx.render_file(&dir.path().join("plain.md")).unwrap();
        assert_eq!(html.as_bytes(), b"SEE LINK.MD\"");
    }
}
