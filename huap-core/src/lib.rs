pub mod arena;
pub mod buffer;
pub mod builder;
pub mod config;
pub mod directive;
pub mod layout;
pub mod lines;
pub mod markdown;
pub mod pipeline;
pub mod queue;
pub mod snippet;
pub mod walker;

// Re-export main types
pub use arena::{Arena, ArenaError, Region, Span};
pub use buffer::Buffer;
pub use builder::{BuildError, BuildReport, SiteBuilder, build_site, default_workers};
pub use markdown::{CommonMark, MarkdownRenderer};
pub use pipeline::{RenderContext, RenderError};
pub use queue::{Job, JobKind, JobQueue};
pub use walker::TreeWalker;
