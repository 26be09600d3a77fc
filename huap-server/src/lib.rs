use anyhow::Result;
use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use huap_core::{RenderContext, RenderError, config::SiteConfig};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

/// Configuration for the live rendering server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Site root holding the markdown sources and static files
    pub root: PathBuf,
    /// Auto-open browser
    pub open: bool,
    /// Rendering settings
    pub site: SiteConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            root: PathBuf::from("."),
            open: false,
            site: SiteConfig::default(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("empty request path")]
    Empty,
    #[error("request path contains a parent-directory sequence")]
    ParentDirectory,
}

/// Maps a request path to the markdown document that renders it.
///
/// `/` and any path ending in `/` resolve to the index document. Paths
/// containing `..` anywhere are rejected outright; this substring check is a
/// minimal guard, not a canonicalizing containment check.
pub fn source_for_request(root: &Path, index: &str, uri_path: &str) -> Result<PathBuf, RequestError> {
    if uri_path.is_empty() {
        return Err(RequestError::Empty);
    }
    if uri_path.contains("..") {
        return Err(RequestError::ParentDirectory);
    }

    let relative = uri_path.trim_start_matches('/');
    let mut document = relative.trim_end_matches('/').to_string();
    if relative.is_empty() || relative.ends_with('/') {
        if !document.is_empty() {
            document.push('/');
        }
        document.push_str(index);
    }
    document.push_str(".md");

    Ok(root.join(document))
}

/// Whether the final path segment names a file with an extension.
pub fn has_extension(uri_path: &str) -> bool {
    uri_path.rsplit('/').next().is_some_and(|segment| segment.contains('.'))
}

#[derive(Clone)]
struct AppState {
    context: Arc<RenderContext>,
    static_files: ServeDir,
    index: Arc<str>,
}

/// Renders markdown on request and serves everything else from disk
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn router(&self) -> Result<Router> {
        let context = RenderContext::from_config(&self.config.root, &self.config.site)?;
        let state = AppState {
            context: Arc::new(context),
            static_files: ServeDir::new(&self.config.root),
            index: Arc::from(self.config.site.index.as_str()),
        };

        Ok(Router::new().fallback(handle_request).with_state(state))
    }

    /// Run until Ctrl-C
    pub async fn run(self) -> Result<()> {
        if !self.config.root.is_dir() {
            return Err(anyhow::anyhow!(
                "Root directory does not exist: {}",
                self.config.root.display()
            ));
        }

        let app = self.router()?;
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to listen on {}: {}", addr, e))?;

        info!("Serving {} on http://{} (Ctrl-C to stop)", self.config.root.display(), addr);

        if self.config.open {
            if let Err(e) = open::that(format!("http://{}", addr)) {
                warn!("Failed to open browser: {}", e);
            }
        }

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn handle_request(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();

    if has_extension(&path) {
        debug!("Static {}", path);
        return match state.static_files.oneshot(request).await {
            Ok(response) => response.into_response(),
            Err(never) => match never {},
        };
    }

    render_page(&state, &path).await
}

fn reply(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

async fn render_page(state: &AppState, path: &str) -> Response {
    let source = match source_for_request(state.context.root(), &state.index, path) {
        Ok(source) => source,
        Err(e) => {
            debug!("Rejecting {}: {}", path, e);
            return reply(StatusCode::BAD_REQUEST, "Bad request\n");
        }
    };

    match tokio::fs::metadata(&source).await {
        Ok(meta) if meta.is_file() => {}
        _ => return reply(StatusCode::NOT_FOUND, "Not found\n"),
    }

    let context = Arc::clone(&state.context);
    let rendered = tokio::task::spawn_blocking(move || context.render_file(&source)).await;

    match rendered {
        Ok(Ok(page)) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            Body::from(page.into_vec()),
        )
            .into_response(),
        Ok(Err(e @ RenderError::Read { .. })) => {
            warn!("{} -> {}", path, e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, "Read failed\n")
        }
        Ok(Err(e)) => {
            warn!("{} -> {}", path, e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, "Render failed\n")
        }
        Err(e) => {
            warn!("{} -> render task failed: {}", path, e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, "Render failed\n")
        }
    }
}
