use std::net::SocketAddr;
use std::path::Path;

use axum::{
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Router serving the generated pages from `site_dir`, plus `/health`.
/// `/` redirects to the index page `index`.
pub fn router<P: AsRef<Path>>(site_dir: P, index: &str) -> Router {
    let index_path = format!("/{}", index);

    Router::new()
        .route(
            "/",
            get(move || async move { Redirect::temporary(&index_path) }),
        )
        .route("/health", get(health))
        .fallback_service(ServeDir::new(site_dir.as_ref()))
        .layer(TraceLayer::new_for_http())
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

/// Serve `site_dir` on `addr` until the process is stopped.
pub async fn serve<P: AsRef<Path>>(
    site_dir: P,
    index: &str,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let app = router(&site_dir, index);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!("Serving {} on http://{}", site_dir.as_ref().display(), local);
    info!("Index page at http://{}/{}", local, index);

    axum::serve(listener, app).await?;
    Ok(())
}
