//! Local static file server for previewing the output directory.

use axum::Router;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::info;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Routes every request to files under `output_root`; directories serve
/// their `index.html`.
pub fn router(output_root: &Path) -> Router {
    Router::new().fallback_service(ServeDir::new(output_root).append_index_html_on_directories(true))
}

/// Bind on localhost. Port 0 picks a free port.
pub async fn bind(port: u16) -> Result<TcpListener, ServeError> {
    Ok(TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?)
}

/// Serve until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    output_root: &Path,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    info!(addr = %listener.local_addr()?, root = %output_root.display(), "serving");
    axum::serve(listener, router(output_root))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("server stopped");
    Ok(())
}
