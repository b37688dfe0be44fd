//! HTTP façade over the conversion pipeline.
//!
//! | Route        | Method | Body           | Response          |
//! |--------------|--------|----------------|-------------------|
//! | `/topdf`     | POST   | document bytes | `application/pdf` |
//! | `/tojpeg`    | POST   | document bytes | `image/jpeg`      |
//! | `/urltopdf`  | POST   | URL text       | `application/pdf` |
//! | `/urltojpeg` | POST   | URL text       | `image/jpeg`      |
//! | `/health`    | GET    | –              | `OK`              |
//!
//! Other methods on these paths get `405` from the router.

pub mod handlers;

use crate::convert::Converter;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub converter: Converter,
    /// Bodies of this size or larger are rejected.
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(converter: Converter) -> Self {
        let max_body_bytes = converter.config().max_body_bytes;
        Self {
            converter,
            max_body_bytes,
        }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/topdf", post(handlers::document_to_pdf))
        .route("/tojpeg", post(handlers::document_to_jpeg))
        .route("/urltopdf", post(handlers::url_to_pdf))
        .route("/urltojpeg", post(handlers::url_to_jpeg))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
pub async fn serve<F>(listener: TcpListener, converter: Converter, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    let app = router(AppState::new(converter));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining requests");
}
