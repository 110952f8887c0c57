use crate::error::AppError;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

pub fn create_router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(registry)
}

pub fn render_metrics(registry: &Registry) -> Result<String, AppError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| AppError::Config(format!("non-utf8 exposition: {e}")))
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> impl IntoResponse {
    match render_metrics(&registry) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        ),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain".to_string())],
                e.to_string(),
            )
        }
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

pub async fn serve<F>(registry: Arc<Registry>, port: u16, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("starting cost exporter on http://{}", addr);

    axum::serve(listener, create_router(registry))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
