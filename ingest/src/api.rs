//! Status API: a small axum router exposing the pipeline's observation
//! surface and the live endpoint export.

use crate::config::Listener;
use crate::manager::{PoolManager, StatusSnapshot};
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub fn router(manager: Arc<PoolManager>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/endpoints", get(endpoints_handler))
        .route("/health", get(health_handler))
        .with_state(manager)
}

pub async fn serve(listener: Listener, manager: Arc<PoolManager>) -> Result<(), ApiError> {
    let address = format!("{}:{}", listener.host, listener.port);
    let tcp = TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "status api listening");
    axum::serve(tcp, router(manager)).await?;
    Ok(())
}

async fn status_handler(State(manager): State<Arc<PoolManager>>) -> Json<StatusSnapshot> {
    Json(manager.status())
}

async fn endpoints_handler(State(manager): State<Arc<PoolManager>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        manager.export_text(),
    )
        .into_response()
}

async fn health_handler() -> &'static str {
    "ok\n"
}
