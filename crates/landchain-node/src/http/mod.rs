//! HTTP surface of the node

pub(crate) mod handlers;
mod page;
pub mod uploads;

use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{from_fn, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::time::Instant;

/// Build the node's router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/healthz", get(handlers::healthz_handler))
        .route("/mine", get(handlers::mine_handler))
        .route("/transactions/new", post(handlers::new_transaction_handler))
        .route("/uploads/:filename", get(handlers::uploaded_file_handler))
        .route("/chain", get(handlers::full_chain_handler))
        .route("/nodes/register", post(handlers::register_nodes_handler))
        .route("/nodes/resolve", get(handlers::consensus_handler))
        .route("/records/:id_tanah", get(handlers::record_history_handler))
        .layer(from_fn(log_request))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}
