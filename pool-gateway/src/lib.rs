//! HTTP gateway for the pool ledger
//!
//! Routes:
//!
//! - `GET  /ping` - Liveness
//! - `GET  /health` - Service info
//! - `GET  /metrics` - Prometheus metrics
//! - `POST /tx` - Submit a transaction (JSON envelope or hex hash)
//! - `GET  /tx/:hash` - Status triple
//! - `GET  /pool/:id` - Pool by id or symbol
//! - `GET  /pools` - Pools in creation order

pub mod config;
pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use pool_ledger::PoolService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PoolService>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/tx", post(handlers::submit_tx))
        .route("/tx/:hash", get(handlers::get_tx))
        .route("/pool/:id", get(handlers::get_pool))
        .route("/pools", get(handlers::list_pools))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
