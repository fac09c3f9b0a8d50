use crate::error::{GatewayError, Result};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    Json,
};
use pool_ledger::{Pool, ProcessOutcome, StatusView};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub ping: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub version: String,
    pub pools: usize,
    pub halted: bool,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub tx_hash: String,
    pub status: String,
    pub pool_id: String,
}

// GET /ping
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { ping: "pong" })
}

// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let config = state.service.config();
    let halted = state.service.is_halted();
    Json(HealthResponse {
        status: if halted { "degraded" } else { "healthy" },
        service: config.service_name.clone(),
        version: config.service_version.clone(),
        pools: state.service.query().pools().len(),
        halted,
    })
}

// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let body = state
        .service
        .metrics()
        .export()
        .map_err(|e| GatewayError::Internal(format!("Failed to export metrics: {}", e)))?;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

// POST /tx
pub async fn submit_tx(State(state): State<AppState>, body: Bytes) -> Result<Json<SubmitResponse>> {
    let outcome = state.service.submit(&body).await?;

    match outcome {
        ProcessOutcome::Applied { record, pool } => {
            info!(tx_hash = %record.tx_hash, pool_id = %pool.pool_id, "Transaction applied");
            Ok(Json(SubmitResponse {
                tx_hash: record.tx_hash.to_string(),
                status: record.status.to_string(),
                pool_id: pool.pool_id.to_string(),
            }))
        }
        ProcessOutcome::ReplayRejected { tx_hash, .. } => {
            Err(GatewayError::Replay(tx_hash.to_string()))
        }
        ProcessOutcome::RegistryConflict { existing, .. } => {
            Err(GatewayError::RegistryConflict(existing.to_string()))
        }
        ProcessOutcome::Malformed { reason, .. } => Err(GatewayError::Malformed(reason)),
    }
}

// GET /tx/:hash
pub async fn get_tx(State(state): State<AppState>, Path(hash): Path<String>) -> Json<StatusView> {
    Json(state.service.query().tx(&hash))
}

// GET /pool/:id
pub async fn get_pool(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Pool>> {
    state
        .service
        .query()
        .pool(&id)
        .map(Json)
        .ok_or(GatewayError::NotFound(id))
}

// GET /pools
pub async fn list_pools(State(state): State<AppState>) -> Json<Vec<Pool>> {
    Json(state.service.query().pools())
}
