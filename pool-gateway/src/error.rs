use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Malformed transaction: {0}")]
    Malformed(String),

    #[error("Transaction already processed: {0}")]
    Replay(String),

    #[error("Pool already exists: {0}")]
    RegistryConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] pool_ledger::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Malformed(_) => StatusCode::BAD_REQUEST,
            GatewayError::Replay(_) | GatewayError::RegistryConflict(_) => StatusCode::CONFLICT,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Ledger(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Malformed(_) => "malformed_input",
            GatewayError::Replay(_) => "replay_conflict",
            GatewayError::RegistryConflict(_) => "registry_conflict",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::Ledger(_) => "ledger_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        if status_code.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.to_string(),
                "type": self.error_type()
            }
        }));

        (status_code, body).into_response()
    }
}
