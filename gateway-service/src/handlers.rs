use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::error;

use turnstile_auth::{AuthGate, JsonMap, VerifiedClaims};

use crate::metrics::GatewayMetrics;

pub async fn health() -> &'static str {
    "ok"
}

/// Echo the verified claims back to the caller. Mostly a smoke-test surface
/// for whatever sits behind the gate.
pub async fn whoami(claims: VerifiedClaims) -> Json<serde_json::Value> {
    let token = claims.into_token();
    Json(json!({
        "claims": token.claims,
        "header": token.header,
    }))
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Dev/test token mint: signs the posted payload with the configured key.
/// Excluded from auth by default; do not expose on a public deployment.
pub async fn issue_token(
    State(gate): State<Arc<AuthGate>>,
    Json(payload): Json<JsonMap>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    match gate.issue(&payload) {
        Ok(token) => Ok(Json(TokenResponse { token })),
        Err(err) => {
            error!(error = %err, "token issuance failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

pub async fn metrics(State(metrics): State<Arc<GatewayMetrics>>) -> Response {
    match metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "metrics rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
