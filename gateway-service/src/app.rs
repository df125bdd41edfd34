use std::sync::Arc;

use axum::extract::{FromRef, Request, State};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method, StatusCode,
};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use turnstile_auth::{authenticate, AuthGate};

use crate::handlers;
use crate::metrics::GatewayMetrics;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub metrics: Arc<GatewayMetrics>,
}

impl FromRef<AppState> for Arc<AuthGate> {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

impl FromRef<AppState> for Arc<GatewayMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Counts every gated request and the 401s among them. Sits outside the
/// auth layer so it sees the final status.
pub async fn track_requests(
    State(metrics): State<Arc<GatewayMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_string();
    let response = next.run(request).await;
    if response.status() == StatusCode::UNAUTHORIZED {
        metrics.record_request("unauthorized");
        metrics.record_rejection(&method);
    } else {
        metrics.record_request("ok");
    }
    response
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://localhost:5173"),
        ]))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE]);

    Router::new()
        .route("/healthz", get(handlers::health))
        .route("/whoami", get(handlers::whoami))
        .route("/token", post(handlers::issue_token))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn_with_state(
            state.gate.clone(),
            authenticate,
        ))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_requests,
        ))
        .layer(cors)
        .with_state(state)
}
