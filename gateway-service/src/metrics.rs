use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    requests: IntCounterVec,
    rejections: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new(
                "gateway_requests_total",
                "Count of gated requests grouped by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(requests.clone()))?;

        let rejections = IntCounterVec::new(
            Opts::new(
                "gateway_auth_rejections_total",
                "Count of 401 responses emitted by the authentication gate",
            ),
            &["method"],
        )?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self {
            registry,
            requests,
            rejections,
        })
    }

    pub fn record_request(&self, outcome: &str) {
        self.requests.with_label_values(&[outcome]).inc();
    }

    pub fn record_rejection(&self, method: &str) {
        self.rejections.with_label_values(&[method]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
