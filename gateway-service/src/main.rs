use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use gateway_service::{build_router, load_config, AppState, GatewayMetrics};
use turnstile_auth::AuthGate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = load_config()?;

    // Invalid gate configuration must keep the service from starting.
    let gate = AuthGate::new(config.gate).context("invalid gateway configuration")?;
    let metrics = GatewayMetrics::new()?;

    let state = AppState {
        gate: Arc::new(gate),
        metrics: Arc::new(metrics),
    };
    let app = build_router(state);

    let ip: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));

    println!("starting gateway-service on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
