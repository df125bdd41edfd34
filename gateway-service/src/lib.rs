pub mod app;
pub mod config;
pub mod handlers;
pub mod metrics;

pub use app::{build_router, AppState};
pub use config::{load_config, GatewayConfig};
pub use metrics::GatewayMetrics;
