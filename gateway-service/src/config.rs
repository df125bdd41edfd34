use anyhow::{Context, Result};
use std::env;

use turnstile_auth::{ClaimChecks, GateSettings, RawExclusion};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub gate: GateSettings,
    pub host: String,
    pub port: u16,
}

/// Routes that stay reachable without a token unless the operator overrides
/// the exclusion list: liveness, metrics scraping, and the dev token mint.
fn default_exclusions() -> Vec<RawExclusion> {
    vec![
        RawExclusion::Path("/healthz".to_string()),
        RawExclusion::Path("/metrics".to_string()),
        RawExclusion::Path("/token".to_string()),
    ]
}

pub fn load_config() -> Result<GatewayConfig> {
    let mut gate = GateSettings::new();

    gate.secret = env::var("GATEWAY_SECRET")
        .ok()
        .and_then(|value| normalize_optional(&value));
    gate.public_key_pem = env::var("GATEWAY_PUBLIC_KEY_PEM")
        .ok()
        .and_then(|value| normalize_optional(&value));
    gate.private_key_pem = env::var("GATEWAY_PRIVATE_KEY_PEM")
        .ok()
        .and_then(|value| normalize_optional(&value));

    if let Ok(algorithm) = env::var("GATEWAY_ALGORITHM") {
        gate.algorithm = algorithm.trim().to_string();
    }
    if let Some(verify) = bool_from_env("GATEWAY_VERIFY") {
        gate.verify = verify;
    }
    gate.cookie_name = env::var("GATEWAY_COOKIE_NAME")
        .ok()
        .and_then(|value| normalize_optional(&value));

    gate.exclude = match env::var("GATEWAY_EXCLUDE") {
        Ok(raw) => serde_json::from_str(&raw).context("Failed to parse GATEWAY_EXCLUDE")?,
        Err(_) => default_exclusions(),
    };

    let mut checks = ClaimChecks::default();
    checks.issuer = env::var("GATEWAY_ISSUER")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .map(|issuer| vec![issuer]);
    checks.audience = env::var("GATEWAY_AUDIENCE")
        .ok()
        .and_then(|value| normalize_optional(&value))
        .map(|audience| vec![audience]);
    if let Ok(raw) = env::var("GATEWAY_LEEWAY_SECS") {
        checks.leeway_seconds = raw
            .trim()
            .parse()
            .context("Failed to parse GATEWAY_LEEWAY_SECS")?;
    }
    gate.claim_checks = checks;

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8090);

    Ok(GatewayConfig { gate, host, port })
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_from_env_parses() {
        std::env::set_var("GW_TEST_BOOL_TRUE", "true");
        std::env::set_var("GW_TEST_BOOL_ONE", "1");
        std::env::set_var("GW_TEST_BOOL_FALSE", "no");
        assert_eq!(bool_from_env("GW_TEST_BOOL_TRUE"), Some(true));
        assert_eq!(bool_from_env("GW_TEST_BOOL_ONE"), Some(true));
        assert_eq!(bool_from_env("GW_TEST_BOOL_FALSE"), Some(false));
    }

    #[test]
    fn normalize_optional_drops_blank() {
        assert_eq!(normalize_optional("  "), None);
        assert_eq!(normalize_optional(" x "), Some("x".to_string()));
    }

    #[test]
    fn default_exclusions_cover_operational_routes() {
        let exclusions = default_exclusions();
        assert_eq!(exclusions.len(), 3);
    }
}
