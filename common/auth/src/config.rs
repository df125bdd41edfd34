use serde::Deserialize;

use crate::error::ConfigError;
use crate::exclude::{ExclusionList, RawExclusion};

/// Signature algorithms the gate understands. `None` means unsigned tokens
/// and is only valid with verification disabled and no secret configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAlgorithm {
    None,
    Hs256,
    Hs384,
    Hs512,
    Rs256,
    Rs384,
    Rs512,
    Es256,
    Es384,
    Es512,
    EdDsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    None,
    Hmac,
    Rsa,
    Ec,
    Ed,
}

impl TokenAlgorithm {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            "HS256" => Some(Self::Hs256),
            "HS384" => Some(Self::Hs384),
            "HS512" => Some(Self::Hs512),
            "RS256" => Some(Self::Rs256),
            "RS384" => Some(Self::Rs384),
            "RS512" => Some(Self::Rs512),
            "ES256" => Some(Self::Es256),
            "ES384" => Some(Self::Es384),
            "ES512" => Some(Self::Es512),
            "ED25519" => Some(Self::EdDsa),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Es256 => "ES256",
            Self::Es384 => "ES384",
            Self::Es512 => "ES512",
            Self::EdDsa => "ED25519",
        }
    }

    pub fn family(&self) -> AlgorithmFamily {
        match self {
            Self::None => AlgorithmFamily::None,
            Self::Hs256 | Self::Hs384 | Self::Hs512 => AlgorithmFamily::Hmac,
            Self::Rs256 | Self::Rs384 | Self::Rs512 => AlgorithmFamily::Rsa,
            Self::Es256 | Self::Es384 | Self::Es512 => AlgorithmFamily::Ec,
            Self::EdDsa => AlgorithmFamily::Ed,
        }
    }

    /// The `jsonwebtoken` counterpart; `None` has no counterpart there.
    pub fn to_signing(&self) -> Option<jsonwebtoken::Algorithm> {
        use jsonwebtoken::Algorithm;
        match self {
            Self::None => None,
            Self::Hs256 => Some(Algorithm::HS256),
            Self::Hs384 => Some(Algorithm::HS384),
            Self::Hs512 => Some(Algorithm::HS512),
            Self::Rs256 => Some(Algorithm::RS256),
            Self::Rs384 => Some(Algorithm::RS384),
            Self::Rs512 => Some(Algorithm::RS512),
            Self::Es256 => Some(Algorithm::ES256),
            Self::Es384 => Some(Algorithm::ES384),
            Self::Es512 => Some(Algorithm::ES512),
            Self::EdDsa => Some(Algorithm::EdDSA),
        }
    }
}

/// Verification key material, shaped by the algorithm family.
#[derive(Debug, Clone)]
pub enum Secret {
    /// No key material; only valid for `none`.
    None,
    /// Shared secret for the HMAC family.
    Shared(String),
    /// PEM key material for the asymmetric families. The decoding side is
    /// mandatory; the encoding side is only needed for token issuance.
    Pem {
        decoding: String,
        encoding: Option<String>,
    },
}

/// Claim-verification directives forwarded opaquely to the codec.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClaimChecks {
    pub leeway_seconds: u64,
    pub validate_exp: bool,
    pub validate_nbf: bool,
    pub issuer: Option<Vec<String>>,
    pub audience: Option<Vec<String>>,
    pub subject: Option<String>,
    pub jwt_id: Option<String>,
    pub required: Vec<String>,
}

impl Default for ClaimChecks {
    fn default() -> Self {
        Self {
            leeway_seconds: 0,
            validate_exp: true,
            validate_nbf: false,
            issuer: None,
            audience: None,
            subject: None,
            jwt_id: None,
            required: Vec::new(),
        }
    }
}

/// Cryptographic capabilities available to this build, passed explicitly
/// into validation instead of sniffed from the environment.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub ed_dsa: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        // jsonwebtoken 9 always ships EdDSA; embedders can still turn the
        // flag off to reject ED25519 configurations.
        Self { ed_dsa: true }
    }
}

/// Raw construction input. Deserializable so services can load it straight
/// from JSON/env material; mistyped fields fail at the serde boundary.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields, default)]
pub struct GateSettings {
    /// Shared secret for the HMAC family.
    pub secret: Option<String>,
    /// Public key PEM for the asymmetric families.
    pub public_key_pem: Option<String>,
    /// Private key PEM, only needed for token issuance.
    pub private_key_pem: Option<String>,
    #[serde(default = "default_verify")]
    pub verify: bool,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    pub claim_checks: ClaimChecks,
    pub cookie_name: Option<String>,
    pub exclude: Vec<RawExclusion>,
}

fn default_verify() -> bool {
    true
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

impl GateSettings {
    pub fn new() -> Self {
        Self {
            verify: default_verify(),
            algorithm: default_algorithm(),
            ..Self::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.algorithm = algorithm.into();
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = Some(name.into());
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<RawExclusion>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn with_claim_checks(mut self, checks: ClaimChecks) -> Self {
        self.claim_checks = checks;
        self
    }
}

/// Validated, immutable gate configuration. Constructed once; shared across
/// requests behind `Arc` with no further writes.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub secret: Secret,
    pub verify: bool,
    pub algorithm: TokenAlgorithm,
    pub claim_checks: ClaimChecks,
    pub cookie_name: Option<String>,
    pub exclusions: ExclusionList,
}

impl GateConfig {
    /// Fail-fast validation of raw settings. Every check must pass before
    /// any request is processed.
    pub fn from_settings(
        settings: GateSettings,
        capabilities: Capabilities,
    ) -> Result<Self, ConfigError> {
        let algorithm = TokenAlgorithm::parse(&settings.algorithm)
            .ok_or_else(|| ConfigError::UnsupportedAlgorithm(settings.algorithm.clone()))?;
        if algorithm == TokenAlgorithm::EdDsa && !capabilities.ed_dsa {
            return Err(ConfigError::UnavailableAlgorithm(settings.algorithm));
        }

        let shared = normalize(settings.secret);
        let public_pem = normalize(settings.public_key_pem);
        let private_pem = normalize(settings.private_key_pem);

        let secret = match algorithm.family() {
            AlgorithmFamily::None => {
                if shared.is_some() || public_pem.is_some() || private_pem.is_some() {
                    return Err(ConfigError::SecretWithNone);
                }
                if settings.verify {
                    return Err(ConfigError::VerifyWithNone);
                }
                Secret::None
            }
            AlgorithmFamily::Hmac => {
                if public_pem.is_some() || private_pem.is_some() {
                    return Err(ConfigError::SecretKindMismatch {
                        algorithm: algorithm.as_str().to_string(),
                        expected: "a shared secret",
                    });
                }
                match shared {
                    Some(secret) => Secret::Shared(secret),
                    None => {
                        return Err(ConfigError::MissingSecret(
                            algorithm.as_str().to_string(),
                        ))
                    }
                }
            }
            AlgorithmFamily::Rsa | AlgorithmFamily::Ec | AlgorithmFamily::Ed => {
                if shared.is_some() {
                    return Err(ConfigError::SecretKindMismatch {
                        algorithm: algorithm.as_str().to_string(),
                        expected: "PEM key material",
                    });
                }
                match public_pem {
                    Some(decoding) => Secret::Pem {
                        decoding,
                        encoding: private_pem,
                    },
                    None => {
                        return Err(ConfigError::MissingSecret(
                            algorithm.as_str().to_string(),
                        ))
                    }
                }
            }
        };

        let mut rules = Vec::with_capacity(settings.exclude.len());
        for (index, entry) in settings.exclude.into_iter().enumerate() {
            let rule = entry
                .resolve()
                .map_err(|source| ConfigError::Exclusion { index, source })?;
            rules.push(rule);
        }

        Ok(Self {
            secret,
            verify: settings.verify,
            algorithm,
            claim_checks: settings.claim_checks,
            cookie_name: settings.cookie_name,
            exclusions: ExclusionList::new(rules),
        })
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn none_settings() -> GateSettings {
        let mut settings = GateSettings::new().with_algorithm("none");
        settings.verify = false;
        settings
    }

    #[test]
    fn none_requires_empty_secret_and_disabled_verify() {
        let config = GateConfig::from_settings(none_settings(), Capabilities::default())
            .expect("valid none config");
        assert_eq!(config.algorithm, TokenAlgorithm::None);
        assert!(matches!(config.secret, Secret::None));
    }

    #[test]
    fn none_with_secret_fails() {
        let settings = none_settings().with_secret("s3cr3t");
        let err = GateConfig::from_settings(settings, Capabilities::default())
            .expect_err("secret with none");
        assert!(matches!(err, ConfigError::SecretWithNone));
    }

    #[test]
    fn none_with_verify_enabled_fails() {
        let mut settings = none_settings();
        settings.verify = true;
        let err = GateConfig::from_settings(settings, Capabilities::default())
            .expect_err("verify with none");
        assert!(matches!(err, ConfigError::VerifyWithNone));
    }

    #[test]
    fn hmac_without_secret_fails() {
        let err = GateConfig::from_settings(GateSettings::new(), Capabilities::default())
            .expect_err("missing secret");
        assert!(matches!(err, ConfigError::MissingSecret(alg) if alg == "HS256"));
    }

    #[test]
    fn blank_secret_counts_as_absent() {
        let settings = GateSettings::new().with_secret("   ");
        let err = GateConfig::from_settings(settings, Capabilities::default())
            .expect_err("blank secret");
        assert!(matches!(err, ConfigError::MissingSecret(_)));
    }

    #[test]
    fn hmac_with_pem_material_fails() {
        let mut settings = GateSettings::new().with_secret("s3cr3t");
        settings.public_key_pem = Some("-----BEGIN PUBLIC KEY-----".into());
        let err = GateConfig::from_settings(settings, Capabilities::default())
            .expect_err("pem with hmac");
        assert!(matches!(err, ConfigError::SecretKindMismatch { .. }));
    }

    #[test]
    fn rsa_with_shared_secret_fails() {
        let settings = GateSettings::new()
            .with_algorithm("RS256")
            .with_secret("s3cr3t");
        let err = GateConfig::from_settings(settings, Capabilities::default())
            .expect_err("shared secret with rsa");
        assert!(matches!(err, ConfigError::SecretKindMismatch { .. }));
    }

    #[test]
    fn unknown_algorithm_fails() {
        let settings = GateSettings::new().with_algorithm("HS999");
        let err = GateConfig::from_settings(settings, Capabilities::default())
            .expect_err("unsupported algorithm");
        assert!(matches!(err, ConfigError::UnsupportedAlgorithm(alg) if alg == "HS999"));
    }

    #[test]
    fn ed25519_gated_by_capability_flag() {
        let mut settings = GateSettings::new().with_algorithm("ED25519");
        settings.public_key_pem = Some("-----BEGIN PUBLIC KEY-----".into());

        let err = GateConfig::from_settings(settings.clone(), Capabilities { ed_dsa: false })
            .expect_err("capability off");
        assert!(matches!(err, ConfigError::UnavailableAlgorithm(_)));

        GateConfig::from_settings(settings, Capabilities { ed_dsa: true })
            .expect("capability on");
    }

    #[test]
    fn malformed_exclusion_reports_index() {
        let settings = GateSettings::new()
            .with_secret("s3cr3t")
            .with_exclude(vec![
                RawExclusion::Path("/ok".into()),
                RawExclusion::Path("bad".into()),
            ]);
        let err = GateConfig::from_settings(settings, Capabilities::default())
            .expect_err("bad exclusion");
        assert!(matches!(err, ConfigError::Exclusion { index: 1, .. }));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: GateSettings =
            serde_json::from_value(serde_json::json!({"secret": "s3cr3t"})).expect("parse");
        assert!(settings.verify);
        assert_eq!(settings.algorithm, "HS256");
        assert!(settings.exclude.is_empty());
    }

    #[test]
    fn settings_reject_unknown_fields() {
        let raw = serde_json::json!({"secret": "s", "verify_enabled": true});
        assert!(serde_json::from_value::<GateSettings>(raw).is_err());
    }
}
