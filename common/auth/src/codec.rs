use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{AlgorithmFamily, ClaimChecks, Secret, TokenAlgorithm};
use crate::error::{DecodeErrorKind, EncodeError};

pub type JsonMap = Map<String, Value>;

/// Result of a successful verification: the claims payload and the token
/// header, both as plain JSON mappings. Owned by the request it was decoded
/// for and dropped with it.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub claims: JsonMap,
    pub header: JsonMap,
}

impl DecodedToken {
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }
}

/// Cryptographic collaborator: turns token strings into claims and back.
/// The engine only ever talks to this interface, so tests can substitute a
/// stub and the signing backend stays swappable.
pub trait TokenCodec: Send + Sync {
    fn decode(
        &self,
        token: &str,
        secret: &Secret,
        algorithm: TokenAlgorithm,
        verify: bool,
        checks: &ClaimChecks,
    ) -> Result<DecodedToken, DecodeErrorKind>;

    fn encode(
        &self,
        payload: &JsonMap,
        secret: &Secret,
        algorithm: TokenAlgorithm,
    ) -> Result<String, EncodeError>;
}

/// Default codec backed by `jsonwebtoken`. The `none` algorithm and the
/// verification-disabled path are handled by decoding the base64url
/// segments directly, since `jsonwebtoken` refuses unsigned tokens.
#[derive(Debug, Clone, Default)]
pub struct JwtCodec;

impl TokenCodec for JwtCodec {
    fn decode(
        &self,
        token: &str,
        secret: &Secret,
        algorithm: TokenAlgorithm,
        verify: bool,
        checks: &ClaimChecks,
    ) -> Result<DecodedToken, DecodeErrorKind> {
        if !verify || algorithm == TokenAlgorithm::None {
            return decode_unverified(token);
        }
        decode_verified(token, secret, algorithm, checks)
    }

    fn encode(
        &self,
        payload: &JsonMap,
        secret: &Secret,
        algorithm: TokenAlgorithm,
    ) -> Result<String, EncodeError> {
        if algorithm == TokenAlgorithm::None {
            return Ok(encode_unsigned(payload));
        }

        let signing = algorithm
            .to_signing()
            .ok_or_else(|| EncodeError::MissingKey(algorithm.as_str().to_string()))?;
        let key = encoding_key(secret, algorithm)?;
        encode(&Header::new(signing), payload, &key)
            .map_err(|err| EncodeError::Sign(err.to_string()))
    }
}

fn decode_verified(
    token: &str,
    secret: &Secret,
    algorithm: TokenAlgorithm,
    checks: &ClaimChecks,
) -> Result<DecodedToken, DecodeErrorKind> {
    let signing = algorithm.to_signing().ok_or(DecodeErrorKind::Other)?;
    let key = decoding_key(secret, algorithm)?;

    let mut validation = Validation::new(signing);
    validation.leeway = checks.leeway_seconds;
    validation.validate_exp = checks.validate_exp;
    validation.validate_nbf = checks.validate_nbf;
    validation.validate_aud = checks.audience.is_some();
    if let Some(audience) = &checks.audience {
        validation.set_audience(audience);
    }
    if let Some(issuer) = &checks.issuer {
        validation.set_issuer(issuer);
    }
    validation.sub = checks.subject.clone();

    let mut required: Vec<&str> = checks.required.iter().map(String::as_str).collect();
    if checks.validate_exp {
        required.push("exp");
    }
    validation.set_required_spec_claims(&required);

    let data = decode::<Value>(token, &key, &validation).map_err(|err| {
        debug!(error = %err, "token decode failed");
        classify(&err)
    })?;

    let claims = match data.claims {
        Value::Object(map) => map,
        _ => return Err(DecodeErrorKind::Other),
    };
    let header = match serde_json::to_value(&data.header) {
        Ok(Value::Object(map)) => map,
        _ => return Err(DecodeErrorKind::Other),
    };

    check_issued_at(&claims)?;
    check_jwt_id(&claims, checks)?;

    Ok(DecodedToken { claims, header })
}

/// Decode a token without verifying anything. Still requires the three
/// dot-separated segments of a compact JWT; anything else is a decode error.
fn decode_unverified(token: &str) -> Result<DecodedToken, DecodeErrorKind> {
    let mut segments = token.split('.');
    let (header, claims) = match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(claims), Some(_signature), None) => (header, claims),
        _ => return Err(DecodeErrorKind::Other),
    };

    let header = decode_segment(header)?;
    let claims = decode_segment(claims)?;
    Ok(DecodedToken { claims, header })
}

fn decode_segment(segment: &str) -> Result<JsonMap, DecodeErrorKind> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| DecodeErrorKind::Other)?;
    match serde_json::from_slice(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(DecodeErrorKind::Other),
    }
}

fn encode_unsigned(payload: &JsonMap) -> String {
    let header = serde_json::json!({"alg": "none", "typ": "JWT"});
    let header = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims = URL_SAFE_NO_PAD.encode(Value::Object(payload.clone()).to_string());
    // Trailing period: the signature segment is present but empty.
    format!("{header}.{claims}.")
}

fn decoding_key(secret: &Secret, algorithm: TokenAlgorithm) -> Result<DecodingKey, DecodeErrorKind> {
    match (algorithm.family(), secret) {
        (AlgorithmFamily::Hmac, Secret::Shared(shared)) => {
            Ok(DecodingKey::from_secret(shared.as_bytes()))
        }
        (AlgorithmFamily::Rsa, Secret::Pem { decoding, .. }) => {
            DecodingKey::from_rsa_pem(decoding.as_bytes()).map_err(|_| DecodeErrorKind::Other)
        }
        (AlgorithmFamily::Ec, Secret::Pem { decoding, .. }) => {
            DecodingKey::from_ec_pem(decoding.as_bytes()).map_err(|_| DecodeErrorKind::Other)
        }
        (AlgorithmFamily::Ed, Secret::Pem { decoding, .. }) => {
            DecodingKey::from_ed_pem(decoding.as_bytes()).map_err(|_| DecodeErrorKind::Other)
        }
        // Config validation keeps secret and algorithm aligned; anything
        // else is a decode error rather than a panic.
        _ => Err(DecodeErrorKind::Other),
    }
}

fn encoding_key(secret: &Secret, algorithm: TokenAlgorithm) -> Result<EncodingKey, EncodeError> {
    let missing = || EncodeError::MissingKey(algorithm.as_str().to_string());
    match (algorithm.family(), secret) {
        (AlgorithmFamily::Hmac, Secret::Shared(shared)) => {
            Ok(EncodingKey::from_secret(shared.as_bytes()))
        }
        (AlgorithmFamily::Rsa, Secret::Pem { encoding, .. }) => {
            let pem = encoding.as_ref().ok_or_else(missing)?;
            EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|err| EncodeError::Sign(err.to_string()))
        }
        (AlgorithmFamily::Ec, Secret::Pem { encoding, .. }) => {
            let pem = encoding.as_ref().ok_or_else(missing)?;
            EncodingKey::from_ec_pem(pem.as_bytes()).map_err(|err| EncodeError::Sign(err.to_string()))
        }
        (AlgorithmFamily::Ed, Secret::Pem { encoding, .. }) => {
            let pem = encoding.as_ref().ok_or_else(missing)?;
            EncodingKey::from_ed_pem(pem.as_bytes()).map_err(|err| EncodeError::Sign(err.to_string()))
        }
        _ => Err(missing()),
    }
}

/// Map `jsonwebtoken` failures onto the gate's taxonomy. `ErrorKind` is
/// non-exhaustive upstream, so unknown variants land in `Other` instead of
/// ever faulting a request.
fn classify(err: &jsonwebtoken::errors::Error) -> DecodeErrorKind {
    use jsonwebtoken::errors::ErrorKind;
    match err.kind() {
        ErrorKind::InvalidSignature => DecodeErrorKind::InvalidSignature,
        ErrorKind::ExpiredSignature => DecodeErrorKind::ExpiredSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            DecodeErrorKind::IncorrectAlgorithm
        }
        ErrorKind::ImmatureSignature => DecodeErrorKind::ImmatureSignature,
        ErrorKind::InvalidIssuer => DecodeErrorKind::InvalidIssuer,
        ErrorKind::InvalidAudience => DecodeErrorKind::InvalidAudience,
        ErrorKind::InvalidSubject => DecodeErrorKind::InvalidSubject,
        ErrorKind::MissingRequiredClaim(_) => DecodeErrorKind::MissingClaim,
        _ => DecodeErrorKind::Other,
    }
}

/// `jsonwebtoken` does not police `iat`; a present but non-numeric value is
/// its own classification.
fn check_issued_at(claims: &JsonMap) -> Result<(), DecodeErrorKind> {
    match claims.get("iat") {
        Some(value) if !value.is_number() => Err(DecodeErrorKind::InvalidIssuedAt),
        _ => Ok(()),
    }
}

/// When a `jti` is pinned in the checks, the token's must match exactly.
fn check_jwt_id(claims: &JsonMap, checks: &ClaimChecks) -> Result<(), DecodeErrorKind> {
    let Some(expected) = &checks.jwt_id else {
        return Ok(());
    };
    match claims.get("jti").and_then(Value::as_str) {
        Some(jti) if jti == expected => Ok(()),
        _ => Err(DecodeErrorKind::InvalidJwtId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
    use rsa::rand_core::OsRng;
    use rsa::RsaPrivateKey;

    fn claims_with_exp(extra: &[(&str, Value)]) -> JsonMap {
        let mut payload = JsonMap::new();
        payload.insert("sub".into(), Value::from("user-1"));
        payload.insert("exp".into(), Value::from(Utc::now().timestamp() + 600));
        for (key, value) in extra {
            payload.insert((*key).to_string(), value.clone());
        }
        payload
    }

    fn hs256_secret() -> Secret {
        Secret::Shared("s3cr3t".to_string())
    }

    #[test]
    fn hs256_round_trip() {
        let codec = JwtCodec;
        let payload = claims_with_exp(&[]);
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let decoded = codec
            .decode(
                &token,
                &hs256_secret(),
                TokenAlgorithm::Hs256,
                true,
                &ClaimChecks::default(),
            )
            .expect("decode");
        assert_eq!(decoded.claims, payload);
        assert_eq!(decoded.header.get("alg"), Some(&Value::from("HS256")));
    }

    #[test]
    fn wrong_secret_classifies_as_invalid_signature() {
        let codec = JwtCodec;
        let token = codec
            .encode(&claims_with_exp(&[]), &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let err = codec
            .decode(
                &token,
                &Secret::Shared("other".to_string()),
                TokenAlgorithm::Hs256,
                true,
                &ClaimChecks::default(),
            )
            .expect_err("wrong secret");
        assert_eq!(err, DecodeErrorKind::InvalidSignature);
    }

    #[test]
    fn expired_token_classifies_as_expired() {
        let codec = JwtCodec;
        let mut payload = claims_with_exp(&[]);
        payload.insert("exp".into(), Value::from(Utc::now().timestamp() - 600));
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let err = codec
            .decode(
                &token,
                &hs256_secret(),
                TokenAlgorithm::Hs256,
                true,
                &ClaimChecks::default(),
            )
            .expect_err("expired");
        assert_eq!(err, DecodeErrorKind::ExpiredSignature);
    }

    #[test]
    fn missing_exp_classifies_as_missing_claim() {
        let codec = JwtCodec;
        let mut payload = JsonMap::new();
        payload.insert("sub".into(), Value::from("user-1"));
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let err = codec
            .decode(
                &token,
                &hs256_secret(),
                TokenAlgorithm::Hs256,
                true,
                &ClaimChecks::default(),
            )
            .expect_err("missing exp");
        assert_eq!(err, DecodeErrorKind::MissingClaim);
    }

    #[test]
    fn wrong_algorithm_classifies_as_incorrect_algorithm() {
        let codec = JwtCodec;
        let token = codec
            .encode(&claims_with_exp(&[]), &hs256_secret(), TokenAlgorithm::Hs384)
            .expect("encode");
        let err = codec
            .decode(
                &token,
                &hs256_secret(),
                TokenAlgorithm::Hs256,
                true,
                &ClaimChecks::default(),
            )
            .expect_err("algorithm mismatch");
        assert_eq!(err, DecodeErrorKind::IncorrectAlgorithm);
    }

    #[test]
    fn wrong_issuer_classifies_as_invalid_issuer() {
        let codec = JwtCodec;
        let payload = claims_with_exp(&[("iss", Value::from("other"))]);
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let checks = ClaimChecks {
            issuer: Some(vec!["expected".to_string()]),
            ..ClaimChecks::default()
        };
        let err = codec
            .decode(&token, &hs256_secret(), TokenAlgorithm::Hs256, true, &checks)
            .expect_err("issuer mismatch");
        assert_eq!(err, DecodeErrorKind::InvalidIssuer);
    }

    #[test]
    fn wrong_audience_classifies_as_invalid_audience() {
        let codec = JwtCodec;
        let payload = claims_with_exp(&[("aud", Value::from("other"))]);
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let checks = ClaimChecks {
            audience: Some(vec!["expected".to_string()]),
            ..ClaimChecks::default()
        };
        let err = codec
            .decode(&token, &hs256_secret(), TokenAlgorithm::Hs256, true, &checks)
            .expect_err("audience mismatch");
        assert_eq!(err, DecodeErrorKind::InvalidAudience);
    }

    #[test]
    fn wrong_subject_classifies_as_invalid_subject() {
        let codec = JwtCodec;
        let payload = claims_with_exp(&[]);
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let checks = ClaimChecks {
            subject: Some("someone-else".to_string()),
            ..ClaimChecks::default()
        };
        let err = codec
            .decode(&token, &hs256_secret(), TokenAlgorithm::Hs256, true, &checks)
            .expect_err("subject mismatch");
        assert_eq!(err, DecodeErrorKind::InvalidSubject);
    }

    #[test]
    fn immature_nbf_classifies_as_immature() {
        let codec = JwtCodec;
        let payload = claims_with_exp(&[("nbf", Value::from(Utc::now().timestamp() + 600))]);
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let checks = ClaimChecks {
            validate_nbf: true,
            ..ClaimChecks::default()
        };
        let err = codec
            .decode(&token, &hs256_secret(), TokenAlgorithm::Hs256, true, &checks)
            .expect_err("not yet valid");
        assert_eq!(err, DecodeErrorKind::ImmatureSignature);
    }

    #[test]
    fn non_numeric_iat_classifies_as_invalid_issued_at() {
        let codec = JwtCodec;
        let payload = claims_with_exp(&[("iat", Value::from("yesterday"))]);
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let err = codec
            .decode(
                &token,
                &hs256_secret(),
                TokenAlgorithm::Hs256,
                true,
                &ClaimChecks::default(),
            )
            .expect_err("bad iat");
        assert_eq!(err, DecodeErrorKind::InvalidIssuedAt);
    }

    #[test]
    fn jti_mismatch_classifies_as_invalid_jwt_id() {
        let codec = JwtCodec;
        let payload = claims_with_exp(&[("jti", Value::from("token-1"))]);
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let checks = ClaimChecks {
            jwt_id: Some("token-2".to_string()),
            ..ClaimChecks::default()
        };
        let err = codec
            .decode(&token, &hs256_secret(), TokenAlgorithm::Hs256, true, &checks)
            .expect_err("jti mismatch");
        assert_eq!(err, DecodeErrorKind::InvalidJwtId);
    }

    #[test]
    fn garbage_classifies_as_generic_decode_error() {
        let codec = JwtCodec;
        let err = codec
            .decode(
                "not-a-token",
                &hs256_secret(),
                TokenAlgorithm::Hs256,
                true,
                &ClaimChecks::default(),
            )
            .expect_err("garbage");
        assert_eq!(err, DecodeErrorKind::Other);
    }

    #[test]
    fn unsigned_round_trip() {
        let codec = JwtCodec;
        let mut payload = JsonMap::new();
        payload.insert("sub".into(), Value::from("anon"));
        let token = codec
            .encode(&payload, &Secret::None, TokenAlgorithm::None)
            .expect("encode");
        assert!(token.ends_with('.'));
        let decoded = codec
            .decode(
                &token,
                &Secret::None,
                TokenAlgorithm::None,
                false,
                &ClaimChecks::default(),
            )
            .expect("decode");
        assert_eq!(decoded.claims, payload);
        assert_eq!(decoded.header.get("alg"), Some(&Value::from("none")));
    }

    #[test]
    fn verify_disabled_skips_signature_checks() {
        let codec = JwtCodec;
        let payload = claims_with_exp(&[]);
        let token = codec
            .encode(&payload, &hs256_secret(), TokenAlgorithm::Hs256)
            .expect("encode");
        let decoded = codec
            .decode(
                &token,
                &Secret::Shared("completely-different".to_string()),
                TokenAlgorithm::Hs256,
                false,
                &ClaimChecks::default(),
            )
            .expect("unverified decode");
        assert_eq!(decoded.claims, payload);
    }

    #[test]
    fn rs256_round_trip_with_generated_keys() {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        let public_key = private_key.to_public_key();
        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("private pem");
        let public_pem = public_key.to_pkcs1_pem(LineEnding::LF).expect("public pem");

        let secret = Secret::Pem {
            decoding: public_pem.to_string(),
            encoding: Some(private_pem.to_string()),
        };

        let codec = JwtCodec;
        let payload = claims_with_exp(&[]);
        let token = codec
            .encode(&payload, &secret, TokenAlgorithm::Rs256)
            .expect("encode");
        let decoded = codec
            .decode(
                &token,
                &secret,
                TokenAlgorithm::Rs256,
                true,
                &ClaimChecks::default(),
            )
            .expect("decode");
        assert_eq!(decoded.claims, payload);
    }

    #[test]
    fn encode_without_private_key_fails() {
        let codec = JwtCodec;
        let secret = Secret::Pem {
            decoding: "-----BEGIN PUBLIC KEY-----".to_string(),
            encoding: None,
        };
        let err = codec
            .encode(&claims_with_exp(&[]), &secret, TokenAlgorithm::Rs256)
            .expect_err("no signing key");
        assert!(matches!(err, EncodeError::MissingKey(_)));
    }
}
