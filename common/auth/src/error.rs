use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::exclude::ExclusionError;

pub type AuthResult<T> = Result<T, AuthError>;

/// Construction-time configuration errors. Raised once at startup; the
/// service must not begin serving requests after any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("secret is required for algorithm '{0}'")]
    MissingSecret(String),
    #[error("secret must be empty when algorithm is 'none'")]
    SecretWithNone,
    #[error("verify must be disabled when algorithm is 'none'")]
    VerifyWithNone,
    #[error("unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("algorithm '{0}' is not available in this build")]
    UnavailableAlgorithm(String),
    #[error("secret kind does not match algorithm '{algorithm}': expected {expected}")]
    SecretKindMismatch {
        algorithm: String,
        expected: &'static str,
    },
    #[error("exclusion rule {index}: {source}")]
    Exclusion {
        index: usize,
        #[source]
        source: ExclusionError,
    },
}

/// Classification of a token decode failure. Every failure the codec can
/// produce lands in exactly one of these; `Other` is the catch-all that
/// keeps the mapping total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    InvalidSignature,
    ExpiredSignature,
    IncorrectAlgorithm,
    ImmatureSignature,
    InvalidIssuer,
    InvalidIssuedAt,
    InvalidAudience,
    InvalidSubject,
    InvalidJwtId,
    MissingClaim,
    Other,
}

impl DecodeErrorKind {
    pub fn message(&self) -> &'static str {
        match self {
            DecodeErrorKind::InvalidSignature => "Signature Verification Error",
            DecodeErrorKind::ExpiredSignature => "Expired Signature Error",
            DecodeErrorKind::IncorrectAlgorithm => "Incorrect Algorithm Error",
            DecodeErrorKind::ImmatureSignature => "Immature Signature Error",
            DecodeErrorKind::InvalidIssuer => "Invalid Issuer Error",
            DecodeErrorKind::InvalidIssuedAt => "Invalid Issued At Error",
            DecodeErrorKind::InvalidAudience => "Invalid Audience Error",
            DecodeErrorKind::InvalidSubject => "Invalid Subject Error",
            DecodeErrorKind::InvalidJwtId => "Invalid JWT ID Error",
            DecodeErrorKind::MissingClaim => "Missing Required Claim Error",
            DecodeErrorKind::Other => "Decode Error",
        }
    }
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Per-request authentication failures. Each variant renders as a 401 with
/// a JSON body carrying a single `error` string; nothing internal leaks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing token cookie and Authorization header")]
    MissingTokenAndHeader,
    #[error("Empty token cookie")]
    EmptyCookie,
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header format")]
    MalformedHeader,
    #[error("Invalid JWT token : {0}")]
    Decode(DecodeErrorKind),
}

/// Token signing failures from the encode pass-through.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("algorithm '{0}' has no signing key material configured")]
    MissingKey(String),
    #[error("failed to sign token: {0}")]
    Sign(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
