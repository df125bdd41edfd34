use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::codec::DecodedToken;
use crate::engine::{AuthGate, AuthOutcome, RequestContext};
use crate::error::AuthError;

/// Verified claims attached to the request by the gate, for downstream
/// handlers to extract.
#[derive(Debug, Clone)]
pub struct VerifiedClaims(pub DecodedToken);

impl VerifiedClaims {
    pub fn into_token(self) -> DecodedToken {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedClaims
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedClaims>()
            .cloned()
            .ok_or(AuthError::MissingHeader)
    }
}

/// Gate middleware. Mount with
/// `axum::middleware::from_fn_with_state(gate, authenticate)`.
///
/// On rejection the response is a 401 JSON body and the handler never runs;
/// otherwise the request proceeds unchanged, with claims attached when a
/// token was verified.
pub async fn authenticate(
    State(gate): State<Arc<AuthGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = request_context(&request);
    match gate.authorize(&context) {
        AuthOutcome::Rejected(error) => error.into_response(),
        AuthOutcome::Authenticated(token) => {
            request.extensions_mut().insert(VerifiedClaims(token));
            next.run(request).await
        }
        AuthOutcome::PassedThrough => next.run(request).await,
    }
}

fn request_context(request: &Request) -> RequestContext {
    RequestContext {
        path: request.uri().path().to_string(),
        method: request.method().as_str().to_string(),
        authorization: request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned),
        cookies: parse_cookies(request.headers()),
    }
}

/// RFC 6265 request-cookie parsing: `k=v; k2=v2`. First occurrence of a
/// name wins.
fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() || cookies.contains_key(name) {
                continue;
            }
            cookies.insert(name.to_string(), value.trim().to_string());
        }
    }
    cookies
}
