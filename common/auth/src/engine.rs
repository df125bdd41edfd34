use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::{DecodedToken, JsonMap, JwtCodec, TokenCodec};
use crate::config::{Capabilities, GateConfig, GateSettings};
use crate::error::{AuthError, ConfigError, DecodeErrorKind, EncodeError};
use crate::locate::{self, CookieToken, HeaderToken};

/// Everything the gate needs to know about one request. Built fresh per
/// request and dropped when the decision is made.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub path: String,
    pub method: String,
    pub authorization: Option<String>,
    pub cookies: HashMap<String, String>,
}

/// The gate's verdict for one request.
#[derive(Debug)]
pub enum AuthOutcome {
    /// Authentication failed; the request must be answered with the carried
    /// error and never reach downstream handlers.
    Rejected(AuthError),
    /// A token was presented and verified; claims travel with the request.
    Authenticated(DecodedToken),
    /// The path was exempt and no token was supplied at all.
    PassedThrough,
}

/// The authentication decision engine. Immutable after construction and
/// safely shared across arbitrarily many concurrent requests.
pub struct AuthGate {
    config: GateConfig,
    codec: Arc<dyn TokenCodec>,
}

impl AuthGate {
    pub fn new(settings: GateSettings) -> Result<Self, ConfigError> {
        Self::with_capabilities(settings, Capabilities::default())
    }

    pub fn with_capabilities(
        settings: GateSettings,
        capabilities: Capabilities,
    ) -> Result<Self, ConfigError> {
        Self::with_codec(settings, capabilities, Arc::new(JwtCodec))
    }

    pub fn with_codec(
        settings: GateSettings,
        capabilities: Capabilities,
        codec: Arc<dyn TokenCodec>,
    ) -> Result<Self, ConfigError> {
        let config = GateConfig::from_settings(settings, capabilities)?;
        Ok(Self { config, codec })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Decide whether a request may proceed.
    ///
    /// Cookie and header sources are located independently; when both carry
    /// a token the cookie wins. Exempt paths skip the mandatory-presence
    /// checks but a supplied token still gets verified, so handlers behind
    /// excluded routes can trust any claims they see.
    pub fn authorize(&self, request: &RequestContext) -> AuthOutcome {
        let exempt = self
            .config
            .exclusions
            .is_exempt(&request.path, &request.method);

        let cookie = self
            .config
            .cookie_name
            .as_deref()
            .map(|name| locate::cookie_token(&request.cookies, name));
        let header = locate::bearer_token(request.authorization.as_deref());

        if !exempt {
            if let Some(cookie) = &cookie {
                match (cookie, &header) {
                    (Err(CookieToken::Missing), Err(HeaderToken::Missing)) => {
                        return self.reject(request, AuthError::MissingTokenAndHeader);
                    }
                    (Err(CookieToken::Empty), _) => {
                        return self.reject(request, AuthError::EmptyCookie);
                    }
                    _ => {}
                }
            } else {
                match &header {
                    Err(HeaderToken::Missing) => {
                        return self.reject(request, AuthError::MissingHeader);
                    }
                    Err(HeaderToken::Malformed) => {
                        return self.reject(request, AuthError::MalformedHeader);
                    }
                    Ok(_) => {}
                }
            }
        }

        let cookie_token = cookie.and_then(Result::ok);
        let header_token = header.ok();
        let candidate = cookie_token.or(header_token);

        match candidate {
            Some(token) => match self.codec.decode(
                &token,
                &self.config.secret,
                self.config.algorithm,
                self.config.verify,
                &self.config.claim_checks,
            ) {
                Ok(decoded) => {
                    debug!(path = %request.path, "request authenticated");
                    AuthOutcome::Authenticated(decoded)
                }
                Err(kind) => self.reject(request, AuthError::Decode(kind)),
            },
            None if exempt => AuthOutcome::PassedThrough,
            // Auth was required but neither source produced a candidate and
            // no presence rule fired (cookie configured, cookie absent,
            // header malformed): a decode with nothing to decode.
            None => self.reject(request, AuthError::Decode(DecodeErrorKind::Other)),
        }
    }

    /// Thin pass-through to the codec for token issuance.
    pub fn issue(&self, payload: &JsonMap) -> Result<String, EncodeError> {
        self.codec
            .encode(payload, &self.config.secret, self.config.algorithm)
    }

    fn reject(&self, request: &RequestContext, error: AuthError) -> AuthOutcome {
        warn!(path = %request.path, method = %request.method, error = %error, "request rejected");
        AuthOutcome::Rejected(error)
    }
}
