pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod exclude;
pub mod locate;
pub mod middleware;

pub use codec::{DecodedToken, JsonMap, JwtCodec, TokenCodec};
pub use config::{Capabilities, ClaimChecks, GateConfig, GateSettings, Secret, TokenAlgorithm};
pub use engine::{AuthGate, AuthOutcome, RequestContext};
pub use error::{AuthError, AuthResult, ConfigError, DecodeErrorKind, EncodeError};
pub use exclude::{
    ExclusionError, ExclusionList, ExclusionRule, MethodSet, RawExclusion, RawMethods, ScopedRule,
};
pub use middleware::{authenticate, VerifiedClaims};
