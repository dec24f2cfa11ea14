//! Core auth error taxonomy and its OAuth2 response mapping.

use serde_json::{Value, json};
use std::fmt;
use tracing::warn;

/// Core authentication error kinds.
///
/// Every operation in this crate returns one of these instead of raising;
/// the endpoint glue maps each variant to its fixed HTTP status and OAuth2
/// error identifier. The core itself carries no HTTP knowledge beyond the
/// spec-reference URI attached to each variant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AuthError {
    /// The token is structurally broken: wrong segment count, invalid
    /// base64url, or JSON that fails strict parsing.
    Malformed(String),
    /// The token header names an algorithm the authority does not implement.
    AlgorithmMismatch,
    /// The token's validity window has elapsed.
    Expired,
    /// The recomputed signature does not match the presented one.
    SignatureInvalid,
    /// A scope token not present in the codec's table.
    UnknownScope(String),
    /// The identity exhausted its login attempt budget.
    RateLimited,
    /// Credential lookup failed. Deliberately generic so the response never
    /// leaks which half of the pair was wrong.
    IncorrectIdentity,
    /// The presented token does not carry the required permissions.
    InsufficientScope,
    /// The token endpoint was asked for a grant type it does not implement.
    UnsupportedGrantType(String),
    /// The secure random source failed during key generation. Fatal to the
    /// caller, never silently retried.
    KeyGeneration,
    /// Generic server-side error.
    ServerError,
}

impl AuthError {
    /// Short human-readable description, used as `error_description`.
    pub fn message(&self) -> String {
        match self {
            AuthError::Malformed(detail) => format!("malformed token: {detail}"),
            AuthError::AlgorithmMismatch => "token header names an unsupported algorithm".into(),
            AuthError::Expired => "the token has expired".into(),
            AuthError::SignatureInvalid => "token signature verification failed".into(),
            AuthError::UnknownScope(token) => format!("unknown scope token {token:?}"),
            AuthError::RateLimited => "too many login attempts, retry later".into(),
            AuthError::IncorrectIdentity => "invalid username and/or password".into(),
            AuthError::InsufficientScope => {
                "the token does not grant the required scope".into()
            }
            AuthError::UnsupportedGrantType(grant) => {
                format!("unsupported grant type {grant:?}")
            }
            AuthError::KeyGeneration => {
                "secure random source failed while generating a signing key".into()
            }
            AuthError::ServerError => "internal server error".into(),
        }
    }

    /// Stable reference into the OAuth2/JWT RFCs naming the violated rule,
    /// surfaced as `error_uri` so a `WWW-Authenticate` challenge can point at
    /// the exact requirement without this crate knowing about HTTP.
    pub fn error_uri(&self) -> &'static str {
        match self {
            AuthError::Malformed(_) => "https://datatracker.ietf.org/doc/html/rfc7519#section-7.2",
            AuthError::AlgorithmMismatch => {
                "https://datatracker.ietf.org/doc/html/rfc7515#section-4.1.1"
            }
            AuthError::Expired => "https://datatracker.ietf.org/doc/html/rfc7519#section-4.1.4",
            AuthError::SignatureInvalid => {
                "https://datatracker.ietf.org/doc/html/rfc7515#section-5.2"
            }
            AuthError::UnknownScope(_) => {
                "https://datatracker.ietf.org/doc/html/rfc6749#section-3.3"
            }
            AuthError::RateLimited => "https://datatracker.ietf.org/doc/html/rfc6585#section-4",
            AuthError::IncorrectIdentity => {
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.3.2"
            }
            AuthError::InsufficientScope => {
                "https://datatracker.ietf.org/doc/html/rfc6750#section-3.1"
            }
            AuthError::UnsupportedGrantType(_)
            | AuthError::KeyGeneration
            | AuthError::ServerError => "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2",
        }
    }

    /// OAuth2 error identifier for the default (protected-resource) mapping.
    /// The token endpoint overrides this with `invalid_grant` on its own
    /// failure paths.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Malformed(_)
            | AuthError::AlgorithmMismatch
            | AuthError::Expired
            | AuthError::SignatureInvalid => "invalid_token",
            AuthError::UnknownScope(_) => "invalid_scope",
            AuthError::RateLimited => "too_many_requests",
            AuthError::IncorrectIdentity => "invalid_grant",
            AuthError::InsufficientScope => "insufficient_scope",
            AuthError::UnsupportedGrantType(_) => "unsupported_grant_type",
            AuthError::KeyGeneration | AuthError::ServerError => "server_error",
        }
    }

    /// HTTP status for the default mapping.
    pub fn status(&self) -> u16 {
        match self {
            AuthError::Malformed(_)
            | AuthError::AlgorithmMismatch
            | AuthError::Expired
            | AuthError::SignatureInvalid => 401,
            AuthError::UnknownScope(_) => 400,
            AuthError::RateLimited => 429,
            AuthError::IncorrectIdentity => 400,
            AuthError::InsufficientScope => 403,
            AuthError::UnsupportedGrantType(_) => 400,
            AuthError::KeyGeneration | AuthError::ServerError => 500,
        }
    }

    /// OAuth2-shaped JSON error body.
    pub fn error_body(&self) -> Value {
        warn!(error = ?self, error_code = self.error_code(), http_status = self.status(), "auth error surfaced to client");
        json!({
            "error": self.error_code(),
            "error_description": self.message(),
            "error_uri": self.error_uri(),
        })
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for AuthError {}
