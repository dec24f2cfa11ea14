//! Self-signed bearer tokens: issuing and strict authentication.
//!
//! The wire format is JWT-shaped (`header.payload.signature`, base64url
//! without padding) but validation is deliberately stricter than RFC 7519:
//! both JSON segments are parsed with unknown fields rejected, and the
//! algorithm must match the owning authority exactly.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use ring::constant_time;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::authority::Authority;
use super::types::AuthError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Header {
    alg: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Payload {
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    /// Unix seconds. Absent when the token was issued with zero validity,
    /// which means "no expiry field", not "expires immediately".
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tmp: Option<bool>,
    /// Random per-token identifier. Uniqueness hint only; never checked
    /// against a store.
    jti: String,
}

/// Validated payload of a presented token. Lives for one request only and is
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Subject identifier.
    pub sub: String,
    /// Raw scope string; decoded lazily by the caller.
    pub scope: String,
    /// Validity left at verification time. `None` for non-expiring tokens.
    pub remaining: Option<Duration>,
    /// Temporary-token flag for pre-confirmation workflows.
    pub temporary: bool,
}

/// Issues and authenticates signed tokens against one [`Authority`].
///
/// Stateless after construction: concurrent calls are safe without locking
/// because every operation takes a fresh hash context and shares no buffers.
pub struct TokenCodec {
    authority: Authority,
}

impl TokenCodec {
    /// Builds a codec over a freshly generated authority.
    pub fn new() -> Result<Self, AuthError> {
        Ok(TokenCodec {
            authority: Authority::new()?,
        })
    }

    /// Builds a codec over an existing authority, taking exclusive ownership.
    pub fn with_authority(authority: Authority) -> Self {
        TokenCodec { authority }
    }

    /// Signs a token for `sub`. A zero `validity` omits the expiry field
    /// entirely; callers wanting a bounded pre-confirmation token pass
    /// `temporary` with a regular validity instead.
    pub fn issue(
        &self,
        sub: &str,
        scope: &str,
        validity: Duration,
        temporary: bool,
    ) -> Result<String, AuthError> {
        let header = Header {
            alg: self.authority.alg().to_string(),
        };
        let header_json = serde_json::to_vec(&header).map_err(|_| AuthError::ServerError)?;

        let exp = if validity.is_zero() {
            None
        } else {
            Some(Utc::now().timestamp() + validity.num_seconds())
        };
        let payload = Payload {
            sub: sub.to_owned(),
            scope: if scope.is_empty() {
                None
            } else {
                Some(scope.to_owned())
            },
            exp,
            tmp: if temporary { Some(true) } else { None },
            jti: Uuid::new_v4().to_string(),
        };
        let payload_json = serde_json::to_vec(&payload).map_err(|_| AuthError::ServerError)?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(payload_json)
        );
        let mut ctx = self.authority.hasher();
        ctx.update(signing_input.as_bytes());
        let tag = ctx.sign();
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(tag.as_ref())
        ))
    }

    /// Verifies a presented token and returns its claim.
    ///
    /// Order of checks: segment count, strict header parse and algorithm
    /// match, strict payload parse and expiry, then the signature in constant
    /// time over the raw substrings (never a re-serialization of the parsed
    /// structs, which could differ byte-for-byte).
    pub fn authenticate(&self, token: &str) -> Result<Claim, AuthError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AuthError::Malformed(format!(
                "expected 3 parts, got {}",
                parts.len()
            )));
        }

        let header_raw = URL_SAFE_NO_PAD
            .decode(parts[0])
            .map_err(|_| AuthError::Malformed("header is not valid base64url".into()))?;
        let header: Header = serde_json::from_slice(&header_raw)
            .map_err(|_| AuthError::Malformed("header is not a strict JSON header object".into()))?;
        if header.alg != self.authority.alg() {
            return Err(AuthError::AlgorithmMismatch);
        }

        let payload_raw = URL_SAFE_NO_PAD
            .decode(parts[1])
            .map_err(|_| AuthError::Malformed("payload is not valid base64url".into()))?;
        let payload: Payload = serde_json::from_slice(&payload_raw).map_err(|_| {
            AuthError::Malformed("payload is not a strict JSON claims object".into())
        })?;

        let remaining = match payload.exp {
            Some(exp) => {
                let left = exp - Utc::now().timestamp();
                if left < 0 {
                    return Err(AuthError::Expired);
                }
                Some(Duration::seconds(left))
            }
            // No expiry field: validity is bounded by external state only,
            // e.g. "is this identity still pending confirmation".
            None => None,
        };

        let mut ctx = self.authority.hasher();
        ctx.update(parts[0].as_bytes());
        ctx.update(b".");
        ctx.update(parts[1].as_bytes());
        let expected = ctx.sign();
        let presented = URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|_| AuthError::Malformed("signature is not valid base64url".into()))?;
        constant_time::verify_slices_are_equal(expected.as_ref(), &presented)
            .map_err(|_| AuthError::SignatureInvalid)?;

        Ok(Claim {
            sub: payload.sub,
            scope: payload.scope.unwrap_or_default(),
            remaining,
            temporary: payload.tmp.unwrap_or(false),
        })
    }
}
