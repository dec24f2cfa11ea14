//! Authentication core for the clubpost membership service.
//!
//! Self-signed HMAC bearer tokens, a bitset scope codec, the token backend
//! holding one codec per token kind, a sliding-window login limiter and the
//! OAuth2 token-endpoint glue tying them together.

pub mod authority;
pub mod backend;
pub mod endpoint;
pub mod jwt;
pub mod rate_limiter;
pub mod scope;
pub mod types;
