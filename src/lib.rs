pub mod auth_core;

pub use auth_core::authority::Authority;
pub use auth_core::backend::{BackendConfig, TokenBackend};
pub use auth_core::endpoint::{
    CredentialStore, InMemoryCredentialStore, TokenEndpoint, TokenReply, TokenRequest,
};
pub use auth_core::jwt::{Claim, TokenCodec};
pub use auth_core::rate_limiter::{LimiterConfig, RateLimiter, SlidingWindowLimiter};
pub use auth_core::scope::{Permission, Scope};
pub use auth_core::types::AuthError;
