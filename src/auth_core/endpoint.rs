//! OAuth2 token-endpoint glue: form fields in, JSON response out.
//!
//! Transport-neutral on purpose. The HTTP layer hands over the parsed form
//! fields and gets back a status code, a JSON body and an optional
//! `WWW-Authenticate` value; nothing here reads or writes wire bytes.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::backend::TokenBackend;
use super::jwt::Claim;
use super::rate_limiter::RateLimiter;
use super::scope::Scope;
use super::types::AuthError;

/// Credential lookup seam to the external member data layer.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// Verifies a username/password pair, returning the scope granted to the
    /// account. Any failure must surface as `IncorrectIdentity` so the
    /// response never says which half was wrong.
    async fn verify_password(&self, username: &str, password: &str) -> Result<Scope, AuthError>;
}

/// In-memory credential store for tests and embedded setups.
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    users: Arc<DashMap<String, (String, Scope)>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces an account.
    pub fn add_user(&self, username: &str, password: &str, scope: Scope) {
        self.users
            .insert(username.to_owned(), (password.to_owned(), scope));
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn verify_password(&self, username: &str, password: &str) -> Result<Scope, AuthError> {
        self.users
            .get(username)
            .filter(|entry| entry.value().0 == password)
            .map(|entry| entry.value().1)
            .ok_or(AuthError::IncorrectIdentity)
    }
}

/// Parsed form fields of a token request.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
}

/// Transport-neutral endpoint reply.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenReply {
    pub status: u16,
    pub body: Value,
    /// `WWW-Authenticate` value, set on 401 replies.
    pub www_authenticate: Option<String>,
}

#[derive(Serialize)]
struct TokenSuccess {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    scope: String,
}

/// Builds the `WWW-Authenticate: Bearer` value for a failed protected
/// request, echoing the error fields plus the scope the operation needed.
pub fn bearer_challenge(err: &AuthError, required: Scope) -> String {
    format!(
        r#"Bearer error="{}", error_description="{}", error_uri="{}", scope="{}""#,
        err.error_code(),
        err.message(),
        err.error_uri(),
        required.encode()
    )
}

/// The token endpoint: rate limiter, credential lookup and token backend
/// behind the two OAuth2 grants the membership service supports.
pub struct TokenEndpoint<C: CredentialStore, L: RateLimiter> {
    backend: TokenBackend,
    credentials: C,
    limiter: L,
}

impl<C: CredentialStore, L: RateLimiter> TokenEndpoint<C, L> {
    pub fn new(backend: TokenBackend, credentials: C, limiter: L) -> Self {
        TokenEndpoint {
            backend,
            credentials,
            limiter,
        }
    }

    /// The backend, for protected-resource verification outside the grants.
    pub fn backend(&self) -> &TokenBackend {
        &self.backend
    }

    /// Dispatches one token request to its grant handler.
    #[instrument(skip(self, request), fields(grant_type = %request.grant_type), level = "debug")]
    pub async fn handle(&self, request: TokenRequest) -> TokenReply {
        match request.grant_type.as_str() {
            "password" => self.grant_password(&request).await,
            "refresh_token" => self.grant_refresh(&request).await,
            other => error_reply(&AuthError::UnsupportedGrantType(other.to_string())),
        }
    }

    /// Resource-owner password grant. The limiter is consulted before the
    /// expensive credential check, and a refusal skips that check entirely.
    async fn grant_password(&self, request: &TokenRequest) -> TokenReply {
        let (Some(username), Some(password)) =
            (request.username.as_deref(), request.password.as_deref())
        else {
            return invalid_request("password grant requires username and password fields");
        };
        match self.limiter.consume(username).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(username, "password grant refused by rate limiter");
                return error_reply(&AuthError::RateLimited);
            }
            Err(err) => return error_reply(&err),
        }
        let scope = match self.credentials.verify_password(username, password).await {
            Ok(scope) => scope,
            Err(_) => return error_reply(&AuthError::IncorrectIdentity),
        };
        let access_token = match self.backend.issue_access(username, scope) {
            Ok(token) => token,
            Err(err) => return error_reply(&err),
        };
        let refresh_token = match self.backend.issue_refresh(username, scope) {
            Ok(token) => token,
            Err(err) => return error_reply(&err),
        };
        debug!(username, "password grant issued access and refresh tokens");
        success_reply(access_token, Some(refresh_token), scope)
    }

    /// Refresh grant. A fresh refresh token is included only when the
    /// presented one is close enough to expiry that rotation is due.
    async fn grant_refresh(&self, request: &TokenRequest) -> TokenReply {
        let Some(presented) = request.refresh_token.as_deref() else {
            return invalid_request("refresh_token grant requires a refresh_token field");
        };
        let claim = match self.backend.authenticate_refresh(presented) {
            Ok(claim) => claim,
            Err(err) => return invalid_grant_reply(&err),
        };
        let scope = match Scope::decode(&claim.scope) {
            Ok(scope) => scope,
            Err(err) => return error_reply(&err),
        };
        let access_token = match self.backend.issue_access(&claim.sub, scope) {
            Ok(token) => token,
            Err(err) => return error_reply(&err),
        };
        let refresh_token = if self.backend.refresh_requires_renew(&claim) {
            match self.backend.issue_refresh(&claim.sub, scope) {
                Ok(token) => Some(token),
                Err(err) => return error_reply(&err),
            }
        } else {
            None
        };
        debug!(sub = %claim.sub, renewed = refresh_token.is_some(), "refresh grant issued tokens");
        success_reply(access_token, refresh_token, scope)
    }

    /// Protected-resource check: verifies a presented `Authorization` header
    /// value against the permissions the operation requires.
    pub fn authorize_bearer(
        &self,
        authorization: &str,
        required: Scope,
    ) -> Result<Claim, AuthError> {
        let token = authorization.strip_prefix("Bearer ").ok_or_else(|| {
            AuthError::Malformed("authorization header is not a bearer credential".into())
        })?;
        let claim = self.backend.authenticate(token)?;
        let granted = Scope::decode(&claim.scope)?;
        if !granted.contains(required) {
            return Err(AuthError::InsufficientScope);
        }
        Ok(claim)
    }
}

fn success_reply(access_token: String, refresh_token: Option<String>, scope: Scope) -> TokenReply {
    let body = TokenSuccess {
        access_token,
        refresh_token,
        scope: scope.encode(),
    };
    TokenReply {
        status: 200,
        body: serde_json::to_value(body).unwrap_or_default(),
        www_authenticate: None,
    }
}

fn error_reply(err: &AuthError) -> TokenReply {
    let status = err.status();
    TokenReply {
        status,
        body: err.error_body(),
        www_authenticate: (status == 401).then(|| bearer_challenge(err, Scope::empty())),
    }
}

/// Token-grant failures surface as `invalid_grant` regardless of the codec's
/// own classification, keeping the codec's description and reference URI.
fn invalid_grant_reply(err: &AuthError) -> TokenReply {
    warn!(error = ?err, "refresh grant rejected");
    TokenReply {
        status: 400,
        body: json!({
            "error": "invalid_grant",
            "error_description": err.message(),
            "error_uri": err.error_uri(),
        }),
        www_authenticate: None,
    }
}

fn invalid_request(description: &str) -> TokenReply {
    TokenReply {
        status: 400,
        body: json!({
            "error": "invalid_request",
            "error_description": description,
            "error_uri": "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2",
        }),
        www_authenticate: None,
    }
}
