//! Token backend: one codec per token kind plus the renewal policy.

use chrono::Duration;

use super::jwt::{Claim, TokenCodec};
use super::scope::{Permission, Scope};
use super::types::AuthError;

/// Validity durations for the three token kinds.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub access_validity: Duration,
    pub refresh_validity: Duration,
    /// Also used for temporary (pending-registration) access tokens.
    pub mail_validity: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            access_validity: Duration::minutes(36),
            refresh_validity: Duration::minutes(1170),
            mail_validity: Duration::minutes(1170),
        }
    }
}

impl BackendConfig {
    /// Overrides the access-token validity.
    pub fn access_validity(mut self, validity: Duration) -> Self {
        self.access_validity = validity;
        self
    }

    /// Overrides the refresh-token validity.
    pub fn refresh_validity(mut self, validity: Duration) -> Self {
        self.refresh_validity = validity;
        self
    }

    /// Overrides the mail/temporary-token validity.
    pub fn mail_validity(mut self, validity: Duration) -> Self {
        self.mail_validity = validity;
        self
    }
}

/// Owns three independent token codecs: access, refresh and mail
/// confirmation. Each has its own freshly generated authority, so a leaked
/// token of one kind never verifies as another kind even with identical
/// subject and scope.
pub struct TokenBackend {
    access: TokenCodec,
    refresh: TokenCodec,
    mail: TokenCodec,
    config: BackendConfig,
}

impl TokenBackend {
    pub fn new() -> Result<Self, AuthError> {
        Self::with_config(BackendConfig::default())
    }

    pub fn with_config(config: BackendConfig) -> Result<Self, AuthError> {
        Ok(TokenBackend {
            access: TokenCodec::new()?,
            refresh: TokenCodec::new()?,
            mail: TokenCodec::new()?,
            config,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Issues a short-lived access token.
    pub fn issue_access(&self, sub: &str, scope: Scope) -> Result<String, AuthError> {
        self.access
            .issue(sub, &scope.encode(), self.config.access_validity, false)
    }

    /// Issues a refresh token carrying the same scope as the access token it
    /// will later mint.
    pub fn issue_refresh(&self, sub: &str, scope: Scope) -> Result<String, AuthError> {
        self.refresh
            .issue(sub, &scope.encode(), self.config.refresh_validity, false)
    }

    /// Issues a scope-less mail-confirmation token.
    pub fn issue_mail(&self, sub: &str) -> Result<String, AuthError> {
        self.mail.issue(sub, "", self.config.mail_validity, false)
    }

    /// Issues a temporary access token for an account still completing
    /// registration: minimal fixed scope, temporary flag set, and the longer
    /// mail validity. The "still pending" check stays with the caller.
    pub fn issue_tmp_user_access(&self, sub: &str) -> Result<String, AuthError> {
        let scope = Scope::empty().set(Permission::User);
        self.access
            .issue(sub, &scope.encode(), self.config.mail_validity, true)
    }

    /// Authenticates an access (or temporary access) token.
    pub fn authenticate(&self, token: &str) -> Result<Claim, AuthError> {
        self.access.authenticate(token)
    }

    /// Authenticates a refresh token.
    pub fn authenticate_refresh(&self, token: &str) -> Result<Claim, AuthError> {
        self.refresh.authenticate(token)
    }

    /// Authenticates a mail-confirmation token.
    pub fn authenticate_mail(&self, token: &str) -> Result<Claim, AuthError> {
        self.mail.authenticate(token)
    }

    /// Refresh-rotation policy: once a refresh claim has less than two access
    /// lifetimes left, the endpoint should hand out a new refresh token with
    /// the new access token instead of forcing a credential login later.
    /// Non-expiring claims never require renewal.
    pub fn refresh_requires_renew(&self, claim: &Claim) -> bool {
        match claim.remaining {
            Some(remaining) => remaining < self.config.access_validity * 2,
            None => false,
        }
    }
}
