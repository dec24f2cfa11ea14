use chrono::Duration;
use clubpost_auth::auth_core::endpoint::bearer_challenge;
use clubpost_auth::{
    AuthError, BackendConfig, InMemoryCredentialStore, Permission, Scope, SlidingWindowLimiter,
    TokenBackend, TokenEndpoint, TokenRequest,
};

fn endpoint_with(
    config: BackendConfig,
) -> TokenEndpoint<InMemoryCredentialStore, SlidingWindowLimiter> {
    let credentials = InMemoryCredentialStore::new();
    credentials.add_user(
        "alice",
        "hunter2",
        Scope::empty().set(Permission::User).set(Permission::Member),
    );
    TokenEndpoint::new(
        TokenBackend::with_config(config).unwrap(),
        credentials,
        SlidingWindowLimiter::new(),
    )
}

fn password_request(username: &str, password: &str) -> TokenRequest {
    TokenRequest {
        grant_type: "password".into(),
        username: Some(username.into()),
        password: Some(password.into()),
        refresh_token: None,
    }
}

#[tokio::test]
async fn password_grant_issues_access_and_refresh_tokens() {
    let endpoint = endpoint_with(BackendConfig::default());
    let reply = endpoint.handle(password_request("alice", "hunter2")).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body["scope"], "user member");

    let access = reply.body["access_token"].as_str().unwrap();
    let claim = endpoint.backend().authenticate(access).unwrap();
    assert_eq!(claim.sub, "alice");
    assert_eq!(claim.scope, "user member");

    let refresh = reply.body["refresh_token"].as_str().unwrap();
    assert!(endpoint.backend().authenticate_refresh(refresh).is_ok());
}

#[tokio::test]
async fn wrong_credentials_yield_a_generic_invalid_grant() {
    let endpoint = endpoint_with(BackendConfig::default());
    for (user, pass) in [("alice", "wrong"), ("nobody", "hunter2")] {
        let reply = endpoint.handle(password_request(user, pass)).await;
        assert_eq!(reply.status, 400);
        assert_eq!(reply.body["error"], "invalid_grant");
        // Never leaks which half of the pair was wrong.
        assert_eq!(
            reply.body["error_description"],
            "invalid username and/or password"
        );
    }
}

#[tokio::test]
async fn the_limiter_refuses_before_the_credential_check() {
    let endpoint = endpoint_with(BackendConfig::default());
    for _ in 0..5 {
        let reply = endpoint.handle(password_request("alice", "wrong")).await;
        assert_eq!(reply.status, 400);
    }
    // 6th attempt: refused up front, even with the correct password.
    let reply = endpoint.handle(password_request("alice", "hunter2")).await;
    assert_eq!(reply.status, 429);
    assert_eq!(reply.body["error"], "too_many_requests");
}

#[tokio::test]
async fn missing_password_fields_are_an_invalid_request() {
    let endpoint = endpoint_with(BackendConfig::default());
    let reply = endpoint
        .handle(TokenRequest {
            grant_type: "password".into(),
            username: Some("alice".into()),
            ..TokenRequest::default()
        })
        .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], "invalid_request");
}

#[tokio::test]
async fn unsupported_grant_types_are_rejected() {
    let endpoint = endpoint_with(BackendConfig::default());
    let reply = endpoint
        .handle(TokenRequest {
            grant_type: "client_credentials".into(),
            ..TokenRequest::default()
        })
        .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], "unsupported_grant_type");
}

#[tokio::test]
async fn refresh_grant_with_a_young_token_skips_rotation() {
    // Default refresh validity (19.5h) is far above twice the access
    // lifetime, so no new refresh token is due.
    let endpoint = endpoint_with(BackendConfig::default());
    let refresh = endpoint
        .backend()
        .issue_refresh("alice", Scope::empty().set(Permission::User))
        .unwrap();
    let reply = endpoint
        .handle(TokenRequest {
            grant_type: "refresh_token".into(),
            refresh_token: Some(refresh),
            ..TokenRequest::default()
        })
        .await;
    assert_eq!(reply.status, 200);
    assert!(reply.body["access_token"].is_string());
    assert!(reply.body.get("refresh_token").is_none());
    assert_eq!(reply.body["scope"], "user");
}

#[tokio::test]
async fn refresh_grant_rotates_a_token_close_to_expiry() {
    // Refresh validity below twice the access lifetime: every refresh claim
    // is inside the renewal threshold from the moment it is issued.
    let config = BackendConfig::default().refresh_validity(Duration::minutes(60));
    let endpoint = endpoint_with(config);
    let refresh = endpoint
        .backend()
        .issue_refresh("alice", Scope::empty().set(Permission::User))
        .unwrap();
    let reply = endpoint
        .handle(TokenRequest {
            grant_type: "refresh_token".into(),
            refresh_token: Some(refresh),
            ..TokenRequest::default()
        })
        .await;
    assert_eq!(reply.status, 200);
    let rotated = reply.body["refresh_token"].as_str().unwrap();
    assert!(endpoint.backend().authenticate_refresh(rotated).is_ok());
}

#[tokio::test]
async fn a_bad_refresh_token_maps_to_invalid_grant_with_the_codec_detail() {
    let endpoint = endpoint_with(BackendConfig::default());
    // An access token is not a refresh token: different authority.
    let access = endpoint
        .backend()
        .issue_access("alice", Scope::empty().set(Permission::User))
        .unwrap();
    let reply = endpoint
        .handle(TokenRequest {
            grant_type: "refresh_token".into(),
            refresh_token: Some(access),
            ..TokenRequest::default()
        })
        .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body["error"], "invalid_grant");
    assert_eq!(
        reply.body["error_description"],
        AuthError::SignatureInvalid.message()
    );
    assert_eq!(
        reply.body["error_uri"],
        AuthError::SignatureInvalid.error_uri()
    );
}

#[tokio::test]
async fn bearer_authorization_checks_the_required_bits() {
    let endpoint = endpoint_with(BackendConfig::default());
    let access = endpoint
        .backend()
        .issue_access("alice", Scope::empty().set(Permission::User))
        .unwrap();
    let header = format!("Bearer {access}");

    let claim = endpoint
        .authorize_bearer(&header, Scope::empty().set(Permission::User))
        .unwrap();
    assert_eq!(claim.sub, "alice");

    assert_eq!(
        endpoint.authorize_bearer(&header, Scope::empty().set(Permission::Management)),
        Err(AuthError::InsufficientScope)
    );
    assert!(matches!(
        endpoint.authorize_bearer(&format!("Basic {access}"), Scope::empty()),
        Err(AuthError::Malformed(_))
    ));
}

#[tokio::test]
async fn the_bearer_challenge_echoes_the_error_and_required_scope() {
    let challenge = bearer_challenge(
        &AuthError::Expired,
        Scope::empty().set(Permission::Member).set(Permission::Privacy),
    );
    assert!(challenge.starts_with("Bearer "));
    assert!(challenge.contains(r#"error="invalid_token""#));
    assert!(challenge.contains(r#"scope="member privacy""#));
    assert!(challenge.contains("rfc7519"));
}
