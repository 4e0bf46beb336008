mod common;

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use common::{TEST_JWT_SECRET, TEST_PASSWORD, test_context};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::time::SystemTime;
use users_api::{
    auth::{
        AuthUser, Claims, cleared_session_cookie, decode_token, extract_token, hash_password,
        session_cookie, verify_password,
    },
    models::{Role, UserChanges},
    repository::Repository,
    sessions::RevocationStore,
};
use uuid::Uuid;

// --- Helper Functions ---

fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs arbitrary claims with the test secret.
fn create_token(user_id: i64, iat: u64, exp: u64) -> String {
    let claims = Claims {
        sub: user_id,
        jti: Uuid::new_v4(),
        iat: iat as usize,
        exp: exp as usize,
    };

    let key = EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes());
    encode(&Header::default(), &claims, &key).unwrap()
}

/// Builds the request head the extractor works on.
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(token: &str) -> Parts {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    parts
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_jwt() {
    let ctx = test_context();
    let user = ctx.seed_user("Juju", Role::User).await;
    let token = ctx.token_for(user.id);

    let mut parts = with_bearer(&token);
    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;

    let auth_user = auth_user.expect("a fresh token for an existing user must be accepted");
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.role, Role::User);
}

#[tokio::test]
async fn test_auth_success_with_session_cookie() {
    let ctx = test_context();
    let user = ctx.seed_user("Cookie", Role::Admin).await;
    let token = ctx.token_for(user.id);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_str(&format!("theme=dark; jwt={}", token)).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state)
        .await
        .unwrap();
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.role, Role::Admin);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let ctx = test_context();

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;

    assert_eq!(auth_user.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_wrong_scheme() {
    let ctx = test_context();
    let user = ctx.seed_user("Basic", Role::User).await;
    let token = ctx.token_for(user.id);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Token {}", token)).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;
    assert_eq!(auth_user.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let ctx = test_context();
    let user = ctx.seed_user("Late", Role::User).await;

    // Well past the default 60s validation leeway.
    let token = create_token(user.id, now() - 7200, now() - 3600);

    let mut parts = with_bearer(&token);
    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;

    assert_eq!(auth_user.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_foreign_signature() {
    let ctx = test_context();
    let user = ctx.seed_user("Forged", Role::Superadmin).await;

    let claims = Claims::new(user.id, 3600);
    let key = EncodingKey::from_secret(b"some-other-secret");
    let token = encode(&Header::default(), &claims, &key).unwrap();

    let mut parts = with_bearer(&token);
    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;

    assert_eq!(auth_user.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_for_deleted_user() {
    let ctx = test_context();
    let user = ctx.seed_user("Gone", Role::User).await;
    let token = ctx.token_for(user.id);
    ctx.state.repo.delete_user(user.id).await.unwrap();

    let mut parts = with_bearer(&token);
    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;

    assert_eq!(auth_user.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_for_revoked_token() {
    let ctx = test_context();
    let user = ctx.seed_user("Revoked", Role::User).await;
    let token = ctx.token_for(user.id);

    let claims = decode_token(&token, TEST_JWT_SECRET).unwrap();
    ctx.revocations.revoke(claims.jti, claims.exp).await;

    let mut parts = with_bearer(&token);
    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;

    assert_eq!(auth_user.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_after_password_change() {
    let ctx = test_context();
    let user = ctx.seed_user("Rotated", Role::User).await;

    // Issued an hour ago, before the password change below.
    let token = create_token(user.id, now() - 3600, now() + 3600);

    let new_hash = hash_password("a-brand-new-password".to_string(), 4)
        .await
        .unwrap();
    ctx.state
        .repo
        .update_user(
            user.id,
            UserChanges {
                password_hash: Some(new_hash),
                ..UserChanges::default()
            },
        )
        .await
        .unwrap();

    let mut parts = with_bearer(&token);
    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;
    assert_eq!(auth_user.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);

    // A token issued after the change is fine.
    let fresh = ctx.token_for(user.id);
    let mut parts = with_bearer(&fresh);
    assert!(AuthUser::from_request_parts(&mut parts, &ctx.state).await.is_ok());
}

#[tokio::test]
async fn test_identity_attached_by_protect_is_reused() {
    let ctx = test_context();

    // No token at all: only the identity already stored in the extensions.
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.extensions.insert(AuthUser {
        id: 42,
        role: Role::Admin,
    });

    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state)
        .await
        .unwrap();
    assert_eq!(auth_user, AuthUser { id: 42, role: Role::Admin });
}

#[test]
fn test_extract_token_prefers_bearer_over_cookie() {
    let mut parts = with_bearer("from-header");
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_static("jwt=from-cookie"),
    );

    assert_eq!(extract_token(&parts.headers).as_deref(), Some("from-header"));
}

#[test]
fn test_extract_token_ignores_other_cookies() {
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_static("jwt_other=nope; session=abc"),
    );

    assert_eq!(extract_token(&parts.headers), None);
}

#[test]
fn test_session_cookie_attributes() {
    let mut config = common::test_config();
    let local = session_cookie("abc", &config);
    assert_eq!(local.name(), "jwt");
    assert_eq!(local.value(), "abc");
    assert_eq!(local.http_only(), Some(true));
    assert_eq!(local.path(), Some("/"));
    assert_eq!(
        local.max_age(),
        Some(time::Duration::seconds(config.jwt_expires_in as i64))
    );
    assert_ne!(local.secure(), Some(true));

    config.env = users_api::config::Env::Production;
    assert_eq!(session_cookie("abc", &config).secure(), Some(true));

    let cleared = cleared_session_cookie(&config);
    assert_eq!(cleared.value(), "loggedout");
    assert_eq!(cleared.max_age(), Some(time::Duration::ZERO));
}

#[test]
fn test_claims_with_huge_ttl_do_not_overflow() {
    let claims = Claims::new(1, u64::MAX);

    assert_eq!(claims.exp, usize::MAX);
    assert!(claims.iat < claims.exp);
}

// --- Expiry and revocation boundaries ---

#[tokio::test]
async fn test_recently_expired_token_is_rejected() {
    let ctx = test_context();
    let user = ctx.seed_user("JustLate", Role::User).await;

    // Inside jsonwebtoken's default leeway window.
    let token = create_token(user.id, now() - 3600, now() - 10);

    let mut parts = with_bearer(&token);
    let auth_user = AuthUser::from_request_parts(&mut parts, &ctx.state).await;
    assert_eq!(auth_user.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
    assert!(decode_token(&token, TEST_JWT_SECRET).is_err());
}

#[tokio::test]
async fn test_revoked_token_near_expiry_stays_rejected() {
    let ctx = test_context();
    let user = ctx.seed_user("Closing", Role::User).await;

    // Valid for two more seconds.
    let token = create_token(user.id, now() - 60, now() + 2);
    let claims = decode_token(&token, TEST_JWT_SECRET).unwrap();
    ctx.revocations.revoke(claims.jti, claims.exp).await;

    let mut parts = with_bearer(&token);
    let rejected = AuthUser::from_request_parts(&mut parts, &ctx.state).await;
    assert_eq!(rejected.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);

    // Once `exp` passes the revocation may be pruned, and the token must still fail.
    tokio::time::sleep(std::time::Duration::from_millis(3100)).await;
    let other = ctx.token_for(user.id);
    let other_claims = decode_token(&other, TEST_JWT_SECRET).unwrap();
    ctx.revocations.revoke(other_claims.jti, other_claims.exp).await;
    assert!(!ctx.revocations.is_revoked(claims.jti).await);

    let mut parts = with_bearer(&token);
    let rejected = AuthUser::from_request_parts(&mut parts, &ctx.state).await;
    assert_eq!(rejected.unwrap_err().status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_hash_round_trip() {
    let hash = hash_password(TEST_PASSWORD.to_string(), 4).await.unwrap();

    assert_ne!(hash, TEST_PASSWORD);
    assert!(verify_password(TEST_PASSWORD.to_string(), hash.clone()).await.unwrap());
    assert!(!verify_password("not-the-password".to_string(), hash).await.unwrap());
}
