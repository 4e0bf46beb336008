use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::Role,
    repository::RepositoryState,
    sessions::{RevocationState, unix_now},
};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "jwt";

/// Claims
///
/// Payload of every session token. Signed with the server secret and validated on each
/// authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the id of the user the token was issued to.
    pub sub: i64,
    /// Token id, the key used by logout to revoke this token.
    pub jti: Uuid,
    /// Issued at (unix seconds). Compared against the user's last password change.
    pub iat: usize,
    /// Expiration (unix seconds).
    pub exp: usize,
}

impl Claims {
    pub fn new(user_id: i64, ttl_secs: u64) -> Self {
        let now = unix_now();
        Self {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now,
            exp: now.saturating_add(usize::try_from(ttl_secs).unwrap_or(usize::MAX)),
        }
    }
}

/// Signs a fresh session token for `user_id`.
pub fn issue_token(user_id: i64, config: &AppConfig) -> Result<String, AppError> {
    let claims = Claims::new(user_id, config.jwt_expires_in);
    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(AppError::server)
}

/// Verifies the signature and expiry of `token`.
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::default();
    validation.validate_exp = true;
    // Revocations are pruned at `exp`, so an expired token must never validate.
    validation.leeway = 0;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => {
                AppError::unauthenticated("Your token has expired. Please log in again.")
            }
            _ => AppError::unauthenticated("Invalid token. Please log in again."),
        })
}

/// Finds the session token: a `Bearer` Authorization header first, the `jwt` cookie second.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().to_string())
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

fn base_cookie(value: String, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies())
        .build()
}

/// Session cookie carrying a freshly issued token, living as long as the token.
pub fn session_cookie(token: &str, config: &AppConfig) -> Cookie<'static> {
    let mut cookie = base_cookie(token.to_string(), config);
    let max_age = i64::try_from(config.jwt_expires_in).unwrap_or(i64::MAX);
    cookie.set_max_age(time::Duration::seconds(max_age));
    cookie
}

/// Overwrites the session cookie and expires it immediately.
pub fn cleared_session_cookie(config: &AppConfig) -> Cookie<'static> {
    let mut cookie = base_cookie("loggedout".to_string(), config);
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

/// Hashes a password on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(AppError::server)?
        .map_err(AppError::server)
}

/// Checks a password against a stored bcrypt hash on the blocking pool.
pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(AppError::server)?
        .map_err(AppError::server)
}

/// AuthUser
///
/// The resolved identity of an authenticated request: what `protect` attaches to the
/// request and what `restrictTo` and the handlers read back.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

/// AuthUser Extractor Implementation
///
/// Makes `AuthUser` usable as a handler argument. When the `protect` guard already ran,
/// the identity it stored in the request extensions is reused as is. Otherwise the full
/// resolution happens here:
/// 1. Token extraction (Bearer header, then `jwt` cookie).
/// 2. Signature and expiry validation.
/// 3. Revocation check (tokens ended by logout).
/// 4. DB lookup: the user must still exist, and must not have changed password after the
///    token was issued.
///
/// Rejection: `AppError::Unauthenticated` (401) on any failure.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    RevocationState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let revocations = RevocationState::from_ref(state);
        let config = AppConfig::from_ref(state);

        let token = extract_token(&parts.headers).ok_or_else(|| {
            AppError::unauthenticated("You are not logged in. Please log in to get access.")
        })?;

        let claims = decode_token(&token, &config.jwt_secret)?;

        if revocations.is_revoked(claims.jti).await {
            tracing::debug!(user_id = claims.sub, "rejected a revoked token");
            return Err(AppError::unauthenticated(
                "This session has ended. Please log in again.",
            ));
        }

        let user = repo.find_user(claims.sub).await?.ok_or_else(|| {
            AppError::unauthenticated("The user belonging to this token no longer exists.")
        })?;

        if let Some(changed_at) = user.password_changed_at {
            if changed_at.timestamp() > claims.iat as i64 {
                return Err(AppError::unauthenticated(
                    "User recently changed password. Please log in again.",
                ));
            }
        }

        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}
