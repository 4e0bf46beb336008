use axum::{
    Json,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    auth::{cleared_session_cookie, decode_token, extract_token, issue_token, session_cookie, verify_password},
    error::AppError,
    models::{AuthResponse, LoginRequest, StatusResponse},
};

const BAD_CREDENTIALS: &str = "Incorrect pseudo, email or password";

/// login
///
/// [Public Route] Exchanges a pseudo (or email) and password for a session token. The token
/// is returned in the body and also set as an HttpOnly `jwt` cookie.
///
/// Unknown accounts and wrong passwords produce the same 400, so the response does not
/// reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/api/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing or incorrect credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let pseudo = payload.pseudo.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let email = payload.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    if payload.password.is_empty() || (pseudo.is_none() && email.is_none()) {
        return Err(AppError::invalid_input(
            "Please provide a pseudo or an email, and a password",
        ));
    }

    let user = match (pseudo, email) {
        (Some(pseudo), _) => state.repo.find_user_by_pseudo(pseudo).await?,
        (None, Some(email)) => state.repo.find_user_by_email(&email.to_lowercase()).await?,
        (None, None) => None,
    };

    let Some(user) = user else {
        tracing::debug!("login attempt for an unknown account");
        return Err(AppError::invalid_input(BAD_CREDENTIALS));
    };

    if !verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::warn!(user_id = user.id, "login attempt with a wrong password");
        return Err(AppError::invalid_input(BAD_CREDENTIALS));
    }

    let token = issue_token(user.id, &state.config)?;
    let jar = CookieJar::new().add(session_cookie(&token, &state.config));

    tracing::info!(user_id = user.id, "user logged in");
    let body = AuthResponse {
        token,
        user: user.into(),
    };
    Ok((jar, Json(body)).into_response())
}

/// logout
///
/// [Public Route] Ends the caller's session. The `jwt` cookie is always cleared; when a
/// still-valid token is presented (header or cookie), it is revoked until its expiry so it
/// cannot be replayed.
#[utoipa::path(
    post,
    path = "/api/users/logout",
    tag = "users",
    responses((status = 200, description = "Logged out", body = StatusResponse))
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_token(&headers) {
        if let Ok(claims) = decode_token(&token, &state.config.jwt_secret) {
            state.revocations.revoke(claims.jti, claims.exp).await;
            tracing::info!(user_id = claims.sub, "user logged out");
        }
    }

    let jar = CookieJar::new().add(cleared_session_cookie(&state.config));
    (jar, Json(StatusResponse::success())).into_response()
}
