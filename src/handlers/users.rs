use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use super::{non_blank, validate_email, validate_password, validate_pseudo};
use crate::{
    AppState,
    auth::{AuthUser, hash_password},
    error::AppError,
    models::{
        CreateUserRequest, NewUser, Role, UpdateProfileRequest, UpdateUserRequest, UserChanges,
        UserProfile,
    },
};

/// Path ids that are not integers cannot name a user, so they resolve to 404.
fn parse_user_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found("No user found with that ID"))
}

/// find_all_users
///
/// [Authenticated Route] Lists every account.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users", body = [UserProfile]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn find_all_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let users = state.repo.list_users().await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// create_user
///
/// [Public Route] Signup. The password is hashed before it reaches the repository and the
/// new account always starts with the `user` role.
#[utoipa::path(
    post,
    path = "/api/users/signup",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = UserProfile),
        (status = 400, description = "Invalid input or pseudo/email already taken")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let pseudo = validate_pseudo(&payload.pseudo)?;
    validate_password(&payload.password)?;
    let email = non_blank(payload.email)
        .map(|email| validate_email(&email))
        .transpose()?;

    let password_hash = hash_password(payload.password, state.config.bcrypt_cost).await?;

    let user = state
        .repo
        .create_user(NewUser {
            pseudo,
            password_hash,
            email,
            country: non_blank(payload.country),
            biography: non_blank(payload.biography),
            avatar: non_blank(payload.avatar),
            role: Role::User,
        })
        .await?;

    tracing::info!(user_id = user.id, pseudo = %user.pseudo, "user signed up");
    Ok(Json(user.into()))
}

/// update_profile
///
/// [Authenticated Route] Updates the caller's own account. The target id comes only from
/// the `AuthUser` resolved by `protect`; the body cannot name another user.
///
/// Changing the password records the change time, which invalidates tokens issued before it.
#[utoipa::path(
    put,
    path = "/api/users/profile/",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let pseudo = payload
        .pseudo
        .as_deref()
        .map(validate_pseudo)
        .transpose()?;
    let email = non_blank(payload.email)
        .map(|email| validate_email(&email))
        .transpose()?;
    let password_hash = match payload.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password(password, state.config.bcrypt_cost).await?)
        }
        None => None,
    };
    let password_changed = password_hash.is_some();

    let changes = UserChanges {
        pseudo,
        password_hash,
        email,
        country: non_blank(payload.country),
        biography: non_blank(payload.biography),
        avatar: non_blank(payload.avatar),
        ..UserChanges::default()
    };

    let user = state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("No user found with that ID"))?;

    tracing::info!(user_id = id, password_changed, "profile updated");
    Ok(Json(user.into()))
}

/// delete_profile
///
/// [Authenticated Route] Deletes the caller's own account.
#[utoipa::path(
    delete,
    path = "/api/users/profile/",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn delete_profile(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    if state.repo.delete_user(id).await? {
        tracing::info!(user_id = id, "profile deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("No user found with that ID"))
    }
}

/// find_user_by_pk
///
/// [Authenticated Route] Fetches one account by id.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn find_user_by_pk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    let id = parse_user_id(&id)?;
    let user = state
        .repo
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("No user found with that ID"))?;
    Ok(Json(user.into()))
}

/// Only a superadmin may grant the superadmin role or take it away, so the admin route
/// cannot be used to reach the superadmin-only routes.
async fn guard_superadmin_role(
    state: &AppState,
    caller: &AuthUser,
    target_id: i64,
    new_role: Role,
) -> Result<(), AppError> {
    if caller.role == Role::Superadmin {
        return Ok(());
    }
    let touches_superadmin = new_role == Role::Superadmin
        || state
            .repo
            .find_user(target_id)
            .await?
            .is_some_and(|target| target.role == Role::Superadmin && new_role != Role::Superadmin);
    if touches_superadmin {
        tracing::warn!(
            user_id = caller.id,
            target_id,
            role = %new_role,
            "refused a superadmin role change"
        );
        return Err(AppError::forbidden(
            "Only a superadmin can grant or revoke the superadmin role",
        ));
    }
    Ok(())
}

/// update_user
///
/// [Admin Route] Updates any account, including its role and ratio. Reached only through
/// `protect` followed by `restrictTo(admin)`. Granting or revoking `superadmin` is refused
/// unless the caller is a superadmin.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = UserProfile),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin role required, or a superadmin role change by a non-superadmin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    caller: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserProfile>, AppError> {
    let id = parse_user_id(&id)?;
    if let Some(new_role) = payload.role {
        guard_superadmin_role(&state, &caller, id, new_role).await?;
    }
    let pseudo = payload
        .pseudo
        .as_deref()
        .map(validate_pseudo)
        .transpose()?;
    let email = non_blank(payload.email)
        .map(|email| validate_email(&email))
        .transpose()?;
    if payload.ratio.is_some_and(|ratio| !ratio.is_finite()) {
        return Err(AppError::invalid_input("A ratio must be a finite number"));
    }

    let changes = UserChanges {
        pseudo,
        email,
        country: non_blank(payload.country),
        biography: non_blank(payload.biography),
        avatar: non_blank(payload.avatar),
        ratio: payload.ratio,
        role: payload.role,
        ..UserChanges::default()
    };

    let user = state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("No user found with that ID"))?;

    tracing::info!(user_id = id, role = %user.role, "user updated by an admin");
    Ok(Json(user.into()))
}

/// delete_user
///
/// [Superadmin Route] Deletes any account. Reached only through `protect` followed by
/// `restrictTo(superadmin)`.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Superadmin role required"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = parse_user_id(&id)?;
    if state.repo.delete_user(id).await? {
        tracing::info!(user_id = id, "user deleted by a superadmin");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("No user found with that ID"))
    }
}
