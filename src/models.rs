use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Authorization ---

/// Role
///
/// Authorization level attached to every account. Route guards check membership of this
/// value in an explicit allowed set, so there is no implicit hierarchy between variants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// Lets `FromRow` decode the TEXT `role` column.
impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// --- Core Schema (Mapped to Database) ---

/// User
///
/// The canonical account record from the `users` table. Carries the password hash, so it is
/// never serialized; API responses go through [`UserProfile`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub pseudo: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub country: Option<String>,
    pub biography: Option<String>,
    pub avatar: Option<String>,
    pub ratio: f64,
    #[sqlx(try_from = "String")]
    pub role: Role,
    // Tokens issued before this instant are rejected by `protect`.
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload handed to the repository once the password has been hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub pseudo: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub country: Option<String>,
    pub biography: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
}

/// UserChanges
///
/// Partial update understood by the repository: `None` leaves a column untouched.
/// Setting `password_hash` also stamps `password_changed_at`.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub pseudo: Option<String>,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    pub biography: Option<String>,
    pub avatar: Option<String>,
    pub ratio: Option<f64>,
    pub role: Option<Role>,
}

// --- Response Schemas (Output) ---

/// UserProfile
///
/// Public JSON shape of a user, as returned by every user route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserProfile {
    #[ts(type = "number")]
    #[schema(example = 4)]
    pub id: i64,
    #[schema(example = "Juju")]
    pub pseudo: String,
    pub email: Option<String>,
    pub country: Option<String>,
    pub biography: Option<String>,
    pub avatar: Option<String>,
    pub ratio: f64,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            pseudo: user.pseudo,
            email: user.email,
            country: user.country,
            biography: user.biography,
            avatar: user.avatar,
            ratio: user.ratio,
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// AuthResponse
///
/// Returned by a successful login. The same token is also set as the `jwt` cookie.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

/// StatusResponse
///
/// Minimal acknowledgement body, e.g. for logout.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StatusResponse {
    #[schema(example = "success")]
    pub status: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// CreateUserRequest
///
/// Signup payload (POST /signup). The role is never taken from the client.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    #[schema(example = "Juju")]
    pub pseudo: String,
    #[schema(example = "efjzb565VHG")]
    pub password: String,
    pub email: Option<String>,
    pub country: Option<String>,
    pub biography: Option<String>,
    pub avatar: Option<String>,
}

/// UpdateProfileRequest
///
/// Self-service partial update (PUT /profile/). Carries no id: the target is always the
/// caller. Role and ratio are deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// UpdateUserRequest
///
/// Administrative partial update of any account (PUT /{id}).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pseudo: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// LoginRequest
///
/// Identifies the account by pseudo or email. When both are sent, pseudo wins.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub pseudo: Option<String>,
    pub email: Option<String>,
    pub password: String,
}
