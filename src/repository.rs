use crate::error::RepositoryError;
use crate::models::{NewUser, User, UserChanges};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations on user accounts. Handlers
/// and the `protect` guard only ever see this trait, so the Postgres store and the
/// in-memory store are interchangeable.
///
/// **Send + Sync + async_trait** are required to share `Arc<dyn Repository>` across Axum's
/// asynchronous task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Reads ---
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_user_by_pseudo(&self, pseudo: &str) -> RepoResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    // --- Writes ---
    // Fails with `RepositoryError::Conflict` when pseudo or email is already used.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    // Partial update. Returns `None` when no user has this id.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>>;
    // Returns true if a row was removed.
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, pseudo, password_hash, email, country, biography, avatar, \
     ratio, role, password_changed_at, created_at, updated_at";

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations under `./migrations`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps unique-constraint violations onto the column that caused them.
fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(constraint) if constraint.contains("email") => "email",
                _ => "pseudo",
            };
            return RepositoryError::Conflict(field);
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id");
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_pseudo(&self, pseudo: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE pseudo = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(pseudo)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// Inserts a new account. `id`, `ratio` and the timestamps come from column defaults.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let query = format!(
            "INSERT INTO users (pseudo, password_hash, email, country, biography, avatar, role) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(user.pseudo)
            .bind(user.password_hash)
            .bind(user.email)
            .bind(user.country)
            .bind(user.biography)
            .bind(user.avatar)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)
    }

    /// update_user
    ///
    /// Uses `COALESCE` so that only the columns whose field in `changes` is `Some` are written.
    /// A new password hash also moves `password_changed_at` one second into the past, so a
    /// token issued right after the change is still accepted.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let query = format!(
            "UPDATE users \
             SET pseudo = COALESCE($2, pseudo), \
                 password_hash = COALESCE($3, password_hash), \
                 password_changed_at = CASE WHEN $3::text IS NULL THEN password_changed_at \
                                            ELSE NOW() - INTERVAL '1 second' END, \
                 email = COALESCE($4, email), \
                 country = COALESCE($5, country), \
                 biography = COALESCE($6, biography), \
                 avatar = COALESCE($7, avatar), \
                 ratio = COALESCE($8, ratio), \
                 role = COALESCE($9, role), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(changes.pseudo)
            .bind(changes.password_hash)
            .bind(changes.email)
            .bind(changes.country)
            .bind(changes.biography)
            .bind(changes.avatar)
            .bind(changes.ratio)
            .bind(changes.role.map(|role| role.as_str()))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// MemoryRepository
///
/// An in-process implementation of `Repository`, used by the test suites and handy for
/// running the API without a database. Enforces the same uniqueness rules as the
/// Postgres schema.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<MemoryTables>,
}

#[derive(Default)]
struct MemoryTables {
    users: BTreeMap<i64, User>,
    last_id: i64,
}

impl MemoryTables {
    fn ensure_unique(
        &self,
        pseudo: Option<&str>,
        email: Option<&str>,
        except: Option<i64>,
    ) -> RepoResult<()> {
        for user in self.users.values().filter(|u| Some(u.id) != except) {
            if pseudo.is_some_and(|p| p == user.pseudo) {
                return Err(RepositoryError::Conflict("pseudo"));
            }
            if email.is_some() && email == user.email.as_deref() {
                return Err(RepositoryError::Conflict("email"));
            }
        }
        Ok(())
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Ok(self.inner.read().await.users.values().cloned().collect())
    }

    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_pseudo(&self, pseudo: &str) -> RepoResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables.users.values().find(|u| u.pseudo == pseudo).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.inner.write().await;
        tables.ensure_unique(Some(&user.pseudo), user.email.as_deref(), None)?;

        tables.last_id += 1;
        let now = Utc::now();
        let created = User {
            id: tables.last_id,
            pseudo: user.pseudo,
            password_hash: user.password_hash,
            email: user.email,
            country: user.country,
            biography: user.biography,
            avatar: user.avatar,
            ratio: 0.0,
            role: user.role,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut tables = self.inner.write().await;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        tables.ensure_unique(changes.pseudo.as_deref(), changes.email.as_deref(), Some(id))?;

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        let now = Utc::now();
        if let Some(pseudo) = changes.pseudo {
            user.pseudo = pseudo;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
            user.password_changed_at = Some(now - Duration::seconds(1));
        }
        if let Some(email) = changes.email {
            user.email = Some(email);
        }
        if let Some(country) = changes.country {
            user.country = Some(country);
        }
        if let Some(biography) = changes.biography {
            user.biography = Some(biography);
        }
        if let Some(avatar) = changes.avatar {
            user.avatar = Some(avatar);
        }
        if let Some(ratio) = changes.ratio {
            user.ratio = ratio;
        }
        if let Some(role) = changes.role {
            user.role = role;
        }
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        Ok(self.inner.write().await.users.remove(&id).is_some())
    }
}
