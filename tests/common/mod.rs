#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use users_api::{
    AppConfig, AppState, MemoryRepository, MemoryRevocationStore,
    auth::{hash_password, issue_token},
    error::RepositoryError,
    models::{NewUser, Role, User, UserChanges},
    repository::{RepoResult, Repository},
};

pub const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
pub const TEST_PASSWORD: &str = "password123";

/// Default config with a known secret and the cheapest bcrypt cost.
pub fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        bcrypt_cost: 4,
        ..AppConfig::default()
    }
}

/// Wraps `MemoryRepository` and counts the calls handlers make, so tests can prove a
/// handler never ran.
#[derive(Default)]
pub struct CountingRepository {
    inner: MemoryRepository,
    pub list_calls: AtomicUsize,
    pub find_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl CountingRepository {
    pub fn handler_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
            + self.find_calls.load(Ordering::SeqCst)
            + self.update_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for CountingRepository {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_users().await
    }
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_user(id).await
    }
    async fn find_user_by_pseudo(&self, pseudo: &str) -> RepoResult<Option<User>> {
        self.inner.find_user_by_pseudo(pseudo).await
    }
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        self.inner.create_user(user).await
    }
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_user(id, changes).await
    }
    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_user(id).await
    }
}

/// A repository whose every call fails, for the 500 path.
pub struct BrokenRepository;

#[async_trait]
impl Repository for BrokenRepository {
    async fn list_users(&self) -> RepoResult<Vec<User>> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn find_user(&self, _id: i64) -> RepoResult<Option<User>> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn find_user_by_pseudo(&self, _pseudo: &str) -> RepoResult<Option<User>> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn find_user_by_email(&self, _email: &str) -> RepoResult<Option<User>> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn create_user(&self, _user: NewUser) -> RepoResult<User> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn update_user(&self, _id: i64, _changes: UserChanges) -> RepoResult<Option<User>> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn delete_user(&self, _id: i64) -> RepoResult<bool> {
        Err(RepositoryError::Database(sqlx::Error::PoolTimedOut))
    }
}

/// Everything a test needs: the shared state plus typed handles on its collaborators.
pub struct TestContext {
    pub state: AppState,
    pub repo: Arc<CountingRepository>,
    pub revocations: Arc<MemoryRevocationStore>,
}

pub fn test_context() -> TestContext {
    let repo = Arc::new(CountingRepository::default());
    let revocations = Arc::new(MemoryRevocationStore::new());
    let state = AppState {
        repo: repo.clone(),
        revocations: revocations.clone(),
        config: test_config(),
    };
    TestContext {
        state,
        repo,
        revocations,
    }
}

impl TestContext {
    /// Inserts an account whose password is `TEST_PASSWORD`.
    pub async fn seed_user(&self, pseudo: &str, role: Role) -> User {
        let password_hash = hash_password(TEST_PASSWORD.to_string(), 4).await.unwrap();
        self.state
            .repo
            .create_user(NewUser {
                pseudo: pseudo.to_string(),
                password_hash,
                email: Some(format!("{}@example.com", pseudo.to_lowercase())),
                country: None,
                biography: None,
                avatar: None,
                role,
            })
            .await
            .unwrap()
    }

    pub fn token_for(&self, user_id: i64) -> String {
        issue_token(user_id, &self.state.config).unwrap()
    }

    pub fn reset_counters(&self) {
        self.repo.list_calls.store(0, Ordering::SeqCst);
        self.repo.find_calls.store(0, Ordering::SeqCst);
        self.repo.update_calls.store(0, Ordering::SeqCst);
        self.repo.delete_calls.store(0, Ordering::SeqCst);
    }
}
