use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use uuid::Uuid;

/// RevocationStore Contract
///
/// Remembers tokens that were explicitly ended by a logout before their natural expiry.
/// `protect` consults it for every authenticated request.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Marks the token identified by `jti` as unusable until `expires_at` (unix seconds).
    async fn revoke(&self, jti: Uuid, expires_at: usize);

    async fn is_revoked(&self, jti: Uuid) -> bool;
}

/// MemoryRevocationStore
///
/// Process-local blocklist. Entries are dropped once the token would have expired anyway,
/// so the map only ever holds tokens that could still be presented.
#[derive(Default)]
pub struct MemoryRevocationStore {
    revoked: Mutex<HashMap<Uuid, usize>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens currently blocked.
    pub async fn len(&self) -> usize {
        self.revoked.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

pub(crate) fn unix_now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as usize)
        .unwrap_or_default()
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, jti: Uuid, expires_at: usize) {
        let now = unix_now();
        let mut revoked = self.revoked.lock().await;
        revoked.retain(|_, exp| *exp >= now);
        if expires_at >= now {
            revoked.insert(jti, expires_at);
        }
    }

    async fn is_revoked(&self, jti: Uuid) -> bool {
        self.revoked.lock().await.contains_key(&jti)
    }
}

/// RevocationState
///
/// The concrete type used to share the revocation store across the application state.
pub type RevocationState = Arc<dyn RevocationStore>;
