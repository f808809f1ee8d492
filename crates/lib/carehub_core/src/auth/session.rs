//! Session tracking, one session per identity.
//!
//! A login replaces any previous session for the same identity. Sessions are
//! informational: request authorization never requires one. The in-memory
//! store is process-local and lost on restart; a multi-instance deployment
//! needs a shared [`SessionStore`] implementation instead.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::auth::TokenPair;

/// Absolute session lifetime from creation.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

/// A tracked login session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub identity_id: Uuid,
    #[serde(skip)]
    pub tokens: TokenPair,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Storage for sessions, keyed by identity ID.
///
/// Operations on different identities must not block each other; operations
/// on the same identity are serialised with last-writer-wins semantics.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session, silently replacing any existing one.
    async fn create(&self, identity_id: Uuid, tokens: TokenPair) -> Session;

    /// Replace the token pair and bump last activity. `None` if no live session.
    async fn update(&self, identity_id: Uuid, tokens: TokenPair) -> Option<Session>;

    /// Fetch the live session for an identity.
    async fn get(&self, identity_id: Uuid) -> Option<Session>;

    /// Remove the session. Idempotent.
    async fn remove(&self, identity_id: Uuid);

    /// Remove every expired session, returning how many were removed.
    async fn sweep(&self) -> usize;

    /// Number of tracked sessions, including expired ones not yet swept.
    async fn len(&self) -> usize;
}

/// Process-local session store backed by a sharded concurrent map.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<Uuid, Session>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::hours(SESSION_TTL_HOURS),
            clock,
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, identity_id: Uuid, tokens: TokenPair) -> Session {
        let now = self.clock.now();
        let session = Session {
            identity_id,
            tokens,
            created_at: now,
            last_activity: now,
            expires_at: now + self.ttl,
        };
        if self.sessions.insert(identity_id, session.clone()).is_some() {
            debug!(identity_id = %identity_id, "replaced existing session");
        }
        session
    }

    async fn update(&self, identity_id: Uuid, tokens: TokenPair) -> Option<Session> {
        let now = self.clock.now();
        let mut entry = self.sessions.get_mut(&identity_id)?;
        if entry.is_expired(now) {
            drop(entry);
            self.sessions
                .remove_if(&identity_id, |_, s| s.is_expired(now));
            return None;
        }
        entry.tokens = tokens;
        entry.last_activity = now;
        Some(entry.value().clone())
    }

    async fn get(&self, identity_id: Uuid) -> Option<Session> {
        let now = self.clock.now();
        self.sessions
            .get(&identity_id)
            .filter(|s| !s.is_expired(now))
            .map(|s| s.value().clone())
    }

    async fn remove(&self, identity_id: Uuid) {
        self.sessions.remove(&identity_id);
    }

    async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now));
        before.saturating_sub(self.sessions.len())
    }

    async fn len(&self) -> usize {
        self.sessions.len()
    }
}

/// Run [`SessionStore::sweep`] every `every` until `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    every: std::time::Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("session sweeper stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let removed = store.sweep().await;
                    if removed > 0 {
                        info!(removed, "swept expired sessions");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn pair(tag: &str) -> TokenPair {
        TokenPair {
            access_token: format!("access-{tag}"),
            refresh_token: format!("refresh-{tag}"),
        }
    }

    fn store(clock: &ManualClock) -> InMemorySessionStore {
        InMemorySessionStore::new(Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn create_then_get() {
        let clock = ManualClock::default();
        let store = store(&clock);
        let id = Uuid::new_v4();
        let created = store.create(id, pair("a")).await;
        assert_eq!(created.expires_at - created.created_at, Duration::hours(24));
        assert_eq!(store.get(id).await, Some(created));
    }

    #[tokio::test]
    async fn second_login_replaces_session() {
        let clock = ManualClock::default();
        let store = store(&clock);
        let id = Uuid::new_v4();
        store.create(id, pair("a")).await;
        clock.advance(Duration::minutes(5));
        store.create(id, pair("b")).await;
        let session = store.get(id).await.unwrap();
        assert_eq!(session.tokens, pair("b"));
        assert_eq!(session.created_at, clock.now());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn update_requires_existing_session() {
        let clock = ManualClock::default();
        let store = store(&clock);
        let id = Uuid::new_v4();
        assert!(store.update(id, pair("x")).await.is_none());
        assert!(store.get(id).await.is_none());

        let created = store.create(id, pair("a")).await;
        clock.advance(Duration::minutes(10));
        let updated = store.update(id, pair("b")).await.unwrap();
        assert_eq!(updated.tokens, pair("b"));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.expires_at, created.expires_at);
        assert_eq!(updated.last_activity, clock.now());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let clock = ManualClock::default();
        let store = store(&clock);
        let id = Uuid::new_v4();
        store.create(id, pair("a")).await;
        store.remove(id).await;
        store.remove(id).await;
        assert!(store.get(id).await.is_none());
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let clock = ManualClock::default();
        let store = store(&clock);
        let old = Uuid::new_v4();
        let fresh = Uuid::new_v4();
        store.create(old, pair("old")).await;
        clock.advance(Duration::hours(12));
        store.create(fresh, pair("fresh")).await;

        clock.advance(Duration::hours(12));
        assert_eq!(store.sweep().await, 1);
        assert!(store.get(old).await.is_none());
        assert!(store.get(fresh).await.is_some());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn expired_session_cannot_be_updated() {
        let clock = ManualClock::default();
        let store = store(&clock);
        let id = Uuid::new_v4();
        store.create(id, pair("a")).await;
        clock.advance(Duration::hours(25));
        assert!(store.update(id, pair("b")).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn concurrent_logins_for_different_identities() {
        let clock = ManualClock::default();
        let store = Arc::new(store(&clock));
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = Uuid::new_v4();
                store.create(id, pair(&i.to_string())).await;
                store.sweep().await;
                id
            }));
        }
        for handle in handles {
            let id = handle.await.unwrap();
            assert!(store.get(id).await.is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_interval_and_stops() {
        let clock = ManualClock::default();
        let store: Arc<dyn SessionStore> = Arc::new(store(&clock));
        let id = Uuid::new_v4();
        store.create(id, pair("a")).await;
        clock.advance(Duration::hours(25));

        let cancel = CancellationToken::new();
        let handle = spawn_sweeper(
            store.clone(),
            std::time::Duration::from_secs(3600),
            cancel.clone(),
        );
        tokio::time::sleep(std::time::Duration::from_secs(3601)).await;
        assert_eq!(store.len().await, 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
