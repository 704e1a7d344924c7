use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex as SessionLock;

use super::practice::{PracticeSession, SessionId};

/// How long an untouched session is kept.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 120;

pub type SharedSession = Arc<SessionLock<PracticeSession>>;

/// In-process store of live sessions.
///
/// Each session sits behind its own async mutex, so at most one request
/// (and therefore one generation call) runs per session at a time.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SharedSession>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<SessionId, SharedSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a session, dropping expired ones first.
    pub fn insert(&self, session: PracticeSession, now: DateTime<Utc>) -> SharedSession {
        let pruned = self.prune(now);
        if pruned > 0 {
            tracing::debug!(pruned, "expired practice sessions dropped");
        }
        let id = session.id();
        let shared = Arc::new(SessionLock::new(session));
        self.map().insert(id, Arc::clone(&shared));
        shared
    }

    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<SharedSession> {
        self.map().get(&id).cloned()
    }

    pub fn remove(&self, id: SessionId) -> Option<SharedSession> {
        self.map().remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    /// Drop sessions idle for longer than the TTL. Sessions currently
    /// locked by a request are kept.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let mut map = self.map();
        let before = map.len();
        map.retain(|_, shared| match shared.try_lock() {
            Ok(session) => session.last_activity() >= cutoff,
            Err(_) => true,
        });
        before - map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Subject, UserId};
    use quiz_core::time::fixed_now;

    fn session(at: DateTime<Utc>) -> PracticeSession {
        PracticeSession::new(
            SessionId::new(),
            UserId::new("kid").unwrap(),
            Subject::English,
            Vec::new(),
            3,
            at,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_and_get() {
        let registry = SessionRegistry::default();
        let s = session(fixed_now());
        let id = s.id();
        registry.insert(s, fixed_now());

        let shared = registry.get(id).unwrap();
        assert_eq!(shared.lock().await.id(), id);
        assert!(registry.get(SessionId::new()).is_none());
    }

    #[tokio::test]
    async fn prune_drops_idle_but_keeps_busy_sessions() {
        let registry = SessionRegistry::new(Duration::minutes(10));
        let old = registry.insert(session(fixed_now()), fixed_now());
        let busy = registry.insert(session(fixed_now()), fixed_now());
        let _held = busy.lock().await;

        let later = fixed_now() + Duration::minutes(11);
        registry.insert(session(later), later);

        assert_eq!(registry.len(), 2);
        let old_id = old.lock().await.id();
        assert!(registry.get(old_id).is_none());
    }
}
