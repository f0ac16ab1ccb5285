//! In-memory session store.

use crate::config::DEFAULT_SESSION_IDLE_TTL_SECS;
use crate::error::AuditError;
use crate::session::AnalysisSession;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
struct Entry {
    session: AnalysisSession,
    last_touched: Instant,
}

/// Sessions keyed by id. Nothing is persisted; a restart forgets them all.
///
/// The lock is only ever held inside the closures passed to
/// [`SessionStore::update`], which never await. Sessions untouched for
/// longer than the idle TTL are swept whenever a new one is created;
/// a session that is `Analyzing` is never swept.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS))
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::default(),
            idle_ttl,
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Create an `Idle` session and return its id.
    pub fn create(&self) -> Result<Uuid, AuditError> {
        let mut sessions = self.lock()?;
        let evicted = sweep(&mut sessions, self.idle_ttl);
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }

        let id = Uuid::new_v4();
        sessions.insert(
            id,
            Entry {
                session: AnalysisSession::new(),
                last_touched: Instant::now(),
            },
        );
        Ok(id)
    }

    /// Run `f` against one session under the lock.
    pub fn update<T>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut AnalysisSession) -> Result<T, AuditError>,
    ) -> Result<T, AuditError> {
        let mut sessions = self.lock()?;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| AuditError::SessionNotFound { id: id.to_string() })?;
        entry.last_touched = Instant::now();
        f(&mut entry.session)
    }

    /// Read-only variant of [`Self::update`]. Also counts as activity.
    pub fn read<T>(&self, id: &Uuid, f: impl FnOnce(&AnalysisSession) -> T) -> Result<T, AuditError> {
        let mut sessions = self.lock()?;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| AuditError::SessionNotFound { id: id.to_string() })?;
        entry.last_touched = Instant::now();
        Ok(f(&entry.session))
    }

    /// Discard a session. Returns `false` if it did not exist.
    pub fn remove(&self, id: &Uuid) -> Result<bool, AuditError> {
        Ok(self.lock()?.remove(id).is_some())
    }

    /// Drop every idle session now. Returns how many were dropped.
    pub fn evict_idle(&self) -> Result<usize, AuditError> {
        Ok(sweep(&mut *self.lock()?, self.idle_ttl))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Entry>>, AuditError> {
        self.inner
            .lock()
            .map_err(|_| AuditError::Internal("session store lock poisoned".to_string()))
    }
}

fn sweep(sessions: &mut HashMap<Uuid, Entry>, idle_ttl: Duration) -> usize {
    let before = sessions.len();
    sessions.retain(|_, e| e.session.is_analyzing() || e.last_touched.elapsed() < idle_ttl);
    before - sessions.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::UploadedDocument;
    use crate::session::SessionPhase;

    #[test]
    fn test_create_read_remove() {
        let store = SessionStore::new();
        let id = store.create().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(&id, |s| s.phase()).unwrap(), SessionPhase::Idle);

        assert!(store.remove(&id).unwrap());
        assert!(!store.remove(&id).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_session() {
        let store = SessionStore::new();
        let err = store.update(&Uuid::new_v4(), |s| s.remove_file()).unwrap_err();
        assert!(matches!(err, AuditError::SessionNotFound { .. }));
    }

    #[test]
    fn test_clones_share_sessions() {
        let store = SessionStore::new();
        let id = store.create().unwrap();
        let other = store.clone();
        assert!(matches!(
            other.update(&id, |s| s.begin_analysis()),
            Err(AuditError::NoFileSelected)
        ));
        assert_eq!(store.read(&id, |s| s.phase()).unwrap(), SessionPhase::Failed);
    }

    #[test]
    fn test_idle_sessions_evicted_on_create() {
        let store = SessionStore::with_idle_ttl(Duration::from_millis(20));
        let stale = store.create().unwrap();
        std::thread::sleep(Duration::from_millis(40));

        let fresh = store.create().unwrap();

        assert_eq!(store.len(), 1);
        assert!(matches!(
            store.read(&stale, |s| s.phase()),
            Err(AuditError::SessionNotFound { .. })
        ));
        assert_eq!(store.read(&fresh, |s| s.phase()).unwrap(), SessionPhase::Idle);
    }

    #[test]
    fn test_activity_keeps_session_alive() {
        let store = SessionStore::with_idle_ttl(Duration::from_millis(200));
        let id = store.create().unwrap();
        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(80));
            store.read(&id, |_| ()).unwrap();
        }
        assert_eq!(store.evict_idle().unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_analyzing_session_is_never_evicted() {
        let store = SessionStore::with_idle_ttl(Duration::ZERO);
        let busy = store.create().unwrap();
        store
            .update(&busy, |s| {
                s.select_file(UploadedDocument::new("pi.pdf", "application/pdf", vec![1u8]))?;
                s.begin_analysis().map(|_| ())
            })
            .unwrap();
        let idle = store.create().unwrap();

        assert_eq!(store.evict_idle().unwrap(), 1);
        assert!(store.read(&busy, |s| s.is_analyzing()).unwrap());
        assert!(store.read(&idle, |_| ()).is_err());
    }
}
