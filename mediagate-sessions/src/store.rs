//! Concurrent session table.
//!
//! Each session sits behind its own mutex. A request leases the session
//! for its whole duration, so ratchet steps for one session happen one
//! request at a time while different sessions proceed in parallel.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use chrono::Duration;
use mediagate_protocol::wire::SALT_BYTES;
use mediagate_protocol::{HashAlgorithm, RatchetSeeds};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::clock::{Clock, SystemClock};
use crate::error::SessionError;
use crate::session::Session;
use crate::types::SessionId;

/// Sessions live for one day after `/key`.
pub const SESSION_LIFETIME_SECS: i64 = 24 * 60 * 60;

type Slot = Arc<Mutex<Session>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Slot>>,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
}

/// Exclusive access to one live session.
#[derive(Debug)]
pub struct SessionLease {
    guard: OwnedMutexGuard<Session>,
}

impl Deref for SessionLease {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.guard
    }
}

impl DerefMut for SessionLease {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.guard
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            lifetime: Duration::seconds(SESSION_LIFETIME_SECS),
        }
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Register a fresh session and return its id.
    pub async fn create(
        &self,
        seeds: RatchetSeeds,
        salt: [u8; SALT_BYTES],
        hash: HashAlgorithm,
    ) -> SessionId {
        let id = SessionId::generate();
        let session = Session::new(id.clone(), seeds, salt, hash, self.clock.now(), self.lifetime);
        let expires_at = session.expires_at();

        self.sessions
            .write()
            .await
            .insert(id.as_str().to_string(), Arc::new(Mutex::new(session)));

        tracing::debug!(session_id = %id, %hash, %expires_at, "session created");
        id
    }

    /// Lock a session for the duration of one request. Expiry is checked
    /// after the lock is held; an expired session is removed.
    pub async fn lease(&self, id: &str) -> Result<SessionLease, SessionError> {
        let slot = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(SessionError::NotFound)?;

        let guard = slot.clone().lock_owned().await;
        if guard.is_expired_at(self.clock.now()) {
            drop(guard);
            self.evict(id, &slot).await;
            tracing::info!(session_id = %id, "session expired");
            return Err(SessionError::Expired);
        }

        Ok(SessionLease { guard })
    }

    /// Remove `id` only if it still maps to `slot`.
    async fn evict(&self, id: &str, slot: &Slot) {
        let mut sessions = self.sessions.write().await;
        if sessions.get(id).is_some_and(|current| Arc::ptr_eq(current, slot)) {
            sessions.remove(id);
        }
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop every expired session that is not currently leased. Returns
    /// the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| match slot.try_lock() {
            Ok(session) => !session.is_expired_at(now),
            Err(_) => true,
        });
        before - sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
