//! In-memory session store with idle expiry.
//!
//! Each session sits behind its own mutex. Submission holds the lock only to
//! enter and leave `Submitting`; the dispatcher call runs unlocked so reads,
//! cancels and rejected double submits stay responsive while it is in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::booking::sequencer::{BookingSession, FlowState, SubmitOutcome};
use crate::dispatch::Dispatcher;
use crate::error::{BookingError, SessionError};

/// Default upper bound on concurrently open sessions.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<BookingSession>>;

/// All live booking sessions, keyed by session id. Nothing is persisted.
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Register a session and return its handle.
    ///
    /// When the store is full, idle sessions are pruned first; if none can
    /// go, the new session is refused.
    pub async fn insert(&self, session: BookingSession) -> Result<SessionHandle, SessionError> {
        let id = session.id();
        let category = session.draft().service_category();
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            self.retain_active(&mut sessions, Utc::now());
            if sessions.len() >= self.max_sessions {
                warn!(limit = self.max_sessions, "Refusing new booking session, store is full");
                return Err(SessionError::CapacityReached {
                    limit: self.max_sessions,
                });
            }
        }
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(id, Arc::clone(&handle));
        info!(session_id = %id, category = ?category, "Booking session opened");
        Ok(handle)
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle longer than the timeout.
    pub async fn prune_idle(&self) -> usize {
        self.prune_idle_at(Utc::now()).await
    }

    /// Drop sessions idle at `now`. Sessions that are locked or mid-submission
    /// count as active.
    pub async fn prune_idle_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        self.retain_active(&mut sessions, now)
    }

    fn retain_active(&self, sessions: &mut HashMap<Uuid, SessionHandle>, now: DateTime<Utc>) -> usize {
        let before = sessions.len();
        sessions.retain(|id, handle| {
            let Ok(session) = handle.try_lock() else {
                return true;
            };
            if session.state() == FlowState::Submitting {
                return true;
            }
            let idle = (now - session.updated_at())
                .to_std()
                .map(|age| age > self.idle_timeout)
                .unwrap_or(false);
            if idle {
                debug!(session_id = %id, state = %session.state(), "Pruning idle booking session");
            }
            !idle
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            info!(pruned, remaining = sessions.len(), "Pruned idle booking sessions");
        }
        pruned
    }
}

/// Submit the session's draft through `dispatcher`.
///
/// A second call while the first is in flight fails with
/// `SubmissionInProgress` and never reaches the dispatcher. If the session is
/// cancelled while the dispatcher runs, its answer is dropped as `Stale`.
pub async fn submit(
    handle: &SessionHandle,
    dispatcher: &dyn Dispatcher,
) -> Result<SubmitOutcome, BookingError> {
    let (session_id, ticket) = {
        let mut session = handle.lock().await;
        let ticket = session.begin_submit()?;
        (session.id(), ticket)
    };

    info!(
        session_id = %session_id,
        generation = ticket.generation,
        category = %ticket.request.service_category(),
        dispatcher = dispatcher.name(),
        "Dispatching booking request"
    );
    let result = dispatcher.submit(&ticket.request).await;

    handle
        .lock()
        .await
        .complete_submit(ticket.generation, result)
}

/// Spawn a background task that prunes idle sessions every `interval`.
pub fn spawn_expiry_task(
    store: Arc<SessionStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            store.prune_idle().await;
        }
    })
}
