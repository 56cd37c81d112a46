//! Engine state shared by every component.
//!
//! All cache mutation, debounce bookkeeping, and scope tracking goes through
//! one short-lived lock that is never held across an await, so ordering
//! between concurrent operations reduces to completion order of the
//! underlying port calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::{Notify, broadcast, oneshot, watch};
use tokio::time::Instant;

use huddle_common::{DomainValue, Notification, QueryIdentity, SyncError};

use crate::cache::{CacheStore, FetchState};
use crate::coalesce;
use crate::port::{AuthIdentity, RemoteAccessPort};
use crate::scope::{ScopeKind, ScopeState};

/// A fetch in flight for one identity.
///
/// `generation` is the token the eventual result must still match to be
/// written; forcing a refetch bumps it, which silently retires the older
/// call. Waiters attached while the fetch is pending all receive the result
/// of whichever generation completes as current.
pub(crate) struct InFlight {
    pub generation: u64,
    pub waiters: Vec<oneshot::Sender<Result<DomainValue, SyncError>>>,
}

#[derive(Default)]
pub(crate) struct EngineState {
    pub cache: CacheStore,
    pub in_flight: HashMap<QueryIdentity, InFlight>,
    pub next_generation: u64,
    /// Scheduled-invalidation table: pending debounce deadlines per identity.
    pub scheduled: HashMap<QueryIdentity, Instant>,
    pub scopes: HashMap<ScopeKind, ScopeState>,
    pub next_epoch: u64,
}

pub(crate) struct EngineInner<P: RemoteAccessPort> {
    pub port: Arc<P>,
    pub auth: AuthIdentity,
    pub state: Mutex<EngineState>,
    pub changed: watch::Sender<u64>,
    pub notifications: broadcast::Sender<Notification>,
    pub scheduler_wake: Arc<Notify>,
}

impl<P: RemoteAccessPort> Drop for EngineInner<P> {
    fn drop(&mut self) {
        // Wake the scheduler so it observes the dead weak handle and exits,
        // and stop any event pumps still attached to live scopes. notify_one
        // stores a permit, so the wake also reaches a scheduler that is not
        // parked in notified() yet.
        self.scheduler_wake.notify_one();
        if let Ok(state) = self.state.get_mut() {
            for scope_state in state.scopes.values() {
                if let ScopeState::Subscribed { pump, .. } = scope_state {
                    pump.abort();
                }
            }
        }
    }
}

/// The synchronization engine: cache store, fetch executor, invalidation
/// coalescer, mutation dispatcher, and subscription lifecycle manager
/// behind one handle.
///
/// Cheap to clone; all clones share state. Construction spawns the
/// debounce scheduler loop, so an engine must be created inside a tokio
/// runtime.
pub struct SyncEngine<P: RemoteAccessPort> {
    pub(crate) inner: Arc<EngineInner<P>>,
}

impl<P: RemoteAccessPort> Clone for SyncEngine<P> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

/// Weak engine handle held by background tasks, so the tasks themselves do
/// not keep the engine alive.
pub(crate) struct WeakEngine<P: RemoteAccessPort> {
    inner: Weak<EngineInner<P>>,
}

impl<P: RemoteAccessPort> Clone for WeakEngine<P> {
    fn clone(&self) -> Self {
        Self { inner: Weak::clone(&self.inner) }
    }
}

impl<P: RemoteAccessPort> WeakEngine<P> {
    pub fn upgrade(&self) -> Option<SyncEngine<P>> {
        self.inner.upgrade().map(|inner| SyncEngine { inner })
    }
}

/// Read-only snapshot of one cache entry, as exposed to UI bindings.
#[derive(Debug, Clone, Default)]
pub struct QuerySnapshot {
    pub data: Option<DomainValue>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<P: RemoteAccessPort> SyncEngine<P> {
    pub fn new(port: Arc<P>, auth: AuthIdentity) -> Self {
        let (changed, _) = watch::channel(0u64);
        let (notifications, _) = broadcast::channel(64);
        let scheduler_wake = Arc::new(Notify::new());
        let inner = Arc::new(EngineInner {
            port,
            auth,
            state: Mutex::new(EngineState::default()),
            changed,
            notifications,
            scheduler_wake: Arc::clone(&scheduler_wake),
        });
        let engine = Self { inner };
        tokio::spawn(coalesce::scheduler_loop(engine.downgrade(), scheduler_wake));
        engine
    }

    pub(crate) fn downgrade(&self) -> WeakEngine<P> {
        WeakEngine { inner: Arc::downgrade(&self.inner) }
    }

    pub fn port(&self) -> Arc<P> {
        Arc::clone(&self.inner.port)
    }

    pub fn auth(&self) -> &AuthIdentity {
        &self.inner.auth
    }

    /// Current view of one cache entry. Absent identities read as an empty
    /// snapshot rather than an error.
    pub fn snapshot(&self, id: &QueryIdentity) -> QuerySnapshot {
        let state = self.inner.state.lock().unwrap();
        match state.cache.entry(id) {
            None => QuerySnapshot::default(),
            Some(entry) => QuerySnapshot {
                data: entry.data.clone(),
                is_loading: entry.state == FetchState::Loading,
                error: entry.error.clone(),
            },
        }
    }

    /// Version channel bumped after every committed cache change; UI
    /// bindings watch this and re-read snapshots.
    pub fn changed(&self) -> watch::Receiver<u64> {
        self.inner.changed.subscribe()
    }

    /// Stream of user-facing success/failure notifications.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifications.subscribe()
    }

    pub(crate) fn notify_changed(&self) {
        self.inner.changed.send_modify(|version| *version += 1);
    }

    pub(crate) fn notify(&self, notification: Notification) {
        // Nobody listening is fine.
        let _ = self.inner.notifications.send(notification);
    }
}
