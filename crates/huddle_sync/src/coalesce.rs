//! Invalidation coalescer.
//!
//! Change events land in an explicit scheduled-invalidation table keyed by
//! [`QueryIdentity`] with a trailing-edge deadline; a single scheduler loop
//! sleeps until the earliest deadline and fires refetches for everything
//! due. One identity's burst of events collapses into one refetch timed
//! from the last event; distinct identities debounce independently. Chat
//! inserts bypass the table entirely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

use huddle_common::{ChangeEvent, QueryIdentity};

use crate::cache::FetchState;
use crate::engine::{SyncEngine, WeakEngine};
use crate::port::RemoteAccessPort;
use crate::registry;
use crate::scope::Scope;

/// Width of the trailing-edge debounce window.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

impl<P: RemoteAccessPort> SyncEngine<P> {
    /// Feed one remote change event into the coalescer.
    ///
    /// Called from a scope's event pump; `scope` is the scope whose
    /// subscription delivered the event.
    pub(crate) fn handle_change_event(&self, scope: &Scope, event: ChangeEvent) {
        if registry::is_chat_insert(&event) {
            // Only the project scope watches chat.
            let Scope::Project { project_id } = scope else { return };
            let id = QueryIdentity::ChatLog { project_id: project_id.clone() };
            let message = registry::chat_fast_path(&event);
            let (appended, needs_fetch) = {
                let mut state = self.inner.state.lock().unwrap();
                let ready = state
                    .cache
                    .entry(&id)
                    .is_some_and(|entry| entry.state == FetchState::Ready);
                match message {
                    // A ready entry and a decodable row: append in place.
                    Some(message) if ready => {
                        (state.cache.append_chat_message(&id, message), false)
                    }
                    // Missing or undecodable row, or no data yet: the event
                    // still must be delivered without a debounce delay.
                    _ => (false, state.cache.is_referenced(&id)),
                }
            };
            if appended {
                trace!("[huddle_sync] appended chat message in place for {id}");
                self.notify_changed();
            } else if needs_fetch {
                // Chat delivery is immediate, never debounced: without an
                // appendable row, a referenced entry refetches right away.
                let engine = self.clone();
                tokio::spawn(async move {
                    let _ = engine.run(&id, true).await;
                });
            }
            return;
        }

        let ids = registry::affected_identities(&event, scope);
        if ids.is_empty() {
            trace!("[huddle_sync] change event on {:?} is a no-op for {scope:?}", event.table);
            return;
        }

        let deadline = Instant::now() + DEBOUNCE_WINDOW;
        {
            let mut state = self.inner.state.lock().unwrap();
            for id in ids {
                trace!("[huddle_sync] (re)scheduling invalidation of {id}");
                state.scheduled.insert(id, deadline);
            }
        }
        self.inner.scheduler_wake.notify_one();
    }
}

/// The scheduler loop driving the scheduled-invalidation table.
///
/// Holds only a weak engine handle: when the last engine clone drops, the
/// drop impl pokes the wake handle and the loop exits.
pub(crate) async fn scheduler_loop<P: RemoteAccessPort>(weak: WeakEngine<P>, wake: Arc<Notify>) {
    loop {
        let next_deadline = {
            let Some(engine) = weak.upgrade() else { return };
            let state = engine.inner.state.lock().unwrap();
            state.scheduled.values().min().copied()
        };

        match next_deadline {
            None => wake.notified().await,
            Some(deadline) => {
                tokio::select! {
                    _ = sleep_until(deadline) => {
                        let Some(engine) = weak.upgrade() else { return };
                        fire_due(&engine);
                    }
                    // A new or rescheduled deadline may now be the earliest;
                    // recompute.
                    _ = wake.notified() => {}
                }
            }
        }
    }
}

fn fire_due<P: RemoteAccessPort>(engine: &SyncEngine<P>) {
    let due: Vec<QueryIdentity> = {
        let mut state = engine.inner.state.lock().unwrap();
        let now = Instant::now();
        let due: Vec<_> = state
            .scheduled
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &due {
            state.scheduled.remove(id);
            state.cache.invalidate(id);
        }
        due
    };

    for id in due {
        debug!("[huddle_sync] debounce window elapsed, refetching {id}");
        let engine = engine.clone();
        tokio::spawn(async move {
            let _ = engine.run(&id, true).await;
        });
    }
    if engine.inner.state.lock().unwrap().scheduled.is_empty() {
        trace!("[huddle_sync] scheduled-invalidation table drained");
    }
}
