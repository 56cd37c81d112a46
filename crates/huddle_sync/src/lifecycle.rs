//! Subscription lifecycle manager.
//!
//! Keyed by [`ScopeKind`], each scope walks `unmounted → subscribing →
//! subscribed → unmounted`. Activation closes any prior descriptor for the
//! same scope before subscribing; deactivation while a subscribe call is
//! still in flight leaves a stale epoch behind, and the confirmation is
//! unsubscribed on arrival instead of completing.

use tokio::sync::mpsc;
use tracing::{debug, info};

use huddle_common::{ChangeEvent, SyncError};

use crate::engine::{SyncEngine, WeakEngine};
use crate::port::{ChangeSubscription, RemoteAccessPort};
use crate::scope::{Scope, ScopeKind, ScopeState};

impl<P: RemoteAccessPort> SyncEngine<P> {
    /// Activate a scope: retain its cache identities, kick off initial
    /// fetches, and open its change-event subscription.
    ///
    /// Re-activating a scope kind that is already active (for example
    /// switching from one project to another) deactivates the previous
    /// scope first, so at no instant are two descriptors open for the same
    /// scope.
    pub async fn activate(&self, scope: Scope) -> Result<(), SyncError> {
        if !self.auth().session_present {
            return Err(SyncError::validation("cannot activate a scope without a session"));
        }

        let kind = scope.kind();
        self.deactivate(kind).await;

        let epoch = {
            let mut state = self.inner.state.lock().unwrap();
            state.next_epoch += 1;
            let epoch = state.next_epoch;
            state
                .scopes
                .insert(kind, ScopeState::Subscribing { epoch, scope: scope.clone() });
            for id in scope.identities() {
                state.cache.retain(&id);
            }
            epoch
        };
        self.notify_changed();

        // Initial fetches run concurrently with the subscribe call; the
        // subscription only needs to be open before *changes* matter.
        for id in scope.identities() {
            let engine = self.clone();
            tokio::spawn(async move {
                let _ = engine.run(&id, false).await;
            });
        }

        info!("[huddle_sync] subscribing scope {kind:?}");
        match self.inner.port.subscribe_changes(scope.filters()).await {
            Ok(subscription) => {
                let ChangeSubscription { id: subscription_id, events } = subscription;
                // The lock only installs the pump or detects a stale epoch;
                // the unsubscribe await happens after the guard's scope ends
                // so the future stays Send for tokio::spawn.
                let stale = {
                    let mut state = self.inner.state.lock().unwrap();
                    if state.scopes.get(&kind).map(ScopeState::epoch) != Some(epoch) {
                        true
                    } else {
                        let pump = tokio::spawn(pump_events(
                            self.downgrade(),
                            scope.clone(),
                            events,
                        ));
                        state.scopes.insert(
                            kind,
                            ScopeState::Subscribed { epoch, scope, subscription_id, pump },
                        );
                        false
                    }
                };
                if stale {
                    debug!(
                        "[huddle_sync] scope {kind:?} changed while subscribing; \
                         discarding confirmation for epoch {epoch}"
                    );
                    self.inner.port.unsubscribe(subscription_id).await;
                    return Ok(());
                }
                info!("[huddle_sync] scope {kind:?} subscribed (id {subscription_id})");
                Ok(())
            }
            Err(e) => {
                {
                    let mut state = self.inner.state.lock().unwrap();
                    if state.scopes.get(&kind).map(ScopeState::epoch) == Some(epoch) {
                        state.scopes.remove(&kind);
                        for id in scope.identities() {
                            state.cache.release(&id);
                        }
                    }
                }
                self.notify(huddle_common::Notification::error(format!(
                    "Failed to subscribe to updates: {e}"
                )));
                Err(e)
            }
        }
    }

    /// Deactivate a scope: close its subscription, stop its event pump,
    /// cancel its pending debounce entries, and release its cache
    /// references. A no-op when the scope is not active.
    pub async fn deactivate(&self, kind: ScopeKind) {
        let to_unsubscribe = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(scope_state) = state.scopes.remove(&kind) else {
                return;
            };
            let identities = scope_state.scope().identities();
            for id in &identities {
                state.scheduled.remove(id);
                state.cache.release(id);
            }
            match scope_state {
                // Still subscribing: the epoch we removed will mismatch on
                // arrival and the confirmation gets unsubscribed there.
                ScopeState::Subscribing { .. } => None,
                ScopeState::Subscribed { subscription_id, pump, .. } => {
                    pump.abort();
                    Some(subscription_id)
                }
            }
        };

        if let Some(subscription_id) = to_unsubscribe {
            info!("[huddle_sync] closing subscription {subscription_id} for scope {kind:?}");
            self.inner.port.unsubscribe(subscription_id).await;
        }
        self.notify_changed();
    }

    /// The scope currently active for a kind, if any.
    pub fn active_scope(&self, kind: ScopeKind) -> Option<Scope> {
        let state = self.inner.state.lock().unwrap();
        state.scopes.get(&kind).map(|s| s.scope().clone())
    }
}

/// Forwards one subscription's events into the coalescer until the stream
/// closes, the scope is deactivated (abort), or the engine is dropped.
async fn pump_events<P: RemoteAccessPort>(
    weak: WeakEngine<P>,
    scope: Scope,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(engine) = weak.upgrade() else { return };
        engine.handle_change_event(&scope, event);
    }
}
