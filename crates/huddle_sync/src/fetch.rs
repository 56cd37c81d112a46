//! Fetch executor: at most one concurrent fetch per identity, generation
//! guards against racing completions, staleness skip on fresh entries.

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use huddle_common::{DomainValue, Notification, QueryIdentity, SyncError};

use crate::engine::{InFlight, SyncEngine};
use crate::port::RemoteAccessPort;
use crate::registry;

/// How a `run` call proceeds, decided under the state lock.
enum RunStep {
    /// The entry is fresh; serve it as-is.
    Serve(DomainValue),
    /// A fetch is already in flight; wait for its result.
    Attach(oneshot::Receiver<Result<DomainValue, SyncError>>),
    /// Start a new fetch under this generation.
    Fetch(oneshot::Receiver<Result<DomainValue, SyncError>>, u64),
}

impl<P: RemoteAccessPort> SyncEngine<P> {
    /// Fetch an identity, serving the cache when fresh.
    ///
    /// Without `force`, a fresh `Ready` entry is returned as-is and a call
    /// issued while a fetch is already in flight attaches to that fetch
    /// instead of issuing a duplicate remote call. With `force`, a new
    /// remote call is always started and supersedes any in-flight one: the
    /// older call's result fails the generation check and is discarded.
    pub async fn run(&self, id: &QueryIdentity, force: bool) -> Result<DomainValue, SyncError> {
        // The lock only decides how to proceed; every await happens after
        // the guard's scope ends, so the future stays Send for tokio::spawn.
        match self.plan_run(id, force) {
            RunStep::Serve(data) => Ok(data),
            RunStep::Attach(rx) => flatten(rx.await),
            RunStep::Fetch(rx, generation) => {
                self.notify_changed();
                self.spawn_fetch(id.clone(), generation);
                flatten(rx.await)
            }
        }
    }

    fn plan_run(&self, id: &QueryIdentity, force: bool) -> RunStep {
        let mut state = self.inner.state.lock().unwrap();

        if !force {
            if let Some(entry) = state.cache.entry(id) {
                if entry.is_fresh(id, Instant::now()) {
                    if let Some(data) = entry.data.clone() {
                        trace!("[huddle_sync] serving fresh cache entry for {id}");
                        return RunStep::Serve(data);
                    }
                }
            }
            if let Some(flight) = state.in_flight.get_mut(id) {
                trace!("[huddle_sync] attaching to in-flight fetch for {id}");
                let (tx, rx) = oneshot::channel();
                flight.waiters.push(tx);
                return RunStep::Attach(rx);
            }
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let (tx, rx) = oneshot::channel();
        match state.in_flight.get_mut(id) {
            Some(flight) => {
                // Supersede: existing waiters ride along onto the new
                // generation's result.
                flight.generation = generation;
                flight.waiters.push(tx);
            }
            None => {
                state.in_flight.insert(id.clone(), InFlight { generation, waiters: vec![tx] });
            }
        }
        state.cache.mark_loading(id);
        RunStep::Fetch(rx, generation)
    }

    /// Force a refetch of one identity. This is the `refetch()` exposed to
    /// UI bindings and the path every invalidation funnels into.
    pub async fn refetch(&self, id: &QueryIdentity) -> Result<DomainValue, SyncError> {
        self.run(id, true).await
    }

    pub(crate) fn spawn_fetch(&self, id: QueryIdentity, generation: u64) {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.do_fetch(id, generation).await;
        });
    }

    async fn do_fetch(self, id: QueryIdentity, generation: u64) {
        let (procedure, params) = registry::fetch_request(&id);
        debug!("[huddle_sync] fetching {id} via '{procedure}'");

        let result = match self.inner.port.call(procedure, params).await {
            Ok(raw) => registry::decode_result(&id, raw),
            Err(e) => Err(e),
        };

        let waiters = {
            let mut state = self.inner.state.lock().unwrap();
            let current = state.in_flight.get(&id).map(|flight| flight.generation);
            if current != Some(generation) {
                trace!(
                    "[huddle_sync] discarding superseded fetch result for {id} (generation {generation})"
                );
                return;
            }
            let flight = match state.in_flight.remove(&id) {
                Some(flight) => flight,
                None => return,
            };
            match &result {
                Ok(value) => {
                    state.cache.put_ready(&id, value.clone(), Instant::now());
                }
                Err(e) => {
                    state.cache.put_error(&id, e.to_string());
                }
            }
            flight.waiters
        };

        if let Err(e) = &result {
            warn!("[huddle_sync] fetch for {id} failed: {e}");
            self.notify(Notification::error(format!("Failed to refresh {id}: {e}")));
        }
        self.notify_changed();

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

fn flatten(
    received: Result<Result<DomainValue, SyncError>, oneshot::error::RecvError>,
) -> Result<DomainValue, SyncError> {
    match received {
        Ok(result) => result,
        Err(_) => Err(SyncError::remote("fetch was dropped before completing")),
    }
}
