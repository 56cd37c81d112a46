//! Mutation dispatcher.
//!
//! A write runs against the port; success invalidates every affected
//! identity and emits a success notification, failure emits the cause and
//! touches nothing. The one exception is a [`SyncError::PartialWrite`]:
//! an earlier step already committed, so the affected identities are
//! invalidated anyway to make the partial state discoverable.

use std::future::Future;

use tracing::{debug, warn};

use huddle_common::{Notification, QueryIdentity, SyncError};

use crate::engine::SyncEngine;
use crate::port::RemoteAccessPort;

impl<P: RemoteAccessPort> SyncEngine<P> {
    /// Execute a write and reconcile the cache with its outcome.
    ///
    /// `write` is the remote work itself (typically closing over
    /// [`SyncEngine::port`]); `affected` lists every identity whose cached
    /// result the write could change. The returned result is the tagged
    /// outcome callers branch on; the error has already been surfaced on
    /// the notification channel by the time it is returned.
    pub async fn execute<T, Fut>(
        &self,
        success_message: &str,
        affected: &[QueryIdentity],
        write: Fut,
    ) -> Result<T, SyncError>
    where
        Fut: Future<Output = Result<T, SyncError>>,
    {
        match write.await {
            Ok(value) => {
                debug!("[huddle_sync] mutation succeeded: {success_message}");
                self.invalidate_all(affected);
                self.notify(Notification::success(success_message));
                Ok(value)
            }
            Err(e) => {
                warn!("[huddle_sync] mutation failed: {e}");
                if e.is_partial_write() {
                    // The first step committed; its effects must become
                    // visible even though the write as a whole failed.
                    self.invalidate_all(affected);
                }
                self.notify(Notification::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Invalidate a set of identities and force their refetches.
    pub fn invalidate_all(&self, identities: &[QueryIdentity]) {
        {
            let mut state = self.inner.state.lock().unwrap();
            for id in identities {
                state.cache.invalidate(id);
            }
        }
        self.notify_changed();
        for id in identities {
            let engine = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                let _ = engine.run(&id, true).await;
            });
        }
    }
}
