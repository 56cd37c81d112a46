//! huddle_client
//!
//! Typed facade over the [`huddle_sync`] engine for front ends: scope
//! helpers tied to the two UI contexts (dashboard, open project), per
//! entity-set query handles carrying `{data, is_loading, error}`, and the
//! full set of mutation verbs.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use huddle_client::WorkspaceClient;
//! use huddle_sync::AuthIdentity;
//!
//! let client = WorkspaceClient::new(port, AuthIdentity::signed_in("u1"));
//! client.open_dashboard().await?;
//!
//! let mut changed = client.changed();
//! loop {
//!     changed.changed().await?;
//!     let projects = client.projects();
//!     render(projects.data, projects.is_loading, projects.error);
//! }
//! ```

mod mutations;
mod queries;

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use huddle_common::{DomainValue, Notification, ProjectId, QueryIdentity, SyncError, UserId};
use huddle_sync::{AuthIdentity, RemoteAccessPort, Scope, ScopeKind, SyncEngine};

pub use queries::QueryHandle;

/// High-level handle to the workspace sync layer.
///
/// Cheap to clone; all clones share the engine.
pub struct WorkspaceClient<P: RemoteAccessPort> {
    engine: SyncEngine<P>,
}

impl<P: RemoteAccessPort> Clone for WorkspaceClient<P> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone() }
    }
}

impl<P: RemoteAccessPort> WorkspaceClient<P> {
    /// Build a client over a remote port and the current (read-only)
    /// authentication state. Must be called inside a tokio runtime.
    pub fn new(port: Arc<P>, auth: AuthIdentity) -> Self {
        Self { engine: SyncEngine::new(port, auth) }
    }

    /// Direct access to the underlying engine.
    pub fn engine(&self) -> &SyncEngine<P> {
        &self.engine
    }

    /// The signed-in user, or a `Validation` error when there is no session.
    pub(crate) fn user_id(&self) -> Result<UserId, SyncError> {
        self.engine
            .auth()
            .current_user_id
            .clone()
            .ok_or_else(|| SyncError::validation("no signed-in user"))
    }

    /// Activate the dashboard scope: project list plus plan limits.
    pub async fn open_dashboard(&self) -> Result<(), SyncError> {
        let user_id = self.user_id()?;
        self.engine.activate(Scope::Dashboard { user_id }).await
    }

    pub async fn close_dashboard(&self) {
        self.engine.deactivate(ScopeKind::Dashboard).await;
    }

    /// Activate the project scope for one project. Switching projects
    /// closes the previous project's subscription before opening the new
    /// one.
    pub async fn open_project(&self, project_id: impl Into<ProjectId>) -> Result<(), SyncError> {
        self.engine.activate(Scope::Project { project_id: project_id.into() }).await
    }

    pub async fn close_project(&self) {
        self.engine.deactivate(ScopeKind::Project).await;
    }

    /// Manually refetch one identity, bypassing the staleness TTL. This is
    /// the `refetch()` a UI offers next to an error state.
    pub async fn refetch(&self, id: &QueryIdentity) -> Result<DomainValue, SyncError> {
        self.engine.refetch(id).await
    }

    /// Ticks after every committed cache change; re-read query handles on
    /// each tick.
    pub fn changed(&self) -> watch::Receiver<u64> {
        self.engine.changed()
    }

    /// User-facing success/failure notifications.
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.engine.notifications()
    }
}
