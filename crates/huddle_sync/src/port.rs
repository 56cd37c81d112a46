use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use huddle_common::{ChangeEvent, ProjectId, SyncError, Table, UserId};

/// Kind of row mutation issued through the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    Insert,
    Update,
    Delete,
}

/// One change-set filter of a subscription descriptor: a table plus the
/// scope key the remote side should restrict delivery to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub project_id: Option<ProjectId>,
    pub user_id: Option<UserId>,
}

impl ChangeFilter {
    pub fn for_project(table: Table, project_id: &ProjectId) -> Self {
        Self { table, project_id: Some(project_id.clone()), user_id: None }
    }

    pub fn for_user(table: Table, user_id: &UserId) -> Self {
        Self { table, project_id: None, user_id: Some(user_id.clone()) }
    }
}

/// An open change-event subscription handed back by the port.
///
/// Dropping the receiver does not close the remote side; the engine always
/// pairs it with an explicit [`RemoteAccessPort::unsubscribe`].
#[derive(Debug)]
pub struct ChangeSubscription {
    /// Port-assigned identifier, passed back on unsubscribe.
    pub id: u64,
    /// Ordered stream of change events matching the filters.
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// Read-only authentication state supplied by the host application.
///
/// The engine never manages session lifecycle; it only checks presence at
/// scope-activation time.
#[derive(Debug, Clone, Default)]
pub struct AuthIdentity {
    pub current_user_id: Option<UserId>,
    pub session_present: bool,
}

impl AuthIdentity {
    pub fn signed_in(user_id: impl Into<UserId>) -> Self {
        Self { current_user_id: Some(user_id.into()), session_present: true }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

/// Abstraction over the remote request/response and change-notification
/// service.
///
/// The engine is generic over this trait the way a networking layer is
/// generic over its transport provider: production code plugs in a real
/// backend client, tests plug in a scripted mock.
#[async_trait]
pub trait RemoteAccessPort: Send + Sync + 'static {
    /// Execute a named query or remote procedure.
    async fn call(&self, procedure: &str, params: Value) -> Result<Value, SyncError>;

    /// Execute a row mutation against a table.
    async fn mutate(
        &self,
        table: Table,
        op: MutationOp,
        payload: Value,
        filter: Value,
    ) -> Result<Value, SyncError>;

    /// Open a change-event subscription covering the given filters.
    async fn subscribe_changes(
        &self,
        filters: Vec<ChangeFilter>,
    ) -> Result<ChangeSubscription, SyncError>;

    /// Close a subscription previously returned by [`Self::subscribe_changes`].
    async fn unsubscribe(&self, subscription_id: u64);
}
