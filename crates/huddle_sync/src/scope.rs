//! UI scopes and their subscription lifecycle states.
//!
//! A scope is a UI-visible context whose activation opens exactly one
//! change-event subscription and whose deactivation tears it down. The
//! engine keys live scopes by [`ScopeKind`], so switching a project scope
//! from one project to another is a parameter change of the *same* scope
//! and must close the old descriptor before opening the new one.

use tokio::task::JoinHandle;

use huddle_common::{ProjectId, QueryIdentity, Table, UserId};

use crate::port::ChangeFilter;

/// Discriminant of a scope, ignoring its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Dashboard,
    Project,
}

/// A UI scope with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The user's dashboard: project list plus plan limits.
    Dashboard { user_id: UserId },
    /// A single open project: detail, roster, tasks, notes, chat, mentor
    /// requests.
    Project { project_id: ProjectId },
}

impl Scope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            Scope::Dashboard { .. } => ScopeKind::Dashboard,
            Scope::Project { .. } => ScopeKind::Project,
        }
    }

    /// The query identities this scope keeps alive while active.
    pub fn identities(&self) -> Vec<QueryIdentity> {
        match self {
            Scope::Dashboard { user_id } => vec![
                QueryIdentity::ProjectList { user_id: user_id.clone() },
                QueryIdentity::UserLimits { user_id: user_id.clone() },
            ],
            Scope::Project { project_id } => vec![
                QueryIdentity::ProjectDetail { project_id: project_id.clone() },
                QueryIdentity::MemberList { project_id: project_id.clone() },
                QueryIdentity::TaskList { project_id: project_id.clone() },
                QueryIdentity::NoteList { project_id: project_id.clone() },
                QueryIdentity::ChatLog { project_id: project_id.clone() },
                QueryIdentity::MentorRequestList { project_id: project_id.clone() },
            ],
        }
    }

    /// The change-set filters of this scope's subscription descriptor.
    pub fn filters(&self) -> Vec<ChangeFilter> {
        match self {
            Scope::Dashboard { user_id } => vec![
                ChangeFilter::for_user(Table::Projects, user_id),
                ChangeFilter::for_user(Table::ProjectMembers, user_id),
                ChangeFilter::for_user(Table::UserLimits, user_id),
            ],
            Scope::Project { project_id } => vec![
                ChangeFilter::for_project(Table::Projects, project_id),
                ChangeFilter::for_project(Table::ProjectMembers, project_id),
                ChangeFilter::for_project(Table::Tasks, project_id),
                ChangeFilter::for_project(Table::Notes, project_id),
                ChangeFilter::for_project(Table::ChatMessages, project_id),
                ChangeFilter::for_project(Table::MentorRequests, project_id),
            ],
        }
    }
}

/// Lifecycle state of one scope, tracked by the engine.
///
/// `Unmounted` is represented by absence from the scope table. The epoch
/// distinguishes a subscription confirmation that is still wanted from one
/// whose scope was deactivated (or re-activated with new parameters) while
/// the subscribe call was in flight.
#[derive(Debug)]
pub enum ScopeState {
    /// `subscribe_changes` is in flight for this epoch.
    Subscribing { epoch: u64, scope: Scope },
    /// The port confirmed the subscription; the pump task forwards its
    /// events into the coalescer.
    Subscribed {
        epoch: u64,
        scope: Scope,
        subscription_id: u64,
        pump: JoinHandle<()>,
    },
}

impl ScopeState {
    pub fn epoch(&self) -> u64 {
        match self {
            ScopeState::Subscribing { epoch, .. } => *epoch,
            ScopeState::Subscribed { epoch, .. } => *epoch,
        }
    }

    pub fn scope(&self) -> &Scope {
        match self {
            ScopeState::Subscribing { scope, .. } => scope,
            ScopeState::Subscribed { scope, .. } => scope,
        }
    }
}
