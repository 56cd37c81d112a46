//! huddle_common
//!
//! Shared vocabulary for the huddle sync client: the domain entities of a
//! collaborative workspace (projects, memberships, tasks, notes, chat,
//! mentor requests, usage limits), the [`QueryIdentity`] keys the cache is
//! organized around, the change-event types delivered by the remote store,
//! and the error taxonomy.
//!
//! This crate is deliberately inert: no async code, no network code, no
//! timers. Everything here is plain data shared between `huddle_sync` (the
//! engine) and `huddle_client` (the typed facade).

mod entities;
mod error;
mod events;
mod identity;
mod notification;
mod value;

pub use entities::{
    ChatMessage, MemberRole, MentorRequest, MentorRequestStatus, Note, PlanTier, Project,
    ProjectId, ProjectMember, Task, TaskId, TaskStats, TaskStatus, TimestampMs, UserId,
    UserLimits,
};
pub use error::SyncError;
pub use events::{ChangeEvent, ChangeOp, Table};
pub use identity::{EntitySet, QueryIdentity};
pub use notification::{Notification, Severity};
pub use value::DomainValue;
