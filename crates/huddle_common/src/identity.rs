use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entities::{ProjectId, UserId};

/// The entity-set tag of a [`QueryIdentity`], without its scope parameters.
///
/// Used wherever behavior is configured per entity set rather than per
/// concrete cached view: staleness TTLs, debounce exemptions, and the
/// event-to-identity mapping in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntitySet {
    ProjectList,
    ProjectDetail,
    MemberList,
    TaskList,
    NoteList,
    ChatLog,
    MentorRequestList,
    UserLimits,
}

/// Key identifying one cached view of remote data.
///
/// Two identities are equal iff the variant and all scope parameters match.
/// This is the unit of caching and of invalidation: a change notification is
/// always translated into a set of `QueryIdentity` values before anything is
/// refetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryIdentity {
    /// Projects visible to a user.
    ProjectList { user_id: UserId },
    /// Aggregated detail for a single project.
    ProjectDetail { project_id: ProjectId },
    /// Membership roster of a project.
    MemberList { project_id: ProjectId },
    /// Tasks of a project.
    TaskList { project_id: ProjectId },
    /// Notes of a project.
    NoteList { project_id: ProjectId },
    /// Append-only chat log of a project.
    ChatLog { project_id: ProjectId },
    /// Mentor requests raised against a project.
    MentorRequestList { project_id: ProjectId },
    /// Plan limits of a user.
    UserLimits { user_id: UserId },
}

impl QueryIdentity {
    /// The entity-set tag of this identity.
    pub fn entity_set(&self) -> EntitySet {
        match self {
            QueryIdentity::ProjectList { .. } => EntitySet::ProjectList,
            QueryIdentity::ProjectDetail { .. } => EntitySet::ProjectDetail,
            QueryIdentity::MemberList { .. } => EntitySet::MemberList,
            QueryIdentity::TaskList { .. } => EntitySet::TaskList,
            QueryIdentity::NoteList { .. } => EntitySet::NoteList,
            QueryIdentity::ChatLog { .. } => EntitySet::ChatLog,
            QueryIdentity::MentorRequestList { .. } => EntitySet::MentorRequestList,
            QueryIdentity::UserLimits { .. } => EntitySet::UserLimits,
        }
    }

    /// How long a fetched entry may be served without refetching.
    ///
    /// This is a freshness optimization only; real changes force a refetch
    /// through the invalidation path regardless of the TTL. Project lists
    /// tolerate five minutes, project detail one minute; the remaining sets
    /// use one minute except limits, which change rarely.
    pub fn stale_ttl(&self) -> Duration {
        match self.entity_set() {
            EntitySet::ProjectList => Duration::from_secs(300),
            EntitySet::ProjectDetail => Duration::from_secs(60),
            EntitySet::MemberList => Duration::from_secs(60),
            EntitySet::TaskList => Duration::from_secs(60),
            EntitySet::NoteList => Duration::from_secs(60),
            EntitySet::ChatLog => Duration::from_secs(60),
            EntitySet::MentorRequestList => Duration::from_secs(60),
            EntitySet::UserLimits => Duration::from_secs(300),
        }
    }
}

impl fmt::Display for QueryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryIdentity::ProjectList { user_id } => write!(f, "project_list({user_id})"),
            QueryIdentity::ProjectDetail { project_id } => {
                write!(f, "project_detail({project_id})")
            }
            QueryIdentity::MemberList { project_id } => write!(f, "member_list({project_id})"),
            QueryIdentity::TaskList { project_id } => write!(f, "task_list({project_id})"),
            QueryIdentity::NoteList { project_id } => write!(f, "note_list({project_id})"),
            QueryIdentity::ChatLog { project_id } => write!(f, "chat_log({project_id})"),
            QueryIdentity::MentorRequestList { project_id } => {
                write!(f, "mentor_request_list({project_id})")
            }
            QueryIdentity::UserLimits { user_id } => write!(f, "user_limits({user_id})"),
        }
    }
}
