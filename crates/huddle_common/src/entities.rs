use serde::{Deserialize, Serialize};

/// Opaque server-assigned identifier for a project.
pub type ProjectId = String;
/// Opaque server-assigned identifier for a user.
pub type UserId = String;
/// Opaque server-assigned identifier for a task.
pub type TaskId = String;
/// Milliseconds since the Unix epoch, as reported by the remote store.
pub type TimestampMs = u64;

/// Aggregated task counters carried on a project row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: u32,
    pub done: u32,
}

/// A collaboratively edited project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub member_count: u32,
    #[serde(default)]
    pub task_stats: TaskStats,
}

/// Role of a user within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Admin,
    Member,
}

/// Membership row linking a user to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMember {
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub role: MemberRole,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub assignee_id: Option<UserId>,
    pub created_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub project_id: ProjectId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: TimestampMs,
}

/// One message in a project's chat log.
///
/// Chat is append-only and ordered by `created_at` ascending; message ids
/// are unique, so duplicate delivery can be detected by id alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub project_id: ProjectId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: TimestampMs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MentorRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorRequest {
    pub id: String,
    pub project_id: ProjectId,
    pub requester_id: UserId,
    pub status: MentorRequestStatus,
    #[serde(default)]
    pub message: Option<String>,
}

/// Subscription tier of the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanTier {
    Free,
    Pro,
}

/// Per-user plan limits reported by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLimits {
    pub tier: PlanTier,
    pub max_projects: u32,
    pub current_projects: u32,
}
