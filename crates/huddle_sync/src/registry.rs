//! Per-entity-set plug-in table.
//!
//! The original per-entity fetch/subscribe/invalidate code paths collapse
//! into three total functions keyed by [`QueryIdentity`] / [`Table`]: the
//! fetch procedure for an identity, the decoder for its result, and the
//! mapping from a change event to the identities it affects within a scope.
//! Chat inserts additionally get an append-in-place fast path so a full
//! refetch is not needed for every message.

use serde_json::{Value, json};

use huddle_common::{
    ChangeEvent, ChangeOp, ChatMessage, DomainValue, MentorRequest, Note, Project,
    ProjectMember, QueryIdentity, SyncError, Table, Task, UserLimits,
};

use crate::scope::Scope;

/// The remote procedure and parameters that fetch an identity.
pub fn fetch_request(id: &QueryIdentity) -> (&'static str, Value) {
    match id {
        QueryIdentity::ProjectList { user_id } => {
            ("get_projects_for_user", json!({ "user_id": user_id }))
        }
        QueryIdentity::ProjectDetail { project_id } => {
            ("get_project_detail", json!({ "project_id": project_id }))
        }
        QueryIdentity::MemberList { project_id } => {
            ("list_project_members", json!({ "project_id": project_id }))
        }
        QueryIdentity::TaskList { project_id } => {
            ("list_project_tasks", json!({ "project_id": project_id }))
        }
        QueryIdentity::NoteList { project_id } => {
            ("list_project_notes", json!({ "project_id": project_id }))
        }
        QueryIdentity::ChatLog { project_id } => {
            ("list_chat_messages", json!({ "project_id": project_id }))
        }
        QueryIdentity::MentorRequestList { project_id } => {
            ("list_mentor_requests", json!({ "project_id": project_id }))
        }
        QueryIdentity::UserLimits { user_id } => {
            ("get_user_limits", json!({ "user_id": user_id }))
        }
    }
}

/// Decode a raw procedure result into the typed value for an identity.
pub fn decode_result(id: &QueryIdentity, raw: Value) -> Result<DomainValue, SyncError> {
    fn typed<T: serde::de::DeserializeOwned>(what: &str, raw: Value) -> Result<T, SyncError> {
        serde_json::from_value(raw).map_err(|e| SyncError::decode(what, e.to_string()))
    }

    Ok(match id {
        QueryIdentity::ProjectList { .. } => {
            DomainValue::Projects(typed::<Vec<Project>>("project list", raw)?)
        }
        QueryIdentity::ProjectDetail { .. } => {
            DomainValue::ProjectDetail(typed::<Project>("project detail", raw)?)
        }
        QueryIdentity::MemberList { .. } => {
            DomainValue::Members(typed::<Vec<ProjectMember>>("member list", raw)?)
        }
        QueryIdentity::TaskList { .. } => {
            DomainValue::Tasks(typed::<Vec<Task>>("task list", raw)?)
        }
        QueryIdentity::NoteList { .. } => {
            DomainValue::Notes(typed::<Vec<Note>>("note list", raw)?)
        }
        QueryIdentity::ChatLog { .. } => {
            DomainValue::Chat(typed::<Vec<ChatMessage>>("chat log", raw)?)
        }
        QueryIdentity::MentorRequestList { .. } => {
            DomainValue::MentorRequests(typed::<Vec<MentorRequest>>("mentor requests", raw)?)
        }
        QueryIdentity::UserLimits { .. } => {
            DomainValue::Limits(typed::<UserLimits>("user limits", raw)?)
        }
    })
}

/// Map a change event to the identities it affects within a scope.
///
/// The mapping is total over the tables each scope subscribes to; tables a
/// scope does not filter on return an empty set, which is the explicit
/// no-op. Chat inserts are excluded here because they take the
/// [`chat_fast_path`] instead of the debounce table.
pub fn affected_identities(event: &ChangeEvent, scope: &Scope) -> Vec<QueryIdentity> {
    match scope {
        Scope::Dashboard { user_id } => match event.table {
            // A project row change, or a membership change, can alter which
            // projects the user sees and their aggregated counters.
            Table::Projects | Table::ProjectMembers => {
                vec![QueryIdentity::ProjectList { user_id: user_id.clone() }]
            }
            Table::UserLimits => vec![QueryIdentity::UserLimits { user_id: user_id.clone() }],
            // Not part of this scope's filters.
            _ => vec![],
        },
        Scope::Project { project_id } => match event.table {
            Table::Projects => {
                vec![QueryIdentity::ProjectDetail { project_id: project_id.clone() }]
            }
            Table::ProjectMembers => vec![
                QueryIdentity::MemberList { project_id: project_id.clone() },
                QueryIdentity::ProjectDetail { project_id: project_id.clone() },
            ],
            Table::Tasks => vec![
                QueryIdentity::TaskList { project_id: project_id.clone() },
                QueryIdentity::ProjectDetail { project_id: project_id.clone() },
            ],
            Table::Notes => vec![QueryIdentity::NoteList { project_id: project_id.clone() }],
            Table::ChatMessages => {
                vec![QueryIdentity::ChatLog { project_id: project_id.clone() }]
            }
            Table::MentorRequests => {
                vec![QueryIdentity::MentorRequestList { project_id: project_id.clone() }]
            }
            Table::UserLimits => vec![],
        },
    }
}

/// Whether an event is a chat insert, regardless of whether it carries the
/// row. Chat inserts are never debounced: with a decodable row they take
/// the append-in-place fast path, without one they refetch immediately.
pub fn is_chat_insert(event: &ChangeEvent) -> bool {
    event.table == Table::ChatMessages && event.op == ChangeOp::Insert
}

/// Decode a chat insert event into its message, if it qualifies for the
/// append-in-place fast path.
pub fn chat_fast_path(event: &ChangeEvent) -> Option<ChatMessage> {
    if !is_chat_insert(event) {
        return None;
    }
    let row = event.new_row.clone()?;
    serde_json::from_value(row).ok()
}
