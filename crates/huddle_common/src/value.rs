use serde::{Deserialize, Serialize};

use crate::entities::{
    ChatMessage, MentorRequest, Note, Project, ProjectMember, Task, UserLimits,
};
use crate::identity::EntitySet;

/// Typed result of one fetch, matching the entity set of the identity it
/// was fetched for.
///
/// The engine stores these directly in cache entries; the client facade
/// narrows them back to concrete collections with the `as_*` accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DomainValue {
    Projects(Vec<Project>),
    ProjectDetail(Project),
    Members(Vec<ProjectMember>),
    Tasks(Vec<Task>),
    Notes(Vec<Note>),
    Chat(Vec<ChatMessage>),
    MentorRequests(Vec<MentorRequest>),
    Limits(UserLimits),
}

impl DomainValue {
    /// The entity set this value belongs to.
    pub fn entity_set(&self) -> EntitySet {
        match self {
            DomainValue::Projects(_) => EntitySet::ProjectList,
            DomainValue::ProjectDetail(_) => EntitySet::ProjectDetail,
            DomainValue::Members(_) => EntitySet::MemberList,
            DomainValue::Tasks(_) => EntitySet::TaskList,
            DomainValue::Notes(_) => EntitySet::NoteList,
            DomainValue::Chat(_) => EntitySet::ChatLog,
            DomainValue::MentorRequests(_) => EntitySet::MentorRequestList,
            DomainValue::Limits(_) => EntitySet::UserLimits,
        }
    }

    pub fn as_projects(&self) -> Option<&Vec<Project>> {
        match self {
            DomainValue::Projects(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_project_detail(&self) -> Option<&Project> {
        match self {
            DomainValue::ProjectDetail(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_members(&self) -> Option<&Vec<ProjectMember>> {
        match self {
            DomainValue::Members(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_tasks(&self) -> Option<&Vec<Task>> {
        match self {
            DomainValue::Tasks(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_notes(&self) -> Option<&Vec<Note>> {
        match self {
            DomainValue::Notes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_chat(&self) -> Option<&Vec<ChatMessage>> {
        match self {
            DomainValue::Chat(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_mentor_requests(&self) -> Option<&Vec<MentorRequest>> {
        match self {
            DomainValue::MentorRequests(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_limits(&self) -> Option<&UserLimits> {
        match self {
            DomainValue::Limits(l) => Some(l),
            _ => None,
        }
    }
}
