//! Typed query handles: snapshots of one cached view, narrowed from the
//! engine's [`DomainValue`] to the concrete collection a front end renders.

use huddle_common::{
    ChatMessage, DomainValue, MentorRequest, Note, Project, ProjectId, ProjectMember,
    QueryIdentity, Task, UserLimits,
};
use huddle_sync::RemoteAccessPort;

use crate::WorkspaceClient;

/// Snapshot of one cached query as exposed to rendering code.
///
/// `data` stays populated while a refetch is in flight (stale-while-
/// revalidate) and after a failed refetch (stale-while-error).
#[derive(Debug, Clone)]
pub struct QueryHandle<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl<T> Default for QueryHandle<T> {
    fn default() -> Self {
        Self { data: None, is_loading: false, error: None }
    }
}

impl<P: RemoteAccessPort> WorkspaceClient<P> {
    fn handle<T>(
        &self,
        id: QueryIdentity,
        narrow: impl FnOnce(&DomainValue) -> Option<T>,
    ) -> QueryHandle<T> {
        let snapshot = self.engine().snapshot(&id);
        QueryHandle {
            data: snapshot.data.as_ref().and_then(narrow),
            is_loading: snapshot.is_loading,
            error: snapshot.error,
        }
    }

    /// Projects visible to the signed-in user. Empty when signed out.
    pub fn projects(&self) -> QueryHandle<Vec<Project>> {
        match self.user_id() {
            Ok(user_id) => self.handle(
                QueryIdentity::ProjectList { user_id },
                |v| v.as_projects().cloned(),
            ),
            Err(_) => QueryHandle::default(),
        }
    }

    pub fn project_detail(&self, project_id: impl Into<ProjectId>) -> QueryHandle<Project> {
        self.handle(
            QueryIdentity::ProjectDetail { project_id: project_id.into() },
            |v| v.as_project_detail().cloned(),
        )
    }

    pub fn members(&self, project_id: impl Into<ProjectId>) -> QueryHandle<Vec<ProjectMember>> {
        self.handle(
            QueryIdentity::MemberList { project_id: project_id.into() },
            |v| v.as_members().cloned(),
        )
    }

    pub fn tasks(&self, project_id: impl Into<ProjectId>) -> QueryHandle<Vec<Task>> {
        self.handle(
            QueryIdentity::TaskList { project_id: project_id.into() },
            |v| v.as_tasks().cloned(),
        )
    }

    pub fn notes(&self, project_id: impl Into<ProjectId>) -> QueryHandle<Vec<Note>> {
        self.handle(
            QueryIdentity::NoteList { project_id: project_id.into() },
            |v| v.as_notes().cloned(),
        )
    }

    pub fn chat(&self, project_id: impl Into<ProjectId>) -> QueryHandle<Vec<ChatMessage>> {
        self.handle(
            QueryIdentity::ChatLog { project_id: project_id.into() },
            |v| v.as_chat().cloned(),
        )
    }

    pub fn mentor_requests(
        &self,
        project_id: impl Into<ProjectId>,
    ) -> QueryHandle<Vec<MentorRequest>> {
        self.handle(
            QueryIdentity::MentorRequestList { project_id: project_id.into() },
            |v| v.as_mentor_requests().cloned(),
        )
    }

    /// Plan limits of the signed-in user. Empty when signed out.
    pub fn limits(&self) -> QueryHandle<UserLimits> {
        match self.user_id() {
            Ok(user_id) => self.handle(
                QueryIdentity::UserLimits { user_id },
                |v| v.as_limits().cloned(),
            ),
            Err(_) => QueryHandle::default(),
        }
    }
}
