//! Mutation verbs.
//!
//! Each verb validates its input, dispatches through the engine's mutation
//! path with the identities its write could affect, and returns the tagged
//! outcome. Failures never touch the cache (so optimistic form state in
//! the UI survives), with the documented exception of a partial write.

use serde_json::json;
use tracing::debug;

use huddle_common::{
    MentorRequestStatus, ProjectId, QueryIdentity, SyncError, Table, TaskId, TaskStatus, UserId,
};
use huddle_sync::{MutationOp, RemoteAccessPort};

use crate::WorkspaceClient;

fn require_non_empty(field: &str, value: &str) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_email(value: &str) -> Result<(), SyncError> {
    // The remote side owns real address validation; this only catches
    // obviously malformed input before a round trip.
    if !value.contains('@') || value.trim().is_empty() {
        return Err(SyncError::validation(format!("'{value}' is not an email address")));
    }
    Ok(())
}

fn row_id(row: &serde_json::Value, what: &str) -> Result<String, SyncError> {
    row.get("id")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| SyncError::decode(what, "row is missing an 'id'"))
}

impl<P: RemoteAccessPort> WorkspaceClient<P> {
    /// Create a project, then add the creator as its admin member.
    ///
    /// The two steps are not transactional: if the membership insert fails
    /// after the project insert committed, this returns
    /// [`SyncError::PartialWrite`] naming the new project id, and the
    /// project list is still invalidated because the project now exists.
    pub async fn create_project(
        &self,
        name: &str,
        description: &str,
    ) -> Result<ProjectId, SyncError> {
        require_non_empty("project name", name)?;
        let user_id = self.user_id()?;
        let affected = [
            QueryIdentity::ProjectList { user_id: user_id.clone() },
            QueryIdentity::UserLimits { user_id: user_id.clone() },
        ];
        let port = self.engine().port();
        let (name, description) = (name.to_owned(), description.to_owned());
        self.engine()
            .execute("Project created", &affected, async move {
                let row = port
                    .mutate(
                        Table::Projects,
                        MutationOp::Insert,
                        json!({ "name": name, "description": description, "created_by": user_id }),
                        json!({}),
                    )
                    .await?;
                let project_id = row_id(&row, "created project")?;
                debug!("[huddle_client] project {project_id} created, adding creator as admin");
                let membership = port
                    .mutate(
                        Table::ProjectMembers,
                        MutationOp::Insert,
                        json!({ "project_id": project_id, "user_id": user_id, "role": "ADMIN" }),
                        json!({}),
                    )
                    .await;
                match membership {
                    Ok(_) => Ok(project_id),
                    Err(e) => Err(SyncError::PartialWrite {
                        committed: format!("project {project_id}"),
                        failed_step: "adding the creator as admin member".into(),
                        message: e.to_string(),
                    }),
                }
            })
            .await
    }

    pub async fn update_project(
        &self,
        project_id: impl Into<ProjectId>,
        name: &str,
        description: &str,
    ) -> Result<(), SyncError> {
        require_non_empty("project name", name)?;
        let project_id = project_id.into();
        let user_id = self.user_id()?;
        let affected = [
            QueryIdentity::ProjectDetail { project_id: project_id.clone() },
            QueryIdentity::ProjectList { user_id },
        ];
        let port = self.engine().port();
        let (name, description) = (name.to_owned(), description.to_owned());
        self.engine()
            .execute("Project updated", &affected, async move {
                port.mutate(
                    Table::Projects,
                    MutationOp::Update,
                    json!({ "name": name, "description": description }),
                    json!({ "id": project_id }),
                )
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn delete_project(&self, project_id: impl Into<ProjectId>) -> Result<(), SyncError> {
        let project_id = project_id.into();
        let user_id = self.user_id()?;
        let affected = [
            QueryIdentity::ProjectList { user_id: user_id.clone() },
            QueryIdentity::UserLimits { user_id },
        ];
        let port = self.engine().port();
        self.engine()
            .execute("Project deleted", &affected, async move {
                port.mutate(
                    Table::Projects,
                    MutationOp::Delete,
                    json!({}),
                    json!({ "id": project_id }),
                )
                .await?;
                Ok(())
            })
            .await
    }

    /// Add a member by email. An unknown address is a [`SyncError::NotFound`].
    pub async fn add_member(
        &self,
        project_id: impl Into<ProjectId>,
        email: &str,
    ) -> Result<(), SyncError> {
        require_email(email)?;
        let project_id = project_id.into();
        let affected = [
            QueryIdentity::MemberList { project_id: project_id.clone() },
            QueryIdentity::ProjectDetail { project_id: project_id.clone() },
        ];
        let port = self.engine().port();
        let email = email.to_owned();
        self.engine()
            .execute("Member added", &affected, async move {
                let found = port.call("find_user_by_email", json!({ "email": email })).await?;
                if found.is_null() {
                    return Err(SyncError::not_found(format!("user with email '{email}'")));
                }
                let user_id = row_id(&found, "looked-up user")?;
                port.mutate(
                    Table::ProjectMembers,
                    MutationOp::Insert,
                    json!({ "project_id": project_id, "user_id": user_id, "role": "MEMBER" }),
                    json!({}),
                )
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn remove_member(
        &self,
        project_id: impl Into<ProjectId>,
        user_id: impl Into<UserId>,
    ) -> Result<(), SyncError> {
        let project_id = project_id.into();
        let user_id = user_id.into();
        let affected = [
            QueryIdentity::MemberList { project_id: project_id.clone() },
            QueryIdentity::ProjectDetail { project_id: project_id.clone() },
        ];
        let port = self.engine().port();
        self.engine()
            .execute("Member removed", &affected, async move {
                port.mutate(
                    Table::ProjectMembers,
                    MutationOp::Delete,
                    json!({}),
                    json!({ "project_id": project_id, "user_id": user_id }),
                )
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn create_task(
        &self,
        project_id: impl Into<ProjectId>,
        title: &str,
    ) -> Result<TaskId, SyncError> {
        require_non_empty("task title", title)?;
        let project_id = project_id.into();
        let user_id = self.user_id()?;
        let affected = [
            QueryIdentity::TaskList { project_id: project_id.clone() },
            QueryIdentity::ProjectDetail { project_id: project_id.clone() },
        ];
        let port = self.engine().port();
        let title = title.to_owned();
        self.engine()
            .execute("Task created", &affected, async move {
                let row = port
                    .mutate(
                        Table::Tasks,
                        MutationOp::Insert,
                        json!({
                            "project_id": project_id,
                            "title": title,
                            "status": "TODO",
                            "created_by": user_id,
                        }),
                        json!({}),
                    )
                    .await?;
                row_id(&row, "created task")
            })
            .await
    }

    pub async fn update_task_status(
        &self,
        project_id: impl Into<ProjectId>,
        task_id: impl Into<TaskId>,
        status: TaskStatus,
    ) -> Result<(), SyncError> {
        let project_id = project_id.into();
        let task_id = task_id.into();
        let affected = [
            QueryIdentity::TaskList { project_id: project_id.clone() },
            QueryIdentity::ProjectDetail { project_id },
        ];
        let port = self.engine().port();
        self.engine()
            .execute("Task updated", &affected, async move {
                port.mutate(
                    Table::Tasks,
                    MutationOp::Update,
                    json!({ "status": status }),
                    json!({ "id": task_id }),
                )
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn assign_task(
        &self,
        project_id: impl Into<ProjectId>,
        task_id: impl Into<TaskId>,
        assignee_id: Option<UserId>,
    ) -> Result<(), SyncError> {
        let project_id = project_id.into();
        let task_id = task_id.into();
        let affected = [QueryIdentity::TaskList { project_id }];
        let port = self.engine().port();
        self.engine()
            .execute("Task assigned", &affected, async move {
                port.mutate(
                    Table::Tasks,
                    MutationOp::Update,
                    json!({ "assignee_id": assignee_id }),
                    json!({ "id": task_id }),
                )
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn delete_task(
        &self,
        project_id: impl Into<ProjectId>,
        task_id: impl Into<TaskId>,
    ) -> Result<(), SyncError> {
        let project_id = project_id.into();
        let task_id = task_id.into();
        let affected = [
            QueryIdentity::TaskList { project_id: project_id.clone() },
            QueryIdentity::ProjectDetail { project_id },
        ];
        let port = self.engine().port();
        self.engine()
            .execute("Task deleted", &affected, async move {
                port.mutate(Table::Tasks, MutationOp::Delete, json!({}), json!({ "id": task_id }))
                    .await?;
                Ok(())
            })
            .await
    }

    pub async fn create_note(
        &self,
        project_id: impl Into<ProjectId>,
        content: &str,
    ) -> Result<(), SyncError> {
        require_non_empty("note content", content)?;
        let project_id = project_id.into();
        let user_id = self.user_id()?;
        let affected = [QueryIdentity::NoteList { project_id: project_id.clone() }];
        let port = self.engine().port();
        let content = content.to_owned();
        self.engine()
            .execute("Note created", &affected, async move {
                port.mutate(
                    Table::Notes,
                    MutationOp::Insert,
                    json!({ "project_id": project_id, "author_id": user_id, "content": content }),
                    json!({}),
                )
                .await?;
                Ok(())
            })
            .await
    }

    /// Send a chat message.
    ///
    /// No identity is invalidated on success: chat is append-only, and the
    /// message comes back through the subscription's insert event where the
    /// coalescer appends it in place without a refetch.
    pub async fn send_chat_message(
        &self,
        project_id: impl Into<ProjectId>,
        content: &str,
    ) -> Result<(), SyncError> {
        require_non_empty("message", content)?;
        let project_id = project_id.into();
        let user_id = self.user_id()?;
        let port = self.engine().port();
        let content = content.to_owned();
        self.engine()
            .execute("Message sent", &[], async move {
                port.mutate(
                    Table::ChatMessages,
                    MutationOp::Insert,
                    json!({ "project_id": project_id, "author_id": user_id, "content": content }),
                    json!({}),
                )
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn request_mentor(
        &self,
        project_id: impl Into<ProjectId>,
        message: Option<&str>,
    ) -> Result<(), SyncError> {
        let project_id = project_id.into();
        let user_id = self.user_id()?;
        let affected = [QueryIdentity::MentorRequestList { project_id: project_id.clone() }];
        let port = self.engine().port();
        let message = message.map(str::to_owned);
        self.engine()
            .execute("Mentor request sent", &affected, async move {
                port.mutate(
                    Table::MentorRequests,
                    MutationOp::Insert,
                    json!({
                        "project_id": project_id,
                        "requester_id": user_id,
                        "status": "PENDING",
                        "message": message,
                    }),
                    json!({}),
                )
                .await?;
                Ok(())
            })
            .await
    }

    pub async fn accept_mentor_request(
        &self,
        project_id: impl Into<ProjectId>,
        request_id: &str,
    ) -> Result<(), SyncError> {
        self.resolve_mentor_request(project_id.into(), request_id, MentorRequestStatus::Accepted)
            .await
    }

    pub async fn reject_mentor_request(
        &self,
        project_id: impl Into<ProjectId>,
        request_id: &str,
    ) -> Result<(), SyncError> {
        self.resolve_mentor_request(project_id.into(), request_id, MentorRequestStatus::Rejected)
            .await
    }

    async fn resolve_mentor_request(
        &self,
        project_id: ProjectId,
        request_id: &str,
        status: MentorRequestStatus,
    ) -> Result<(), SyncError> {
        let affected = [QueryIdentity::MentorRequestList { project_id }];
        let port = self.engine().port();
        let request_id = request_id.to_owned();
        let message = match status {
            MentorRequestStatus::Accepted => "Mentor request accepted",
            _ => "Mentor request rejected",
        };
        self.engine()
            .execute(message, &affected, async move {
                port.mutate(
                    Table::MentorRequests,
                    MutationOp::Update,
                    json!({ "status": status }),
                    json!({ "id": request_id }),
                )
                .await?;
                Ok(())
            })
            .await
    }

    /// Redeem a promo code through the remote procedure.
    ///
    /// Failure (for example a code the remote side reports as already used)
    /// surfaces as an error notification and leaves the cached limits
    /// untouched; there is no optimistic tier upgrade.
    pub async fn redeem_code(&self, code: &str) -> Result<(), SyncError> {
        require_non_empty("promo code", code)?;
        let user_id = self.user_id()?;
        let affected = [QueryIdentity::UserLimits { user_id: user_id.clone() }];
        let port = self.engine().port();
        let code = code.to_owned();
        self.engine()
            .execute("Promo code redeemed", &affected, async move {
                port.call("redeem_promo_code", json!({ "code": code, "user_id": user_id }))
                    .await?;
                Ok(())
            })
            .await
    }
}
