//! Task operations: authorization, state transition, conditional commit,
//! then notification.
//!
//! Every mutation is a read-modify-write guarded by the task revision. A
//! writer that loses the race re-reads the task to report why: a task that
//! left `PendingVerification` yields the same precondition error a
//! sequential caller would see.

use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::policy;
use super::task::{NewTask, Task, TaskPatch, TaskStatus};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::hierarchy::subordinates_of;
use crate::notify::{comment_recipients, NotificationDispatcher, NotificationType};
use crate::roster::{team_lead_of, Employee};
use crate::store::SharedStore;

#[derive(Clone)]
pub struct TaskService {
    store: SharedStore,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl TaskService {
    pub fn new(store: SharedStore, dispatcher: NotificationDispatcher, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            dispatcher,
            clock,
        }
    }

    async fn load(&self, id: Uuid) -> Result<Task> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Task {}", id)))
    }

    /// Effective team lead of the task's assignee.
    async fn assignee_lead(&self, task: &Task) -> Result<Option<Uuid>> {
        let Some(assignee) = self.store.get_employee(task.assignee_id).await? else {
            return Ok(None);
        };
        let assignment = self.store.get_assignment(assignee.id).await?;
        Ok(team_lead_of(&assignee, assignment.as_ref()))
    }

    async fn subordinates(&self, root: Uuid) -> Result<HashSet<Uuid>> {
        let employees = self.store.list_employees().await?;
        let assignments = self.store.list_assignments().await?;
        Ok(subordinates_of(root, &employees, &assignments))
    }

    /// Commit `next` if nobody wrote since `expected` was read.
    async fn commit(&self, next: &mut Task, expected: u64) -> Result<bool> {
        next.revision = expected + 1;
        Ok(self.store.update_task_if_revision(next, expected).await?)
    }

    /// Explain a lost compare-and-set for an update.
    async fn lost_update(&self, id: Uuid) -> Error {
        match self.load(id).await {
            Ok(current) if current.status.is_final() => Error::AlreadyFinalized,
            Ok(_) => Error::Conflict(format!("Task {} was modified concurrently", id)),
            Err(e) => e,
        }
    }

    /// Explain a lost compare-and-set for an approval or rejection.
    async fn lost_finalization(&self, id: Uuid) -> Error {
        match self.load(id).await {
            Ok(current) if current.status != TaskStatus::PendingVerification => {
                Error::NotPendingVerification(current.status.to_string())
            }
            Ok(_) => Error::Conflict(format!("Task {} was modified concurrently", id)),
            Err(e) => e,
        }
    }

    /// Assign a new task.
    pub async fn create_task(&self, actor: &Employee, new: NewTask) -> Result<Task> {
        policy::create_task(actor).into_result()?;
        if self.store.get_employee(new.assignee_id).await?.is_none() {
            return Err(Error::NotFound(format!("Employee {}", new.assignee_id)));
        }

        let now = self.clock.now();
        let task = Task::new(actor.id, new, now)?;
        self.store.insert_task(&task).await?;
        tracing::info!(
            "Task {} assigned to {} by {}",
            task.id,
            task.assignee_id,
            actor.id
        );

        if task.assignee_id != actor.id {
            let message = format!("{} assigned you a new task: {}", actor.name, task.title);
            self.dispatcher
                .notify(
                    NotificationType::Info,
                    &[task.assignee_id],
                    task.assignee_id,
                    &message,
                    Some(task.id),
                    now,
                )
                .await;
        }
        Ok(task)
    }

    /// Apply a partial update: progress fields and/or detail fields.
    pub async fn update_task(&self, actor: &Employee, id: Uuid, patch: TaskPatch) -> Result<Task> {
        if !patch.touches_progress() && !patch.touches_details() {
            return Err(Error::Validation("update contains no changes".to_string()));
        }

        let task = self.load(id).await?;
        if patch.touches_details() {
            policy::edit_details(actor, &task).into_result()?;
        }
        if patch.touches_progress() {
            policy::report_progress(actor, &task).into_result()?;
        }

        let now = self.clock.now();
        let mut next = task.clone();
        if patch.touches_details() {
            next.apply_details(&patch, now)?;
        }
        let submitted = if patch.touches_progress() {
            next.apply_progress(patch.status, patch.progress, now)?
                .submitted_for_verification
        } else {
            false
        };

        if !self.commit(&mut next, task.revision).await? {
            return Err(self.lost_update(id).await);
        }
        tracing::debug!(
            "Task {} updated by {}: {} at {}%",
            id,
            actor.id,
            next.status,
            next.progress
        );

        if submitted {
            let message = format!(
                "\"{}\" was submitted for verification at {}%",
                next.title, next.progress
            );
            self.dispatcher.request_approval(&next, &message, now).await;
        }
        Ok(next)
    }

    pub async fn update_task_progress(
        &self,
        actor: &Employee,
        id: Uuid,
        status: Option<TaskStatus>,
        progress: Option<u8>,
    ) -> Result<Task> {
        self.update_task(
            actor,
            id,
            TaskPatch {
                status,
                progress,
                ..Default::default()
            },
        )
        .await
    }

    /// Grade a task awaiting verification.
    pub async fn approve_task(
        &self,
        actor: &Employee,
        id: Uuid,
        final_percentage: u8,
        comment: Option<&str>,
    ) -> Result<Task> {
        let task = self.load(id).await?;
        let lead = self.assignee_lead(&task).await?;
        policy::finalize(actor, &task, lead).into_result()?;

        let now = self.clock.now();
        let mut next = task.clone();
        next.approve(final_percentage, now)?;
        if let Some(text) = comment.filter(|c| !c.trim().is_empty()) {
            next.push_comment(actor.id, text, now)?;
        }

        if !self.commit(&mut next, task.revision).await? {
            return Err(self.lost_finalization(id).await);
        }
        tracing::info!(
            "Task {} approved by {} at {}% ({})",
            id,
            actor.id,
            final_percentage,
            next.status
        );

        self.dispatcher.clear_task_approvals(id).await;
        let message = format!(
            "\"{}\" was approved at {}% by {}",
            next.title, final_percentage, actor.name
        );
        self.dispatcher
            .notify(
                NotificationType::Info,
                &[next.assignee_id],
                next.assignee_id,
                &message,
                Some(id),
                now,
            )
            .await;
        Ok(next)
    }

    /// Reject a task awaiting verification. The task ends `NotCompleted`.
    pub async fn reject_task(
        &self,
        actor: &Employee,
        id: Uuid,
        reason: &str,
        final_percentage: Option<u8>,
    ) -> Result<Task> {
        let task = self.load(id).await?;
        let lead = self.assignee_lead(&task).await?;
        policy::finalize(actor, &task, lead).into_result()?;

        let now = self.clock.now();
        let mut next = task.clone();
        next.reject(reason, final_percentage, now)?;

        if !self.commit(&mut next, task.revision).await? {
            return Err(self.lost_finalization(id).await);
        }
        tracing::info!("Task {} rejected by {}", id, actor.id);

        self.dispatcher.clear_task_approvals(id).await;
        let message = format!(
            "\"{}\" was rejected by {}: {}",
            next.title, actor.name, next.rejection_reason
        );
        self.dispatcher
            .notify(
                NotificationType::Info,
                &[next.assignee_id],
                next.assignee_id,
                &message,
                Some(id),
                now,
            )
            .await;
        Ok(next)
    }

    /// Append a comment in any status and notify the other participants.
    pub async fn add_comment(&self, actor: &Employee, id: Uuid, text: &str) -> Result<Task> {
        let task = self.load(id).await?;
        let lead = self.assignee_lead(&task).await?;
        policy::comment(actor, &task, lead).into_result()?;

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("comment text is required".to_string()));
        }

        let now = self.clock.now();
        let comment = super::task::Comment {
            author_id: actor.id,
            text: text.to_string(),
            created_at: now,
        };
        let updated = self
            .store
            .append_comment(id, &comment)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Task {}", id)))?;

        let recipients = comment_recipients(&updated, lead, actor.id);
        let message = format!("{} commented on \"{}\": {}", actor.name, updated.title, text);
        self.dispatcher
            .notify(
                NotificationType::Info,
                &recipients,
                updated.assignee_id,
                &message,
                Some(id),
                now,
            )
            .await;
        Ok(updated)
    }

    pub async fn get_task(&self, actor: &Employee, id: Uuid) -> Result<Task> {
        let task = self.load(id).await?;
        let subordinates = if actor.is_admin()
            || actor.id == task.assignee_id
            || actor.id == task.assigner_id
        {
            HashSet::new()
        } else {
            self.subordinates(actor.id).await?
        };
        policy::view_task(actor, &task, &subordinates).into_result()?;
        Ok(task)
    }

    /// Tasks assigned to the actor, newest first.
    pub async fn my_tasks(&self, actor: &Employee) -> Result<Vec<Task>> {
        Ok(self.store.list_tasks(Some(std::slice::from_ref(&actor.id))).await?)
    }

    /// Tasks assigned to anyone below the actor in the hierarchy.
    pub async fn team_tasks(&self, actor: &Employee) -> Result<Vec<Task>> {
        policy::view_team(actor).into_result()?;
        let team: Vec<Uuid> = self.subordinates(actor.id).await?.into_iter().collect();
        if team.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.store.list_tasks(Some(&team)).await?)
    }
}
