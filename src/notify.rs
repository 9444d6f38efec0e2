//! Notifications and the dispatcher that fans them out.
//!
//! Delivery is best-effort: a failed insert is logged and never fails the
//! transition that triggered it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::roster::{team_lead_of, Assignment, Employee};
use crate::store::SharedStore;
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    /// Asks the recipient to verify a task. At most one batch per task.
    TaskApproval,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Info => "info",
            NotificationType::TaskApproval => "task_approval",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(NotificationType::Info),
            "task_approval" => Some(NotificationType::TaskApproval),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    /// Employee the notification is about
    pub subject_id: Uuid,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient_id: Uuid,
        subject_id: Uuid,
        message: impl Into<String>,
        kind: NotificationType,
        task_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id,
            subject_id,
            message: message.into(),
            kind,
            is_read: false,
            task_id,
            created_at: now,
        }
    }
}

/// Push `id` unless it is excluded or already present.
fn push_unique(out: &mut Vec<Uuid>, id: Uuid, exclude: Uuid) {
    if id != exclude && !out.contains(&id) {
        out.push(id);
    }
}

/// Assigner, the assignee's team lead and every admin, minus the assignee.
pub fn approver_recipients(
    task: &Task,
    employees: &[Employee],
    assignments: &[Assignment],
) -> Vec<Uuid> {
    let mut out = Vec::new();
    push_unique(&mut out, task.assigner_id, task.assignee_id);

    let bindings: HashMap<Uuid, &Assignment> =
        assignments.iter().map(|a| (a.employee_id, a)).collect();
    if let Some(assignee) = employees.iter().find(|e| e.id == task.assignee_id) {
        if let Some(lead) = team_lead_of(assignee, bindings.get(&assignee.id).copied()) {
            push_unique(&mut out, lead, task.assignee_id);
        }
    }

    for admin in employees.iter().filter(|e| e.is_admin()) {
        push_unique(&mut out, admin.id, task.assignee_id);
    }
    out
}

/// Assigner, assignee and the assignee's team lead, minus the author.
pub fn comment_recipients(task: &Task, assignee_lead: Option<Uuid>, author_id: Uuid) -> Vec<Uuid> {
    let mut out = Vec::new();
    push_unique(&mut out, task.assigner_id, author_id);
    push_unique(&mut out, task.assignee_id, author_id);
    if let Some(lead) = assignee_lead {
        push_unique(&mut out, lead, author_id);
    }
    out
}

/// Inserts notification batches with per-task approval deduplication.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: SharedStore,
}

impl NotificationDispatcher {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Insert one notification per recipient. Returns how many were stored.
    ///
    /// A `TaskApproval` batch is skipped entirely while an earlier batch for
    /// the same task is still unresolved.
    pub async fn notify(
        &self,
        kind: NotificationType,
        recipients: &[Uuid],
        subject_id: Uuid,
        message: &str,
        task_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> usize {
        if recipients.is_empty() {
            return 0;
        }

        if let (NotificationType::TaskApproval, Some(task_id)) = (kind, task_id) {
            match self.store.has_task_approval(task_id).await {
                Ok(true) => {
                    tracing::debug!("Approval request for task {} already pending, skipping", task_id);
                    return 0;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Failed to check pending approvals for task {}: {}", task_id, e);
                    return 0;
                }
            }
        }

        let batch: Vec<Notification> = recipients
            .iter()
            .map(|recipient| Notification::new(*recipient, subject_id, message, kind, task_id, now))
            .collect();

        match self.store.insert_notifications(&batch).await {
            Ok(results) => {
                let mut stored = 0;
                for (notification, result) in batch.iter().zip(results) {
                    match result {
                        Ok(()) => stored += 1,
                        Err(e) => tracing::warn!(
                            "Failed to notify {} ({}): {}",
                            notification.recipient_id,
                            kind.as_str(),
                            e
                        ),
                    }
                }
                stored
            }
            Err(e) => {
                tracing::warn!("Failed to insert {} notifications: {}", kind.as_str(), e);
                0
            }
        }
    }

    /// Ask the task's approvers to verify it.
    ///
    /// If the task was finalized while the batch was being inserted, the
    /// batch is cleared again so it never outlives the verification.
    pub async fn request_approval(&self, task: &Task, message: &str, now: DateTime<Utc>) -> usize {
        let recipients = match self.load_roster().await {
            Ok((employees, assignments)) => approver_recipients(task, &employees, &assignments),
            Err(e) => {
                tracing::warn!("Failed to resolve approvers for task {}: {}", task.id, e);
                return 0;
            }
        };
        let stored = self
            .notify(
                NotificationType::TaskApproval,
                &recipients,
                task.assignee_id,
                message,
                Some(task.id),
                now,
            )
            .await;
        if stored == 0 {
            return 0;
        }

        match self.store.get_task(task.id).await {
            Ok(Some(current)) if current.status == TaskStatus::PendingVerification => stored,
            Ok(_) => {
                tracing::debug!("Task {} finalized during approval request, clearing", task.id);
                self.clear_task_approvals(task.id).await;
                0
            }
            Err(e) => {
                tracing::warn!("Failed to re-check task {} after approval request: {}", task.id, e);
                stored
            }
        }
    }

    /// Resolve the approval batch of a finalized task.
    pub async fn clear_task_approvals(&self, task_id: Uuid) -> usize {
        match self.store.delete_task_approvals(task_id).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Failed to clear approval requests for task {}: {}", task_id, e);
                0
            }
        }
    }

    async fn load_roster(&self) -> Result<(Vec<Employee>, Vec<Assignment>), String> {
        let employees = self.store.list_employees().await?;
        let assignments = self.store.list_assignments().await?;
        Ok((employees, assignments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Capabilities, Role};
    use crate::store::InMemoryStore;
    use crate::task::NewTask;
    use std::sync::Arc;

    fn employee(role: Role, team_lead: Option<Uuid>) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            name: "staff".into(),
            role,
            capabilities: Capabilities::default(),
            team_lead,
        }
    }

    fn task(assigner: Uuid, assignee: Uuid) -> Task {
        Task::new(
            assigner,
            NewTask {
                assignee_id: assignee,
                title: "Quarterly audit".into(),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_approver_recipients_exclude_assignee() {
        let lead = employee(Role::Ordinary, None);
        let admin = employee(Role::Admin, None);
        let assignee = employee(Role::Admin, Some(lead.id));
        let assigner = employee(Role::Ordinary, None);
        let employees = vec![lead.clone(), admin.clone(), assignee.clone(), assigner.clone()];

        let recipients = approver_recipients(&task(assigner.id, assignee.id), &employees, &[]);
        assert_eq!(recipients, vec![assigner.id, lead.id, admin.id]);
    }

    #[test]
    fn test_approver_recipients_deduplicate_lead_and_assigner() {
        let lead = employee(Role::Admin, None);
        let assignee = employee(Role::Ordinary, Some(lead.id));
        let employees = vec![lead.clone(), assignee.clone()];

        let recipients = approver_recipients(&task(lead.id, assignee.id), &employees, &[]);
        assert_eq!(recipients, vec![lead.id]);
    }

    #[test]
    fn test_comment_recipients_exclude_author() {
        let assigner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let lead = Uuid::new_v4();
        let t = task(assigner, assignee);

        assert_eq!(comment_recipients(&t, Some(lead), assignee), vec![assigner, lead]);
        assert_eq!(comment_recipients(&t, None, lead), vec![assigner, assignee]);
    }

    #[tokio::test]
    async fn test_second_approval_batch_is_skipped_until_cleared() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let dispatcher = NotificationDispatcher::new(store.clone());
        let task_id = Uuid::new_v4();
        let subject = Uuid::new_v4();
        let recipients = [Uuid::new_v4(), Uuid::new_v4()];

        let first = dispatcher
            .notify(NotificationType::TaskApproval, &recipients, subject, "verify", Some(task_id), Utc::now())
            .await;
        let second = dispatcher
            .notify(NotificationType::TaskApproval, &recipients, subject, "verify", Some(task_id), Utc::now())
            .await;
        assert_eq!(first, 2);
        assert_eq!(second, 0);

        assert_eq!(dispatcher.clear_task_approvals(task_id).await, 2);
        let third = dispatcher
            .notify(NotificationType::TaskApproval, &recipients, subject, "verify", Some(task_id), Utc::now())
            .await;
        assert_eq!(third, 2);
    }

    #[tokio::test]
    async fn test_approval_request_for_task_finalized_meanwhile_is_cleared() {
        let assigner = employee(Role::Admin, None);
        let assignee = employee(Role::Ordinary, Some(assigner.id));
        let store: SharedStore = Arc::new(InMemoryStore::new());
        store.upsert_employee(&assigner).await.unwrap();
        store.upsert_employee(&assignee).await.unwrap();

        let mut awaiting = task(assigner.id, assignee.id);
        awaiting.apply_progress(None, Some(100), Utc::now()).unwrap();
        let mut finalized = awaiting.clone();
        finalized.approve(100, Utc::now()).unwrap();
        store.insert_task(&finalized).await.unwrap();

        let dispatcher = NotificationDispatcher::new(store.clone());
        assert_eq!(dispatcher.request_approval(&awaiting, "verify", Utc::now()).await, 0);
        assert!(!store.has_task_approval(awaiting.id).await.unwrap());
        assert!(store.list_notifications(assigner.id, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_approval_request_for_awaiting_task_is_kept() {
        let assigner = employee(Role::Admin, None);
        let assignee = employee(Role::Ordinary, Some(assigner.id));
        let store: SharedStore = Arc::new(InMemoryStore::new());
        store.upsert_employee(&assigner).await.unwrap();
        store.upsert_employee(&assignee).await.unwrap();

        let mut awaiting = task(assigner.id, assignee.id);
        awaiting.apply_progress(None, Some(100), Utc::now()).unwrap();
        store.insert_task(&awaiting).await.unwrap();

        let dispatcher = NotificationDispatcher::new(store.clone());
        assert_eq!(dispatcher.request_approval(&awaiting, "verify", Utc::now()).await, 1);
        assert!(store.has_task_approval(awaiting.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_info_notifications_are_not_deduplicated() {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let dispatcher = NotificationDispatcher::new(store.clone());
        let recipient = Uuid::new_v4();
        let task_id = Some(Uuid::new_v4());

        for _ in 0..2 {
            dispatcher
                .notify(NotificationType::Info, &[recipient], recipient, "comment", task_id, Utc::now())
                .await;
        }
        assert_eq!(store.list_notifications(recipient, false).await.unwrap().len(), 2);
    }
}
