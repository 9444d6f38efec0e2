//! In-memory store with injectable write failures.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::{InMemoryStore, Store};
use crate::attendance::{Holiday, Leave, Report};
use crate::notify::Notification;
use crate::roster::{Assignment, Employee};
use crate::task::{Comment, Task};

#[derive(Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    notifications_down: bool,
    broken_tasks: Vec<Uuid>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification write and approval lookup fails.
    pub fn with_notifications_down(mut self) -> Self {
        self.notifications_down = true;
        self
    }

    /// `mark_past_due` fails for this task.
    pub fn with_broken_task(mut self, id: Uuid) -> Self {
        self.broken_tasks.push(id);
        self
    }

    fn notifications(&self) -> Result<(), String> {
        if self.notifications_down {
            Err("notifications table unavailable".to_string())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Store for FaultyStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list_employees(&self) -> Result<Vec<Employee>, String> {
        self.inner.list_employees().await
    }

    async fn get_employee(&self, id: Uuid) -> Result<Option<Employee>, String> {
        self.inner.get_employee(id).await
    }

    async fn upsert_employee(&self, employee: &Employee) -> Result<(), String> {
        self.inner.upsert_employee(employee).await
    }

    async fn list_assignments(&self) -> Result<Vec<Assignment>, String> {
        self.inner.list_assignments().await
    }

    async fn get_assignment(&self, employee_id: Uuid) -> Result<Option<Assignment>, String> {
        self.inner.get_assignment(employee_id).await
    }

    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), String> {
        self.inner.upsert_assignment(assignment).await
    }

    async fn insert_task(&self, task: &Task) -> Result<(), String> {
        self.inner.insert_task(task).await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, String> {
        self.inner.get_task(id).await
    }

    async fn list_tasks(&self, assignees: Option<&[Uuid]>) -> Result<Vec<Task>, String> {
        self.inner.list_tasks(assignees).await
    }

    async fn update_task_if_revision(
        &self,
        task: &Task,
        expected_revision: u64,
    ) -> Result<bool, String> {
        self.inner.update_task_if_revision(task, expected_revision).await
    }

    async fn find_past_due_tasks(&self, today: NaiveDate) -> Result<Vec<Task>, String> {
        self.inner.find_past_due_tasks(today).await
    }

    async fn mark_past_due(
        &self,
        id: Uuid,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, String> {
        if self.broken_tasks.contains(&id) {
            return Err(format!("row {} is corrupt", id));
        }
        self.inner.mark_past_due(id, today, now).await
    }

    async fn append_comment(&self, id: Uuid, comment: &Comment) -> Result<Option<Task>, String> {
        self.inner.append_comment(id, comment).await
    }

    async fn get_report(
        &self,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Report>, String> {
        self.inner.get_report(employee_id, date).await
    }

    async fn save_report_if_draft(&self, report: &Report) -> Result<bool, String> {
        self.inner.save_report_if_draft(report).await
    }

    async fn list_reports(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Report>, String> {
        self.inner.list_reports(employee_id, from, to).await
    }

    async fn upsert_leave(&self, leave: &Leave) -> Result<(), String> {
        self.inner.upsert_leave(leave).await
    }

    async fn list_leaves(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Leave>, String> {
        self.inner.list_leaves(employee_id, from, to).await
    }

    async fn upsert_holiday(&self, holiday: &Holiday) -> Result<(), String> {
        self.inner.upsert_holiday(holiday).await
    }

    async fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Holiday>, String> {
        self.inner.list_holidays(from, to).await
    }

    async fn insert_notifications(
        &self,
        notifications: &[Notification],
    ) -> Result<Vec<Result<(), String>>, String> {
        self.notifications()?;
        self.inner.insert_notifications(notifications).await
    }

    async fn has_task_approval(&self, task_id: Uuid) -> Result<bool, String> {
        self.notifications()?;
        self.inner.has_task_approval(task_id).await
    }

    async fn delete_task_approvals(&self, task_id: Uuid) -> Result<usize, String> {
        self.notifications()?;
        self.inner.delete_task_approvals(task_id).await
    }

    async fn list_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, String> {
        self.inner.list_notifications(recipient_id, unread_only).await
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, String> {
        self.inner.mark_notification_read(id, recipient_id).await
    }
}
