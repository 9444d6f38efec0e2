//! In-memory store (non-persistent).
//!
//! A single write lock per collection makes every conditional update atomic.

use super::Store;
use crate::attendance::{Holiday, Leave, Report};
use crate::notify::{Notification, NotificationType};
use crate::roster::{Assignment, Employee};
use crate::task::{Comment, Task, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    employees: Arc<RwLock<HashMap<Uuid, Employee>>>,
    assignments: Arc<RwLock<HashMap<Uuid, Assignment>>>,
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
    reports: Arc<RwLock<HashMap<(Uuid, NaiveDate), Report>>>,
    leaves: Arc<RwLock<HashMap<(Uuid, NaiveDate), Leave>>>,
    holidays: Arc<RwLock<BTreeMap<NaiveDate, Holiday>>>,
    notifications: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list_employees(&self) -> Result<Vec<Employee>, String> {
        let mut employees: Vec<Employee> = self.employees.read().await.values().cloned().collect();
        employees.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(employees)
    }

    async fn get_employee(&self, id: Uuid) -> Result<Option<Employee>, String> {
        Ok(self.employees.read().await.get(&id).cloned())
    }

    async fn upsert_employee(&self, employee: &Employee) -> Result<(), String> {
        self.employees
            .write()
            .await
            .insert(employee.id, employee.clone());
        Ok(())
    }

    async fn list_assignments(&self) -> Result<Vec<Assignment>, String> {
        Ok(self.assignments.read().await.values().cloned().collect())
    }

    async fn get_assignment(&self, employee_id: Uuid) -> Result<Option<Assignment>, String> {
        Ok(self.assignments.read().await.get(&employee_id).cloned())
    }

    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), String> {
        self.assignments
            .write()
            .await
            .insert(assignment.employee_id, assignment.clone());
        Ok(())
    }

    async fn insert_task(&self, task: &Task) -> Result<(), String> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(format!("Task {} already exists", task.id));
        }
        tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, String> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn list_tasks(&self, assignees: Option<&[Uuid]>) -> Result<Vec<Task>, String> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| assignees.map(|ids| ids.contains(&t.assignee_id)).unwrap_or(true))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn update_task_if_revision(
        &self,
        task: &Task,
        expected_revision: u64,
    ) -> Result<bool, String> {
        let mut tasks = self.tasks.write().await;
        let Some(stored) = tasks.get_mut(&task.id) else {
            return Ok(false);
        };
        if stored.revision != expected_revision {
            return Ok(false);
        }
        *stored = task.clone();
        Ok(true)
    }

    async fn find_past_due_tasks(&self, today: NaiveDate) -> Result<Vec<Task>, String> {
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.is_past_due(today))
            .cloned()
            .collect())
    }

    async fn mark_past_due(
        &self,
        id: Uuid,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, String> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(&id) else {
            return Ok(None);
        };
        if !task.is_past_due(today) {
            return Ok(None);
        }
        task.status = TaskStatus::PendingVerification;
        task.submitted_for_verification_date = Some(now);
        task.updated_at = now;
        task.revision += 1;
        Ok(Some(task.clone()))
    }

    async fn append_comment(&self, id: Uuid, comment: &Comment) -> Result<Option<Task>, String> {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(&id) else {
            return Ok(None);
        };
        task.comments.push(comment.clone());
        task.updated_at = comment.created_at;
        task.revision += 1;
        Ok(Some(task.clone()))
    }

    async fn get_report(
        &self,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Report>, String> {
        Ok(self.reports.read().await.get(&(employee_id, date)).cloned())
    }

    async fn save_report_if_draft(&self, report: &Report) -> Result<bool, String> {
        let mut reports = self.reports.write().await;
        let key = (report.employee_id, report.date);
        if reports.get(&key).map(|r| r.is_submitted()).unwrap_or(false) {
            return Ok(false);
        }
        reports.insert(key, report.clone());
        Ok(true)
    }

    async fn list_reports(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Report>, String> {
        let mut reports: Vec<Report> = self
            .reports
            .read()
            .await
            .values()
            .filter(|r| r.employee_id == employee_id && r.date >= from && r.date <= to)
            .cloned()
            .collect();
        reports.sort_by_key(|r| r.date);
        Ok(reports)
    }

    async fn upsert_leave(&self, leave: &Leave) -> Result<(), String> {
        self.leaves
            .write()
            .await
            .insert((leave.employee_id, leave.date), leave.clone());
        Ok(())
    }

    async fn list_leaves(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Leave>, String> {
        let mut leaves: Vec<Leave> = self
            .leaves
            .read()
            .await
            .values()
            .filter(|l| l.employee_id == employee_id && l.date >= from && l.date <= to)
            .cloned()
            .collect();
        leaves.sort_by_key(|l| l.date);
        Ok(leaves)
    }

    async fn upsert_holiday(&self, holiday: &Holiday) -> Result<(), String> {
        self.holidays
            .write()
            .await
            .insert(holiday.date, holiday.clone());
        Ok(())
    }

    async fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Holiday>, String> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self
            .holidays
            .read()
            .await
            .range(from..=to)
            .map(|(_, h)| h.clone())
            .collect())
    }

    async fn insert_notifications(
        &self,
        notifications: &[Notification],
    ) -> Result<Vec<Result<(), String>>, String> {
        let mut stored = self.notifications.write().await;
        let mut results = Vec::with_capacity(notifications.len());
        for n in notifications {
            let duplicate = n.kind == NotificationType::TaskApproval
                && stored.iter().any(|existing| {
                    existing.kind == NotificationType::TaskApproval
                        && existing.recipient_id == n.recipient_id
                        && existing.task_id == n.task_id
                });
            if duplicate || stored.iter().any(|existing| existing.id == n.id) {
                results.push(Err(format!(
                    "duplicate notification for recipient {}",
                    n.recipient_id
                )));
                continue;
            }
            stored.push(n.clone());
            results.push(Ok(()));
        }
        Ok(results)
    }

    async fn has_task_approval(&self, task_id: Uuid) -> Result<bool, String> {
        Ok(self
            .notifications
            .read()
            .await
            .iter()
            .any(|n| n.kind == NotificationType::TaskApproval && n.task_id == Some(task_id)))
    }

    async fn delete_task_approvals(&self, task_id: Uuid) -> Result<usize, String> {
        let mut stored = self.notifications.write().await;
        let before = stored.len();
        stored.retain(|n| !(n.kind == NotificationType::TaskApproval && n.task_id == Some(task_id)));
        Ok(before - stored.len())
    }

    async fn list_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, String> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .read()
            .await
            .iter()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, String> {
        let mut stored = self.notifications.write().await;
        match stored
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
        {
            Some(n) => {
                n.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
