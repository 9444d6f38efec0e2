//! Persistence with pluggable backends.
//!
//! Supports:
//! - `memory`: In-memory storage (non-persistent, for testing)
//! - `sqlite`: SQLite database
//!
//! Backends must provide atomic conditional writes (`update_task_if_revision`,
//! `mark_past_due`, `save_report_if_draft`) and per-row notification inserts;
//! the engine holds no locks of its own.

#[cfg(test)]
mod faulty;
mod memory;
mod sqlite;

#[cfg(test)]
pub(crate) use faulty::FaultyStore;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::attendance::{Holiday, Leave, Report};
use crate::notify::Notification;
use crate::roster::{Assignment, Employee};
use crate::task::{Comment, Task};

/// Store trait - implemented by all storage backends.
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether this store persists data across restarts.
    fn is_persistent(&self) -> bool;

    // === Roster ===

    async fn list_employees(&self) -> Result<Vec<Employee>, String>;

    async fn get_employee(&self, id: Uuid) -> Result<Option<Employee>, String>;

    async fn upsert_employee(&self, employee: &Employee) -> Result<(), String>;

    async fn list_assignments(&self) -> Result<Vec<Assignment>, String>;

    async fn get_assignment(&self, employee_id: Uuid) -> Result<Option<Assignment>, String>;

    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), String>;

    // === Tasks ===

    async fn insert_task(&self, task: &Task) -> Result<(), String>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, String>;

    /// Tasks assigned to any of `assignees`, or every task when `None`.
    /// Ordered by creation time, newest first.
    async fn list_tasks(&self, assignees: Option<&[Uuid]>) -> Result<Vec<Task>, String>;

    /// Replace a task only if the stored revision equals `expected_revision`.
    ///
    /// Returns `false` when another writer got there first.
    async fn update_task_if_revision(
        &self,
        task: &Task,
        expected_revision: u64,
    ) -> Result<bool, String>;

    /// Open, unrejected tasks whose due date is before `today`.
    async fn find_past_due_tasks(&self, today: NaiveDate) -> Result<Vec<Task>, String>;

    /// Atomically move a past-due task to `PendingVerification`.
    ///
    /// The sweep predicate is re-evaluated at write time. Returns the updated
    /// task only for the caller whose write matched; everyone else gets `None`.
    async fn mark_past_due(
        &self,
        id: Uuid,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, String>;

    /// Append a comment regardless of status. `None` if the task is missing.
    async fn append_comment(&self, id: Uuid, comment: &Comment) -> Result<Option<Task>, String>;

    // === Reports, leave, holidays ===

    async fn get_report(&self, employee_id: Uuid, date: NaiveDate)
        -> Result<Option<Report>, String>;

    /// Insert or replace a report unless the stored one is already submitted.
    ///
    /// Returns `false` when the stored report is submitted.
    async fn save_report_if_draft(&self, report: &Report) -> Result<bool, String>;

    async fn list_reports(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Report>, String>;

    async fn upsert_leave(&self, leave: &Leave) -> Result<(), String>;

    async fn list_leaves(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Leave>, String>;

    async fn upsert_holiday(&self, holiday: &Holiday) -> Result<(), String>;

    async fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Holiday>, String>;

    // === Notifications ===

    /// Insert each notification independently.
    ///
    /// The result vector is parallel to the input; a unique-key violation on
    /// one row never prevents the others from being stored.
    async fn insert_notifications(
        &self,
        notifications: &[Notification],
    ) -> Result<Vec<Result<(), String>>, String>;

    /// Whether an unresolved `task_approval` notification exists for the task.
    async fn has_task_approval(&self, task_id: Uuid) -> Result<bool, String>;

    /// Delete every `task_approval` notification tied to the task.
    async fn delete_task_approvals(&self, task_id: Uuid) -> Result<usize, String>;

    async fn list_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, String>;

    /// Mark read if owned by `recipient_id`. Returns `false` otherwise.
    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, String>;
}

pub type SharedStore = Arc<dyn Store>;

/// Store type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreType {
    Memory,
    #[default]
    Sqlite,
}

impl StoreType {
    /// Parse from environment variable value.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a store based on type and configuration.
pub async fn create_store(store_type: StoreType, data_dir: PathBuf) -> Result<SharedStore, String> {
    match store_type {
        StoreType::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreType::Sqlite => {
            let store = SqliteStore::new(data_dir).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotificationType;
    use crate::task::{NewTask, TaskStatus};
    use chrono::TimeZone;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 6, 0, 0).unwrap()
    }

    fn overdue_task() -> Task {
        Task::new(
            Uuid::new_v4(),
            NewTask {
                assignee_id: Uuid::new_v4(),
                title: "File expense claims".into(),
                due_date: Some(date(10)),
                ..Default::default()
            },
            Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn approval(recipient: Uuid, task_id: Uuid) -> Notification {
        Notification::new(
            recipient,
            recipient,
            "awaiting verification",
            NotificationType::TaskApproval,
            Some(task_id),
            now(),
        )
    }

    async fn stores() -> Vec<(SharedStore, tempfile::TempDir)> {
        let dir = tempfile::tempdir().unwrap();
        let sqlite: SharedStore = Arc::new(SqliteStore::new(dir.path().to_path_buf()).await.unwrap());
        let memory: SharedStore = Arc::new(InMemoryStore::new());
        vec![(memory, tempfile::tempdir().unwrap()), (sqlite, dir)]
    }

    #[test]
    fn test_store_type_parse() {
        assert_eq!(StoreType::from_str("memory"), StoreType::Memory);
        assert_eq!(StoreType::from_str("SQLite"), StoreType::Sqlite);
        assert_eq!(StoreType::from_str("unknown"), StoreType::Sqlite);
    }

    #[tokio::test]
    async fn test_task_round_trip_and_revision_guard() {
        for (store, _dir) in stores().await {
            let mut task = overdue_task();
            store.insert_task(&task).await.unwrap();
            assert_eq!(store.get_task(task.id).await.unwrap(), Some(task.clone()));

            task.apply_progress(None, Some(30), now()).unwrap();
            task.revision = 1;
            assert!(store.update_task_if_revision(&task, 0).await.unwrap());

            // stale writer still thinks revision is 0
            let mut stale = task.clone();
            stale.progress = 90;
            stale.revision = 1;
            assert!(!store.update_task_if_revision(&stale, 0).await.unwrap());

            let stored = store.get_task(task.id).await.unwrap().unwrap();
            assert_eq!(stored.progress, 30);
            assert_eq!(stored.status, TaskStatus::InProgress);
            assert_eq!(stored.revision, 1);
        }
    }

    #[tokio::test]
    async fn test_mark_past_due_wins_once() {
        for (store, _dir) in stores().await {
            let task = overdue_task();
            store.insert_task(&task).await.unwrap();

            let candidates = store.find_past_due_tasks(date(14)).await.unwrap();
            assert_eq!(candidates.len(), 1);

            let first = store.mark_past_due(task.id, date(14), now()).await.unwrap();
            let second = store.mark_past_due(task.id, date(14), now()).await.unwrap();

            let first = first.expect("first sweep should win");
            assert_eq!(first.status, TaskStatus::PendingVerification);
            assert_eq!(first.submitted_for_verification_date, Some(now()));
            assert_eq!(first.revision, task.revision + 1);
            assert!(second.is_none());
            assert!(store.find_past_due_tasks(date(14)).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_mark_past_due_skips_rejected_and_not_due() {
        for (store, _dir) in stores().await {
            let mut rejected = overdue_task();
            rejected.rejection_reason = "incomplete".into();
            store.insert_task(&rejected).await.unwrap();

            let not_due = overdue_task();
            store.insert_task(&not_due).await.unwrap();

            assert!(store
                .mark_past_due(rejected.id, date(14), now())
                .await
                .unwrap()
                .is_none());
            assert!(store
                .mark_past_due(not_due.id, date(10), now())
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn test_append_comment_on_finalized_task() {
        for (store, _dir) in stores().await {
            let mut task = overdue_task();
            task.apply_progress(None, Some(100), now()).unwrap();
            task.approve(100, now()).unwrap();
            store.insert_task(&task).await.unwrap();

            let comment = Comment {
                author_id: task.assigner_id,
                text: "archived".into(),
                created_at: now(),
            };
            let updated = store.append_comment(task.id, &comment).await.unwrap().unwrap();
            assert_eq!(updated.comments, vec![comment]);
            assert_eq!(updated.status, TaskStatus::Completed);

            assert!(store
                .append_comment(Uuid::new_v4(), &updated.comments[0])
                .await
                .unwrap()
                .is_none());
        }
    }

    #[tokio::test]
    async fn test_notification_batch_tolerates_duplicates() {
        for (store, _dir) in stores().await {
            let task_id = Uuid::new_v4();
            let a = Uuid::new_v4();
            let b = Uuid::new_v4();

            let results = store
                .insert_notifications(&[approval(a, task_id)])
                .await
                .unwrap();
            assert!(results[0].is_ok());

            // a conflicts, b is new
            let results = store
                .insert_notifications(&[approval(a, task_id), approval(b, task_id)])
                .await
                .unwrap();
            assert!(results[0].is_err());
            assert!(results[1].is_ok());

            assert_eq!(store.list_notifications(a, false).await.unwrap().len(), 1);
            assert_eq!(store.list_notifications(b, false).await.unwrap().len(), 1);
            assert!(store.has_task_approval(task_id).await.unwrap());

            assert_eq!(store.delete_task_approvals(task_id).await.unwrap(), 2);
            assert!(!store.has_task_approval(task_id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_mark_notification_read_checks_recipient() {
        for (store, _dir) in stores().await {
            let owner = Uuid::new_v4();
            let n = Notification::new(owner, owner, "hello", NotificationType::Info, None, now());
            store.insert_notifications(&[n.clone()]).await.unwrap();

            assert!(!store.mark_notification_read(n.id, Uuid::new_v4()).await.unwrap());
            assert!(store.mark_notification_read(n.id, owner).await.unwrap());
            assert!(store.list_notifications(owner, true).await.unwrap().is_empty());
            assert_eq!(store.list_notifications(owner, false).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_submitted_report_is_locked() {
        use crate::attendance::{ReportEntry, ReportStatus};

        for (store, _dir) in stores().await {
            let employee = Uuid::new_v4();
            let mut report = Report {
                id: Uuid::new_v4(),
                employee_id: employee,
                date: date(14),
                status: ReportStatus::Draft,
                entries: vec![ReportEntry {
                    task_id: Uuid::new_v4(),
                    completion_percent: 20,
                }],
                updated_at: now(),
                submitted_at: None,
            };
            assert!(store.save_report_if_draft(&report).await.unwrap());

            report.status = ReportStatus::Submitted;
            report.submitted_at = Some(now());
            assert!(store.save_report_if_draft(&report).await.unwrap());

            report.status = ReportStatus::Draft;
            assert!(!store.save_report_if_draft(&report).await.unwrap());

            let stored = store.get_report(employee, date(14)).await.unwrap().unwrap();
            assert_eq!(stored.status, ReportStatus::Submitted);
            assert_eq!(
                store.list_reports(employee, date(1), date(31)).await.unwrap().len(),
                1
            );
        }
    }

    #[tokio::test]
    async fn test_leave_and_holiday_upserts_are_unique_per_day() {
        use crate::attendance::LeaveStatus;

        for (store, _dir) in stores().await {
            let employee = Uuid::new_v4();
            let mut leave = Leave {
                employee_id: employee,
                date: date(5),
                status: LeaveStatus::Requested,
            };
            store.upsert_leave(&leave).await.unwrap();
            leave.status = LeaveStatus::Approved;
            store.upsert_leave(&leave).await.unwrap();

            let leaves = store.list_leaves(employee, date(1), date(31)).await.unwrap();
            assert_eq!(leaves, vec![leave]);

            store
                .upsert_holiday(&Holiday { date: date(8), name: "Spring".into() })
                .await
                .unwrap();
            store
                .upsert_holiday(&Holiday { date: date(8), name: "Spring Day".into() })
                .await
                .unwrap();
            let holidays = store.list_holidays(date(1), date(31)).await.unwrap();
            assert_eq!(holidays.len(), 1);
            assert_eq!(holidays[0].name, "Spring Day");
            assert!(store.list_holidays(date(9), date(31)).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_roster_upserts() {
        use crate::roster::{Capabilities, Role};

        for (store, _dir) in stores().await {
            let lead = Uuid::new_v4();
            let mut employee = Employee {
                id: Uuid::new_v4(),
                name: "Nils".into(),
                role: Role::Ordinary,
                capabilities: Capabilities::default(),
                team_lead: None,
            };
            store.upsert_employee(&employee).await.unwrap();
            employee.capabilities.can_view_team = true;
            employee.team_lead = Some(lead);
            store.upsert_employee(&employee).await.unwrap();

            assert_eq!(store.list_employees().await.unwrap(), vec![employee.clone()]);
            assert_eq!(store.get_employee(employee.id).await.unwrap(), Some(employee.clone()));

            let assignment = Assignment {
                employee_id: employee.id,
                department: Some("Finance".into()),
                team_lead: Some(lead),
            };
            store.upsert_assignment(&assignment).await.unwrap();
            assert_eq!(store.get_assignment(employee.id).await.unwrap(), Some(assignment.clone()));
            assert_eq!(store.list_assignments().await.unwrap(), vec![assignment]);
        }
    }
}
