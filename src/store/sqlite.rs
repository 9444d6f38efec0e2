//! SQLite-based store.

use super::Store;
use crate::attendance::{Holiday, Leave, LeaveStatus, Report, ReportStatus};
use crate::notify::{Notification, NotificationType};
use crate::roster::{Assignment, Employee, Role};
use crate::task::{Comment, CompletionCategory, Priority, Task, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS employees (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'ordinary',
    capabilities TEXT NOT NULL DEFAULT '{}',
    team_lead TEXT
);

CREATE TABLE IF NOT EXISTS assignments (
    employee_id TEXT PRIMARY KEY NOT NULL,
    department TEXT,
    team_lead TEXT
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    assignee_id TEXT NOT NULL,
    assigner_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    progress INTEGER NOT NULL DEFAULT 0,
    priority TEXT NOT NULL DEFAULT 'medium',
    start_date TEXT,
    due_date TEXT,
    completion_date TEXT,
    submitted_for_verification_date TEXT,
    rejection_reason TEXT NOT NULL DEFAULT '',
    completion_category TEXT,
    comments TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status_due ON tasks(status, due_date);

CREATE TABLE IF NOT EXISTS reports (
    id TEXT PRIMARY KEY NOT NULL,
    employee_id TEXT NOT NULL,
    date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    entries TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL,
    submitted_at TEXT,
    UNIQUE (employee_id, date)
);

CREATE TABLE IF NOT EXISTS leaves (
    employee_id TEXT NOT NULL,
    date TEXT NOT NULL,
    status TEXT NOT NULL,
    PRIMARY KEY (employee_id, date)
);

CREATE TABLE IF NOT EXISTS holidays (
    date TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY NOT NULL,
    recipient_id TEXT NOT NULL,
    subject_id TEXT NOT NULL,
    message TEXT NOT NULL,
    type TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    task_id TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient ON notifications(recipient_id, created_at DESC);
CREATE UNIQUE INDEX IF NOT EXISTS idx_notifications_task_approval
    ON notifications(recipient_id, task_id) WHERE type = 'task_approval';
"#;

const TASK_COLUMNS: &str = "id, title, description, assignee_id, assigner_id, status, progress,
    priority, start_date, due_date, completion_date, submitted_for_verification_date,
    rejection_reason, completion_category, comments, created_at, updated_at, revision";

const REPORT_COLUMNS: &str = "id, employee_id, date, status, entries, updated_at, submitted_at";

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, subject_id, message, type, is_read, task_id, created_at";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self, String> {
        let db_path = data_dir.join("taskledger.db");

        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| format!("Failed to create data dir: {}", e))?;

        // Open database in blocking task
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)
                .map_err(|e| format!("Failed to open SQLite database: {}", e))?;

            conn.execute_batch(SCHEMA)
                .map_err(|e| format!("Failed to run schema: {}", e))?;

            Ok::<_, String>(conn)
        })
        .await
        .map_err(|e| format!("Task join error: {}", e))??;

        tracing::info!("SQLite store ready in {}", data_dir.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, String>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, String> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(|e| e.to_string())?
    }
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_default()
}

fn parse_opt_uuid(s: Option<String>) -> Option<Uuid> {
    s.and_then(|s| Uuid::parse_str(&s).ok())
}

fn role_to_string(role: Role) -> &'static str {
    match role {
        Role::Ordinary => "ordinary",
        Role::Admin => "admin",
    }
}

fn parse_role(s: &str) -> Role {
    match s {
        "admin" => Role::Admin,
        _ => Role::Ordinary,
    }
}

fn row_to_employee(row: &rusqlite::Row<'_>) -> rusqlite::Result<Employee> {
    let id: String = row.get(0)?;
    let role: String = row.get(2)?;
    let capabilities: String = row.get(3)?;
    Ok(Employee {
        id: parse_uuid(&id),
        name: row.get(1)?,
        role: parse_role(&role),
        capabilities: serde_json::from_str(&capabilities).unwrap_or_default(),
        team_lead: parse_opt_uuid(row.get(4)?),
    })
}

fn row_to_assignment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assignment> {
    let employee_id: String = row.get(0)?;
    Ok(Assignment {
        employee_id: parse_uuid(&employee_id),
        department: row.get(1)?,
        team_lead: parse_opt_uuid(row.get(2)?),
    })
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let assignee_id: String = row.get(3)?;
    let assigner_id: String = row.get(4)?;
    let status: String = row.get(5)?;
    let priority: String = row.get(7)?;
    let category: Option<String> = row.get(13)?;
    let comments: String = row.get(14)?;
    let revision: i64 = row.get(17)?;

    Ok(Task {
        id: parse_uuid(&id),
        title: row.get(1)?,
        description: row.get(2)?,
        assignee_id: parse_uuid(&assignee_id),
        assigner_id: parse_uuid(&assigner_id),
        status: TaskStatus::parse(&status).unwrap_or(TaskStatus::Pending),
        progress: row.get(6)?,
        priority: Priority::parse(&priority).unwrap_or_default(),
        start_date: row.get(8)?,
        due_date: row.get(9)?,
        completion_date: row.get(10)?,
        submitted_for_verification_date: row.get(11)?,
        rejection_reason: row.get(12)?,
        completion_category: category.and_then(|c| CompletionCategory::parse(&c)),
        comments: serde_json::from_str(&comments).unwrap_or_default(),
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
        revision: revision.max(0) as u64,
    })
}

fn row_to_report(row: &rusqlite::Row<'_>) -> rusqlite::Result<Report> {
    let id: String = row.get(0)?;
    let employee_id: String = row.get(1)?;
    let status: String = row.get(3)?;
    let entries: String = row.get(4)?;
    Ok(Report {
        id: parse_uuid(&id),
        employee_id: parse_uuid(&employee_id),
        date: row.get(2)?,
        status: ReportStatus::parse(&status).unwrap_or_default(),
        entries: serde_json::from_str(&entries).unwrap_or_default(),
        updated_at: row.get(5)?,
        submitted_at: row.get(6)?,
    })
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id: String = row.get(0)?;
    let recipient_id: String = row.get(1)?;
    let subject_id: String = row.get(2)?;
    let kind: String = row.get(4)?;
    Ok(Notification {
        id: parse_uuid(&id),
        recipient_id: parse_uuid(&recipient_id),
        subject_id: parse_uuid(&subject_id),
        message: row.get(3)?,
        kind: NotificationType::parse(&kind).unwrap_or(NotificationType::Info),
        is_read: row.get::<_, i32>(5)? != 0,
        task_id: parse_opt_uuid(row.get(6)?),
        created_at: row.get(7)?,
    })
}

fn load_task(conn: &Connection, id: &str) -> Result<Option<Task>, String> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        row_to_task,
    )
    .optional()
    .map_err(|e| e.to_string())
}

#[async_trait]
impl Store for SqliteStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list_employees(&self) -> Result<Vec<Employee>, String> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, role, capabilities, team_lead FROM employees ORDER BY name")
                .map_err(|e| e.to_string())?;
            let employees = stmt
                .query_map([], row_to_employee)
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(employees)
        })
        .await
    }

    async fn get_employee(&self, id: Uuid) -> Result<Option<Employee>, String> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, name, role, capabilities, team_lead FROM employees WHERE id = ?1",
                params![id],
                row_to_employee,
            )
            .optional()
            .map_err(|e| e.to_string())
        })
        .await
    }

    async fn upsert_employee(&self, employee: &Employee) -> Result<(), String> {
        let employee = employee.clone();
        let capabilities =
            serde_json::to_string(&employee.capabilities).unwrap_or_else(|_| "{}".to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO employees (id, name, role, capabilities, team_lead)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, role = excluded.role,
                     capabilities = excluded.capabilities, team_lead = excluded.team_lead",
                params![
                    employee.id.to_string(),
                    employee.name,
                    role_to_string(employee.role),
                    capabilities,
                    employee.team_lead.map(|id| id.to_string()),
                ],
            )
            .map_err(|e| e.to_string())?;
            Ok(())
        })
        .await
    }

    async fn list_assignments(&self) -> Result<Vec<Assignment>, String> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT employee_id, department, team_lead FROM assignments")
                .map_err(|e| e.to_string())?;
            let assignments = stmt
                .query_map([], row_to_assignment)
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(assignments)
        })
        .await
    }

    async fn get_assignment(&self, employee_id: Uuid) -> Result<Option<Assignment>, String> {
        let employee_id = employee_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT employee_id, department, team_lead FROM assignments WHERE employee_id = ?1",
                params![employee_id],
                row_to_assignment,
            )
            .optional()
            .map_err(|e| e.to_string())
        })
        .await
    }

    async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), String> {
        let assignment = assignment.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO assignments (employee_id, department, team_lead) VALUES (?1, ?2, ?3)
                 ON CONFLICT(employee_id) DO UPDATE SET department = excluded.department,
                     team_lead = excluded.team_lead",
                params![
                    assignment.employee_id.to_string(),
                    assignment.department,
                    assignment.team_lead.map(|id| id.to_string()),
                ],
            )
            .map_err(|e| e.to_string())?;
            Ok(())
        })
        .await
    }

    async fn insert_task(&self, task: &Task) -> Result<(), String> {
        let task = task.clone();
        let comments = serde_json::to_string(&task.comments).map_err(|e| e.to_string())?;
        self.with_conn(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO tasks ({TASK_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                ),
                params![
                    task.id.to_string(),
                    task.title,
                    task.description,
                    task.assignee_id.to_string(),
                    task.assigner_id.to_string(),
                    task.status.as_str(),
                    task.progress,
                    task.priority.as_str(),
                    task.start_date,
                    task.due_date,
                    task.completion_date,
                    task.submitted_for_verification_date,
                    task.rejection_reason,
                    task.completion_category.map(|c| c.as_str()),
                    comments,
                    task.created_at,
                    task.updated_at,
                    task.revision as i64,
                ],
            )
            .map_err(|e| e.to_string())?;
            Ok(())
        })
        .await
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, String> {
        let id = id.to_string();
        self.with_conn(move |conn| load_task(conn, &id)).await
    }

    async fn list_tasks(&self, assignees: Option<&[Uuid]>) -> Result<Vec<Task>, String> {
        let filter: Option<String> = assignees.map(|ids| {
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            serde_json::to_string(&ids).unwrap_or_else(|_| "[]".to_string())
        });
        self.with_conn(move |conn| {
            let (query, bind): (String, Vec<String>) = match filter {
                Some(ids_json) => (
                    format!(
                        "SELECT {TASK_COLUMNS} FROM tasks
                         WHERE assignee_id IN (SELECT value FROM json_each(?1))
                         ORDER BY created_at DESC"
                    ),
                    vec![ids_json],
                ),
                None => (
                    format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY created_at DESC"),
                    vec![],
                ),
            };
            let mut stmt = conn.prepare(&query).map_err(|e| e.to_string())?;
            let tasks = stmt
                .query_map(rusqlite::params_from_iter(bind.iter()), row_to_task)
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(tasks)
        })
        .await
    }

    async fn update_task_if_revision(
        &self,
        task: &Task,
        expected_revision: u64,
    ) -> Result<bool, String> {
        let task = task.clone();
        let comments = serde_json::to_string(&task.comments).map_err(|e| e.to_string())?;
        self.with_conn(move |conn| {
            let affected = conn
                .execute(
                    "UPDATE tasks SET title = ?1, description = ?2, status = ?3, progress = ?4,
                         priority = ?5, start_date = ?6, due_date = ?7, completion_date = ?8,
                         submitted_for_verification_date = ?9, rejection_reason = ?10,
                         completion_category = ?11, comments = ?12, updated_at = ?13, revision = ?14
                     WHERE id = ?15 AND revision = ?16",
                    params![
                        task.title,
                        task.description,
                        task.status.as_str(),
                        task.progress,
                        task.priority.as_str(),
                        task.start_date,
                        task.due_date,
                        task.completion_date,
                        task.submitted_for_verification_date,
                        task.rejection_reason,
                        task.completion_category.map(|c| c.as_str()),
                        comments,
                        task.updated_at,
                        task.revision as i64,
                        task.id.to_string(),
                        expected_revision as i64,
                    ],
                )
                .map_err(|e| e.to_string())?;
            Ok(affected > 0)
        })
        .await
    }

    async fn find_past_due_tasks(&self, today: NaiveDate) -> Result<Vec<Task>, String> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM tasks
                     WHERE status IN ('pending', 'in_progress')
                       AND due_date IS NOT NULL AND due_date < ?1
                       AND rejection_reason = ''
                     ORDER BY due_date ASC"
                ))
                .map_err(|e| e.to_string())?;
            let tasks = stmt
                .query_map(params![today], row_to_task)
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(tasks)
        })
        .await
    }

    async fn mark_past_due(
        &self,
        id: Uuid,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, String> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            // Same predicate as find_past_due_tasks, re-checked by the write itself
            let affected = conn
                .execute(
                    "UPDATE tasks SET status = 'pending_verification',
                         submitted_for_verification_date = ?1, updated_at = ?1,
                         revision = revision + 1
                     WHERE id = ?2
                       AND status IN ('pending', 'in_progress')
                       AND due_date IS NOT NULL AND due_date < ?3
                       AND rejection_reason = ''",
                    params![now, id, today],
                )
                .map_err(|e| e.to_string())?;
            if affected == 0 {
                return Ok(None);
            }
            load_task(conn, &id)
        })
        .await
    }

    async fn append_comment(&self, id: Uuid, comment: &Comment) -> Result<Option<Task>, String> {
        let id = id.to_string();
        let comment = comment.clone();
        self.with_conn(move |conn| {
            let Some(mut task) = load_task(conn, &id)? else {
                return Ok(None);
            };
            task.comments.push(comment.clone());
            task.updated_at = comment.created_at;
            task.revision += 1;
            let comments = serde_json::to_string(&task.comments).map_err(|e| e.to_string())?;
            conn.execute(
                "UPDATE tasks SET comments = ?1, updated_at = ?2, revision = revision + 1
                 WHERE id = ?3",
                params![comments, task.updated_at, id],
            )
            .map_err(|e| e.to_string())?;
            Ok(Some(task))
        })
        .await
    }

    async fn get_report(
        &self,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Report>, String> {
        let employee_id = employee_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE employee_id = ?1 AND date = ?2"),
                params![employee_id, date],
                row_to_report,
            )
            .optional()
            .map_err(|e| e.to_string())
        })
        .await
    }

    async fn save_report_if_draft(&self, report: &Report) -> Result<bool, String> {
        let report = report.clone();
        let entries = serde_json::to_string(&report.entries).map_err(|e| e.to_string())?;
        self.with_conn(move |conn| {
            let affected = conn
                .execute(
                    "INSERT INTO reports (id, employee_id, date, status, entries, updated_at, submitted_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(employee_id, date) DO UPDATE SET status = excluded.status,
                         entries = excluded.entries, updated_at = excluded.updated_at,
                         submitted_at = excluded.submitted_at
                     WHERE reports.status = 'draft'",
                    params![
                        report.id.to_string(),
                        report.employee_id.to_string(),
                        report.date,
                        report.status.as_str(),
                        entries,
                        report.updated_at,
                        report.submitted_at,
                    ],
                )
                .map_err(|e| e.to_string())?;
            Ok(affected > 0)
        })
        .await
    }

    async fn list_reports(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Report>, String> {
        let employee_id = employee_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {REPORT_COLUMNS} FROM reports
                     WHERE employee_id = ?1 AND date >= ?2 AND date <= ?3
                     ORDER BY date ASC"
                ))
                .map_err(|e| e.to_string())?;
            let reports = stmt
                .query_map(params![employee_id, from, to], row_to_report)
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(reports)
        })
        .await
    }

    async fn upsert_leave(&self, leave: &Leave) -> Result<(), String> {
        let leave = leave.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO leaves (employee_id, date, status) VALUES (?1, ?2, ?3)
                 ON CONFLICT(employee_id, date) DO UPDATE SET status = excluded.status",
                params![leave.employee_id.to_string(), leave.date, leave.status.as_str()],
            )
            .map_err(|e| e.to_string())?;
            Ok(())
        })
        .await
    }

    async fn list_leaves(
        &self,
        employee_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Leave>, String> {
        let employee_id = employee_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT employee_id, date, status FROM leaves
                     WHERE employee_id = ?1 AND date >= ?2 AND date <= ?3
                     ORDER BY date ASC",
                )
                .map_err(|e| e.to_string())?;
            let leaves = stmt
                .query_map(params![employee_id, from, to], |row| {
                    let employee_id: String = row.get(0)?;
                    let status: String = row.get(2)?;
                    Ok(Leave {
                        employee_id: parse_uuid(&employee_id),
                        date: row.get(1)?,
                        status: LeaveStatus::parse(&status).unwrap_or_default(),
                    })
                })
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(leaves)
        })
        .await
    }

    async fn upsert_holiday(&self, holiday: &Holiday) -> Result<(), String> {
        let holiday = holiday.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO holidays (date, name) VALUES (?1, ?2)
                 ON CONFLICT(date) DO UPDATE SET name = excluded.name",
                params![holiday.date, holiday.name],
            )
            .map_err(|e| e.to_string())?;
            Ok(())
        })
        .await
    }

    async fn list_holidays(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Holiday>, String> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT date, name FROM holidays WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC",
                )
                .map_err(|e| e.to_string())?;
            let holidays = stmt
                .query_map(params![from, to], |row| {
                    Ok(Holiday {
                        date: row.get(0)?,
                        name: row.get(1)?,
                    })
                })
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(holidays)
        })
        .await
    }

    async fn insert_notifications(
        &self,
        notifications: &[Notification],
    ) -> Result<Vec<Result<(), String>>, String> {
        let notifications = notifications.to_vec();
        self.with_conn(move |conn| {
            let results = notifications
                .iter()
                .map(|n| {
                    conn.execute(
                        &format!(
                            "INSERT INTO notifications ({NOTIFICATION_COLUMNS})
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                        ),
                        params![
                            n.id.to_string(),
                            n.recipient_id.to_string(),
                            n.subject_id.to_string(),
                            n.message,
                            n.kind.as_str(),
                            if n.is_read { 1 } else { 0 },
                            n.task_id.map(|id| id.to_string()),
                            n.created_at,
                        ],
                    )
                    .map(|_| ())
                    .map_err(|e| e.to_string())
                })
                .collect();
            Ok(results)
        })
        .await
    }

    async fn has_task_approval(&self, task_id: Uuid) -> Result<bool, String> {
        let task_id = task_id.to_string();
        self.with_conn(move |conn| {
            conn.prepare(
                "SELECT 1 FROM notifications WHERE task_id = ?1 AND type = 'task_approval' LIMIT 1",
            )
            .map_err(|e| e.to_string())?
            .exists(params![task_id])
            .map_err(|e| e.to_string())
        })
        .await
    }

    async fn delete_task_approvals(&self, task_id: Uuid) -> Result<usize, String> {
        let task_id = task_id.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM notifications WHERE task_id = ?1 AND type = 'task_approval'",
                params![task_id],
            )
            .map_err(|e| e.to_string())
        })
        .await
    }

    async fn list_notifications(
        &self,
        recipient_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>, String> {
        let recipient_id = recipient_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                     WHERE recipient_id = ?1 AND (?2 = 0 OR is_read = 0)
                     ORDER BY created_at DESC"
                ))
                .map_err(|e| e.to_string())?;
            let notifications = stmt
                .query_map(
                    params![recipient_id, if unread_only { 1 } else { 0 }],
                    row_to_notification,
                )
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;
            Ok(notifications)
        })
        .await
    }

    async fn mark_notification_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool, String> {
        let id = id.to_string();
        let recipient_id = recipient_id.to_string();
        self.with_conn(move |conn| {
            let affected = conn
                .execute(
                    "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND recipient_id = ?2",
                    params![id, recipient_id],
                )
                .map_err(|e| e.to_string())?;
            Ok(affected > 0)
        })
        .await
    }
}
