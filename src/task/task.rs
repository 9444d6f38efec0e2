//! Core Task type and its state transitions.
//!
//! # Invariants
//! - `progress <= 100`
//! - `status == PendingVerification` implies `submitted_for_verification_date.is_some()`
//! - Once `status.is_final()`, only `comments` may change
//!
//! Transitions here are pure: they validate and mutate an owned record.
//! Authorization lives in [`super::policy`], persistence in the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Status of a task in its lifecycle.
///
/// # State Machine
/// ```text
/// Pending -> InProgress -> PendingVerification -> Completed
///        \________________/                    \-> NotCompleted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    PendingVerification,
    Completed,
    NotCompleted,
}

impl TaskStatus {
    /// `Completed` or `NotCompleted`.
    pub fn is_final(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::NotCompleted)
    }

    /// Still owned by the assignee (can make progress or be swept).
    pub fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::PendingVerification => "pending_verification",
            TaskStatus::Completed => "completed",
            TaskStatus::NotCompleted => "not_completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" => Some(TaskStatus::InProgress),
            "pending_verification" => Some(TaskStatus::PendingVerification),
            "completed" => Some(TaskStatus::Completed),
            "not_completed" => Some(TaskStatus::NotCompleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// Grade assigned when a task is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCategory {
    Pending,
    Low,
    Moderate,
    Completed,
    /// Finalized without a percentage to grade
    NotApplicable,
}

impl CompletionCategory {
    /// Grade thresholds: 100 → Completed, ≥80 → Moderate, ≥60 → Low, else Pending.
    pub fn from_percentage(percentage: u8) -> Self {
        match percentage {
            100..=u8::MAX => CompletionCategory::Completed,
            80..=99 => CompletionCategory::Moderate,
            60..=79 => CompletionCategory::Low,
            _ => CompletionCategory::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionCategory::Pending => "pending",
            CompletionCategory::Low => "low",
            CompletionCategory::Moderate => "moderate",
            CompletionCategory::Completed => "completed",
            CompletionCategory::NotApplicable => "not_applicable",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CompletionCategory::Pending),
            "low" => Some(CompletionCategory::Low),
            "moderate" => Some(CompletionCategory::Moderate),
            "completed" => Some(CompletionCategory::Completed),
            "not_applicable" => Some(CompletionCategory::NotApplicable),
            _ => None,
        }
    }
}

/// A comment on a task. Comments are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author_id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when assigning a new task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTask {
    pub assignee_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
}

/// Partial update of a task.
///
/// `status`/`progress` form the assignee's progress report; the remaining
/// fields are details only managers may edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn touches_progress(&self) -> bool {
        self.status.is_some() || self.progress.is_some()
    }

    pub fn touches_details(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.start_date.is_some()
            || self.due_date.is_some()
            || self.priority.is_some()
    }
}

/// A unit of work assigned to one employee by another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub assignee_id: Uuid,
    pub assigner_id: Uuid,
    pub status: TaskStatus,
    pub progress: u8,
    pub priority: Priority,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub completion_date: Option<DateTime<Utc>>,
    pub submitted_for_verification_date: Option<DateTime<Utc>>,
    /// Empty means "not rejected".
    #[serde(default)]
    pub rejection_reason: String,
    pub completion_category: Option<CompletionCategory>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write; used for optimistic concurrency.
    #[serde(default)]
    pub revision: u64,
}

/// What a progress update changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressOutcome {
    /// The update moved the task into `PendingVerification`.
    pub submitted_for_verification: bool,
}

fn validate_dates(start: Option<NaiveDate>, due: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(due)) = (start, due) {
        if due < start {
            return Err(Error::Validation(format!(
                "due date {due} is before start date {start}"
            )));
        }
    }
    Ok(())
}

fn validate_percentage(value: u8, field: &str) -> Result<()> {
    if value > 100 {
        return Err(Error::Validation(format!(
            "{field} must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}

impl Task {
    /// Create a new task.
    ///
    /// # Postconditions
    /// - `status == Pending`, `progress == 0`
    ///
    /// # Errors
    /// `Validation` for an empty title or a due date before the start date.
    pub fn new(assigner_id: Uuid, new: NewTask, now: DateTime<Utc>) -> Result<Self> {
        let title = new.title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Validation("title is required".to_string()));
        }
        validate_dates(new.start_date, new.due_date)?;

        Ok(Self {
            id: Uuid::new_v4(),
            title,
            description: new.description,
            assignee_id: new.assignee_id,
            assigner_id,
            status: TaskStatus::Pending,
            progress: 0,
            priority: new.priority,
            start_date: new.start_date,
            due_date: new.due_date,
            completion_date: None,
            submitted_for_verification_date: None,
            rejection_reason: String::new(),
            completion_category: None,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        })
    }

    pub fn is_rejected(&self) -> bool {
        !self.rejection_reason.is_empty()
    }

    /// Sweep predicate: overdue, still open, and not rejected.
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.status.is_open()
            && !self.is_rejected()
            && self.due_date.map(|due| due < today).unwrap_or(false)
    }

    fn ensure_not_final(&self) -> Result<()> {
        if self.status.is_final() {
            return Err(Error::AlreadyFinalized);
        }
        Ok(())
    }

    fn ensure_pending_verification(&self) -> Result<()> {
        if self.status != TaskStatus::PendingVerification {
            return Err(Error::NotPendingVerification(self.status.to_string()));
        }
        Ok(())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Move an open task into `PendingVerification`.
    ///
    /// # Precondition
    /// `self.status.is_open()`
    pub fn submit_for_verification(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.status.is_open() {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: TaskStatus::PendingVerification.to_string(),
            });
        }
        self.status = TaskStatus::PendingVerification;
        self.submitted_for_verification_date = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Apply a progress/status report.
    ///
    /// # Preconditions
    /// - task not finalized (`AlreadyFinalized`)
    /// - task open (`InvalidTransition` while awaiting verification)
    /// - target status, if any, is `InProgress` or `PendingVerification`
    ///
    /// # Postconditions
    /// - `rejection_reason` is cleared
    /// - explicit `PendingVerification` forces `progress = 100`
    /// - `progress == 100` implies `PendingVerification`
    /// - `progress > 0` implies at least `InProgress`
    pub fn apply_progress(
        &mut self,
        status: Option<TaskStatus>,
        progress: Option<u8>,
        now: DateTime<Utc>,
    ) -> Result<ProgressOutcome> {
        self.ensure_not_final()?;
        if let Some(target) = status {
            if !matches!(
                target,
                TaskStatus::InProgress | TaskStatus::PendingVerification
            ) {
                return Err(Error::InvalidTransition {
                    from: self.status.to_string(),
                    to: target.to_string(),
                });
            }
        }
        if !self.status.is_open() {
            return Err(Error::InvalidTransition {
                from: self.status.to_string(),
                to: status.unwrap_or(self.status).to_string(),
            });
        }
        if let Some(p) = progress {
            validate_percentage(p, "progress")?;
        }

        let mut next_progress = progress.unwrap_or(self.progress);
        if status == Some(TaskStatus::PendingVerification) {
            next_progress = 100;
        }

        self.rejection_reason.clear();
        self.progress = next_progress;

        if next_progress == 100 {
            self.submit_for_verification(now)?;
            return Ok(ProgressOutcome {
                submitted_for_verification: true,
            });
        }

        if next_progress > 0 || status == Some(TaskStatus::InProgress) {
            self.status = TaskStatus::InProgress;
        }
        self.touch(now);
        Ok(ProgressOutcome {
            submitted_for_verification: false,
        })
    }

    /// Apply manager-only detail edits.
    ///
    /// # Precondition
    /// task not finalized
    pub fn apply_details(&mut self, patch: &TaskPatch, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_final()?;
        if let Some(title) = &patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(Error::Validation("title cannot be empty".to_string()));
            }
            self.title = title.to_string();
        }
        let start = patch.start_date.or(self.start_date);
        let due = patch.due_date.or(self.due_date);
        validate_dates(start, due)?;

        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        self.start_date = start;
        self.due_date = due;
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        self.touch(now);
        Ok(())
    }

    /// Grade and finalize a task awaiting verification.
    ///
    /// # Precondition
    /// `self.status == PendingVerification`
    ///
    /// # Postconditions
    /// - `status == Completed` iff `final_percentage == 100`, else `NotCompleted`
    /// - `completion_category` set by threshold, `rejection_reason` cleared
    pub fn approve(&mut self, final_percentage: u8, now: DateTime<Utc>) -> Result<()> {
        self.ensure_pending_verification()?;
        validate_percentage(final_percentage, "final percentage")?;

        self.status = if final_percentage == 100 {
            TaskStatus::Completed
        } else {
            TaskStatus::NotCompleted
        };
        self.progress = final_percentage;
        self.completion_date = Some(now);
        self.completion_category = Some(CompletionCategory::from_percentage(final_percentage));
        self.rejection_reason.clear();
        self.touch(now);
        Ok(())
    }

    /// Reject a task awaiting verification.
    ///
    /// # Precondition
    /// `self.status == PendingVerification`, non-empty `reason`
    ///
    /// # Postconditions
    /// - `status == NotCompleted`
    /// - graded by threshold, or `NotApplicable` without a percentage
    pub fn reject(
        &mut self,
        reason: &str,
        final_percentage: Option<u8>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_pending_verification()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(Error::MissingReason);
        }
        if let Some(p) = final_percentage {
            validate_percentage(p, "final percentage")?;
            self.progress = p;
        }

        self.status = TaskStatus::NotCompleted;
        self.rejection_reason = reason.to_string();
        self.completion_date = Some(now);
        self.completion_category = Some(
            final_percentage
                .map(CompletionCategory::from_percentage)
                .unwrap_or(CompletionCategory::NotApplicable),
        );
        self.touch(now);
        Ok(())
    }

    /// Append a comment. Allowed in every status.
    pub fn push_comment(&mut self, author_id: Uuid, text: &str, now: DateTime<Utc>) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Validation("comment text is required".to_string()));
        }
        self.comments.push(Comment {
            author_id,
            text: text.to_string(),
            created_at: now,
        });
        self.touch(now);
        Ok(())
    }

    /// Inclusive day range during which the task was an obligation.
    ///
    /// Starts at `start_date` (or the creation day). Tasks awaiting
    /// verification end on their submission day, finalized tasks on their
    /// completion day; only open tasks have no end.
    pub fn active_window(&self) -> (NaiveDate, Option<NaiveDate>) {
        let start = self.start_date.unwrap_or_else(|| self.created_at.date_naive());
        let end = if self.status.is_open() {
            None
        } else {
            self.completion_date
                .or(self.submitted_for_verification_date)
                .map(|d| d.date_naive())
                .or(Some(self.updated_at.date_naive()))
        };
        (start, end)
    }

    /// Whether the task was active on `day`.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        let (start, end) = self.active_window();
        day >= start && end.map(|end| day <= end).unwrap_or(true)
    }
}
