//! Daily reports, leave, holidays and the monthly attendance classifier.

mod calculator;
mod service;

pub use calculator::{attendance_for_month, month_bounds, AttendanceInputs};
pub use service::AttendanceService;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Classification of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Holiday,
    OnLeave,
    /// Today, with an obligation and no report yet
    Pending,
    Future,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAttendance {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Draft,
    Submitted,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Submitted => "submitted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ReportStatus::Draft),
            "submitted" => Some(ReportStatus::Submitted),
            _ => None,
        }
    }
}

/// One line of a daily report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub task_id: Uuid,
    pub completion_percent: u8,
}

/// Daily work report. At most one per (employee, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub status: ReportStatus,
    #[serde(default)]
    pub entries: Vec<ReportEntry>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn is_submitted(&self) -> bool {
        self.status == ReportStatus::Submitted
    }
}

/// Check entry ranges and duplicate task ids.
pub fn validate_entries(entries: &[ReportEntry]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for entry in entries {
        if entry.completion_percent > 100 {
            return Err(Error::Validation(format!(
                "completion for task {} must be between 0 and 100",
                entry.task_id
            )));
        }
        if !seen.insert(entry.task_id) {
            return Err(Error::Validation(format!(
                "task {} appears more than once in the report",
                entry.task_id
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    #[default]
    Requested,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Requested => "requested",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(LeaveStatus::Requested),
            "approved" => Some(LeaveStatus::Approved),
            "rejected" => Some(LeaveStatus::Rejected),
            _ => None,
        }
    }
}

/// Personal leave for one day. Unique per (employee, date).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    pub employee_id: Uuid,
    pub date: NaiveDate,
    pub status: LeaveStatus,
}

/// Company-wide day off. Unique per date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
}
