use chrono::{NaiveDate, Timelike, Weekday};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    attendance_for_month, month_bounds, validate_entries, AttendanceInputs, DayAttendance,
    Holiday, Leave, LeaveStatus, Report, ReportEntry, ReportStatus,
};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::hierarchy::subordinates_of;
use crate::roster::{team_lead_of, Employee};
use crate::store::SharedStore;
use crate::task::policy;

/// Reports, leave, holidays and the monthly attendance view.
#[derive(Clone)]
pub struct AttendanceService {
    store: SharedStore,
    clock: Arc<dyn Clock>,
    weekly_off: Weekday,
    /// UTC hour from which today's report can no longer be edited
    report_cutoff_hour: u32,
}

impl AttendanceService {
    pub fn new(
        store: SharedStore,
        clock: Arc<dyn Clock>,
        weekly_off: Weekday,
        report_cutoff_hour: u32,
    ) -> Self {
        Self {
            store,
            clock,
            weekly_off,
            report_cutoff_hour,
        }
    }

    async fn employee(&self, id: Uuid) -> Result<Employee> {
        self.store
            .get_employee(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Employee {}", id)))
    }

    async fn ensure_can_view(&self, actor: &Employee, employee_id: Uuid) -> Result<()> {
        let subordinates = if actor.id == employee_id || actor.is_admin() {
            HashSet::new()
        } else {
            let employees = self.store.list_employees().await?;
            let assignments = self.store.list_assignments().await?;
            subordinates_of(actor.id, &employees, &assignments)
        };
        policy::view_employee(actor, employee_id, &subordinates).into_result()
    }

    /// Day-by-day attendance of `employee_id` for one month.
    pub async fn attendance_for_month(
        &self,
        actor: &Employee,
        employee_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<Vec<DayAttendance>> {
        self.ensure_can_view(actor, employee_id).await?;
        self.employee(employee_id).await?;
        let (first, last) = month_bounds(year, month)?;

        let reports = self.store.list_reports(employee_id, first, last).await?;
        let leaves = self.store.list_leaves(employee_id, first, last).await?;
        let holidays = self.store.list_holidays(first, last).await?;
        let tasks = self
            .store
            .list_tasks(Some(std::slice::from_ref(&employee_id)))
            .await?;

        let inputs = AttendanceInputs {
            reports: &reports,
            leaves: &leaves,
            holidays: &holidays,
            tasks: &tasks,
        };
        attendance_for_month(&inputs, year, month, self.clock.today(), self.weekly_off)
    }

    /// Create or replace the actor's report for today.
    ///
    /// `submit` locks the report. Only today's report is editable, and only
    /// before the cutoff hour.
    pub async fn save_report(
        &self,
        actor: &Employee,
        date: NaiveDate,
        entries: Vec<ReportEntry>,
        submit: bool,
    ) -> Result<Report> {
        let now = self.clock.now();
        let today = now.date_naive();
        if date > today {
            return Err(Error::Validation(format!("cannot report for future date {}", date)));
        }
        if date < today || now.hour() >= self.report_cutoff_hour {
            return Err(Error::CutoffPassed(date.to_string()));
        }

        validate_entries(&entries)?;
        for entry in &entries {
            let task = self
                .store
                .get_task(entry.task_id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("Task {}", entry.task_id)))?;
            if task.assignee_id != actor.id {
                return Err(Error::Validation(format!(
                    "task {} is not assigned to you",
                    entry.task_id
                )));
            }
        }

        let existing = self.store.get_report(actor.id, date).await?;
        if existing.as_ref().map(|r| r.is_submitted()).unwrap_or(false) {
            return Err(Error::ReportLocked(date.to_string()));
        }

        let report = Report {
            id: existing.map(|r| r.id).unwrap_or_else(Uuid::new_v4),
            employee_id: actor.id,
            date,
            status: if submit {
                ReportStatus::Submitted
            } else {
                ReportStatus::Draft
            },
            entries,
            updated_at: now,
            submitted_at: submit.then_some(now),
        };
        if !self.store.save_report_if_draft(&report).await? {
            return Err(Error::ReportLocked(date.to_string()));
        }

        tracing::debug!(
            "Report {} for {} saved as {}",
            date,
            actor.id,
            report.status.as_str()
        );
        Ok(report)
    }

    pub async fn get_report(
        &self,
        actor: &Employee,
        employee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Report> {
        self.ensure_can_view(actor, employee_id).await?;
        self.store
            .get_report(employee_id, date)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Report for {} on {}", employee_id, date)))
    }

    /// Record (or update) one day of leave for an employee.
    pub async fn record_leave(
        &self,
        actor: &Employee,
        employee_id: Uuid,
        date: NaiveDate,
        status: LeaveStatus,
    ) -> Result<Leave> {
        let employee = self.employee(employee_id).await?;
        let assignment = self.store.get_assignment(employee_id).await?;
        let lead = team_lead_of(&employee, assignment.as_ref());
        policy::record_leave(actor, lead).into_result()?;

        let leave = Leave {
            employee_id,
            date,
            status,
        };
        self.store.upsert_leave(&leave).await?;
        tracing::info!(
            "Leave for {} on {} recorded as {} by {}",
            employee_id,
            date,
            status.as_str(),
            actor.id
        );
        Ok(leave)
    }

    pub async fn add_holiday(&self, actor: &Employee, date: NaiveDate, name: &str) -> Result<Holiday> {
        policy::manage_holidays(actor).into_result()?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("holiday name is required".to_string()));
        }

        let holiday = Holiday {
            date,
            name: name.to_string(),
        };
        self.store.upsert_holiday(&holiday).await?;
        tracing::info!("Holiday {} on {} added by {}", holiday.name, date, actor.id);
        Ok(holiday)
    }
}
