//! Day-by-day attendance classification for one employee and month.
//!
//! Priority per day, evaluated only up to today:
//! 1. weekly off or holiday → `Holiday`
//! 2. approved leave → `OnLeave`
//! 3. submitted report → `Present`
//! 4. no active task → `Present`; active before today → `Absent`; active today → `Pending`
//!
//! Holiday and leave must always win over task-derived absence.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashSet;

use super::{AttendanceStatus, DayAttendance, Holiday, Leave, LeaveStatus, Report};
use crate::error::{Error, Result};
use crate::task::Task;

/// Everything the classifier reads for one employee.
#[derive(Debug, Clone, Default)]
pub struct AttendanceInputs<'a> {
    pub reports: &'a [Report],
    pub leaves: &'a [Leave],
    pub holidays: &'a [Holiday],
    /// Tasks assigned to the employee
    pub tasks: &'a [Task],
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::Validation(format!("invalid month {year}-{month}")))?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| Error::Validation(format!("invalid month {year}-{month}")))?;
    Ok((first, next_first - Duration::days(1)))
}

/// Classify every day of `year`-`month`.
pub fn attendance_for_month(
    inputs: &AttendanceInputs<'_>,
    year: i32,
    month: u32,
    today: NaiveDate,
    weekly_off: Weekday,
) -> Result<Vec<DayAttendance>> {
    let (first, last) = month_bounds(year, month)?;

    let holidays: HashSet<NaiveDate> = inputs.holidays.iter().map(|h| h.date).collect();
    let leave_days: HashSet<NaiveDate> = inputs
        .leaves
        .iter()
        .filter(|l| l.status == LeaveStatus::Approved)
        .map(|l| l.date)
        .collect();
    let reported_days: HashSet<NaiveDate> = inputs
        .reports
        .iter()
        .filter(|r| r.is_submitted())
        .map(|r| r.date)
        .collect();

    let days = first.iter_days().take_while(|d| *d <= last);
    Ok(days
        .map(|date| DayAttendance {
            date,
            status: classify_day(date, today, weekly_off, &holidays, &leave_days, &reported_days, inputs.tasks),
        })
        .collect())
}

fn classify_day(
    date: NaiveDate,
    today: NaiveDate,
    weekly_off: Weekday,
    holidays: &HashSet<NaiveDate>,
    leave_days: &HashSet<NaiveDate>,
    reported_days: &HashSet<NaiveDate>,
    tasks: &[Task],
) -> AttendanceStatus {
    if date > today {
        return AttendanceStatus::Future;
    }
    if date.weekday() == weekly_off || holidays.contains(&date) {
        return AttendanceStatus::Holiday;
    }
    if leave_days.contains(&date) {
        return AttendanceStatus::OnLeave;
    }
    if reported_days.contains(&date) {
        return AttendanceStatus::Present;
    }
    if !tasks.iter().any(|t| t.is_active_on(date)) {
        return AttendanceStatus::Present;
    }
    if date < today {
        AttendanceStatus::Absent
    } else {
        AttendanceStatus::Pending
    }
}
