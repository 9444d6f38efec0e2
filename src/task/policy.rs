//! Authorization decisions, one function per action.
//!
//! Every check returns a [`Decision`] naming why it was denied, so the
//! transition table in the service stays auditable.

use std::collections::HashSet;
use uuid::Uuid;

use super::task::Task;
use crate::error::{Error, Result};
use crate::roster::Employee;

/// Outcome of a policy check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Convert a denial into [`Error::Forbidden`].
    pub fn into_result(self) -> Result<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(Error::Forbidden(reason.to_string())),
        }
    }
}

fn allow_if(condition: bool, reason: &'static str) -> Decision {
    if condition {
        Decision::Allow
    } else {
        Decision::Deny(reason)
    }
}

pub fn create_task(actor: &Employee) -> Decision {
    allow_if(
        actor.is_admin() || actor.capabilities.can_assign_task,
        "assigning tasks requires the assign capability",
    )
}

/// Status/progress reports: the assignee, or a manager of the task.
pub fn report_progress(actor: &Employee, task: &Task) -> Decision {
    if actor.id == task.assignee_id {
        return Decision::Allow;
    }
    allow_if(
        actor.is_admin() || (actor.id == task.assigner_id && actor.capabilities.can_update_task),
        "only the assignee or a manager of the task may report progress",
    )
}

/// Title, description, dates and priority.
pub fn edit_details(actor: &Employee, task: &Task) -> Decision {
    if actor.id == task.assignee_id && !actor.is_admin() {
        return Decision::Deny("the assignee may only report status and progress");
    }
    allow_if(
        actor.is_admin() || (actor.id == task.assigner_id && actor.capabilities.can_update_task),
        "only an admin or the assigner holding the update capability may edit task details",
    )
}

/// Approve or reject. `assignee_lead` is the assignee's effective team lead.
pub fn finalize(actor: &Employee, task: &Task, assignee_lead: Option<Uuid>) -> Decision {
    if actor.is_admin() {
        return Decision::Allow;
    }
    if actor.id == task.assignee_id {
        return Decision::Deny("the assignee cannot grade their own task");
    }
    allow_if(
        actor.id == task.assigner_id
            || assignee_lead == Some(actor.id)
            || actor.capabilities.can_approve_task,
        "only the assigner, the assignee's team lead, an admin or an approver may finalize",
    )
}

pub fn comment(actor: &Employee, task: &Task, assignee_lead: Option<Uuid>) -> Decision {
    allow_if(
        actor.is_admin()
            || actor.id == task.assignee_id
            || actor.id == task.assigner_id
            || assignee_lead == Some(actor.id)
            || actor.capabilities.can_approve_task,
        "only participants of the task may comment",
    )
}

pub fn view_task(actor: &Employee, task: &Task, subordinates: &HashSet<Uuid>) -> Decision {
    allow_if(
        actor.is_admin()
            || actor.id == task.assignee_id
            || actor.id == task.assigner_id
            || actor.capabilities.can_approve_task
            || subordinates.contains(&task.assignee_id),
        "task is not visible to this employee",
    )
}

pub fn view_team(actor: &Employee) -> Decision {
    allow_if(
        actor.is_admin() || actor.capabilities.can_view_team,
        "viewing team data requires the view-team capability",
    )
}

/// Attendance and reports of `employee_id`.
pub fn view_employee(actor: &Employee, employee_id: Uuid, subordinates: &HashSet<Uuid>) -> Decision {
    if actor.id == employee_id || actor.is_admin() {
        return Decision::Allow;
    }
    allow_if(
        actor.capabilities.can_view_team && subordinates.contains(&employee_id),
        "employee is not in this actor's team",
    )
}

pub fn record_leave(actor: &Employee, employee_lead: Option<Uuid>) -> Decision {
    allow_if(
        actor.is_admin() || employee_lead == Some(actor.id),
        "only an admin or the employee's team lead may record leave",
    )
}

pub fn manage_holidays(actor: &Employee) -> Decision {
    allow_if(actor.is_admin(), "only admins may manage holidays")
}
