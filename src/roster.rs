//! Employees, capabilities and team-lead assignments.
//!
//! The roster is owned by an external profile service; this crate only reads
//! it (and upserts it when importing a roster file).

use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use crate::store::SharedStore;

/// Coarse role of an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Ordinary,
    Admin,
}

/// Fixed set of boolean capabilities granted to an employee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// May finalize any task awaiting verification
    #[serde(default)]
    pub can_approve_task: bool,
    /// May create tasks for other employees
    #[serde(default)]
    pub can_assign_task: bool,
    /// May edit details of tasks they assigned
    #[serde(default)]
    pub can_update_task: bool,
    /// May view tasks and attendance of their subordinates
    #[serde(default)]
    pub can_view_team: bool,
}

/// An employee as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Manager this employee reports to. Not guaranteed acyclic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_lead: Option<Uuid>,
}

impl Employee {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Department and team-lead binding for one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub employee_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_lead: Option<Uuid>,
}

/// Effective team lead of an employee: the assignment binding wins over the
/// profile's own back-pointer.
pub fn team_lead_of(
    employee: &Employee,
    assignment: Option<&Assignment>,
) -> Option<Uuid> {
    assignment
        .and_then(|a| a.team_lead)
        .or(employee.team_lead)
        .filter(|lead| *lead != employee.id)
}

/// Contents of a roster import file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub employees: Vec<Employee>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
}

impl RosterFile {
    /// Load a roster file from disk.
    pub fn load(path: &Path) -> Result<Self, std::io::Error> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Upsert every employee and assignment of a roster file.
///
/// Returns the number of records written.
pub async fn import_roster(store: &SharedStore, roster: &RosterFile) -> Result<usize, String> {
    for employee in &roster.employees {
        store.upsert_employee(employee).await?;
    }
    for assignment in &roster.assignments {
        store.upsert_assignment(assignment).await?;
    }
    Ok(roster.employees.len() + roster.assignments.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(team_lead: Option<Uuid>) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            name: "Dana".to_string(),
            role: Role::Ordinary,
            capabilities: Capabilities::default(),
            team_lead,
        }
    }

    #[test]
    fn test_assignment_overrides_profile_team_lead() {
        let profile_lead = Uuid::new_v4();
        let assigned_lead = Uuid::new_v4();
        let emp = employee(Some(profile_lead));
        let assignment = Assignment {
            employee_id: emp.id,
            department: Some("Ops".into()),
            team_lead: Some(assigned_lead),
        };

        assert_eq!(team_lead_of(&emp, Some(&assignment)), Some(assigned_lead));
        assert_eq!(team_lead_of(&emp, None), Some(profile_lead));
    }

    #[test]
    fn test_self_lead_is_ignored() {
        let mut emp = employee(None);
        emp.team_lead = Some(emp.id);
        assert_eq!(team_lead_of(&emp, None), None);
    }

    #[test]
    fn test_roster_file_parses_with_defaults() {
        let json = r#"{
            "employees": [
                {"id": "4c0f7b52-4a5b-4c36-9c62-0b3a3e7b9d11", "name": "Ida"}
            ]
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, json).unwrap();

        let roster = RosterFile::load(&path).unwrap();
        assert_eq!(roster.employees.len(), 1);
        assert_eq!(roster.employees[0].role, Role::Ordinary);
        assert!(!roster.employees[0].capabilities.can_view_team);
        assert!(roster.assignments.is_empty());
    }

    #[tokio::test]
    async fn test_import_roster_is_idempotent() {
        use crate::store::InMemoryStore;
        use std::sync::Arc;

        let store: SharedStore = Arc::new(InMemoryStore::new());
        let lead = employee(None);
        let member = employee(Some(lead.id));
        let roster = RosterFile {
            employees: vec![lead.clone(), member.clone()],
            assignments: vec![Assignment {
                employee_id: member.id,
                department: Some("Sales".into()),
                team_lead: Some(lead.id),
            }],
        };

        assert_eq!(import_roster(&store, &roster).await.unwrap(), 3);
        assert_eq!(import_roster(&store, &roster).await.unwrap(), 3);
        assert_eq!(store.list_employees().await.unwrap().len(), 2);
        assert_eq!(store.list_assignments().await.unwrap().len(), 1);
    }
}
