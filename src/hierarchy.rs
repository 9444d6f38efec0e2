//! Subordinate resolution over the team-lead back-pointers.

use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

use crate::roster::{team_lead_of, Assignment, Employee};

/// Index from team lead to direct reports.
fn direct_reports(
    employees: &[Employee],
    assignments: &[Assignment],
) -> HashMap<Uuid, Vec<Uuid>> {
    let by_employee: HashMap<Uuid, &Assignment> =
        assignments.iter().map(|a| (a.employee_id, a)).collect();

    let mut reports: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for employee in employees {
        if let Some(lead) = team_lead_of(employee, by_employee.get(&employee.id).copied()) {
            reports.entry(lead).or_default().push(employee.id);
        }
    }
    reports
}

/// All employees reporting to `root`, directly or transitively.
///
/// Breadth-first over the team-lead edges. The visited set doubles as the
/// cycle guard, so a malformed hierarchy terminates after visiting each node
/// once. The result may contain `root` itself when `root` sits on a cycle.
pub fn subordinates_of(
    root: Uuid,
    employees: &[Employee],
    assignments: &[Assignment],
) -> HashSet<Uuid> {
    let reports = direct_reports(employees, assignments);

    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut queue: VecDeque<Uuid> = VecDeque::new();
    for id in reports.get(&root).into_iter().flatten() {
        if visited.insert(*id) {
            queue.push_back(*id);
        }
    }

    while let Some(current) = queue.pop_front() {
        for id in reports.get(&current).into_iter().flatten() {
            if visited.insert(*id) {
                queue.push_back(*id);
            }
        }
    }

    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Capabilities, Role};

    fn emp(id: Uuid, lead: Option<Uuid>) -> Employee {
        Employee {
            id,
            name: id.to_string(),
            role: Role::Ordinary,
            capabilities: Capabilities::default(),
            team_lead: lead,
        }
    }

    #[test]
    fn test_transitive_subordinates() {
        let ceo = Uuid::new_v4();
        let lead = Uuid::new_v4();
        let dev_a = Uuid::new_v4();
        let dev_b = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let employees = vec![
            emp(ceo, None),
            emp(lead, Some(ceo)),
            emp(dev_a, Some(lead)),
            emp(dev_b, Some(lead)),
            emp(outsider, None),
        ];

        let subs = subordinates_of(ceo, &employees, &[]);
        assert_eq!(subs, HashSet::from([lead, dev_a, dev_b]));

        let subs = subordinates_of(lead, &employees, &[]);
        assert_eq!(subs, HashSet::from([dev_a, dev_b]));

        assert!(subordinates_of(dev_a, &employees, &[]).is_empty());
    }

    #[test]
    fn test_two_node_cycle_terminates() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let employees = vec![emp(a, Some(b)), emp(b, Some(a))];

        let subs = subordinates_of(a, &employees, &[]);
        assert_eq!(subs.len(), 2);
        assert!(subs.contains(&a));
        assert!(subs.contains(&b));
    }

    #[test]
    fn test_longer_cycle_below_root_terminates() {
        let root = Uuid::new_v4();
        let x = Uuid::new_v4();
        let y = Uuid::new_v4();
        let z = Uuid::new_v4();
        // root -> x -> y -> z -> root
        let employees = vec![
            emp(root, Some(z)),
            emp(x, Some(root)),
            emp(y, Some(x)),
            emp(z, Some(y)),
        ];

        let subs = subordinates_of(root, &employees, &[]);
        assert_eq!(subs, HashSet::from([root, x, y, z]));

        let subs = subordinates_of(y, &employees, &[]);
        assert_eq!(subs, HashSet::from([root, x, y, z]));
    }

    #[test]
    fn test_assignment_binding_drives_traversal() {
        let lead = Uuid::new_v4();
        let other = Uuid::new_v4();
        let dev = Uuid::new_v4();
        let employees = vec![emp(lead, None), emp(other, None), emp(dev, Some(other))];
        let assignments = vec![Assignment {
            employee_id: dev,
            department: Some("Platform".into()),
            team_lead: Some(lead),
        }];

        assert_eq!(
            subordinates_of(lead, &employees, &assignments),
            HashSet::from([dev])
        );
        assert!(subordinates_of(other, &employees, &assignments).is_empty());
    }
}
