use crate::directory::{Role, User};
use crate::tickets::Ticket;

/// Elevated-caller scope check. ADMIN is unrestricted; a SUPERVISOR must
/// share the ticket's department or unit. A ticket attached to neither a
/// department nor a unit is visible to any elevated caller.
pub fn can_access_ticket(user: &User, ticket: &Ticket) -> bool {
    if user.role == Role::Admin {
        return true;
    }
    if ticket.department_id.is_none() && ticket.unit_id.is_none() {
        return true;
    }
    let in_department = ticket
        .department_id
        .is_some_and(|d| user.department_ids.contains(&d));
    let in_unit = ticket.unit_id.is_some_and(|u| user.unit_ids.contains(&u));
    in_department || in_unit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::lifecycle::tests::sample_ticket;
    use uuid::Uuid;

    fn supervisor(department_ids: Vec<Uuid>, unit_ids: Vec<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            name: "sup".into(),
            role: Role::Supervisor,
            active: true,
            department_ids,
            unit_ids,
        }
    }

    #[test]
    fn test_admin_is_unrestricted() {
        let mut user = supervisor(vec![], vec![]);
        user.role = Role::Admin;
        let mut ticket = sample_ticket();
        ticket.department_id = Some(Uuid::new_v4());
        assert!(can_access_ticket(&user, &ticket));
    }

    #[test]
    fn test_supervisor_needs_matching_membership() {
        let department = Uuid::new_v4();
        let user = supervisor(vec![department], vec![]);
        let mut ticket = sample_ticket();
        ticket.department_id = Some(department);
        assert!(can_access_ticket(&user, &ticket));

        ticket.department_id = Some(Uuid::new_v4());
        assert!(!can_access_ticket(&user, &ticket));
    }

    #[test]
    fn test_unit_membership_grants_access() {
        let unit = Uuid::new_v4();
        let user = supervisor(vec![], vec![unit]);
        let mut ticket = sample_ticket();
        ticket.department_id = Some(Uuid::new_v4());
        ticket.unit_id = Some(unit);
        assert!(can_access_ticket(&user, &ticket));
    }

    #[test]
    fn test_ungrouped_ticket_visible_to_any_elevated_caller() {
        let user = supervisor(vec![], vec![]);
        let ticket = sample_ticket();
        assert!(can_access_ticket(&user, &ticket));
    }
}
