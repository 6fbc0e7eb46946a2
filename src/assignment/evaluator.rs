//! Pure rule-matching and target-selection logic. The engine drives the
//! pass itself so that every automated assignment goes through the same
//! guarded commit path as a manual one.

use uuid::Uuid;

use crate::assignment::AssignmentRule;
use crate::tickets::Ticket;

/// Open-ticket load of one candidate user.
#[derive(Debug, Clone, Copy)]
pub struct CandidateLoad {
    pub user_id: Uuid,
    pub open_tickets: i64,
}

/// Filter steps 1 and 2: a set filter must equal the ticket's value.
pub fn rule_matches(rule: &AssignmentRule, ticket: &Ticket) -> bool {
    if let Some(ref ticket_type) = rule.ticket_type {
        if *ticket_type != ticket.ticket_type {
            return false;
        }
    }
    if let Some(priority) = rule.priority {
        if priority != ticket.priority {
            return false;
        }
    }
    true
}

/// Least-loaded selection with a stable tie-break: fewest open tickets,
/// then ascending user id.
pub fn pick_least_loaded(candidates: &[CandidateLoad]) -> Option<Uuid> {
    candidates
        .iter()
        .min_by(|a, b| {
            a.open_tickets
                .cmp(&b.open_tickets)
                .then(a.user_id.cmp(&b.user_id))
        })
        .map(|c| c.user_id)
}

/// Step 4: a declared cap blocks the rule when the target already holds at
/// least that many open tickets.
pub fn cap_exhausted(rule: &AssignmentRule, target_open_tickets: i64) -> bool {
    rule.max_active
        .is_some_and(|cap| target_open_tickets >= cap)
}
