use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SlaTable;
use crate::tickets::{Priority, Ticket, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaPhase {
    Response,
    Resolution,
}

/// Point-in-time standing of one SLA phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaPhaseStatus {
    /// No deadline recorded for the phase.
    None,
    /// Terminal event happened at or before the due time.
    Met,
    /// Due time is comfortably in the future.
    Ok,
    /// Due time is in the future but inside the warning window.
    Warning,
    /// Due time passed without the terminal event, or a breach is already
    /// recorded.
    Breached,
}

impl SlaPhaseStatus {
    fn severity(self) -> u8 {
        match self {
            SlaPhaseStatus::None => 0,
            SlaPhaseStatus::Met => 1,
            SlaPhaseStatus::Ok => 2,
            SlaPhaseStatus::Warning => 3,
            SlaPhaseStatus::Breached => 4,
        }
    }

    fn worse(self, other: SlaPhaseStatus) -> SlaPhaseStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaStatus {
    pub response: SlaPhaseStatus,
    pub resolution: SlaPhaseStatus,
    pub overall: SlaPhaseStatus,
}

/// Budgets and due timestamps produced for a ticket's SLA clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaDates {
    pub response_minutes: i64,
    pub resolution_minutes: i64,
    pub response_due_at: DateTime<Utc>,
    pub resolution_due_at: DateTime<Utc>,
}

/// Turns a priority and a reference timestamp into the two deadlines.
/// Recomputation after a priority change passes the ticket's original
/// `created_at`, never the moment of recomputation.
pub fn compute_sla_dates(
    priority: Priority,
    created_at: DateTime<Utc>,
    table: &SlaTable,
) -> SlaDates {
    let budget = table.budget(priority);
    SlaDates {
        response_minutes: budget.response_minutes,
        resolution_minutes: budget.resolution_minutes,
        response_due_at: created_at + Duration::minutes(budget.response_minutes),
        resolution_due_at: created_at + Duration::minutes(budget.resolution_minutes),
    }
}

fn pending_status(
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    warning_window: Duration,
) -> SlaPhaseStatus {
    if now > due {
        SlaPhaseStatus::Breached
    } else if due - now <= warning_window {
        SlaPhaseStatus::Warning
    } else {
        SlaPhaseStatus::Ok
    }
}

fn response_status(
    ticket: &Ticket,
    now: DateTime<Utc>,
    warning_window: Duration,
) -> SlaPhaseStatus {
    let Some(due) = ticket.response_due_at else {
        return SlaPhaseStatus::None;
    };
    if ticket.sla_response_breached_at.is_some() {
        return SlaPhaseStatus::Breached;
    }
    match ticket.first_response_at {
        Some(first) if first <= due => SlaPhaseStatus::Met,
        Some(_) => SlaPhaseStatus::Breached,
        None => pending_status(due, now, warning_window),
    }
}

fn resolution_status(
    ticket: &Ticket,
    now: DateTime<Utc>,
    warning_window: Duration,
) -> SlaPhaseStatus {
    let Some(due) = ticket.resolution_due_at else {
        return SlaPhaseStatus::None;
    };
    if ticket.sla_resolution_breached_at.is_some() {
        return SlaPhaseStatus::Breached;
    }
    match (ticket.status, ticket.closed_at) {
        (TicketStatus::Finalizado, Some(closed)) if closed <= due => SlaPhaseStatus::Met,
        (TicketStatus::Finalizado, Some(_)) => SlaPhaseStatus::Breached,
        _ => pending_status(due, now, warning_window),
    }
}

/// Evaluates both phases at `now`. The overall status is the worse of the
/// two under the order breached > warning > ok > met > none.
pub fn evaluate(ticket: &Ticket, now: DateTime<Utc>, warning_window_minutes: i64) -> SlaStatus {
    let window = Duration::minutes(warning_window_minutes);
    let response = response_status(ticket, now, window);
    let resolution = resolution_status(ticket, now, window);
    SlaStatus {
        response,
        resolution,
        overall: response.worse(resolution),
    }
}
