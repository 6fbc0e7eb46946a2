//! Applies a guard-accepted change set to a ticket and derives the
//! system-managed fields: phase timestamps, write-once first response and
//! breach markers, and the SLA clock recomputation on priority change.

use chrono::{DateTime, Utc};

use crate::config::SlaTable;
use crate::tickets::{sla, Ticket, TicketChangeSet, TicketStatus};

/// Records the first response if not yet recorded, stamping the response
/// breach when the event lands past the due time. Both fields are
/// write-once.
fn record_first_response(ticket: &mut Ticket, now: DateTime<Utc>) {
    if ticket.first_response_at.is_some() {
        return;
    }
    ticket.first_response_at = Some(now);
    if ticket.sla_response_breached_at.is_none() {
        if let Some(due) = ticket.response_due_at {
            if now > due {
                ticket.sla_response_breached_at = Some(now);
            }
        }
    }
}

fn enter_status(ticket: &mut Ticket, status: TicketStatus, now: DateTime<Utc>) {
    let previous = ticket.status;
    ticket.status = status;
    match status {
        TicketStatus::Creado => {}
        TicketStatus::Asignado => {
            if previous != TicketStatus::Asignado {
                ticket.assigned_at = Some(now);
            }
        }
        TicketStatus::EnProgreso => {
            ticket.started_at = Some(now);
            record_first_response(ticket, now);
        }
        TicketStatus::PendienteValidacion => {
            ticket.pending_validation_at = Some(now);
            record_first_response(ticket, now);
        }
        TicketStatus::Finalizado => {
            ticket.closed_at = Some(now);
            record_first_response(ticket, now);
            if ticket.sla_resolution_breached_at.is_none() {
                if let Some(due) = ticket.resolution_due_at {
                    if now > due {
                        ticket.sla_resolution_breached_at = Some(now);
                    }
                }
            }
        }
        TicketStatus::Reabierto => {
            ticket.reopened_at = Some(now);
            ticket.closed_at = None;
        }
    }
}

/// Applies an accepted, normalized change set. Never called without a prior
/// guard acceptance; the caller commits the result conditionally on
/// `current.version`.
pub fn apply(
    current: &Ticket,
    changes: &TicketChangeSet,
    now: DateTime<Utc>,
    table: &SlaTable,
) -> Ticket {
    let mut ticket = current.clone();

    if let Some(ref title) = changes.title {
        ticket.title = title.clone();
    }
    if let Some(ref description) = changes.description {
        ticket.description = description.clone();
    }
    if let Some(ref ticket_type) = changes.ticket_type {
        ticket.ticket_type = ticket_type.clone();
    }
    if let Some(channel) = changes.channel {
        ticket.channel = channel;
    }
    if let Some(ref label) = changes.assignee_label {
        ticket.assignee_label = label.clone();
    }
    if let Some(department) = changes.department_id {
        ticket.department_id = department;
    }
    if let Some(unit) = changes.unit_id {
        ticket.unit_id = unit;
    }
    if let Some(parent) = changes.parent_id {
        ticket.parent_id = parent;
    }
    if let Some(ref external_ref) = changes.external_ref {
        ticket.external_ref = external_ref.clone();
    }

    if let Some(assignee) = changes.assignee_id {
        if assignee != ticket.assignee_id {
            ticket.assignee_id = assignee;
            ticket.assigned_at = Some(now);
        }
    }

    let priority_changed = changes
        .priority
        .is_some_and(|priority| priority != ticket.priority);
    if let Some(priority) = changes.priority {
        ticket.priority = priority;
    }
    if priority_changed || ticket.sla_fields_incomplete() {
        // The clock always restarts from the original creation time.
        let dates = sla::compute_sla_dates(ticket.priority, ticket.created_at, table);
        ticket.sla_response_minutes = Some(dates.response_minutes);
        ticket.sla_resolution_minutes = Some(dates.resolution_minutes);
        ticket.response_due_at = Some(dates.response_due_at);
        ticket.resolution_due_at = Some(dates.resolution_due_at);
    }

    if let Some(status) = changes.status {
        enter_status(&mut ticket, status, now);
    }

    ticket.version = current.version + 1;
    ticket.updated_at = now;
    ticket
}
