//! Role-gated transition guard. Pure decision logic: given the requesting
//! actor, the current ticket and the requested change set, either returns a
//! normalized change set ready for the lifecycle committer or rejects
//! without mutating anything.

use crate::directory::{Actor, Role};
use crate::engine::EngineError;
use crate::tickets::{Ticket, TicketChangeSet, TicketStatus};

/// Worker-only transitions: {ASIGNADO, REABIERTO} -> EN_PROGRESO and
/// EN_PROGRESO -> PENDIENTE_VALIDACION.
fn worker_transition_allowed(from: TicketStatus, to: TicketStatus) -> bool {
    matches!(
        (from, to),
        (TicketStatus::Asignado, TicketStatus::EnProgreso)
            | (TicketStatus::Reabierto, TicketStatus::EnProgreso)
            | (TicketStatus::EnProgreso, TicketStatus::PendienteValidacion)
    )
}

fn review_worker(
    actor: &Actor,
    ticket: &Ticket,
    changes: &TicketChangeSet,
) -> Result<TicketChangeSet, EngineError> {
    if ticket.assignee_id != Some(actor.id) {
        return Err(EngineError::Forbidden(
            "only the current assignee may progress this ticket".into(),
        ));
    }
    if changes.touches_non_status() {
        return Err(EngineError::Forbidden(
            "workers may change only the ticket status".into(),
        ));
    }
    let Some(target) = changes.status else {
        return Err(EngineError::InvalidArgument("no status change requested".into()));
    };
    if !worker_transition_allowed(ticket.status, target) {
        return Err(EngineError::Forbidden(format!(
            "transition {:?} -> {:?} is not allowed for the assignee",
            ticket.status, target
        )));
    }
    Ok(TicketChangeSet {
        status: Some(target),
        ..Default::default()
    })
}

fn review_manager_status(
    ticket: &Ticket,
    changes: &TicketChangeSet,
    target: TicketStatus,
) -> Result<(), EngineError> {
    match target {
        TicketStatus::Asignado => {
            let assignee_after = match changes.assignee_id {
                Some(explicit) => explicit,
                None => ticket.assignee_id,
            };
            if assignee_after.is_none() {
                return Err(EngineError::InvalidArgument(
                    "cannot set ASIGNADO without an assignee".into(),
                ));
            }
            if !matches!(
                ticket.status,
                TicketStatus::Creado | TicketStatus::Reabierto | TicketStatus::Asignado
            ) {
                return Err(EngineError::Forbidden(format!(
                    "cannot set ASIGNADO from {:?}",
                    ticket.status
                )));
            }
        }
        TicketStatus::EnProgreso | TicketStatus::PendienteValidacion => {
            return Err(EngineError::Forbidden(
                "EN_PROGRESO and PENDIENTE_VALIDACION are assignee-only transitions".into(),
            ));
        }
        TicketStatus::Finalizado | TicketStatus::Reabierto => {
            if ticket.status != TicketStatus::PendienteValidacion {
                return Err(EngineError::Forbidden(format!(
                    "validation can only be accepted or rejected from PENDIENTE_VALIDACION, not {:?}",
                    ticket.status
                )));
            }
        }
        TicketStatus::Creado => {
            return Err(EngineError::Forbidden(
                "a ticket cannot be moved back to CREADO".into(),
            ));
        }
    }
    Ok(())
}

fn review_manager(
    ticket: &Ticket,
    changes: &TicketChangeSet,
) -> Result<TicketChangeSet, EngineError> {
    if let Some(Some(parent)) = changes.parent_id {
        if parent == ticket.id {
            return Err(EngineError::InvalidArgument(
                "a ticket cannot be its own parent".into(),
            ));
        }
    }
    let mut normalized = changes.clone();
    match changes.status {
        Some(target) => review_manager_status(ticket, changes, target)?,
        None => {
            // Assigning a freshly created ticket implicitly moves it to
            // ASIGNADO.
            if matches!(changes.assignee_id, Some(Some(_)))
                && ticket.status == TicketStatus::Creado
            {
                normalized.status = Some(TicketStatus::Asignado);
            }
        }
    }
    Ok(normalized)
}

/// Reviews a requested change set against the state machine. Returns the
/// normalized change set (the manager auto-promotion to ASIGNADO filled in)
/// or the typed rejection. Referential checks that need storage (parent
/// existence, department/unit consistency) happen after acceptance, in the
/// engine.
pub fn review(
    actor: &Actor,
    ticket: &Ticket,
    changes: &TicketChangeSet,
) -> Result<TicketChangeSet, EngineError> {
    if changes.is_empty() {
        return Err(EngineError::InvalidArgument("empty change set".into()));
    }
    match actor.role {
        Role::Tecnico => review_worker(actor, ticket, changes),
        Role::Supervisor | Role::Admin => review_manager(ticket, changes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::lifecycle::tests::sample_ticket;
    use uuid::Uuid;

    fn worker(ticket: &Ticket) -> Actor {
        Actor {
            id: ticket.assignee_id.expect("test ticket has an assignee"),
            role: Role::Tecnico,
        }
    }

    fn manager() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role: Role::Supervisor,
        }
    }

    fn status_change(target: TicketStatus) -> TicketChangeSet {
        TicketChangeSet {
            status: Some(target),
            ..Default::default()
        }
    }

    fn assigned_ticket() -> Ticket {
        let mut ticket = sample_ticket();
        ticket.assignee_id = Some(Uuid::new_v4());
        ticket.status = TicketStatus::Asignado;
        ticket
    }

    #[test]
    fn test_worker_may_start_assigned_ticket() {
        let ticket = assigned_ticket();
        let accepted = review(
            &worker(&ticket),
            &ticket,
            &status_change(TicketStatus::EnProgreso),
        )
        .unwrap();
        assert_eq!(accepted.status, Some(TicketStatus::EnProgreso));
    }

    #[test]
    fn test_worker_may_request_validation_from_in_progress() {
        let mut ticket = assigned_ticket();
        ticket.status = TicketStatus::EnProgreso;
        let accepted = review(
            &worker(&ticket),
            &ticket,
            &status_change(TicketStatus::PendienteValidacion),
        )
        .unwrap();
        assert_eq!(accepted.status, Some(TicketStatus::PendienteValidacion));
    }

    #[test]
    fn test_worker_may_restart_reopened_ticket() {
        let mut ticket = assigned_ticket();
        ticket.status = TicketStatus::Reabierto;
        assert!(review(
            &worker(&ticket),
            &ticket,
            &status_change(TicketStatus::EnProgreso)
        )
        .is_ok());
    }

    #[test]
    fn test_worker_may_not_finalize() {
        let mut ticket = assigned_ticket();
        ticket.status = TicketStatus::PendienteValidacion;
        let err = review(
            &worker(&ticket),
            &ticket,
            &status_change(TicketStatus::Finalizado),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[test]
    fn test_worker_may_not_touch_other_fields() {
        let ticket = assigned_ticket();
        let mut changes = status_change(TicketStatus::EnProgreso);
        changes.title = Some("new title".into());
        let err = review(&worker(&ticket), &ticket, &changes).unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[test]
    fn test_non_assignee_worker_is_rejected_for_any_change_set() {
        let ticket = assigned_ticket();
        let stranger = Actor {
            id: Uuid::new_v4(),
            role: Role::Tecnico,
        };
        let attempts = [
            status_change(TicketStatus::EnProgreso),
            TicketChangeSet {
                title: Some("x".into()),
                ..Default::default()
            },
            TicketChangeSet {
                assignee_id: Some(Some(stranger.id)),
                ..Default::default()
            },
        ];
        for changes in attempts {
            let err = review(&stranger, &ticket, &changes).unwrap_err();
            assert!(matches!(err, EngineError::Forbidden(_)));
        }
    }

    #[test]
    fn test_manager_may_not_set_worker_only_states() {
        let ticket = assigned_ticket();
        for target in [TicketStatus::EnProgreso, TicketStatus::PendienteValidacion] {
            let err = review(&manager(), &ticket, &status_change(target)).unwrap_err();
            assert!(matches!(err, EngineError::Forbidden(_)));
        }
    }

    #[test]
    fn test_manager_assign_requires_assignee() {
        let mut ticket = sample_ticket();
        ticket.assignee_id = None;
        let err = review(&manager(), &ticket, &status_change(TicketStatus::Asignado))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));

        let mut changes = status_change(TicketStatus::Asignado);
        changes.assignee_id = Some(Some(Uuid::new_v4()));
        assert!(review(&manager(), &ticket, &changes).is_ok());
    }

    #[test]
    fn test_manager_assign_rejected_from_work_states() {
        let mut ticket = assigned_ticket();
        ticket.status = TicketStatus::EnProgreso;
        let err = review(&manager(), &ticket, &status_change(TicketStatus::Asignado))
            .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[test]
    fn test_validation_verdict_only_from_pending_validation() {
        let mut ticket = assigned_ticket();
        ticket.status = TicketStatus::PendienteValidacion;
        assert!(review(&manager(), &ticket, &status_change(TicketStatus::Finalizado)).is_ok());
        assert!(review(&manager(), &ticket, &status_change(TicketStatus::Reabierto)).is_ok());

        ticket.status = TicketStatus::EnProgreso;
        for target in [TicketStatus::Finalizado, TicketStatus::Reabierto] {
            let err = review(&manager(), &ticket, &status_change(target)).unwrap_err();
            assert!(matches!(err, EngineError::Forbidden(_)));
        }
    }

    #[test]
    fn test_assigning_created_ticket_auto_promotes() {
        let ticket = sample_ticket();
        assert_eq!(ticket.status, TicketStatus::Creado);
        let changes = TicketChangeSet {
            assignee_id: Some(Some(Uuid::new_v4())),
            ..Default::default()
        };
        let accepted = review(&manager(), &ticket, &changes).unwrap();
        assert_eq!(accepted.status, Some(TicketStatus::Asignado));
    }

    #[test]
    fn test_reassigning_later_does_not_auto_promote() {
        let mut ticket = assigned_ticket();
        ticket.status = TicketStatus::Reabierto;
        let changes = TicketChangeSet {
            assignee_id: Some(Some(Uuid::new_v4())),
            ..Default::default()
        };
        let accepted = review(&manager(), &ticket, &changes).unwrap();
        assert_eq!(accepted.status, None);
    }

    #[test]
    fn test_self_parent_rejected() {
        let ticket = sample_ticket();
        let changes = TicketChangeSet {
            parent_id: Some(Some(ticket.id)),
            ..Default::default()
        };
        let err = review(&manager(), &ticket, &changes).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_change_set_rejected() {
        let ticket = sample_ticket();
        let err = review(&manager(), &ticket, &TicketChangeSet::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
}
