//! Engine facade. Every mutation flows scope resolver -> transition guard
//! -> lifecycle committer -> audit/notification dispatcher; the assignment
//! pass re-enters the same path under the automation principal.

mod error;

pub use error::EngineError;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::assignment::evaluator::{self, CandidateLoad};
use crate::assignment::AssignmentRule;
use crate::audit::Dispatcher;
use crate::config::EngineConfig;
use crate::directory::{scope, Actor, Role};
use crate::store::{AuditSink, DirectoryStore, NotificationSink, RuleStore, TicketStore};
use crate::tickets::{
    guard, lifecycle, sla, NewTicket, Ticket, TicketChangeSet, TicketStatus, TicketWithSla,
};

pub struct TicketEngine {
    config: EngineConfig,
    tickets: Arc<dyn TicketStore>,
    rules: Arc<dyn RuleStore>,
    directory: Arc<dyn DirectoryStore>,
    dispatcher: Dispatcher,
    /// Synthetic ADMIN-scoped principal the scheduler commits under.
    automation_id: Uuid,
}

impl TicketEngine {
    pub fn new(
        config: EngineConfig,
        tickets: Arc<dyn TicketStore>,
        rules: Arc<dyn RuleStore>,
        directory: Arc<dyn DirectoryStore>,
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config,
            tickets,
            rules,
            directory: directory.clone(),
            dispatcher: Dispatcher::new(audit, notifications, directory),
            automation_id: Uuid::new_v4(),
        }
    }

    pub fn automation_actor(&self) -> Actor {
        Actor {
            id: self.automation_id,
            role: Role::Admin,
        }
    }

    fn with_sla(&self, ticket: Ticket, now: DateTime<Utc>) -> TicketWithSla {
        let sla = sla::evaluate(&ticket, now, self.config.sla_warning_window_minutes);
        TicketWithSla { ticket, sla }
    }

    fn authenticate(requester_id: Uuid, role: Role) -> Result<Actor, EngineError> {
        if requester_id.is_nil() {
            return Err(EngineError::Unauthenticated("missing identity".into()));
        }
        Ok(Actor {
            id: requester_id,
            role,
        })
    }

    async fn load_ticket(&self, ticket_id: Uuid) -> Result<Ticket, EngineError> {
        let ticket = self
            .tickets
            .get(ticket_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("ticket {ticket_id}")))?;
        if ticket.is_deleted() {
            return Err(EngineError::NotFound(format!("ticket {ticket_id}")));
        }
        Ok(ticket)
    }

    async fn check_scope(&self, actor: &Actor, ticket: &Ticket) -> Result<(), EngineError> {
        match actor.role {
            Role::Admin => Ok(()),
            Role::Tecnico => {
                if ticket.assignee_id == Some(actor.id) {
                    Ok(())
                } else {
                    Err(EngineError::Forbidden(
                        "ticket is not assigned to the caller".into(),
                    ))
                }
            }
            Role::Supervisor => {
                let user = self
                    .directory
                    .get_user(actor.id)
                    .await?
                    .ok_or_else(|| {
                        EngineError::Unauthenticated(format!("unknown user {}", actor.id))
                    })?;
                if !user.active {
                    return Err(EngineError::Forbidden("caller is deactivated".into()));
                }
                if scope::can_access_ticket(&user, ticket) {
                    Ok(())
                } else {
                    Err(EngineError::Forbidden(
                        "caller is outside the ticket's department and unit".into(),
                    ))
                }
            }
        }
    }

    /// Referential checks the pure guard cannot do: parent existence and
    /// department/unit consistency against the directory.
    async fn check_references(
        &self,
        ticket: &Ticket,
        changes: &TicketChangeSet,
    ) -> Result<(), EngineError> {
        if let Some(Some(parent_id)) = changes.parent_id {
            let parent = self
                .tickets
                .get(parent_id)
                .await?
                .filter(|p| !p.is_deleted())
                .ok_or_else(|| EngineError::NotFound(format!("parent ticket {parent_id}")))?;
            debug!("parent ticket {} accepted for {}", parent.id, ticket.id);
        }

        let department_after = match changes.department_id {
            Some(explicit) => explicit,
            None => ticket.department_id,
        };
        if let Some(department_id) = changes.department_id.flatten() {
            let department = self
                .directory
                .get_department(department_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("department {department_id}")))?;
            if !department.active {
                return Err(EngineError::InvalidArgument(format!(
                    "department {} is inactive",
                    department_id
                )));
            }
        }

        let unit_after = match changes.unit_id {
            Some(explicit) => explicit,
            None => ticket.unit_id,
        };
        if let Some(unit_id) = changes.unit_id.flatten() {
            let unit = self
                .directory
                .get_unit(unit_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("unit {unit_id}")))?;
            if !unit.active {
                return Err(EngineError::InvalidArgument(format!(
                    "unit {unit_id} is inactive"
                )));
            }
        }

        // When both survive the change set, the unit must belong to the
        // department.
        if let (Some(department_id), Some(unit_id)) = (department_after, unit_after) {
            let unit = self
                .directory
                .get_unit(unit_id)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("unit {unit_id}")))?;
            if unit.department_id != department_id {
                return Err(EngineError::InvalidArgument(format!(
                    "unit {unit_id} does not belong to department {department_id}"
                )));
            }
        }
        Ok(())
    }

    /// Guard, lifecycle and conditional commit for an already scope-checked
    /// change, followed by the side-effect dispatch.
    async fn commit_change(
        &self,
        actor: &Actor,
        current: Ticket,
        changes: &TicketChangeSet,
        now: DateTime<Utc>,
    ) -> Result<Ticket, EngineError> {
        let normalized = guard::review(actor, &current, changes)?;
        self.check_references(&current, &normalized).await?;
        let updated = lifecycle::apply(&current, &normalized, now, &self.config.sla);
        let committed = self.tickets.update(updated, current.version).await?;
        self.dispatcher
            .dispatch_update(actor, &current, &committed, &normalized)
            .await;
        Ok(committed)
    }

    pub async fn submit_ticket_change(
        &self,
        requester_id: Uuid,
        role: Role,
        ticket_id: Uuid,
        changes: TicketChangeSet,
    ) -> Result<TicketWithSla, EngineError> {
        let actor = Self::authenticate(requester_id, role)?;
        let now = Utc::now();
        let current = self.load_ticket(ticket_id).await?;
        self.check_scope(&actor, &current).await?;
        let committed = self.commit_change(&actor, current, &changes, now).await?;
        info!(
            "ticket {} updated to {:?} by {}",
            committed.display_folio(),
            committed.status,
            actor.id
        );
        Ok(self.with_sla(committed, now))
    }

    pub async fn get_ticket_with_sla(
        &self,
        requester_id: Uuid,
        role: Role,
        ticket_id: Uuid,
    ) -> Result<TicketWithSla, EngineError> {
        let actor = Self::authenticate(requester_id, role)?;
        let ticket = self.load_ticket(ticket_id).await?;
        self.check_scope(&actor, &ticket).await?;
        Ok(self.with_sla(ticket, Utc::now()))
    }

    /// Any authenticated role may open a ticket; the creator becomes the
    /// immutable owner and the SLA clock starts from the creation time.
    pub async fn create_ticket(
        &self,
        requester_id: Uuid,
        role: Role,
        new_ticket: NewTicket,
    ) -> Result<TicketWithSla, EngineError> {
        let actor = Self::authenticate(requester_id, role)?;
        if new_ticket.title.trim().is_empty() {
            return Err(EngineError::InvalidArgument("title is empty".into()));
        }
        let now = Utc::now();
        let dates = sla::compute_sla_dates(new_ticket.priority, now, &self.config.sla);
        let ticket = Ticket {
            id: Uuid::new_v4(),
            folio: 0,
            title: new_ticket.title,
            description: new_ticket.description,
            ticket_type: new_ticket.ticket_type,
            priority: new_ticket.priority,
            channel: new_ticket.channel,
            status: TicketStatus::Creado,
            owner_id: actor.id,
            assignee_id: None,
            assignee_label: None,
            department_id: new_ticket.department_id,
            unit_id: new_ticket.unit_id,
            parent_id: new_ticket.parent_id,
            external_ref: new_ticket.external_ref,
            sla_response_minutes: Some(dates.response_minutes),
            sla_resolution_minutes: Some(dates.resolution_minutes),
            response_due_at: Some(dates.response_due_at),
            resolution_due_at: Some(dates.resolution_due_at),
            first_response_at: None,
            sla_response_breached_at: None,
            sla_resolution_breached_at: None,
            assigned_at: None,
            started_at: None,
            pending_validation_at: None,
            closed_at: None,
            reopened_at: None,
            deleted_at: None,
            deleted_by: None,
            delete_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let creation_refs = TicketChangeSet {
            department_id: ticket.department_id.map(Some),
            unit_id: ticket.unit_id.map(Some),
            parent_id: ticket.parent_id.map(Some),
            ..Default::default()
        };
        if ticket.parent_id == Some(ticket.id) {
            return Err(EngineError::InvalidArgument(
                "a ticket cannot be its own parent".into(),
            ));
        }
        self.check_references(&ticket, &creation_refs).await?;
        let stored = self.tickets.insert(ticket).await?;
        self.dispatcher.dispatch_create(&actor, &stored).await;
        info!("ticket {} created by {}", stored.display_folio(), actor.id);
        Ok(self.with_sla(stored, now))
    }

    /// Soft delete: the ticket drops out of reads and of the evaluator's
    /// pool but keeps its history.
    pub async fn delete_ticket(
        &self,
        requester_id: Uuid,
        role: Role,
        ticket_id: Uuid,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let actor = Self::authenticate(requester_id, role)?;
        if !actor.role.is_elevated() {
            return Err(EngineError::Forbidden(
                "only elevated roles may delete tickets".into(),
            ));
        }
        let now = Utc::now();
        let current = self.load_ticket(ticket_id).await?;
        self.check_scope(&actor, &current).await?;
        let mut deleted = current.clone();
        deleted.deleted_at = Some(now);
        deleted.deleted_by = Some(actor.id);
        deleted.delete_reason = reason;
        deleted.version = current.version + 1;
        deleted.updated_at = now;
        let committed = self.tickets.update(deleted, current.version).await?;
        self.dispatcher.dispatch_delete(&actor, &committed).await;
        info!("ticket {} deleted by {}", committed.display_folio(), actor.id);
        Ok(())
    }

    async fn resolve_rule_target(
        &self,
        rule: &AssignmentRule,
    ) -> Result<Option<Uuid>, EngineError> {
        if let Some(user_id) = rule.target_user_id {
            let user = self.directory.get_user(user_id).await?;
            return Ok(user.filter(|u| u.active).map(|u| u.id));
        }
        if let Some(role) = rule.target_role {
            let users = self.directory.list_active_users_with_role(role).await?;
            let mut loads = Vec::with_capacity(users.len());
            for user in users {
                loads.push(CandidateLoad {
                    user_id: user.id,
                    open_tickets: self.tickets.count_open_assigned_to(user.id).await?,
                });
            }
            return Ok(evaluator::pick_least_loaded(&loads));
        }
        Ok(None)
    }

    /// First matching rule with a usable target wins; the assignment goes
    /// through the normal guarded commit so every derived field and side
    /// effect matches a manual assignment.
    async fn assign_by_rules(
        &self,
        ticket: &Ticket,
        rules: &[AssignmentRule],
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        for rule in rules {
            if !evaluator::rule_matches(rule, ticket) {
                continue;
            }
            let Some(target) = self.resolve_rule_target(rule).await? else {
                continue;
            };
            let open = self.tickets.count_open_assigned_to(target).await?;
            if evaluator::cap_exhausted(rule, open) {
                debug!(
                    "rule '{}' skipped for {}: target {} holds {} open ticket(s)",
                    rule.name,
                    ticket.display_folio(),
                    target,
                    open
                );
                continue;
            }
            let changes = TicketChangeSet {
                assignee_id: Some(Some(target)),
                ..Default::default()
            };
            let actor = self.automation_actor();
            self.commit_change(&actor, ticket.clone(), &changes, now)
                .await?;
            info!(
                "rule '{}' assigned ticket {} to {}",
                rule.name,
                ticket.display_folio(),
                target
            );
            return Ok(true);
        }
        Ok(false)
    }

    /// One scheduler tick. Eligibility is re-read per ticket right before
    /// its commit, so a ticket taken by a manual edit or a concurrent tick
    /// is skipped rather than double-assigned; a failure on one ticket
    /// never aborts the rest of the pass.
    pub async fn run_assignment_pass(&self, now: DateTime<Utc>) -> Result<usize, EngineError> {
        let rules = self.rules.list_active().await?;
        if rules.is_empty() {
            return Ok(0);
        }
        let pool = self.tickets.list_unassigned().await?;
        let mut assigned = 0;
        for stale in pool {
            let Some(ticket) = self.tickets.get(stale.id).await? else {
                continue;
            };
            if ticket.assignee_id.is_some() || !ticket.is_open() {
                continue;
            }
            match self.assign_by_rules(&ticket, &rules, now).await {
                Ok(true) => assigned += 1,
                Ok(false) => {}
                Err(e) if e.is_conflict() => {
                    debug!(
                        "ticket {} was taken concurrently, skipping",
                        ticket.display_folio()
                    );
                }
                Err(e) => {
                    warn!(
                        "assignment failed for ticket {}: {e}",
                        ticket.display_folio()
                    );
                }
            }
        }
        Ok(assigned)
    }

    pub async fn list_active_assignment_rules(&self) -> Result<Vec<AssignmentRule>, EngineError> {
        self.rules.list_active().await
    }

    pub async fn list_assignment_rules(&self) -> Result<Vec<AssignmentRule>, EngineError> {
        self.rules.list_all().await
    }

    pub async fn upsert_rule(&self, rule: AssignmentRule) -> Result<AssignmentRule, EngineError> {
        rule.validate()?;
        self.rules.upsert(rule).await
    }

    pub async fn delete_rule(&self, rule_id: Uuid) -> Result<(), EngineError> {
        self.rules.delete(rule_id).await
    }
}
