//! Audit trail and notification side effects. Runs after a commit; sink
//! failures are logged and swallowed, they never roll back or fail the
//! committed change.

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::directory::{Actor, Role};
use crate::store::{AuditSink, DirectoryStore, NotificationSink};
use crate::tickets::{Ticket, TicketChangeSet, TicketStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

/// Closed set of auditable ticket fields. The diff never carries anything
/// outside this set, so a payload cannot smuggle or mis-type a field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditedField {
    Title,
    Description,
    TicketType,
    Priority,
    Channel,
    Status,
    AssigneeId,
    AssigneeLabel,
    DepartmentId,
    UnitId,
    ParentId,
    ExternalRef,
}

/// Before/after pair for one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub previous: Value,
    pub new: Value,
}

pub type TicketDiff = BTreeMap<AuditedField, FieldChange>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub changes: TicketDiff,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    TicketAssigned,
    ValidationRequested,
    TicketReopened,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub recipient: Uuid,
    pub ticket_id: Uuid,
    pub created_at: DateTime<Utc>,
}

fn json_of<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn push_if_changed(diff: &mut TicketDiff, field: AuditedField, previous: Value, new: Value) {
    if previous != new {
        diff.insert(field, FieldChange { previous, new });
    }
}

/// Shallow field diff between the pre- and post-commit ticket, restricted
/// to fields present in the normalized change set.
pub fn diff_ticket(old: &Ticket, new: &Ticket, changes: &TicketChangeSet) -> TicketDiff {
    let mut diff = TicketDiff::new();
    if changes.title.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::Title,
            json_of(&old.title),
            json_of(&new.title),
        );
    }
    if changes.description.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::Description,
            json_of(&old.description),
            json_of(&new.description),
        );
    }
    if changes.ticket_type.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::TicketType,
            json_of(&old.ticket_type),
            json_of(&new.ticket_type),
        );
    }
    if changes.priority.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::Priority,
            json_of(&old.priority),
            json_of(&new.priority),
        );
    }
    if changes.channel.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::Channel,
            json_of(&old.channel),
            json_of(&new.channel),
        );
    }
    if changes.status.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::Status,
            json_of(&old.status),
            json_of(&new.status),
        );
    }
    if changes.assignee_id.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::AssigneeId,
            json_of(&old.assignee_id),
            json_of(&new.assignee_id),
        );
    }
    if changes.assignee_label.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::AssigneeLabel,
            json_of(&old.assignee_label),
            json_of(&new.assignee_label),
        );
    }
    if changes.department_id.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::DepartmentId,
            json_of(&old.department_id),
            json_of(&new.department_id),
        );
    }
    if changes.unit_id.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::UnitId,
            json_of(&old.unit_id),
            json_of(&new.unit_id),
        );
    }
    if changes.parent_id.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::ParentId,
            json_of(&old.parent_id),
            json_of(&new.parent_id),
        );
    }
    if changes.external_ref.is_some() {
        push_if_changed(
            &mut diff,
            AuditedField::ExternalRef,
            json_of(&old.external_ref),
            json_of(&new.external_ref),
        );
    }
    diff
}

/// Post-commit side-effect dispatcher: one audit entry per non-empty diff
/// plus transition-specific notifications, each independent of the others.
pub struct Dispatcher {
    audit: Arc<dyn AuditSink>,
    notifications: Arc<dyn NotificationSink>,
    directory: Arc<dyn DirectoryStore>,
}

impl Dispatcher {
    pub fn new(
        audit: Arc<dyn AuditSink>,
        notifications: Arc<dyn NotificationSink>,
        directory: Arc<dyn DirectoryStore>,
    ) -> Self {
        Self {
            audit,
            notifications,
            directory,
        }
    }

    async fn record_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.record(entry).await {
            warn!("audit write failed, continuing: {e}");
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifications.send(notification).await {
            warn!("notification delivery failed, continuing: {e}");
        }
    }

    fn notification(
        kind: NotificationKind,
        title: String,
        body: String,
        recipient: Uuid,
        ticket: &Ticket,
        now: DateTime<Utc>,
    ) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            kind,
            title,
            body,
            recipient,
            ticket_id: ticket.id,
            created_at: now,
        }
    }

    pub async fn dispatch_create(&self, actor: &Actor, ticket: &Ticket) {
        let now = Utc::now();
        self.record_audit(AuditEntry {
            id: Uuid::new_v4(),
            action: AuditAction::Create,
            entity_type: "ticket".into(),
            entity_id: ticket.id,
            changes: TicketDiff::new(),
            actor_id: actor.id,
            created_at: now,
        })
        .await;
    }

    pub async fn dispatch_delete(&self, actor: &Actor, ticket: &Ticket) {
        let now = Utc::now();
        self.record_audit(AuditEntry {
            id: Uuid::new_v4(),
            action: AuditAction::Delete,
            entity_type: "ticket".into(),
            entity_id: ticket.id,
            changes: TicketDiff::new(),
            actor_id: actor.id,
            created_at: now,
        })
        .await;
    }

    pub async fn dispatch_update(
        &self,
        actor: &Actor,
        old: &Ticket,
        new: &Ticket,
        changes: &TicketChangeSet,
    ) {
        let now = Utc::now();
        let diff = diff_ticket(old, new, changes);
        if !diff.is_empty() {
            self.record_audit(AuditEntry {
                id: Uuid::new_v4(),
                action: AuditAction::Update,
                entity_type: "ticket".into(),
                entity_id: new.id,
                changes: diff,
                actor_id: actor.id,
                created_at: now,
            })
            .await;
        }

        if let Some(assignee) = new.assignee_id {
            if old.assignee_id != Some(assignee) {
                self.notify(Self::notification(
                    NotificationKind::TicketAssigned,
                    format!("Ticket {} assigned to you", new.display_folio()),
                    new.title.clone(),
                    assignee,
                    new,
                    now,
                ))
                .await;
            }
        }

        if new.status == TicketStatus::PendienteValidacion
            && old.status != TicketStatus::PendienteValidacion
        {
            self.notify_managers(new, now).await;
        }

        if new.status == TicketStatus::Reabierto && old.status != TicketStatus::Reabierto {
            if let Some(assignee) = new.assignee_id {
                self.notify(Self::notification(
                    NotificationKind::TicketReopened,
                    format!("Ticket {} was reopened", new.display_folio()),
                    new.title.clone(),
                    assignee,
                    new,
                    now,
                ))
                .await;
            }
        }
    }

    /// Entering PENDIENTE_VALIDACION notifies every active elevated user.
    async fn notify_managers(&self, ticket: &Ticket, now: DateTime<Utc>) {
        for role in [Role::Supervisor, Role::Admin] {
            let managers = match self.directory.list_active_users_with_role(role).await {
                Ok(users) => users,
                Err(e) => {
                    warn!("manager lookup failed for validation notice: {e}");
                    continue;
                }
            };
            for manager in managers {
                self.notify(Self::notification(
                    NotificationKind::ValidationRequested,
                    format!("Ticket {} awaits validation", ticket.display_folio()),
                    ticket.title.clone(),
                    manager.id,
                    ticket,
                    now,
                ))
                .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryAuditSink, MemoryDirectoryStore, MemoryNotificationSink};
    use crate::tickets::lifecycle::tests::sample_ticket;
    use crate::tickets::Priority;

    fn fixture() -> (
        Dispatcher,
        MemoryAuditSink,
        MemoryNotificationSink,
        MemoryDirectoryStore,
    ) {
        let audit = MemoryAuditSink::new();
        let notifications = MemoryNotificationSink::new();
        let directory = MemoryDirectoryStore::new();
        let dispatcher = Dispatcher::new(
            Arc::new(audit.clone()),
            Arc::new(notifications.clone()),
            Arc::new(directory.clone()),
        );
        (dispatcher, audit, notifications, directory)
    }

    fn actor() -> Actor {
        Actor {
            id: Uuid::new_v4(),
            role: Role::Supervisor,
        }
    }

    #[test]
    fn test_diff_limited_to_payload_fields() {
        let old = sample_ticket();
        let mut new = old.clone();
        new.title = "renamed".into();
        new.priority = Priority::Alta;
        new.started_at = Some(Utc::now());

        // Priority changed in storage but not in the payload.
        let changes = TicketChangeSet {
            title: Some("renamed".into()),
            ..Default::default()
        };
        let diff = diff_ticket(&old, &new, &changes);
        assert_eq!(diff.len(), 1);
        let change = diff.get(&AuditedField::Title).unwrap();
        assert_eq!(change.previous, serde_json::json!("printer offline"));
        assert_eq!(change.new, serde_json::json!("renamed"));
    }

    #[test]
    fn test_unchanged_payload_field_drops_out_of_diff() {
        let old = sample_ticket();
        let new = old.clone();
        let changes = TicketChangeSet {
            title: Some(old.title.clone()),
            ..Default::default()
        };
        assert!(diff_ticket(&old, &new, &changes).is_empty());
    }

    #[tokio::test]
    async fn test_no_audit_entry_for_empty_diff() {
        let (dispatcher, audit, _, _) = fixture();
        let old = sample_ticket();
        let changes = TicketChangeSet {
            title: Some(old.title.clone()),
            ..Default::default()
        };
        dispatcher
            .dispatch_update(&actor(), &old, &old.clone(), &changes)
            .await;
        assert!(audit.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_new_assignee_is_notified() {
        let (dispatcher, audit, notifications, _) = fixture();
        let old = sample_ticket();
        let assignee = Uuid::new_v4();
        let mut new = old.clone();
        new.assignee_id = Some(assignee);
        new.status = TicketStatus::Asignado;
        let changes = TicketChangeSet {
            assignee_id: Some(Some(assignee)),
            status: Some(TicketStatus::Asignado),
            ..Default::default()
        };
        dispatcher.dispatch_update(&actor(), &old, &new, &changes).await;

        assert_eq!(audit.entries().await.len(), 1);
        let sent = notifications.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::TicketAssigned);
        assert_eq!(sent[0].recipient, assignee);
    }

    #[tokio::test]
    async fn test_validation_request_notifies_active_managers() {
        let (dispatcher, _, notifications, directory) = fixture();
        let supervisor = crate::directory::User {
            id: Uuid::new_v4(),
            name: "sup".into(),
            role: Role::Supervisor,
            active: true,
            department_ids: vec![],
            unit_ids: vec![],
        };
        let mut inactive = supervisor.clone();
        inactive.id = Uuid::new_v4();
        inactive.active = false;
        directory.add_user(supervisor.clone()).await;
        directory.add_user(inactive).await;

        let mut old = sample_ticket();
        old.status = TicketStatus::EnProgreso;
        let mut new = old.clone();
        new.status = TicketStatus::PendienteValidacion;
        let changes = TicketChangeSet {
            status: Some(TicketStatus::PendienteValidacion),
            ..Default::default()
        };
        dispatcher.dispatch_update(&actor(), &old, &new, &changes).await;

        let sent = notifications.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::ValidationRequested);
        assert_eq!(sent[0].recipient, supervisor.id);
    }

    #[tokio::test]
    async fn test_reopen_notifies_current_assignee() {
        let (dispatcher, _, notifications, _) = fixture();
        let assignee = Uuid::new_v4();
        let mut old = sample_ticket();
        old.status = TicketStatus::PendienteValidacion;
        old.assignee_id = Some(assignee);
        let mut new = old.clone();
        new.status = TicketStatus::Reabierto;
        let changes = TicketChangeSet {
            status: Some(TicketStatus::Reabierto),
            ..Default::default()
        };
        dispatcher.dispatch_update(&actor(), &old, &new, &changes).await;

        let sent = notifications.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::TicketReopened);
        assert_eq!(sent[0].recipient, assignee);
    }
}
