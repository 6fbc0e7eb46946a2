pub mod guard;
pub mod lifecycle;
pub mod sla;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use sla::{SlaPhase, SlaPhaseStatus, SlaStatus};

/// Ticket priority. Higher priority means shorter SLA budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Alta,
    Media,
    Baja,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Portal,
    Email,
    Chat,
    Whatsapp,
}

/// Lifecycle states. CREADO is initial; FINALIZADO is terminal unless the
/// ticket is reopened, in which case REABIERTO restarts the work phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Creado,
    Asignado,
    EnProgreso,
    PendienteValidacion,
    Finalizado,
    Reabierto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    /// Sequential folio assigned by the store at creation.
    pub folio: i64,
    pub title: String,
    pub description: Option<String>,
    pub ticket_type: String,
    pub priority: Priority,
    pub channel: Channel,
    pub status: TicketStatus,
    /// Creator. Immutable after creation.
    pub owner_id: Uuid,
    pub assignee_id: Option<Uuid>,
    /// Legacy free-text assignee label, display-only and independent of
    /// `assignee_id`.
    pub assignee_label: Option<String>,
    pub department_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub external_ref: Option<String>,
    pub sla_response_minutes: Option<i64>,
    pub sla_resolution_minutes: Option<i64>,
    pub response_due_at: Option<DateTime<Utc>>,
    pub resolution_due_at: Option<DateTime<Utc>>,
    /// Earliest of entering EN_PROGRESO, PENDIENTE_VALIDACION or FINALIZADO.
    /// Write-once.
    pub first_response_at: Option<DateTime<Utc>>,
    /// Write-once; never cleared, even across reopen or reassignment.
    pub sla_response_breached_at: Option<DateTime<Utc>>,
    /// Write-once; never cleared, even across reopen or reassignment.
    pub sla_resolution_breached_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub pending_validation_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub reopened_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    pub delete_reason: Option<String>,
    /// Incremented by every committed update; commits are conditional on the
    /// version read before the guard ran.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn display_folio(&self) -> String {
        format!("TKT-{:06}", self.folio)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Open means it still counts against an assignee's workload.
    pub fn is_open(&self) -> bool {
        self.status != TicketStatus::Finalizado && !self.is_deleted()
    }

    /// True when any of the four SLA clock fields is missing.
    pub fn sla_fields_incomplete(&self) -> bool {
        self.sla_response_minutes.is_none()
            || self.sla_resolution_minutes.is_none()
            || self.response_due_at.is_none()
            || self.resolution_due_at.is_none()
    }
}

/// Payload for ticket creation. The folio, status and SLA clock are derived
/// by the engine, never supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    pub description: Option<String>,
    pub ticket_type: String,
    pub priority: Priority,
    pub channel: Channel,
    pub department_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub external_ref: Option<String>,
}

/// Closed, typed change set: one optional field per mutable ticket
/// attribute. `None` means "not present in the request"; for nullable
/// attributes `Some(None)` means "clear the field".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketChangeSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_label: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<Option<String>>,
}

impl TicketChangeSet {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.ticket_type.is_none()
            && self.priority.is_none()
            && self.channel.is_none()
            && self.status.is_none()
            && self.assignee_id.is_none()
            && self.assignee_label.is_none()
            && self.department_id.is_none()
            && self.unit_id.is_none()
            && self.parent_id.is_none()
            && self.external_ref.is_none()
    }

    /// True when any field other than `status` is present.
    pub fn touches_non_status(&self) -> bool {
        let mut probe = self.clone();
        probe.status = None;
        !probe.is_empty()
    }
}

/// A ticket together with its point-in-time SLA evaluation, as returned by
/// every engine read and mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketWithSla {
    pub ticket: Ticket,
    pub sla: SlaStatus,
}
