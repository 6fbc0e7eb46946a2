//! Collaborator seams. The engine only talks to storage and to the
//! audit/notification sinks through these object-safe traits; the in-memory
//! implementations in [`memory`] are the reference semantics and the test
//! fixtures.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::assignment::AssignmentRule;
use crate::audit::{AuditEntry, Notification};
use crate::directory::{Department, Role, Unit, User};
use crate::engine::EngineError;
use crate::tickets::Ticket;

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Stores a new ticket, assigning the next sequential folio.
    async fn insert(&self, ticket: Ticket) -> Result<Ticket, EngineError>;

    async fn get(&self, id: Uuid) -> Result<Option<Ticket>, EngineError>;

    /// Conditional update: commits only when the stored version still equals
    /// `expected_version`, otherwise fails with `Conflict`.
    async fn update(&self, ticket: Ticket, expected_version: i64) -> Result<Ticket, EngineError>;

    /// Unassigned, non-deleted, non-finalized tickets, the assignment
    /// evaluator's pool.
    async fn list_unassigned(&self) -> Result<Vec<Ticket>, EngineError>;

    /// Open (non-FINALIZADO, non-deleted) tickets currently held by a user.
    async fn count_open_assigned_to(&self, user_id: Uuid) -> Result<i64, EngineError>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules in ascending `order`.
    async fn list_active(&self) -> Result<Vec<AssignmentRule>, EngineError>;

    async fn list_all(&self) -> Result<Vec<AssignmentRule>, EngineError>;

    async fn upsert(&self, rule: AssignmentRule) -> Result<AssignmentRule, EngineError>;

    async fn delete(&self, rule_id: Uuid) -> Result<(), EngineError>;
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, EngineError>;

    async fn list_active_users_with_role(&self, role: Role) -> Result<Vec<User>, EngineError>;

    async fn get_department(&self, id: Uuid) -> Result<Option<Department>, EngineError>;

    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>, EngineError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), EngineError>;
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), EngineError>;
}
