//! In-memory reference stores and sinks, kept behind `Arc<RwLock<..>>`.
//! They define the reference semantics for folio assignment and
//! version-conditional updates, and double as the test fixtures and the
//! demo-binary wiring.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::assignment::AssignmentRule;
use crate::audit::{AuditEntry, Notification};
use crate::directory::{Department, Role, Unit, User};
use crate::engine::EngineError;
use crate::store::{AuditSink, DirectoryStore, NotificationSink, RuleStore, TicketStore};
use crate::tickets::Ticket;

#[derive(Default)]
struct TicketShelf {
    tickets: HashMap<Uuid, Ticket>,
    next_folio: i64,
}

#[derive(Clone, Default)]
pub struct MemoryTicketStore {
    shelf: Arc<RwLock<TicketShelf>>,
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/seed helper: stores a fully formed ticket verbatim, folio
    /// included.
    pub async fn seed(&self, ticket: Ticket) {
        let mut shelf = self.shelf.write().await;
        shelf.next_folio = shelf.next_folio.max(ticket.folio);
        shelf.tickets.insert(ticket.id, ticket);
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn insert(&self, mut ticket: Ticket) -> Result<Ticket, EngineError> {
        let mut shelf = self.shelf.write().await;
        shelf.next_folio += 1;
        ticket.folio = shelf.next_folio;
        shelf.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Ticket>, EngineError> {
        Ok(self.shelf.read().await.tickets.get(&id).cloned())
    }

    async fn update(&self, ticket: Ticket, expected_version: i64) -> Result<Ticket, EngineError> {
        let mut shelf = self.shelf.write().await;
        let stored = shelf
            .tickets
            .get(&ticket.id)
            .ok_or_else(|| EngineError::NotFound(format!("ticket {}", ticket.id)))?;
        if stored.version != expected_version {
            return Err(EngineError::Conflict(format!(
                "ticket {} changed concurrently (expected v{}, found v{})",
                ticket.id, expected_version, stored.version
            )));
        }
        shelf.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn list_unassigned(&self) -> Result<Vec<Ticket>, EngineError> {
        let shelf = self.shelf.read().await;
        let mut pool: Vec<Ticket> = shelf
            .tickets
            .values()
            .filter(|t| t.assignee_id.is_none() && t.is_open())
            .cloned()
            .collect();
        pool.sort_by_key(|t| t.folio);
        Ok(pool)
    }

    async fn count_open_assigned_to(&self, user_id: Uuid) -> Result<i64, EngineError> {
        let shelf = self.shelf.read().await;
        Ok(shelf
            .tickets
            .values()
            .filter(|t| t.assignee_id == Some(user_id) && t.is_open())
            .count() as i64)
    }
}

#[derive(Clone, Default)]
pub struct MemoryRuleStore {
    rules: Arc<RwLock<HashMap<Uuid, AssignmentRule>>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list_active(&self) -> Result<Vec<AssignmentRule>, EngineError> {
        let rules = self.rules.read().await;
        let mut active: Vec<AssignmentRule> =
            rules.values().filter(|r| r.active).cloned().collect();
        active.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
        Ok(active)
    }

    async fn list_all(&self) -> Result<Vec<AssignmentRule>, EngineError> {
        let rules = self.rules.read().await;
        let mut all: Vec<AssignmentRule> = rules.values().cloned().collect();
        all.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn upsert(&self, rule: AssignmentRule) -> Result<AssignmentRule, EngineError> {
        let mut rules = self.rules.write().await;
        rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn delete(&self, rule_id: Uuid) -> Result<(), EngineError> {
        let mut rules = self.rules.write().await;
        rules
            .remove(&rule_id)
            .map(|_| ())
            .ok_or_else(|| EngineError::NotFound(format!("rule {rule_id}")))
    }
}

#[derive(Clone, Default)]
pub struct MemoryDirectoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    departments: Arc<RwLock<HashMap<Uuid, Department>>>,
    units: Arc<RwLock<HashMap<Uuid, Unit>>>,
}

impl MemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn add_department(&self, department: Department) {
        self.departments
            .write()
            .await
            .insert(department.id, department);
    }

    pub async fn add_unit(&self, unit: Unit) {
        self.units.write().await.insert(unit.id, unit);
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, EngineError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list_active_users_with_role(&self, role: Role) -> Result<Vec<User>, EngineError> {
        let users = self.users.read().await;
        let mut matching: Vec<User> = users
            .values()
            .filter(|u| u.active && u.role == role)
            .cloned()
            .collect();
        matching.sort_by_key(|u| u.id);
        Ok(matching)
    }

    async fn get_department(&self, id: Uuid) -> Result<Option<Department>, EngineError> {
        Ok(self.departments.read().await.get(&id).cloned())
    }

    async fn get_unit(&self, id: Uuid) -> Result<Option<Unit>, EngineError> {
        Ok(self.units.read().await.get(&id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), EngineError> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryNotificationSink {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn send(&self, notification: Notification) -> Result<(), EngineError> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tickets::lifecycle::tests::sample_ticket;

    #[tokio::test]
    async fn test_insert_assigns_sequential_folios() {
        let store = MemoryTicketStore::new();
        let first = store.insert(sample_ticket()).await.unwrap();
        let second = store.insert(sample_ticket()).await.unwrap();
        assert_eq!(first.folio, 1);
        assert_eq!(second.folio, 2);
    }

    #[tokio::test]
    async fn test_stale_version_update_is_a_conflict() {
        let store = MemoryTicketStore::new();
        let ticket = store.insert(sample_ticket()).await.unwrap();

        let mut winner = ticket.clone();
        winner.version = ticket.version + 1;
        store.update(winner, ticket.version).await.unwrap();

        let mut loser = ticket.clone();
        loser.title = "stale edit".into();
        loser.version = ticket.version + 1;
        let err = store.update(loser, ticket.version).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_unassigned_pool_excludes_closed_and_deleted() {
        let store = MemoryTicketStore::new();
        store.insert(sample_ticket()).await.unwrap();

        let mut finished = sample_ticket();
        finished.status = crate::tickets::TicketStatus::Finalizado;
        store.insert(finished).await.unwrap();

        let mut deleted = sample_ticket();
        deleted.deleted_at = Some(chrono::Utc::now());
        store.insert(deleted).await.unwrap();

        let mut taken = sample_ticket();
        taken.assignee_id = Some(Uuid::new_v4());
        store.insert(taken).await.unwrap();

        assert_eq!(store.list_unassigned().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_ticket_count_per_user() {
        let store = MemoryTicketStore::new();
        let user = Uuid::new_v4();

        let mut open = sample_ticket();
        open.assignee_id = Some(user);
        store.insert(open).await.unwrap();

        let mut closed = sample_ticket();
        closed.assignee_id = Some(user);
        closed.status = crate::tickets::TicketStatus::Finalizado;
        store.insert(closed).await.unwrap();

        assert_eq!(store.count_open_assigned_to(user).await.unwrap(), 1);
    }
}
