pub mod scope;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// TECNICO is the basic worker role. SUPERVISOR and ADMIN are elevated;
/// ADMIN is additionally unrestricted for scope purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Tecnico,
    Supervisor,
    Admin,
}

impl Role {
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Supervisor | Role::Admin)
    }
}

/// The identity+role pair the authentication layer supplies with every
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub active: bool,
    pub department_ids: Vec<Uuid>,
    pub unit_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub department_id: Uuid,
    pub name: String,
    pub active: bool,
}
