pub mod evaluator;
pub mod scheduler;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::Role;
use crate::engine::EngineError;
use crate::tickets::Priority;

pub use scheduler::AssignmentScheduler;

/// Ordered automation directive. Lower `order` is evaluated first; the
/// first rule producing a usable target wins. A rule carries exactly one
/// target kind, a user id taking precedence over a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub order: i32,
    /// Exact-match filter; `None` matches any type.
    pub ticket_type: Option<String>,
    /// Exact-match filter; `None` matches any priority.
    pub priority: Option<Priority>,
    pub target_user_id: Option<Uuid>,
    pub target_role: Option<Role>,
    /// Cap on the target's concurrently open tickets, counted across manual
    /// and automated assignment alike. `None` is unbounded.
    pub max_active: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssignmentRule {
    /// Upsert-time validation; rules with no target are rejected before
    /// they can reach the evaluator.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.target_user_id.is_none() && self.target_role.is_none() {
            return Err(EngineError::InvalidArgument(format!(
                "rule '{}' has neither a target user nor a target role",
                self.name
            )));
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidArgument("rule name is empty".into()));
        }
        if let Some(cap) = self.max_active {
            if cap < 1 {
                return Err(EngineError::InvalidArgument(format!(
                    "rule '{}' declares a non-positive max_active",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn rule(order: i32) -> AssignmentRule {
        let now = Utc::now();
        AssignmentRule {
            id: Uuid::new_v4(),
            name: format!("rule-{order}"),
            active: true,
            order,
            ticket_type: None,
            priority: None,
            target_user_id: None,
            target_role: Some(Role::Tecnico),
            max_active: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rule_without_target_is_invalid() {
        let mut bad = rule(1);
        bad.target_role = None;
        assert!(matches!(
            bad.validate().unwrap_err(),
            EngineError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_non_positive_cap_is_invalid() {
        let mut bad = rule(1);
        bad.max_active = Some(0);
        assert!(bad.validate().is_err());
        bad.max_active = Some(3);
        assert!(bad.validate().is_ok());
    }
}
