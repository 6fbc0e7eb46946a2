use serde::{Deserialize, Serialize};

use crate::tickets::Priority;

/// Response/resolution budget, in minutes, for one priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaBudget {
    pub response_minutes: i64,
    pub resolution_minutes: i64,
}

/// Per-priority SLA budget table. Higher priority rows carry shorter
/// budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaTable {
    pub alta: SlaBudget,
    pub media: SlaBudget,
    pub baja: SlaBudget,
}

impl Default for SlaTable {
    fn default() -> Self {
        Self {
            alta: SlaBudget {
                response_minutes: 30,
                resolution_minutes: 240,
            },
            media: SlaBudget {
                response_minutes: 120,
                resolution_minutes: 960,
            },
            baja: SlaBudget {
                response_minutes: 480,
                resolution_minutes: 2880,
            },
        }
    }
}

impl SlaTable {
    pub fn budget(&self, priority: Priority) -> SlaBudget {
        match priority {
            Priority::Alta => self.alta,
            Priority::Media => self.media,
            Priority::Baja => self.baja,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sla: SlaTable,
    /// Minutes before a due time during which an unmet phase reports
    /// `warning` instead of `ok`.
    pub sla_warning_window_minutes: i64,
    /// Seconds between assignment scheduler ticks.
    pub assignment_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sla: SlaTable::default(),
            sla_warning_window_minutes: 30,
            assignment_interval_secs: 60,
        }
    }
}

fn env_i64(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = SlaTable::default();
        Self {
            sla: SlaTable {
                alta: SlaBudget {
                    response_minutes: env_i64(
                        "SLA_ALTA_RESPONSE_MINUTES",
                        defaults.alta.response_minutes,
                    ),
                    resolution_minutes: env_i64(
                        "SLA_ALTA_RESOLUTION_MINUTES",
                        defaults.alta.resolution_minutes,
                    ),
                },
                media: SlaBudget {
                    response_minutes: env_i64(
                        "SLA_MEDIA_RESPONSE_MINUTES",
                        defaults.media.response_minutes,
                    ),
                    resolution_minutes: env_i64(
                        "SLA_MEDIA_RESOLUTION_MINUTES",
                        defaults.media.resolution_minutes,
                    ),
                },
                baja: SlaBudget {
                    response_minutes: env_i64(
                        "SLA_BAJA_RESPONSE_MINUTES",
                        defaults.baja.response_minutes,
                    ),
                    resolution_minutes: env_i64(
                        "SLA_BAJA_RESOLUTION_MINUTES",
                        defaults.baja.resolution_minutes,
                    ),
                },
            },
            sla_warning_window_minutes: env_i64("SLA_WARNING_WINDOW_MINUTES", 30),
            assignment_interval_secs: env_u64("ASSIGNMENT_INTERVAL_SECS", 60),
        }
    }
}
