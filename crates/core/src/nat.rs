//! NAT traversal status as observed from traversal/mapping events.
//!
//! The traversal machinery itself lives outside the core; the core only
//! consumes its events and keeps the last known outcome.

use serde::{Deserialize, Serialize};

/// Stage name reported by the hole-punching path.
pub const STAGE_TRAVERSAL: &str = "hole_punching";
/// Stage name reported by the port-mapping path.
pub const STAGE_MAPPING: &str = "port_mapping";

/// Outcome of a single NAT traversal or port-mapping attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatEvent {
    pub stage: String,
    pub successful: bool,
    pub error: String,
}

impl NatEvent {
    pub fn success(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            successful: true,
            error: String::new(),
        }
    }

    pub fn failure(stage: &str, error: &str) -> Self {
        Self {
            stage: stage.to_string(),
            successful: false,
            error: error.to_string(),
        }
    }
}

/// Aggregated NAT status exposed in the node state snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatStatus {
    pub status: String,
    pub error: String,
}

pub const STATUS_NOT_FINISHED: &str = "not_finished";
pub const STATUS_SUCCESSFUL: &str = "successful";
pub const STATUS_FAILURE: &str = "failure";

impl NatStatus {
    /// Status before any traversal attempt has completed.
    pub fn not_finished() -> Self {
        Self {
            status: STATUS_NOT_FINISHED.to_string(),
            error: String::new(),
        }
    }

    /// Derive a status from the last observed event.
    pub fn from_event(event: &NatEvent) -> Self {
        if event.successful {
            Self {
                status: STATUS_SUCCESSFUL.to_string(),
                error: String::new(),
            }
        } else {
            Self {
                status: STATUS_FAILURE.to_string(),
                error: event.error.clone(),
            }
        }
    }
}

impl Default for NatStatus {
    fn default() -> Self {
        Self::not_finished()
    }
}
