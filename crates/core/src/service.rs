//! Service lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a running service instance.
///
/// Transitions are monotonic within
/// `NotRunning → Starting → Running → Stopping → NotRunning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    NotRunning,
    Starting,
    Running,
    Stopping,
}

impl ServiceState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: ServiceState) -> bool {
        matches!(
            (self, next),
            (ServiceState::NotRunning, ServiceState::Starting)
                | (ServiceState::Starting, ServiceState::Running)
                | (ServiceState::Running, ServiceState::Stopping)
                | (ServiceState::Stopping, ServiceState::NotRunning)
        )
    }
}

impl Default for ServiceState {
    fn default() -> Self {
        Self::NotRunning
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceState::NotRunning => "not_running",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions_allowed() {
        use ServiceState::*;
        assert!(NotRunning.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(NotRunning));

        assert!(!NotRunning.can_transition_to(Running));
        assert!(!Running.can_transition_to(Starting));
        assert!(!Starting.can_transition_to(NotRunning));
        assert!(!Stopping.can_transition_to(Running));
    }
}
