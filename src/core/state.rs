//! Turn state types

use serde::{Deserialize, Serialize};

/// Current state of a conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TurnState {
    /// Selecting the agent that will handle the message
    Routing,

    /// Consuming the capability provider's event stream
    Streaming {
        /// Name of the agent producing output
        agent: String,
    },

    /// Suspended until the caller resubmits with approval decisions
    AwaitingApproval {
        /// Number of outstanding approval requests
        pending: usize,
    },

    /// Writing the assistant interaction and charging credits
    Persisting,

    /// Turn completed successfully
    Done,

    /// Turn failed
    Errored {
        /// Error message
        message: String,
    },
}

impl TurnState {
    /// Check if the turn is in a terminal state (Done or Errored)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Done | TurnState::Errored { .. })
    }

    /// Whether moving from this state to `next` is a legal transition
    ///
    /// `AwaitingApproval` is terminal for the request that suspended the turn;
    /// a resume call starts again from `Streaming`.
    pub fn can_transition_to(&self, next: &TurnState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, TurnState::Errored { .. }) {
            return true;
        }

        match (self, next) {
            (TurnState::Routing, TurnState::Streaming { .. }) => true,
            // Delegation from triage to a specialist re-enters streaming
            (TurnState::Streaming { .. }, TurnState::Streaming { .. }) => true,
            (TurnState::Streaming { .. }, TurnState::AwaitingApproval { .. }) => true,
            (TurnState::Streaming { .. }, TurnState::Persisting) => true,
            (TurnState::AwaitingApproval { .. }, TurnState::Streaming { .. }) => true,
            // Every request rejected: nothing to stream
            (TurnState::AwaitingApproval { .. }, TurnState::Persisting) => true,
            (TurnState::Persisting, TurnState::Done) => true,
            _ => false,
        }
    }

    /// Create an errored state
    pub fn errored(msg: impl Into<String>) -> Self {
        TurnState::Errored {
            message: msg.into(),
        }
    }

    /// Create a streaming state
    pub fn streaming(agent: impl Into<String>) -> Self {
        TurnState::Streaming {
            agent: agent.into(),
        }
    }
}

impl Default for TurnState {
    fn default() -> Self {
        TurnState::Routing
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnState::Routing => write!(f, "Routing"),
            TurnState::Streaming { agent } => write!(f, "Streaming from {}", agent),
            TurnState::AwaitingApproval { pending } => {
                write!(f, "Awaiting approval ({} pending)", pending)
            }
            TurnState::Persisting => write!(f, "Persisting"),
            TurnState::Done => write!(f, "Done"),
            TurnState::Errored { message } => write!(f, "Errored: {}", message),
        }
    }
}

/// Tracks the state of one turn and logs every transition
#[derive(Debug)]
pub struct TurnTracker {
    state: TurnState,
    label: String,
}

impl TurnTracker {
    /// Start tracking a fresh turn in `Routing`
    pub fn fresh(label: impl Into<String>) -> Self {
        Self {
            state: TurnState::Routing,
            label: label.into(),
        }
    }

    /// Start tracking a resumed turn in `AwaitingApproval`
    pub fn resumed(label: impl Into<String>, pending: usize) -> Self {
        Self {
            state: TurnState::AwaitingApproval { pending },
            label: label.into(),
        }
    }

    /// Current state
    pub fn state(&self) -> &TurnState {
        &self.state
    }

    /// Move to `next`; illegal transitions are logged and ignored
    pub fn advance(&mut self, next: TurnState) -> bool {
        if !self.state.can_transition_to(&next) {
            tracing::warn!(
                "[Turn {}] Ignoring illegal transition {} -> {}",
                self.label,
                self.state,
                next
            );
            return false;
        }
        tracing::debug!("[Turn {}] {} -> {}", self.label, self.state, next);
        self.state = next;
        true
    }

    /// Move to `Errored`
    pub fn fail(&mut self, msg: impl Into<String>) {
        self.advance(TurnState::errored(msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_checks() {
        assert!(TurnState::Done.is_terminal());
        assert!(TurnState::errored("oops").is_terminal());
        assert!(!TurnState::Routing.is_terminal());
        assert!(!TurnState::AwaitingApproval { pending: 1 }.is_terminal());
    }

    #[test]
    fn test_legal_transitions() {
        let streaming = TurnState::streaming("triage");
        assert!(TurnState::Routing.can_transition_to(&streaming));
        assert!(streaming.can_transition_to(&TurnState::streaming("web_search")));
        assert!(streaming.can_transition_to(&TurnState::AwaitingApproval { pending: 2 }));
        assert!(streaming.can_transition_to(&TurnState::Persisting));
        assert!(TurnState::Persisting.can_transition_to(&TurnState::Done));
        assert!(TurnState::Persisting.can_transition_to(&TurnState::errored("disk")));
        assert!(TurnState::AwaitingApproval { pending: 1 }.can_transition_to(&TurnState::Persisting));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!TurnState::Routing.can_transition_to(&TurnState::Done));
        assert!(!TurnState::Routing.can_transition_to(&TurnState::Persisting));
        assert!(!TurnState::Done.can_transition_to(&TurnState::Routing));
        assert!(!TurnState::errored("x").can_transition_to(&TurnState::errored("y")));
    }

    #[test]
    fn test_tracker_ignores_illegal() {
        let mut tracker = TurnTracker::fresh("s1");
        assert!(!tracker.advance(TurnState::Done));
        assert_eq!(tracker.state(), &TurnState::Routing);

        assert!(tracker.advance(TurnState::streaming("triage")));
        assert!(tracker.advance(TurnState::Persisting));
        assert!(tracker.advance(TurnState::Done));
        assert!(tracker.state().is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TurnState::Routing.to_string(), "Routing");
        assert_eq!(
            TurnState::streaming("triage").to_string(),
            "Streaming from triage"
        );
    }
}
