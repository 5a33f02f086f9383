//! Reservation state machine.

use serde::{Deserialize, Serialize};

/// The state of a single-line stock reservation.
///
/// State transitions:
/// ```text
/// Pending ──┬──► FastPathChecked ──┬──► DurableCommitted ──► FastPathCompensated
///           │                      └──► FastPathCompensated
///           ├──► DurableCommitted ──► Failed
///           └──► Failed
/// ```
///
/// A reservation stays `Pending` when the counter store had no entry or was
/// unreachable; it then goes straight to the durable phase. A committed
/// reservation can still be unwound when a later step of the same checkout
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationState {
    /// Nothing has been decremented yet.
    #[default]
    Pending,

    /// The counter store accepted the decrement; the durable phase is next.
    FastPathChecked,

    /// The durable conditional decrement succeeded.
    DurableCommitted,

    /// The fast-path decrement was given back (terminal state).
    FastPathCompensated,

    /// The reservation did not hold and there was nothing to give back
    /// (terminal state).
    Failed,
}

impl ReservationState {
    /// Returns true if the durable phase may run next.
    pub fn can_commit(&self) -> bool {
        matches!(
            self,
            ReservationState::Pending | ReservationState::FastPathChecked
        )
    }

    /// Returns true if the reservation can still be unwound.
    pub fn can_compensate(&self) -> bool {
        matches!(
            self,
            ReservationState::Pending
                | ReservationState::FastPathChecked
                | ReservationState::DurableCommitted
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationState::FastPathCompensated | ReservationState::Failed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Pending => "Pending",
            ReservationState::FastPathChecked => "FastPathChecked",
            ReservationState::DurableCommitted => "DurableCommitted",
            ReservationState::FastPathCompensated => "FastPathCompensated",
            ReservationState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_pending() {
        assert_eq!(ReservationState::default(), ReservationState::Pending);
    }

    #[test]
    fn test_can_commit() {
        assert!(ReservationState::Pending.can_commit());
        assert!(ReservationState::FastPathChecked.can_commit());
        assert!(!ReservationState::DurableCommitted.can_commit());
        assert!(!ReservationState::FastPathCompensated.can_commit());
        assert!(!ReservationState::Failed.can_commit());
    }

    #[test]
    fn test_can_compensate() {
        assert!(ReservationState::Pending.can_compensate());
        assert!(ReservationState::FastPathChecked.can_compensate());
        assert!(ReservationState::DurableCommitted.can_compensate());
        assert!(!ReservationState::FastPathCompensated.can_compensate());
        assert!(!ReservationState::Failed.can_compensate());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ReservationState::Pending.is_terminal());
        assert!(!ReservationState::FastPathChecked.is_terminal());
        assert!(!ReservationState::DurableCommitted.is_terminal());
        assert!(ReservationState::FastPathCompensated.is_terminal());
        assert!(ReservationState::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(ReservationState::Pending.to_string(), "Pending");
        assert_eq!(
            ReservationState::FastPathChecked.to_string(),
            "FastPathChecked"
        );
        assert_eq!(
            ReservationState::DurableCommitted.to_string(),
            "DurableCommitted"
        );
        assert_eq!(
            ReservationState::FastPathCompensated.to_string(),
            "FastPathCompensated"
        );
        assert_eq!(ReservationState::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_serialization() {
        let state = ReservationState::DurableCommitted;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: ReservationState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
