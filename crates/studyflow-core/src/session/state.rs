//! Lifecycle and validation state types for sessions.
//!
//! The two state axes are independent: lifecycle tracks a session's progress
//! through the study, validation tracks the reviewer-assigned data-quality
//! decision and is only meaningful once the lifecycle is `Completed`.

use serde::{Deserialize, Serialize};

/// Presentation mode assigned to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Text,
    Avatar,
}

/// The irreversible progress marker of a session.
///
/// A session is created in `Active` and moves to exactly one terminal state.
/// No path returns to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// The participant is still working through the study.
    Active,
    /// The participant finished; the only state eligible for validation.
    Completed,
    /// The participant explicitly withdrew consent.
    Withdrawn,
    /// The session timed out without completing.
    Expired,
    /// A policy violation was detected; local progress must be discarded.
    Reset,
}

impl LifecycleState {
    /// Whether this state is terminal (no further lifecycle transitions).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Whether the lifecycle may move from this state to `next`.
    ///
    /// Transitions are monotonic and one-way: only `Active` has outgoing
    /// edges, and self-transitions are rejected so that double submission
    /// cannot double-count.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        matches!(self, Self::Active) && next != Self::Active
    }

    /// Stable snake_case name, used in error messages and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Withdrawn => "withdrawn",
            Self::Expired => "expired",
            Self::Reset => "reset",
        }
    }
}

/// The reviewer-assigned data-quality marker gating statistics inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// No reviewer has looked at the session yet.
    Unvalidated,
    /// A first reviewer proposed accepting; awaiting second-role confirmation.
    PendingAccepted,
    /// A first reviewer proposed ignoring; awaiting second-role confirmation.
    PendingIgnored,
    /// Confirmed: the session counts toward statistics.
    Accepted,
    /// Confirmed: the session is excluded from statistics.
    Ignored,
}

impl ValidationState {
    /// Whether this state is final (no further validation transitions).
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Accepted | Self::Ignored)
    }

    /// Whether this is one of the pending states awaiting confirmation.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingAccepted | Self::PendingIgnored)
    }

    /// Stable snake_case name, used in error messages and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unvalidated => "unvalidated",
            Self::PendingAccepted => "pending_accepted",
            Self::PendingIgnored => "pending_ignored",
            Self::Accepted => "accepted",
            Self::Ignored => "ignored",
        }
    }

    /// The pending state that confirms into this final state, if any.
    pub fn pending_counterpart(&self) -> Option<ValidationState> {
        match self {
            Self::Accepted => Some(Self::PendingAccepted),
            Self::Ignored => Some(Self::PendingIgnored),
            _ => None,
        }
    }
}

/// The reviewing roles participating in the two-role validation workflow.
///
/// A pending decision made by one role must be confirmed by the other role
/// before it becomes final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewerRole {
    Reviewer,
    Supervisor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_reaches_every_terminal_state() {
        for next in [
            LifecycleState::Completed,
            LifecycleState::Withdrawn,
            LifecycleState::Expired,
            LifecycleState::Reset,
        ] {
            assert!(LifecycleState::Active.can_transition_to(next));
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in [
            LifecycleState::Completed,
            LifecycleState::Withdrawn,
            LifecycleState::Expired,
            LifecycleState::Reset,
        ] {
            assert!(from.is_terminal());
            for next in [
                LifecycleState::Active,
                LifecycleState::Completed,
                LifecycleState::Withdrawn,
                LifecycleState::Expired,
                LifecycleState::Reset,
            ] {
                assert!(!from.can_transition_to(next));
            }
        }
    }

    #[test]
    fn self_transition_is_rejected() {
        assert!(!LifecycleState::Active.can_transition_to(LifecycleState::Active));
    }

    #[test]
    fn pending_counterparts_match() {
        assert_eq!(
            ValidationState::Accepted.pending_counterpart(),
            Some(ValidationState::PendingAccepted)
        );
        assert_eq!(
            ValidationState::Ignored.pending_counterpart(),
            Some(ValidationState::PendingIgnored)
        );
        assert_eq!(ValidationState::Unvalidated.pending_counterpart(), None);
    }
}
