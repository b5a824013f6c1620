//! Session domain model.
//!
//! This module contains the core Session entity that represents one
//! participant's end-to-end attempt at the study.

use super::state::{LifecycleState, Mode, ReviewerRole, ValidationState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents one participant session in the domain layer.
///
/// A session carries two identifiers: `client_id` is generated by the client
/// and stays stable for the browsing session (used to correlate requests
/// before the server has seen the session), while `server_id` is assigned by
/// the server at first successful creation and is the foreign key for all
/// response rows. The two are deliberately separate fields and are never
/// conflated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Client-generated opaque identifier, stable per browsing session
    pub client_id: String,
    /// Server-assigned durable identifier, set at first successful creation
    pub server_id: Option<Uuid>,
    /// The mode assigned to this participant
    pub assigned_mode: Mode,
    /// Modes actually used. Write paths always replace this with a single
    /// mode; legacy sessions recorded with both modes remain readable.
    #[serde(default)]
    pub modes_used: Vec<Mode>,
    /// Lifecycle progress marker (irreversible)
    pub lifecycle: LifecycleState,
    /// Reviewer-assigned data-quality state, orthogonal to lifecycle
    pub validation: ValidationState,
    /// The role that made the current pending validation decision, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_review_by: Option<ReviewerRole>,
    /// Suspicion score (0-100), computed at completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspicion_score: Option<u8>,
    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last recorded activity
    pub last_activity_at: DateTime<Utc>,
    /// Timestamp when the session completed, stamped exactly once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a new session in the `Active` lifecycle state.
    ///
    /// The server id is left unset; it is assigned atomically by the
    /// repository insert.
    pub fn new(client_id: impl Into<String>, assigned_mode: Mode) -> Self {
        let now = Utc::now();
        Self {
            client_id: client_id.into(),
            server_id: None,
            assigned_mode,
            modes_used: vec![assigned_mode],
            lifecycle: LifecycleState::Active,
            validation: ValidationState::Unvalidated,
            pending_review_by: None,
            suspicion_score: None,
            created_at: now,
            last_activity_at: now,
            completed_at: None,
        }
    }

    /// Whether this session counts toward aggregate statistics.
    ///
    /// Only completed sessions are eligible. Among those, a session is
    /// included when a reviewer accepted it, or when it has never needed
    /// review (unvalidated with a suspicion score of exactly zero). `Reset`
    /// sessions and `Ignored` sessions are always excluded, regardless of
    /// the other axis.
    pub fn counts_toward_statistics(&self) -> bool {
        if self.lifecycle != LifecycleState::Completed {
            return false;
        }
        match self.validation {
            ValidationState::Accepted => true,
            ValidationState::Unvalidated => self.suspicion_score == Some(0),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_active_and_unvalidated() {
        let session = Session::new("client-1", Mode::Text);
        assert_eq!(session.lifecycle, LifecycleState::Active);
        assert_eq!(session.validation, ValidationState::Unvalidated);
        assert_eq!(session.modes_used, vec![Mode::Text]);
        assert!(session.server_id.is_none());
        assert!(session.completed_at.is_none());
    }

    #[test]
    fn reset_session_never_counts_regardless_of_validation() {
        let mut session = Session::new("client-1", Mode::Text);
        session.lifecycle = LifecycleState::Reset;
        for validation in [
            ValidationState::Unvalidated,
            ValidationState::PendingAccepted,
            ValidationState::Accepted,
            ValidationState::Ignored,
        ] {
            session.validation = validation;
            session.suspicion_score = Some(0);
            assert!(!session.counts_toward_statistics());
        }
    }

    #[test]
    fn completed_accepted_counts() {
        let mut session = Session::new("client-1", Mode::Avatar);
        session.lifecycle = LifecycleState::Completed;
        session.validation = ValidationState::Accepted;
        assert!(session.counts_toward_statistics());
    }

    #[test]
    fn completed_unvalidated_counts_only_with_zero_score() {
        let mut session = Session::new("client-1", Mode::Text);
        session.lifecycle = LifecycleState::Completed;
        session.suspicion_score = Some(0);
        assert!(session.counts_toward_statistics());

        session.suspicion_score = Some(25);
        assert!(!session.counts_toward_statistics());

        session.suspicion_score = None;
        assert!(!session.counts_toward_statistics());
    }

    #[test]
    fn ignored_session_is_excluded() {
        let mut session = Session::new("client-1", Mode::Text);
        session.lifecycle = LifecycleState::Completed;
        session.validation = ValidationState::Ignored;
        session.suspicion_score = Some(0);
        assert!(!session.counts_toward_statistics());
    }

    #[test]
    fn legacy_multi_mode_session_deserializes() {
        // Historical sessions were recorded with both modes; the read path
        // still accepts that shape even though writes only ever store one.
        let json = r#"{
            "client_id": "legacy-1",
            "server_id": null,
            "assigned_mode": "text",
            "modes_used": ["text", "avatar"],
            "lifecycle": "completed",
            "validation": "accepted",
            "created_at": "2024-01-01T00:00:00Z",
            "last_activity_at": "2024-01-01T01:00:00Z"
        }"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.modes_used, vec![Mode::Text, Mode::Avatar]);
        assert!(session.counts_toward_statistics());
    }
}
