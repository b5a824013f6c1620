//! Session state machine service.
//!
//! The single source of truth for whether a session's data counts toward
//! analysis. Every transition is a read-then-conditional-write against the
//! session repository, so a stale or malicious client cannot forge
//! completion or validation. Runs server-side behind the remote endpoint.

use chrono::Utc;
use std::sync::Arc;
use studyflow_core::error::{Result, StudyError, ALREADY_COMPLETED};
use studyflow_core::session::{
    LifecycleState, Mode, ReviewerRole, Session, SessionRepository, ValidationState,
};
use studyflow_core::suspicion::SuspicionAssessment;

/// Orchestrates session lifecycle and validation transitions.
pub struct SessionService {
    sessions: Arc<dyn SessionRepository>,
}

impl SessionService {
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self { sessions }
    }

    /// Creates a session for `client_id`, or returns the existing one.
    ///
    /// Creation is idempotent per client id so a retried create command
    /// cannot produce duplicate sessions; the server id is assigned
    /// atomically with the insert.
    pub async fn create_session(&self, client_id: &str, mode: Mode) -> Result<Session> {
        if let Some(existing) = self.sessions.find_by_client_id(client_id).await? {
            return Ok(existing);
        }
        self.sessions.insert(Session::new(client_id, mode)).await
    }

    /// Marks a session completed.
    ///
    /// Completing an already-completed session is rejected with a
    /// distinguishable "already completed" error rather than silently
    /// accepted, so double submission cannot double-count statistics. The
    /// completion timestamp is stamped exactly once.
    pub async fn complete_session(&self, client_id: &str) -> Result<Session> {
        self.transition(client_id, LifecycleState::Completed).await
    }

    /// Marks a session withdrawn at the participant's request.
    pub async fn withdraw_session(&self, client_id: &str) -> Result<Session> {
        self.transition(client_id, LifecycleState::Withdrawn).await
    }

    /// Marks a session expired after inactivity.
    pub async fn expire_session(&self, client_id: &str) -> Result<Session> {
        self.transition(client_id, LifecycleState::Expired).await
    }

    /// Resets a session after a detected policy violation.
    ///
    /// The caller is expected to clear the client's locally cached progress
    /// and force a restart; a reset session never counts toward statistics.
    pub async fn reset_session(&self, client_id: &str) -> Result<Session> {
        self.transition(client_id, LifecycleState::Reset).await
    }

    /// Updates the session's mode.
    ///
    /// Allowed only before the lifecycle reaches a terminal state. The
    /// recorded modes are replaced, not appended: write paths no longer
    /// produce the legacy "used both modes" shape.
    pub async fn update_mode(&self, client_id: &str, mode: Mode) -> Result<Session> {
        let mut session = self.require(client_id).await?;
        if session.lifecycle.is_terminal() {
            return Err(StudyError::invalid_transition(
                session.lifecycle.as_str(),
                session.lifecycle.as_str(),
                "mode is locked once the lifecycle is terminal",
            ));
        }
        session.assigned_mode = mode;
        session.modes_used = vec![mode];
        session.last_activity_at = Utc::now();
        self.sessions.update(&session).await?;
        Ok(session)
    }

    /// Attaches a suspicion assessment to a completed session.
    pub async fn attach_suspicion(
        &self,
        client_id: &str,
        assessment: &SuspicionAssessment,
    ) -> Result<Session> {
        let mut session = self.require(client_id).await?;
        if session.lifecycle != LifecycleState::Completed {
            return Err(StudyError::invalid_transition(
                session.lifecycle.as_str(),
                session.lifecycle.as_str(),
                "suspicion score applies to completed sessions only",
            ));
        }
        session.suspicion_score = Some(assessment.score);
        self.sessions.update(&session).await?;
        Ok(session)
    }

    /// Moves a session's validation state, enforcing the two-role rule.
    ///
    /// A pending decision records the acting role; the matching final state
    /// requires confirmation by a *different* role. Validation only
    /// progresses on completed sessions.
    pub async fn set_validation(
        &self,
        client_id: &str,
        target: ValidationState,
        role: ReviewerRole,
    ) -> Result<Session> {
        let mut session = self.require(client_id).await?;
        if session.lifecycle != LifecycleState::Completed {
            return Err(StudyError::invalid_transition(
                session.validation.as_str(),
                target.as_str(),
                "only completed sessions can be validated",
            ));
        }

        let current = session.validation;
        match target {
            ValidationState::PendingAccepted | ValidationState::PendingIgnored => {
                if current != ValidationState::Unvalidated {
                    return Err(StudyError::invalid_transition(
                        current.as_str(),
                        target.as_str(),
                        "pending decisions start from unvalidated",
                    ));
                }
                session.validation = target;
                session.pending_review_by = Some(role);
            }
            ValidationState::Accepted | ValidationState::Ignored => {
                if Some(current) != target.pending_counterpart() {
                    return Err(StudyError::invalid_transition(
                        current.as_str(),
                        target.as_str(),
                        "final states require the matching pending state",
                    ));
                }
                if session.pending_review_by == Some(role) {
                    return Err(StudyError::invalid_transition(
                        current.as_str(),
                        target.as_str(),
                        "a second role must confirm the pending decision",
                    ));
                }
                session.validation = target;
                session.pending_review_by = None;
            }
            ValidationState::Unvalidated => {
                return Err(StudyError::invalid_transition(
                    current.as_str(),
                    target.as_str(),
                    "validation cannot move back to unvalidated",
                ));
            }
        }

        self.sessions.update(&session).await?;
        Ok(session)
    }

    /// Number of sessions currently counting toward aggregate statistics.
    pub async fn included_session_count(&self) -> Result<usize> {
        Ok(self
            .sessions
            .list_all()
            .await?
            .iter()
            .filter(|s| s.counts_toward_statistics())
            .count())
    }

    async fn require(&self, client_id: &str) -> Result<Session> {
        self.sessions
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| StudyError::not_found("session", client_id))
    }

    async fn transition(&self, client_id: &str, next: LifecycleState) -> Result<Session> {
        let mut session = self.require(client_id).await?;
        if !session.lifecycle.can_transition_to(next) {
            let reason = if session.lifecycle == LifecycleState::Completed
                && next == LifecycleState::Completed
            {
                ALREADY_COMPLETED.to_string()
            } else {
                format!("lifecycle '{}' is terminal", session.lifecycle.as_str())
            };
            return Err(StudyError::invalid_transition(
                session.lifecycle.as_str(),
                next.as_str(),
                reason,
            ));
        }

        let now = Utc::now();
        session.lifecycle = next;
        session.last_activity_at = now;
        if next == LifecycleState::Completed {
            session.completed_at = Some(now);
        }
        self.sessions.update(&session).await?;
        Ok(session)
    }
}
