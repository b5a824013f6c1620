//! In-memory repository implementations.
//!
//! These back the unit tests and the synchronous fallback write path; the
//! production deployment substitutes the relational store reached through
//! the remote endpoint's service role.

use async_trait::async_trait;
use std::collections::HashMap;
use studyflow_core::error::{Result, StudyError};
use studyflow_core::response::{ResponseRecord, ResponseRepository};
use studyflow_core::session::{Session, SessionRepository};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Session repository held in a `RwLock`ed map keyed by client id.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(client_id).cloned())
    }

    async fn find_by_server_id(&self, server_id: Uuid) -> Result<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .find(|s| s.server_id == Some(server_id))
            .cloned())
    }

    async fn insert(&self, mut session: Session) -> Result<Session> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.client_id) {
            return Err(StudyError::internal(format!(
                "session '{}' already exists",
                session.client_id
            )));
        }
        session.server_id = Some(Uuid::new_v4());
        sessions.insert(session.client_id.clone(), session.clone());
        Ok(session)
    }

    async fn update(&self, session: &Session) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.client_id) {
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => Err(StudyError::not_found("session", &session.client_id)),
        }
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }
}

/// Append-only response store backed by a vector.
#[derive(Default)]
pub struct InMemoryResponseRepository {
    records: RwLock<Vec<ResponseRecord>>,
}

impl InMemoryResponseRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResponseRepository for InMemoryResponseRepository {
    async fn append(&self, record: ResponseRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn append_many(&self, records: &[ResponseRecord]) -> Result<()> {
        self.records.write().await.extend_from_slice(records);
        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<ResponseRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyflow_core::session::Mode;

    #[tokio::test]
    async fn insert_assigns_a_server_id() {
        let repo = InMemorySessionRepository::new();
        let stored = repo.insert(Session::new("client-1", Mode::Text)).await.unwrap();
        assert!(stored.server_id.is_some());

        let found = repo.find_by_client_id("client-1").await.unwrap().unwrap();
        assert_eq!(found.server_id, stored.server_id);
        let by_server = repo
            .find_by_server_id(stored.server_id.unwrap())
            .await
            .unwrap();
        assert_eq!(by_server, Some(found));
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let repo = InMemorySessionRepository::new();
        repo.insert(Session::new("client-1", Mode::Text)).await.unwrap();
        assert!(repo.insert(Session::new("client-1", Mode::Text)).await.is_err());
    }

    #[tokio::test]
    async fn responses_append_in_order() {
        let repo = InMemoryResponseRepository::new();
        let session = Uuid::new_v4();
        repo.append(ResponseRecord::new(session, "q1", "a")).await.unwrap();
        repo.append_many(&[
            ResponseRecord::new(session, "q2", "b"),
            ResponseRecord::new(Uuid::new_v4(), "q1", "other"),
        ])
        .await
        .unwrap();

        let records = repo.list_for_session(session).await.unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.question_id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q2"]);
    }
}
