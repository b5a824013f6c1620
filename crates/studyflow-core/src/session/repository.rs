//! Session repository trait.
//!
//! Defines the interface for session persistence operations.

use super::model::Session;
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// An abstract repository for managing session persistence.
///
/// This trait decouples the state machine from the specific storage
/// mechanism (relational store behind the remote endpoint's service role,
/// in-memory store in tests). Implementations must make `insert` assign the
/// server id atomically with the insert of the session record.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its client-generated id.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: Session found
    /// - `Ok(None)`: Session not found
    /// - `Err(_)`: Error occurred during retrieval
    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Session>>;

    /// Finds a session by its server-assigned durable id.
    async fn find_by_server_id(&self, server_id: Uuid) -> Result<Option<Session>>;

    /// Inserts a new session, assigning its server id atomically.
    ///
    /// # Returns
    ///
    /// The stored session with `server_id` set.
    async fn insert(&self, session: Session) -> Result<Session>;

    /// Persists an updated session.
    ///
    /// The caller is responsible for the read-then-conditional-write
    /// pattern; this method overwrites unconditionally.
    async fn update(&self, session: &Session) -> Result<()>;

    /// Lists all stored sessions.
    async fn list_all(&self) -> Result<Vec<Session>>;
}
