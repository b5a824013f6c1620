//! Queued write-command model.
//!
//! A `QueuedCommand` captures one write intent that failed its immediate
//! remote call and is waiting for a background retry. The queue behavior
//! lives in the infrastructure layer; this module only defines the persisted
//! shape and the retry-policy constants.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One pending write intent in the durable local queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    /// Generated entry id
    pub id: Uuid,
    /// Target remote operation name
    pub operation: String,
    /// Opaque JSON body, forwarded verbatim on retry
    pub body: serde_json::Value,
    /// Number of failed delivery attempts so far
    pub attempts: u32,
    /// When the intent was first recorded (eviction is oldest-first on this)
    pub created_at: DateTime<Utc>,
    /// Earliest time the next retry may run
    pub next_retry_at: DateTime<Utc>,
    /// Optional key ensuring only the latest intent for a logical operation
    /// remains queued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
}

impl QueuedCommand {
    /// Creates a new entry eligible for immediate retry.
    pub fn new(
        operation: impl Into<String>,
        body: serde_json::Value,
        dedupe_key: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            operation: operation.into(),
            body,
            attempts: 0,
            created_at: now,
            next_retry_at: now,
            dedupe_key,
        }
    }

    /// Age of this entry relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

/// Retry and capacity policy for the durable local queue.
///
/// Backoff is linear with a cap: `min(max_backoff, base_backoff * attempts)`.
/// The cap is low enough that retry storms stay bounded without exponential
/// growth.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Entries older than this are discarded unsent
    pub max_age: Duration,
    /// Capacity bound; oldest entries are evicted first beyond this
    pub max_entries: usize,
    /// Backoff unit multiplied by the attempt count
    pub base_backoff: Duration,
    /// Upper bound on the computed backoff
    pub max_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::days(7),
            max_entries: 200,
            base_backoff: Duration::seconds(5),
            max_backoff: Duration::seconds(60),
        }
    }
}

impl QueueConfig {
    /// Backoff delay after `attempts` consecutive failures.
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        let linear = self.base_backoff * attempts as i32;
        if linear > self.max_backoff {
            self.max_backoff
        } else {
            linear
        }
    }
}
