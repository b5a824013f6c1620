//! Append-only response records.
//!
//! A response record holds one answer (or one chunk of an oversized
//! telemetry payload) keyed by the owning session's server id and a question
//! identifier. There is no update or delete path: duplicates are possible
//! and are deduplicated at read time, last write wins.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Question-id prefix reserved for internal telemetry payloads.
pub const TELEMETRY_PREFIX: &str = "_telemetry";

/// One participant answer, owned by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Server id of the owning session
    pub session_id: Uuid,
    /// Question identifier; ids starting with [`TELEMETRY_PREFIX`] carry
    /// internal telemetry rather than participant answers
    pub question_id: String,
    /// The answer value; oversized payloads arrive pre-chunked
    pub answer: String,
}

impl ResponseRecord {
    pub fn new(
        session_id: Uuid,
        question_id: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            session_id,
            question_id: question_id.into(),
            answer: answer.into(),
        }
    }

    /// Whether this record carries internal telemetry.
    pub fn is_telemetry(&self) -> bool {
        self.question_id.starts_with(TELEMETRY_PREFIX)
    }
}

/// Collapses duplicate records for the same question, last write wins.
///
/// The store has no uniqueness constraint on (session, question), so retried
/// submissions can leave duplicates; readers apply this policy instead.
pub fn dedupe_last_write_wins(records: &[ResponseRecord]) -> Vec<ResponseRecord> {
    let mut latest: Vec<ResponseRecord> = Vec::new();
    for record in records {
        match latest
            .iter_mut()
            .find(|r| r.session_id == record.session_id && r.question_id == record.question_id)
        {
            Some(existing) => *existing = record.clone(),
            None => latest.push(record.clone()),
        }
    }
    latest
}

/// An abstract append-only store for response records.
#[async_trait]
pub trait ResponseRepository: Send + Sync {
    /// Appends a single record.
    async fn append(&self, record: ResponseRecord) -> Result<()>;

    /// Appends several records. Implementations append in order; a failure
    /// may leave a prefix of the slice applied.
    async fn append_many(&self, records: &[ResponseRecord]) -> Result<()>;

    /// Lists every record for a session, in append order.
    async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<ResponseRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_ids_are_detected_by_prefix() {
        let session = Uuid::new_v4();
        let telemetry = ResponseRecord::new(session, "_telemetry:timings", "{}");
        let answer = ResponseRecord::new(session, "q1", "42");
        assert!(telemetry.is_telemetry());
        assert!(!answer.is_telemetry());
    }

    #[test]
    fn read_dedupe_keeps_the_last_write() {
        let session = Uuid::new_v4();
        let records = vec![
            ResponseRecord::new(session, "q1", "first"),
            ResponseRecord::new(session, "q2", "only"),
            ResponseRecord::new(session, "q1", "second"),
        ];
        let deduped = dedupe_last_write_wins(&records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].question_id, "q1");
        assert_eq!(deduped[0].answer, "second");
        assert_eq!(deduped[1].answer, "only");
    }
}
