//! Submission client: the single call-site feature pages use to persist
//! participant events.
//!
//! `submit` tries the remote endpoint directly and falls back to the durable
//! queue on transient failure; except for the final post-test write, callers
//! never see a transport error. The final write additionally falls back to a
//! synchronous direct store write before re-raising, because the participant
//! must not advance past the point of no return on unpersisted data.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use studyflow_core::error::{Result, StudyError};
use studyflow_core::response::{ResponseRecord, ResponseRepository};
use studyflow_infrastructure::{DurableQueue, RemoteEndpoint};
use uuid::Uuid;

/// Maximum records per saveResponses call; larger sets are split into
/// sequential batches.
pub const MAX_BATCH_SIZE: usize = 200;

/// Answers larger than this many bytes are chunked into multiple records.
pub const CHUNK_LIMIT: usize = 8 * 1024;

/// The remote operations the pipeline can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateSession,
    UpdateMode,
    SaveResponses,
    SavePretest,
    SavePosttest,
    CompleteSession,
    WithdrawSession,
    SaveTelemetry,
}

impl Operation {
    /// Wire operation name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSession => "createSession",
            Self::UpdateMode => "updateMode",
            Self::SaveResponses => "saveResponses",
            Self::SavePretest => "savePretest",
            Self::SavePosttest => "savePosttest",
            Self::CompleteSession => "completeSession",
            Self::WithdrawSession => "withdrawSession",
            Self::SaveTelemetry => "saveTelemetry",
        }
    }

    /// Dedupe key for queued retries, where only the latest intent matters.
    ///
    /// Mode updates and completion are idempotent per session: retrying a
    /// superseded mode change would resurrect stale state, so the queue
    /// keeps one live entry per session for these operations.
    pub fn dedupe_key(&self, session_id: &str) -> Option<String> {
        match self {
            Self::UpdateMode | Self::CompleteSession => {
                Some(format!("{}:{session_id}", self.as_str()))
            }
            _ => None,
        }
    }
}

/// Secondary durable write path used by the blocking final submission when
/// the remote endpoint is down.
#[async_trait]
pub trait FallbackWriter: Send + Sync {
    async fn write(&self, operation: Operation, body: &Value) -> Result<()>;
}

/// Fallback that writes response payloads straight into a response store.
pub struct DirectStoreFallback {
    responses: Arc<dyn ResponseRepository>,
}

impl DirectStoreFallback {
    pub fn new(responses: Arc<dyn ResponseRepository>) -> Self {
        Self { responses }
    }
}

#[async_trait]
impl FallbackWriter for DirectStoreFallback {
    async fn write(&self, _operation: Operation, body: &Value) -> Result<()> {
        let records: Vec<ResponseRecord> = serde_json::from_value(
            body.get("responses")
                .cloned()
                .ok_or_else(|| StudyError::validation("fallback body missing 'responses'"))?,
        )?;
        self.responses.append_many(&records).await
    }
}

/// Addresses one chunk of an oversized payload.
///
/// All chunks of one payload share a batch id and carry sequential part
/// indices, so reassembly is possible and losing one part loses only that
/// part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
    pub question_id: String,
    pub batch_id: Uuid,
    pub index: usize,
}

impl ChunkRef {
    /// Question id under which this chunk is stored.
    pub fn storage_id(&self) -> String {
        format!("{}:{}:{}", self.question_id, self.batch_id, self.index)
    }
}

/// Splits an oversized answer into independently submittable records.
///
/// Payloads at or under [`CHUNK_LIMIT`] come back as a single record under
/// the original question id. Splitting is char-boundary safe, so every
/// chunk stays valid UTF-8 at no more than `CHUNK_LIMIT` bytes.
pub fn chunk_answer(
    session_id: Uuid,
    question_id: &str,
    payload: &str,
) -> Vec<ResponseRecord> {
    if payload.len() <= CHUNK_LIMIT {
        return vec![ResponseRecord::new(session_id, question_id, payload)];
    }

    let batch_id = Uuid::new_v4();
    let mut records = Vec::new();
    let mut chunk = String::with_capacity(CHUNK_LIMIT);
    let mut index = 0usize;

    for ch in payload.chars() {
        if chunk.len() + ch.len_utf8() > CHUNK_LIMIT {
            let chunk_ref = ChunkRef {
                question_id: question_id.to_string(),
                batch_id,
                index,
            };
            records.push(ResponseRecord::new(
                session_id,
                chunk_ref.storage_id(),
                std::mem::take(&mut chunk),
            ));
            index += 1;
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        let chunk_ref = ChunkRef {
            question_id: question_id.to_string(),
            batch_id,
            index,
        };
        records.push(ResponseRecord::new(
            session_id,
            chunk_ref.storage_id(),
            chunk,
        ));
    }
    records
}

/// The sole entry point for persisting participant events.
pub struct SubmissionClient {
    endpoint: Arc<dyn RemoteEndpoint>,
    queue: Arc<DurableQueue>,
    fallback: Arc<dyn FallbackWriter>,
}

impl SubmissionClient {
    pub fn new(
        endpoint: Arc<dyn RemoteEndpoint>,
        queue: Arc<DurableQueue>,
        fallback: Arc<dyn FallbackWriter>,
    ) -> Self {
        Self {
            endpoint,
            queue,
            fallback,
        }
    }

    /// Submits an event, best effort.
    ///
    /// Transient failures are queued for background retry and reported as
    /// success (eventually consistent). Validation failures surface
    /// immediately and are never queued. A rejected duplicate completion is
    /// success-equivalent and logged for audit.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed payloads
    /// - `NotFound` when the session is gone (caller restarts)
    /// - `InvalidTransition` for illegal moves other than re-completion
    pub async fn submit(&self, operation: Operation, session_id: &str, body: Value) -> Result<()> {
        let body = with_session_id(body, session_id)?;
        match self.endpoint.call(operation.as_str(), &body).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_transport() => {
                tracing::warn!("{} failed, queueing for retry: {e}", operation.as_str());
                self.queue
                    .enqueue(operation.as_str(), &body, operation.dedupe_key(session_id))
                    .await;
                Ok(())
            }
            Err(e) if e.is_already_completed() => {
                tracing::info!("{}: session already completed", operation.as_str());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Submits the one blocking operation (final post-test write).
    ///
    /// The caller must know definitively whether the data persisted before
    /// advancing the participant past the point of no return. On transport
    /// failure this tries a synchronous fallback write; if that also fails,
    /// the intent is queued for later retry and the error is re-raised.
    pub async fn submit_final(
        &self,
        operation: Operation,
        session_id: &str,
        body: Value,
    ) -> Result<()> {
        let body = with_session_id(body, session_id)?;
        let direct_err = match self.endpoint.call(operation.as_str(), &body).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_already_completed() => return Ok(()),
            Err(e) if e.is_transport() => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "{} failed, attempting fallback write: {direct_err}",
            operation.as_str()
        );
        match self.fallback.write(operation, &body).await {
            Ok(()) => Ok(()),
            Err(fallback_err) => {
                tracing::warn!(
                    "fallback write for {} also failed: {fallback_err}",
                    operation.as_str()
                );
                self.queue
                    .enqueue(operation.as_str(), &body, operation.dedupe_key(session_id))
                    .await;
                Err(direct_err)
            }
        }
    }

    /// Submits many response records in sequential batches of at most
    /// [`MAX_BATCH_SIZE`].
    ///
    /// A transport failure queues the failed batch and every remaining
    /// batch, then stops issuing direct calls; partial application is
    /// possible and callers must assume it. Validation failures abort
    /// without queueing.
    pub async fn submit_responses(
        &self,
        session_id: &str,
        records: &[ResponseRecord],
    ) -> Result<()> {
        let batches: Vec<&[ResponseRecord]> = records.chunks(MAX_BATCH_SIZE).collect();
        for (i, batch) in batches.iter().enumerate() {
            let body = json!({
                "sessionId": session_id,
                "responses": batch,
            });
            match self.endpoint.call(Operation::SaveResponses.as_str(), &body).await {
                Ok(_) => {}
                Err(e) if e.is_transport() => {
                    tracing::warn!("saveResponses batch {i} failed, queueing remainder: {e}");
                    for batch in &batches[i..] {
                        let body = json!({
                            "sessionId": session_id,
                            "responses": batch,
                        });
                        self.queue
                            .enqueue(Operation::SaveResponses.as_str(), &body, None)
                            .await;
                    }
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn with_session_id(body: Value, session_id: &str) -> Result<Value> {
    let mut map = match body {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        _ => return Err(StudyError::validation("submission body must be an object")),
    };
    map.insert("sessionId".to_string(), Value::String(session_id.into()));
    Ok(Value::Object(map))
}
