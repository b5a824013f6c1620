//! StudyFlow application layer: the submission client, the session state
//! machine service, and the background drain worker.

pub mod drain_worker;
pub mod session_service;
pub mod submission;


pub use drain_worker::DrainWorker;
pub use session_service::SessionService;
pub use submission::{
    chunk_answer, ChunkRef, DirectStoreFallback, FallbackWriter, Operation, SubmissionClient,
    CHUNK_LIMIT, MAX_BATCH_SIZE,
};
