//! StudyFlow core domain: sessions, responses, queue model, and scoring.
//!
//! This crate holds the pure domain layer of the resilient data-submission
//! pipeline. Storage and transport live in `studyflow-infrastructure`; the
//! submission client and state-machine services live in
//! `studyflow-application`.

pub mod error;
pub mod queue;
pub mod response;
pub mod session;
pub mod suspicion;

pub use error::{Result, StudyError};
