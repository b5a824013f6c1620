//! Suspicion scoring engine: timing telemetry in, bounded risk score out.

pub mod engine;
pub mod model;

pub use engine::assess;
pub use model::{
    RuleId, ScoringThresholds, SuspicionAssessment, SuspicionBand, SuspicionFlag, TimingEntry,
    TimingKind,
};
