//! Types for the suspicion scoring engine.

use crate::session::state::Mode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of client-side interval a timing entry measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingKind {
    /// Time spent viewing one learning slide
    Slide,
    /// Time spent on one major page
    Page,
    /// Time taken to answer one question
    Question,
}

/// One behavioral observation collected client-side during the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub kind: TimingKind,
    /// Slide index, page name, or question id, depending on `kind`
    pub label: String,
    pub duration_ms: u64,
    /// Mode active when the observation was recorded, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl TimingEntry {
    pub fn new(kind: TimingKind, label: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            kind,
            label: label.into(),
            duration_ms,
            mode: None,
        }
    }
}

/// Global thresholds the scoring rules evaluate against.
///
/// Defaults mirror the production deployment; studies with different
/// pacing override individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringThresholds {
    /// Minimum plausible time to answer one question
    pub min_question_ms: u64,
    /// Minimum plausible time to read one learning slide
    pub min_slide_ms: u64,
    /// Minimum plausible average answer time across the session
    pub min_avg_answer_ms: u64,
    /// Minimum number of learning slides a genuine participant views
    pub min_learning_slides: usize,
    /// Maximum tolerated fraction of too-fast answers or slide views
    pub max_fast_answer_ratio: f64,
    /// Minimum time for each major page, keyed by page label.
    /// BTreeMap keeps rule evaluation order deterministic.
    pub min_page_ms: BTreeMap<String, u64>,
}

impl Default for ScoringThresholds {
    fn default() -> Self {
        let mut min_page_ms = BTreeMap::new();
        min_page_ms.insert("learning".to_string(), 60_000);
        min_page_ms.insert("posttest".to_string(), 30_000);
        min_page_ms.insert("pretest".to_string(), 30_000);
        Self {
            min_question_ms: 3_000,
            min_slide_ms: 2_000,
            min_avg_answer_ms: 5_000,
            min_learning_slides: 5,
            max_fast_answer_ratio: 0.5,
            min_page_ms,
        }
    }
}

/// Identifies a scoring rule and carries its fixed point value.
///
/// Flags carry the rule id itself rather than a formatted string, so display
/// code never parses text to recover which rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    FastAnswersRatio,
    LowAverageAnswerTime,
    FastSlideViews,
    TooFewSlides,
    FastPage,
}

impl RuleId {
    /// Fixed point value this rule contributes when triggered.
    pub fn points(&self) -> u32 {
        match self {
            Self::FastAnswersRatio => 25,
            Self::LowAverageAnswerTime => 20,
            Self::FastSlideViews => 20,
            Self::TooFewSlides => 15,
            Self::FastPage => 10,
        }
    }

    /// Renders the human-readable summary for a triggered flag.
    ///
    /// Text is produced here, at display time, from the structured params
    /// recorded at scoring time.
    pub fn describe(&self, params: &serde_json::Value) -> String {
        match self {
            Self::FastAnswersRatio => format!(
                "{} of {} answers were faster than the per-question minimum",
                params["fast"], params["total"]
            ),
            Self::LowAverageAnswerTime => format!(
                "average answer time {}ms is below the minimum {}ms",
                params["average_ms"], params["min_ms"]
            ),
            Self::FastSlideViews => format!(
                "{} of {} slides were viewed faster than the per-slide minimum",
                params["fast"], params["total"]
            ),
            Self::TooFewSlides => format!(
                "only {} learning slides viewed (minimum {})",
                params["viewed"], params["minimum"]
            ),
            Self::FastPage => format!(
                "page '{}' took {}ms (minimum {}ms)",
                params["page"].as_str().unwrap_or("?"),
                params["duration_ms"],
                params["min_ms"]
            ),
        }
    }
}

/// One triggered rule with the evidence it fired on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionFlag {
    pub rule: RuleId,
    pub points: u32,
    /// Structured evidence, rendered to text by [`RuleId::describe`]
    pub params: serde_json::Value,
}

/// Human-review label derived from the score.
///
/// Bands exist purely for review triage; inclusion decisions use the score
/// itself (a score of exactly 0 needs no review).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionBand {
    Normal,
    Low,
    Medium,
    High,
}

/// The result of scoring one session's telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionAssessment {
    /// Total score, clamped to 0-100
    pub score: u8,
    /// Triggered rules in evaluation order
    pub flags: Vec<SuspicionFlag>,
}

impl SuspicionAssessment {
    /// Review band for this score.
    pub fn band(&self) -> SuspicionBand {
        match self.score {
            0..=19 => SuspicionBand::Normal,
            20..=39 => SuspicionBand::Low,
            40..=59 => SuspicionBand::Medium,
            _ => SuspicionBand::High,
        }
    }

    /// Whether the session can be auto-included without review.
    pub fn needs_review(&self) -> bool {
        self.score > 0
    }
}
