//! Suspicion scoring.
//!
//! `assess` is a pure function of the telemetry and thresholds: recomputing
//! from the same inputs always yields the same score and the same flags in
//! the same order, which is required for reproducible audits.

use super::model::{
    RuleId, ScoringThresholds, SuspicionAssessment, SuspicionFlag, TimingEntry, TimingKind,
};
use serde_json::json;

/// Scores a session's accumulated telemetry.
///
/// Each rule evaluates independently; triggered rules contribute their fixed
/// point value and a structured flag. The total is clamped to 100.
pub fn assess(entries: &[TimingEntry], thresholds: &ScoringThresholds) -> SuspicionAssessment {
    let mut flags = Vec::new();

    check_fast_answers(entries, thresholds, &mut flags);
    check_average_answer_time(entries, thresholds, &mut flags);
    check_fast_slides(entries, thresholds, &mut flags);
    check_slide_count(entries, thresholds, &mut flags);
    check_page_minimums(entries, thresholds, &mut flags);

    let total: u32 = flags.iter().map(|f| f.points).sum();
    SuspicionAssessment {
        score: total.min(100) as u8,
        flags,
    }
}

fn check_fast_answers(
    entries: &[TimingEntry],
    thresholds: &ScoringThresholds,
    flags: &mut Vec<SuspicionFlag>,
) {
    let answers: Vec<&TimingEntry> = entries
        .iter()
        .filter(|e| e.kind == TimingKind::Question)
        .collect();
    if answers.is_empty() {
        return;
    }
    let fast = answers
        .iter()
        .filter(|e| e.duration_ms < thresholds.min_question_ms)
        .count();
    let ratio = fast as f64 / answers.len() as f64;
    if ratio > thresholds.max_fast_answer_ratio {
        flags.push(SuspicionFlag {
            rule: RuleId::FastAnswersRatio,
            points: RuleId::FastAnswersRatio.points(),
            params: json!({
                "fast": fast,
                "total": answers.len(),
                "min_ms": thresholds.min_question_ms,
            }),
        });
    }
}

fn check_average_answer_time(
    entries: &[TimingEntry],
    thresholds: &ScoringThresholds,
    flags: &mut Vec<SuspicionFlag>,
) {
    let durations: Vec<u64> = entries
        .iter()
        .filter(|e| e.kind == TimingKind::Question)
        .map(|e| e.duration_ms)
        .collect();
    if durations.is_empty() {
        return;
    }
    let average = durations.iter().sum::<u64>() / durations.len() as u64;
    if average < thresholds.min_avg_answer_ms {
        flags.push(SuspicionFlag {
            rule: RuleId::LowAverageAnswerTime,
            points: RuleId::LowAverageAnswerTime.points(),
            params: json!({
                "average_ms": average,
                "min_ms": thresholds.min_avg_answer_ms,
            }),
        });
    }
}

fn check_fast_slides(
    entries: &[TimingEntry],
    thresholds: &ScoringThresholds,
    flags: &mut Vec<SuspicionFlag>,
) {
    let slides: Vec<&TimingEntry> = entries
        .iter()
        .filter(|e| e.kind == TimingKind::Slide)
        .collect();
    if slides.is_empty() {
        return;
    }
    let fast = slides
        .iter()
        .filter(|e| e.duration_ms < thresholds.min_slide_ms)
        .count();
    let ratio = fast as f64 / slides.len() as f64;
    if ratio > thresholds.max_fast_answer_ratio {
        flags.push(SuspicionFlag {
            rule: RuleId::FastSlideViews,
            points: RuleId::FastSlideViews.points(),
            params: json!({
                "fast": fast,
                "total": slides.len(),
                "min_ms": thresholds.min_slide_ms,
            }),
        });
    }
}

fn check_slide_count(
    entries: &[TimingEntry],
    thresholds: &ScoringThresholds,
    flags: &mut Vec<SuspicionFlag>,
) {
    let viewed = entries
        .iter()
        .filter(|e| e.kind == TimingKind::Slide)
        .count();
    if viewed < thresholds.min_learning_slides {
        flags.push(SuspicionFlag {
            rule: RuleId::TooFewSlides,
            points: RuleId::TooFewSlides.points(),
            params: json!({
                "viewed": viewed,
                "minimum": thresholds.min_learning_slides,
            }),
        });
    }
}

fn check_page_minimums(
    entries: &[TimingEntry],
    thresholds: &ScoringThresholds,
    flags: &mut Vec<SuspicionFlag>,
) {
    // One flag per undershot page; BTreeMap iteration keeps the order stable.
    for (page, min_ms) in &thresholds.min_page_ms {
        let mut visited = false;
        let mut total: u64 = 0;
        for entry in entries
            .iter()
            .filter(|e| e.kind == TimingKind::Page && &e.label == page)
        {
            visited = true;
            total += entry.duration_ms;
        }
        if !visited {
            // Page never visited; the lifecycle layer catches incomplete
            // sessions, so absence is not timing evidence. A visit recorded
            // at zero milliseconds is evidence and falls through.
            continue;
        }
        if total < *min_ms {
            flags.push(SuspicionFlag {
                rule: RuleId::FastPage,
                points: RuleId::FastPage.points(),
                params: json!({
                    "page": page,
                    "duration_ms": total,
                    "min_ms": min_ms,
                }),
            });
        }
    }
}
