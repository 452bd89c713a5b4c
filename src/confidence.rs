//! Confidence scoring for candidate nudges
//!
//! Combines five independent factors, each 0-1, into a single confidence
//! value with an advisory suppression flag:
//! - protocol_fit: does the candidate match the user's primary goal
//! - memory_support: what the user's learned memories say about it
//! - timing_fit: time-of-day and recovery-orientation alignment
//! - conflict_risk (inverted, higher = safer): constraint violations and
//!   batch conflicts
//! - evidence_strength: fixed table from the qualitative evidence label
//!
//! The reasoning string is assembled from buckets, never generated text, so
//! identical inputs always produce the identical report.

use crate::memory::{keyword_overlap, MemoryKind, RetrievedMemory};
use crate::types::{EvidenceLevel, NudgeCandidate, Orientation, TimeOfDay};
use serde::{Deserialize, Serialize};

/// Overall confidence below this sets the advisory suppression flag
pub const SUPPRESS_THRESHOLD: f64 = 0.4;

/// Category pairs that semantically conflict within one delivery batch
const CONFLICT_PAIRS: &[(&str, &str)] = &[
    ("caffeine", "sleep"),
    ("stimulant", "sleep"),
    ("high_intensity", "rest"),
    ("cold_exposure", "wind_down"),
];

/// Factor weights; must sum to 1.0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub protocol_fit: f64,
    pub memory_support: f64,
    pub timing_fit: f64,
    pub conflict_risk: f64,
    pub evidence_strength: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            protocol_fit: 0.25,
            memory_support: 0.25,
            timing_fit: 0.20,
            conflict_risk: 0.15,
            evidence_strength: 0.15,
        }
    }
}

/// Inputs for one confidence evaluation
#[derive(Debug, Clone)]
pub struct ConfidenceContext<'a> {
    pub candidate: &'a NudgeCandidate,
    /// The user's primary goal/module enrollment (e.g. "sleep")
    pub primary_goal: &'a str,
    /// Memories retrieved for this candidate
    pub memories: &'a [RetrievedMemory],
    /// Other candidates in the same delivery batch
    pub batch: &'a [NudgeCandidate],
    /// Local hour of day (0-23)
    pub local_hour: u32,
    /// Latest recovery score, if one exists
    pub recovery_score: Option<f64>,
}

/// The five factor values, each 0-1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub protocol_fit: f64,
    pub memory_support: f64,
    pub timing_fit: f64,
    pub conflict_risk: f64,
    pub evidence_strength: f64,
}

/// Result of one confidence evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceReport {
    /// Weighted overall confidence (0-1)
    pub overall: f64,
    pub factors: ConfidenceFactors,
    /// Advisory flag; the suppression engine makes the final call
    pub should_suppress: bool,
    /// Deterministic assembled reasoning
    pub reasoning: String,
}

/// Confidence scorer
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self::with_weights(ConfidenceWeights::default())
    }

    pub fn with_weights(weights: ConfidenceWeights) -> Self {
        Self { weights }
    }

    /// Score a candidate in its context
    pub fn score(&self, ctx: &ConfidenceContext<'_>) -> ConfidenceReport {
        let factors = ConfidenceFactors {
            protocol_fit: protocol_fit(ctx.candidate, ctx.primary_goal),
            memory_support: memory_support(ctx.memories),
            timing_fit: timing_fit(ctx.candidate, ctx.local_hour, ctx.recovery_score),
            conflict_risk: conflict_risk(ctx.candidate, ctx.memories, ctx.batch),
            evidence_strength: evidence_strength(ctx.candidate.evidence_level),
        };

        let w = &self.weights;
        let overall = (factors.protocol_fit * w.protocol_fit
            + factors.memory_support * w.memory_support
            + factors.timing_fit * w.timing_fit
            + factors.conflict_risk * w.conflict_risk
            + factors.evidence_strength * w.evidence_strength)
            .clamp(0.0, 1.0);

        let should_suppress = overall < SUPPRESS_THRESHOLD;
        let reasoning = reasoning(overall, &factors, should_suppress);

        ConfidenceReport {
            overall,
            factors,
            should_suppress,
            reasoning,
        }
    }
}

/// 1.0 on exact module/goal match, 0.7 on keyword overlap, else 0.3
fn protocol_fit(candidate: &NudgeCandidate, primary_goal: &str) -> f64 {
    if candidate.module.eq_ignore_ascii_case(primary_goal) {
        return 1.0;
    }
    let candidate_text = format!("{} {}", candidate.module, candidate.title);
    if keyword_overlap(&candidate_text, primary_goal) {
        return 0.7;
    }
    0.3
}

/// Net sentiment across retrieved memories, each weighted by its own
/// confidence x relevance (relevance already carries the type multiplier).
/// The net is mapped from [-1, 1] into [0.1, 0.9] so a single strong memory
/// cannot saturate the factor. Summation makes the result order-independent.
fn memory_support(memories: &[RetrievedMemory]) -> f64 {
    let mut signed = 0.0;
    let mut total = 0.0;
    for retrieved in memories {
        let weight = retrieved.memory.confidence * retrieved.relevance;
        signed += retrieved.memory.polarity * weight;
        total += weight;
    }
    if total <= 0.0 {
        return 0.5;
    }
    let net = (signed / total).clamp(-1.0, 1.0);
    0.5 + net * 0.4
}

/// Rewards time-of-day alignment and recovery-orientation alignment
fn timing_fit(candidate: &NudgeCandidate, local_hour: u32, recovery_score: Option<f64>) -> f64 {
    let mut fit: f64 = 0.5;

    if let Some(natural) = candidate.time_of_day {
        if natural == TimeOfDay::from_hour(local_hour) {
            fit += 0.3;
        } else {
            fit -= 0.2;
        }
    }

    if let Some(recovery) = recovery_score {
        match candidate.orientation {
            Orientation::Recovery if recovery < 40.0 => fit += 0.2,
            Orientation::Recovery if recovery > 70.0 => fit -= 0.1,
            Orientation::Performance if recovery > 70.0 => fit += 0.2,
            Orientation::Performance if recovery < 40.0 => fit -= 0.2,
            _ => {}
        }
    }

    fit.clamp(0.0, 1.0)
}

/// Inverted risk: 1.0 is safest. Penalizes stated-constraint violations,
/// duplicate categories in the batch, and fixed semantic conflict pairs.
fn conflict_risk(
    candidate: &NudgeCandidate,
    memories: &[RetrievedMemory],
    batch: &[NudgeCandidate],
) -> f64 {
    let mut risk = 1.0_f64;

    let candidate_text = format!(
        "{} {} {}",
        candidate.module, candidate.title, candidate.category
    );
    let violates_constraint = memories.iter().any(|retrieved| {
        retrieved.memory.kind == MemoryKind::PreferenceConstraint
            && retrieved.memory.polarity < 0.0
            && keyword_overlap(&retrieved.memory.content, &candidate_text)
    });
    if violates_constraint {
        risk = risk.min(0.1);
    }

    for other in batch {
        if other.id == candidate.id {
            continue;
        }
        if other.category.eq_ignore_ascii_case(&candidate.category) {
            risk -= 0.4;
        }
        if categories_conflict(&candidate.category, &other.category) {
            risk -= 0.5;
        }
    }

    risk.clamp(0.05, 1.0)
}

fn categories_conflict(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    CONFLICT_PAIRS.iter().any(|(x, y)| {
        (a.contains(x) && b.contains(y)) || (a.contains(y) && b.contains(x))
    })
}

/// Fixed table from the qualitative evidence label
fn evidence_strength(level: EvidenceLevel) -> f64 {
    match level {
        EvidenceLevel::Strong => 0.9,
        EvidenceLevel::Moderate => 0.7,
        EvidenceLevel::Emerging => 0.5,
        EvidenceLevel::Anecdotal => 0.3,
    }
}

fn bucket(value: f64, low_label: &str, mid_label: &str, high_label: &str) -> String {
    if value < 0.35 {
        low_label.to_owned()
    } else if value < 0.7 {
        mid_label.to_owned()
    } else {
        high_label.to_owned()
    }
}

fn reasoning(overall: f64, factors: &ConfidenceFactors, should_suppress: bool) -> String {
    let mut parts = vec![
        format!("confidence {overall:.2}"),
        bucket(factors.protocol_fit, "weak goal fit", "partial goal fit", "strong goal fit"),
        bucket(
            factors.memory_support,
            "memories lean against",
            "memories neutral",
            "memories lean in favor",
        ),
        bucket(factors.timing_fit, "poor timing", "acceptable timing", "well timed"),
        bucket(factors.conflict_risk, "conflict detected", "some conflict risk", "no conflicts"),
        bucket(factors.evidence_strength, "thin evidence", "moderate evidence", "strong evidence"),
    ];
    if should_suppress {
        parts.push("below delivery threshold".to_owned());
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Memory, MemoryKind};
    use crate::types::PriorityClass;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn make_candidate(module: &str, category: &str) -> NudgeCandidate {
        NudgeCandidate {
            id: format!("nudge-{module}-{category}"),
            title: format!("{module} nudge"),
            module: module.to_owned(),
            category: category.to_owned(),
            time_of_day: Some(TimeOfDay::Morning),
            orientation: Orientation::Neutral,
            evidence_level: EvidenceLevel::Moderate,
            priority: PriorityClass::Standard,
        }
    }

    fn make_retrieved(kind: MemoryKind, content: &str, polarity: f64, confidence: f64) -> RetrievedMemory {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        RetrievedMemory {
            memory: Memory {
                id: Uuid::new_v4(),
                kind,
                content: content.to_owned(),
                polarity,
                confidence,
                evidence_count: 3,
                decay_rate: 0.02,
                created_at: now,
                last_used_at: now,
                last_decayed_at: now,
                expires_at: None,
                source_protocol: None,
                source_nudge_id: None,
            },
            relevance: kind.relevance_multiplier(),
        }
    }

    fn base_ctx<'a>(
        candidate: &'a NudgeCandidate,
        memories: &'a [RetrievedMemory],
        batch: &'a [NudgeCandidate],
    ) -> ConfidenceContext<'a> {
        ConfidenceContext {
            candidate,
            primary_goal: "sleep",
            memories,
            batch,
            local_hour: 8,
            recovery_score: Some(55.0),
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let w = ConfidenceWeights::default();
        let sum = w.protocol_fit + w.memory_support + w.timing_fit + w.conflict_risk + w.evidence_strength;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_protocol_fit_levels() {
        let exact = make_candidate("sleep", "wind_down");
        assert!((protocol_fit(&exact, "sleep") - 1.0).abs() < 0.001);

        let mut overlap = make_candidate("recovery", "wind_down");
        overlap.title = "improve sleep onset".to_owned();
        assert!((protocol_fit(&overlap, "sleep") - 0.7).abs() < 0.001);

        let unrelated = make_candidate("nutrition", "protein");
        assert!((protocol_fit(&unrelated, "sleep") - 0.3).abs() < 0.001);
    }

    #[test]
    fn test_memory_support_order_independent() {
        let memories = vec![
            make_retrieved(MemoryKind::StatedPreference, "loves morning light", 1.0, 0.9),
            make_retrieved(MemoryKind::NudgeFeedback, "dismissed stretch", -1.0, 0.6),
            make_retrieved(MemoryKind::DetectedPattern, "skips on weekends", -0.5, 0.4),
        ];
        let mut reversed = memories.clone();
        reversed.reverse();

        assert!((memory_support(&memories) - memory_support(&reversed)).abs() < 1e-12);
    }

    #[test]
    fn test_memory_support_sensitive_to_confidence() {
        let weak = vec![make_retrieved(MemoryKind::NudgeFeedback, "liked it", 1.0, 0.2)];
        let strong = vec![make_retrieved(MemoryKind::NudgeFeedback, "liked it", 1.0, 0.9)];
        // Both positive, but the net is confidence-weighted against nothing else,
        // so both sit at the positive cap; mix in a negative to expose the weighting
        let mixed_weak = vec![
            make_retrieved(MemoryKind::NudgeFeedback, "liked it", 1.0, 0.2),
            make_retrieved(MemoryKind::NudgeFeedback, "hated it", -1.0, 0.8),
        ];
        let mixed_strong = vec![
            make_retrieved(MemoryKind::NudgeFeedback, "liked it", 1.0, 0.9),
            make_retrieved(MemoryKind::NudgeFeedback, "hated it", -1.0, 0.8),
        ];
        assert!(memory_support(&mixed_strong) > memory_support(&mixed_weak));
        assert!((memory_support(&weak) - memory_support(&strong)).abs() < 1e-9);
    }

    #[test]
    fn test_memory_support_stays_off_extremes() {
        let all_positive = vec![make_retrieved(MemoryKind::StatedPreference, "always yes", 1.0, 1.0)];
        let all_negative = vec![make_retrieved(MemoryKind::StatedPreference, "always no", -1.0, 1.0)];
        assert!((memory_support(&all_positive) - 0.9).abs() < 0.001);
        assert!((memory_support(&all_negative) - 0.1).abs() < 0.001);
        assert!((memory_support(&[]) - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_timing_fit_recovery_orientation() {
        let mut candidate = make_candidate("recovery", "breathwork");
        candidate.orientation = Orientation::Recovery;
        candidate.time_of_day = None;

        let low = timing_fit(&candidate, 8, Some(25.0));
        let high = timing_fit(&candidate, 8, Some(85.0));
        assert!(low > high);

        // Both adjustments stacked in either direction stay within 0-1
        let mut aligned = make_candidate("recovery", "breathwork");
        aligned.orientation = Orientation::Recovery;
        aligned.time_of_day = Some(TimeOfDay::Morning);
        assert!((timing_fit(&aligned, 8, Some(25.0)) - 1.0).abs() < 0.001);

        let mut misaligned = make_candidate("training", "intervals");
        misaligned.orientation = Orientation::Performance;
        misaligned.time_of_day = Some(TimeOfDay::Evening);
        let worst = timing_fit(&misaligned, 8, Some(25.0));
        assert!((worst - 0.1).abs() < 0.001);
        assert!((0.0..=1.0).contains(&worst));

        candidate.orientation = Orientation::Performance;
        let low = timing_fit(&candidate, 8, Some(25.0));
        let high = timing_fit(&candidate, 8, Some(85.0));
        assert!(high > low);
    }

    #[test]
    fn test_timing_fit_hour_alignment() {
        let candidate = make_candidate("sleep", "wind_down");
        // Natural time is morning
        assert!(timing_fit(&candidate, 8, None) > timing_fit(&candidate, 20, None));
    }

    #[test]
    fn test_conflict_risk_constraint_violation() {
        let candidate = make_candidate("nutrition", "caffeine");
        let memories = vec![make_retrieved(
            MemoryKind::PreferenceConstraint,
            "no caffeine nudges",
            -1.0,
            0.9,
        )];
        let risk = conflict_risk(&candidate, &memories, &[]);
        assert!((risk - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_conflict_risk_batch_duplicates_and_pairs() {
        let candidate = make_candidate("nutrition", "caffeine");

        let duplicate = vec![make_candidate("energy", "caffeine")];
        assert!(conflict_risk(&candidate, &[], &duplicate) < 0.7);

        let semantic = vec![make_candidate("sleep", "sleep_hygiene")];
        assert!(conflict_risk(&candidate, &[], &semantic) < 0.6);

        let clean = vec![make_candidate("movement", "walking")];
        assert!((conflict_risk(&candidate, &[], &clean) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_evidence_table() {
        assert!((evidence_strength(EvidenceLevel::Strong) - 0.9).abs() < 0.001);
        assert!((evidence_strength(EvidenceLevel::Moderate) - 0.7).abs() < 0.001);
        assert!((evidence_strength(EvidenceLevel::Emerging) - 0.5).abs() < 0.001);
        assert!((evidence_strength(EvidenceLevel::Anecdotal) - 0.3).abs() < 0.001);
    }

    #[test]
    fn test_low_overall_sets_advisory_flag() {
        let mut candidate = make_candidate("nutrition", "caffeine");
        candidate.evidence_level = EvidenceLevel::Anecdotal;
        let memories = vec![
            make_retrieved(MemoryKind::PreferenceConstraint, "no caffeine nudges", -1.0, 0.9),
            make_retrieved(MemoryKind::NudgeFeedback, "dismissed caffeine nudge", -1.0, 0.8),
        ];
        let batch = vec![make_candidate("sleep", "sleep_hygiene")];

        let scorer = ConfidenceScorer::new();
        let mut ctx = base_ctx(&candidate, &memories, &batch);
        ctx.primary_goal = "movement";
        ctx.recovery_score = Some(25.0);
        let report = scorer.score(&ctx);

        assert!(report.overall < SUPPRESS_THRESHOLD, "overall {}", report.overall);
        assert!(report.should_suppress);
        assert!(report.reasoning.contains("below delivery threshold"));
    }

    #[test]
    fn test_report_deterministic() {
        let candidate = make_candidate("sleep", "wind_down");
        let memories = vec![make_retrieved(MemoryKind::StatedPreference, "loves wind down", 1.0, 0.8)];
        let scorer = ConfidenceScorer::new();

        let a = scorer.score(&base_ctx(&candidate, &memories, &[]));
        let b = scorer.score(&base_ctx(&candidate, &memories, &[]));
        assert!((a.overall - b.overall).abs() < 1e-12);
        assert_eq!(a.reasoning, b.reasoning);
    }
}
