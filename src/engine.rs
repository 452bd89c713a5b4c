//! Engine orchestration
//!
//! This module provides the public API for the governance engine. One
//! `GovernanceEngine` owns all per-user state (baseline windows, memory bank,
//! MVD state machine) and runs the full evaluation pipeline:
//! baseline update → recovery scoring → MVD check → memory maintenance →
//! per-candidate confidence → MVD allowlist gate → suppression.
//!
//! Evaluation is synchronous and deterministic for a given (state, request,
//! now) triple. All clock reads come from the caller-supplied `now`.

use crate::baseline::{BaselineTracker, DEFAULT_BASELINE_WINDOW};
use crate::confidence::{ConfidenceContext, ConfidenceReport, ConfidenceScorer, ConfidenceWeights};
use crate::error::EngineError;
use crate::memory::{MemoryBank, MemoryQuery, Observation, RetrievedMemory, MEMORY_CAP};
use crate::mvd::{is_candidate_allowed, MvdSignals, MvdStateManager, MvdTransition};
use crate::recovery::{RecoveryConfig, RecoveryOutcome, RecoveryResult, RecoveryScorer};
use crate::suppression::{
    QuietHours, SuppressionConfig, SuppressionContext, SuppressionDecision, SuppressionEngine,
};
use crate::types::{DailyMetrics, NudgeCandidate, Orientation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum memories retrieved per candidate
const MEMORIES_PER_CANDIDATE: usize = 10;

/// Engine-wide configuration, aggregating each stage's settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Rolling baseline window (days)
    pub baseline_window: usize,
    /// Memory bank capacity
    pub memory_cap: usize,
    pub recovery: RecoveryConfig,
    pub confidence: ConfidenceWeights,
    pub suppression: SuppressionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            baseline_window: DEFAULT_BASELINE_WINDOW,
            memory_cap: MEMORY_CAP,
            recovery: RecoveryConfig::default(),
            confidence: ConfidenceWeights::default(),
            suppression: SuppressionConfig::default(),
        }
    }
}

/// One evaluation request: the day's data plus the candidate batch.
///
/// Everything here is boundary-supplied; the engine holds no clock, no
/// calendar connection, and no delivery log of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Verified user identity, supplied by the authenticating boundary
    pub user_id: String,
    /// Today's normalized metrics, when a sync has produced them
    pub metrics: Option<DailyMetrics>,
    /// Candidates awaiting a delivery decision
    pub candidates: Vec<NudgeCandidate>,
    /// The user's primary goal/module enrollment (e.g. "sleep")
    pub primary_goal: String,
    /// Local hour of day (0-23)
    pub local_hour: u32,
    pub quiet_hours: QuietHours,
    /// User asked for a minimum viable day explicitly
    pub manual_mvd_request: bool,
    /// Absolute offset between stored and current device timezone (hours)
    pub timezone_offset_hours: f64,
    /// Meeting hours today, if calendar data is available
    pub meeting_hours_today: Option<f64>,
    /// Daily protocol completion rates (percent), most recent last
    pub completion_rates: Vec<f64>,
    pub delivered_today: u32,
    pub dismissed_today: u32,
    pub last_delivery_at: Option<DateTime<Utc>>,
    /// Current habit streak length (days)
    pub streak_days: u32,
    /// Candidate categories that would interrupt the streak habit
    pub streak_conflict_categories: Vec<String>,
}

impl EvaluationRequest {
    /// Validate boundary input before evaluation.
    ///
    /// The engine itself is total over well-formed requests; this check
    /// belongs at the deserialization boundary (CLI, service handler).
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.primary_goal.is_empty() {
            return Err(EngineError::MissingField("primary_goal".to_owned()));
        }
        for candidate in &self.candidates {
            if candidate.id.is_empty() {
                return Err(EngineError::MissingField("candidate.id".to_owned()));
            }
        }
        if self.local_hour > 23 {
            return Err(EngineError::OutOfRange {
                field: "local_hour".to_owned(),
                value: f64::from(self.local_hour),
            });
        }
        if self.quiet_hours.start > 23 || self.quiet_hours.end > 23 {
            return Err(EngineError::OutOfRange {
                field: "quiet_hours".to_owned(),
                value: f64::from(self.quiet_hours.start.max(self.quiet_hours.end)),
            });
        }
        if self.timezone_offset_hours.abs() > 18.0 {
            return Err(EngineError::InvalidTimezone(format!(
                "{} hours",
                self.timezone_offset_hours
            )));
        }
        if let Some(metrics) = &self.metrics {
            chrono::NaiveDate::parse_from_str(&metrics.date, "%Y-%m-%d")
                .map_err(|e| EngineError::DateParseError(format!("{}: {e}", metrics.date)))?;
        }
        Ok(())
    }

    /// A minimal request with no metrics and no candidates
    pub fn empty(primary_goal: impl Into<String>) -> Self {
        Self {
            user_id: String::new(),
            metrics: None,
            candidates: Vec::new(),
            primary_goal: primary_goal.into(),
            local_hour: 12,
            quiet_hours: QuietHours { start: 22, end: 7 },
            manual_mvd_request: false,
            timezone_offset_hours: 0.0,
            meeting_hours_today: None,
            completion_rates: Vec::new(),
            delivered_today: 0,
            dismissed_today: 0,
            last_delivery_at: None,
            streak_days: 0,
            streak_conflict_categories: Vec::new(),
        }
    }
}

/// The full decision trail for one candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDecision {
    pub candidate: NudgeCandidate,
    pub confidence: ConfidenceReport,
    pub suppression: SuppressionDecision,
    /// Whether the candidate cleared every gate
    pub deliver: bool,
}

/// Result of one full evaluation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceDecision {
    /// Recovery outcome for the day, when metrics were supplied
    pub recovery: Option<RecoveryOutcome>,
    pub mvd_transition: MvdTransition,
    pub mvd_active: bool,
    /// Per-candidate decisions, in request order
    pub candidates: Vec<CandidateDecision>,
    pub evaluated_at: DateTime<Utc>,
}

impl GovernanceDecision {
    /// Candidates that cleared every gate, in request order
    pub fn deliverable(&self) -> Vec<&NudgeCandidate> {
        self.candidates
            .iter()
            .filter(|decision| decision.deliver)
            .map(|decision| &decision.candidate)
            .collect()
    }
}

/// Serialized engine state; versioned for forward-compatible loads
#[derive(Debug, Serialize, Deserialize)]
struct EngineState {
    version: u32,
    baseline: BaselineTracker,
    memory: MemoryBank,
    mvd: MvdStateManager,
    last_recovery: Option<RecoveryResult>,
}

const STATE_VERSION: u32 = 1;

/// Stateful governance engine for one user.
///
/// Owns the baseline tracker, memory bank, and MVD state machine; callers
/// persist the engine between evaluations with [`GovernanceEngine::save_state`]
/// and [`GovernanceEngine::load_state`].
pub struct GovernanceEngine {
    config: EngineConfig,
    baseline: BaselineTracker,
    memory: MemoryBank,
    mvd: MvdStateManager,
    recovery_scorer: RecoveryScorer,
    confidence_scorer: ConfidenceScorer,
    suppression: SuppressionEngine,
    last_recovery: Option<RecoveryResult>,
}

impl Default for GovernanceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GovernanceEngine {
    /// Create an engine with default settings
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            baseline: BaselineTracker::new(config.baseline_window),
            memory: MemoryBank::new(config.memory_cap),
            mvd: MvdStateManager::new(),
            recovery_scorer: RecoveryScorer::with_config(config.recovery.clone()),
            confidence_scorer: ConfidenceScorer::with_weights(config.confidence.clone()),
            suppression: SuppressionEngine::with_config(config.suppression.clone()),
            last_recovery: None,
            config,
        }
    }

    /// The latest scored recovery result, if any
    pub fn last_recovery(&self) -> Option<&RecoveryResult> {
        self.last_recovery.as_ref()
    }

    pub fn memory(&self) -> &MemoryBank {
        &self.memory
    }

    pub fn mvd(&self) -> &MvdStateManager {
        &self.mvd
    }

    pub fn baseline_samples(&self) -> u32 {
        self.baseline.sample_count()
    }

    /// Record an explicit user observation (feedback, stated preference,
    /// constraint). Reinforcement and dedup happen inside the bank.
    pub fn record_observation(&mut self, observation: Observation, now: DateTime<Utc>) {
        self.memory.observe(observation, now);
    }

    /// Run the full evaluation pipeline for one request.
    ///
    /// Stage order is fixed: baseline update, recovery scoring, MVD check,
    /// memory decay and pruning, then per-candidate confidence and
    /// suppression. Later stages see the outputs of earlier ones (the MVD
    /// check sees today's recovery score, suppression sees today's
    /// confidence).
    pub fn evaluate(&mut self, request: &EvaluationRequest, now: DateTime<Utc>) -> GovernanceDecision {
        // Stage 1 + 2: baseline update and recovery scoring
        let recovery = request.metrics.as_ref().map(|metrics| {
            let baseline = self.baseline.update(metrics);
            let outcome =
                self.recovery_scorer
                    .score(metrics, &baseline, self.last_recovery.as_ref());
            if let Some(result) = outcome.as_ready() {
                self.last_recovery = Some(result.clone());
            }
            outcome
        });

        let recovery_score = self.last_recovery.as_ref().map(|result| result.score);

        // Stage 3: MVD state machine
        let signals = MvdSignals {
            manual_request: request.manual_mvd_request,
            timezone_offset_hours: request.timezone_offset_hours,
            recovery_score,
            meeting_hours_today: request.meeting_hours_today,
            completion_rates: request.completion_rates.clone(),
        };
        let mvd_transition = self.mvd.check(&signals, now);
        match &mvd_transition {
            MvdTransition::Activated { mvd_type, trigger } => {
                tracing::info!(
                    user = request.user_id.as_str(),
                    mvd_type = mvd_type.as_str(),
                    trigger = trigger.as_str(),
                    "minimum viable day activated"
                );
            }
            MvdTransition::Deactivated { mvd_type, .. } => {
                tracing::info!(
                    user = request.user_id.as_str(),
                    mvd_type = mvd_type.as_str(),
                    "minimum viable day ended"
                );
            }
            MvdTransition::NoChange => {}
        }

        // Stage 4: memory maintenance before any retrieval
        self.memory.decay(now);
        self.memory.prune(now);

        // Stage 5: per-candidate confidence + suppression
        let candidates = request
            .candidates
            .iter()
            .map(|candidate| self.decide_candidate(candidate, request, recovery_score, now))
            .collect();

        GovernanceDecision {
            recovery,
            mvd_transition,
            mvd_active: self.mvd.is_active(),
            candidates,
            evaluated_at: now,
        }
    }

    fn decide_candidate(
        &self,
        candidate: &NudgeCandidate,
        request: &EvaluationRequest,
        recovery_score: Option<f64>,
        now: DateTime<Utc>,
    ) -> CandidateDecision {
        let memories = self.retrieve_for(candidate, now);

        let confidence = self.confidence_scorer.score(&ConfidenceContext {
            candidate,
            primary_goal: &request.primary_goal,
            memories: &memories,
            batch: &request.candidates,
            local_hour: request.local_hour,
            recovery_score,
        });

        let in_mvd_allowlist = match self.mvd.state().mvd_type {
            Some(mvd_type) if self.mvd.is_active() => is_candidate_allowed(mvd_type, candidate),
            _ => false,
        };

        let suppression = self.suppression.evaluate(&SuppressionContext {
            delivered_today: request.delivered_today,
            dismissed_today: request.dismissed_today,
            last_delivery_at: request.last_delivery_at,
            now,
            local_hour: request.local_hour,
            quiet_hours: request.quiet_hours,
            meeting_hours_today: request.meeting_hours_today,
            streak_days: request.streak_days,
            candidate_conflicts_with_streak: request
                .streak_conflict_categories
                .iter()
                .any(|category| category.eq_ignore_ascii_case(&candidate.category)),
            recovery_score,
            candidate_recovery_oriented: candidate.orientation == Orientation::Recovery,
            mvd_active: self.mvd.is_active(),
            candidate_in_mvd_allowlist: in_mvd_allowlist,
            confidence: confidence.overall,
            priority: candidate.priority,
        });

        let deliver = suppression.should_deliver;
        if !deliver {
            tracing::debug!(
                candidate = candidate.id.as_str(),
                suppressed_by = suppression.suppressed_by.as_deref().unwrap_or(""),
                "candidate suppressed"
            );
        }

        CandidateDecision {
            candidate: candidate.clone(),
            confidence,
            suppression,
            deliver,
        }
    }

    /// Retrieve memories relevant to one candidate (read-only)
    fn retrieve_for(&self, candidate: &NudgeCandidate, now: DateTime<Utc>) -> Vec<RetrievedMemory> {
        let query = MemoryQuery {
            kinds: Vec::new(),
            text: Some(format!(
                "{} {} {}",
                candidate.module, candidate.category, candidate.title
            )),
            limit: MEMORIES_PER_CANDIDATE,
        };
        self.memory.retrieve(&query, now)
    }

    /// Load engine state from JSON saved by [`GovernanceEngine::save_state`].
    ///
    /// Scorer configuration is not part of the saved state; it comes from the
    /// config this engine was constructed with.
    pub fn load_state(&mut self, json: &str) -> Result<(), EngineError> {
        let state: EngineState = serde_json::from_str(json)?;
        if state.version != STATE_VERSION {
            return Err(EngineError::StateParseError(format!(
                "unsupported state version {}",
                state.version
            )));
        }
        self.baseline = state.baseline;
        self.memory = state.memory;
        self.mvd = state.mvd;
        self.last_recovery = state.last_recovery;
        Ok(())
    }

    /// Save all per-user state to JSON
    pub fn save_state(&self) -> Result<String, EngineError> {
        let state = EngineState {
            version: STATE_VERSION,
            baseline: self.baseline.clone(),
            memory: self.memory.clone(),
            mvd: self.mvd.clone(),
            last_recovery: self.last_recovery.clone(),
        };
        Ok(serde_json::to_string(&state)?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
