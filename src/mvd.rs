//! Minimum Viable Day (MVD) detection and state management
//!
//! When a user is struggling (low recovery, travel, heavy schedule,
//! consistency collapse), the engine switches them into a restricted protocol
//! set instead of business-as-usual nudging. This module holds:
//! - The trigger detector: strict priority order, first match wins
//! - The state manager: activation, universal recovery exit, append-only
//!   episode history
//! - The protocol allowlist gate: a pure filter over candidates while active

use crate::types::NudgeCandidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Timezone offset (hours) between stored and device timezone that flags travel
pub const TRAVEL_TIMEZONE_OFFSET_HOURS: f64 = 2.0;

/// Recovery score below this activates full MVD
pub const LOW_RECOVERY_THRESHOLD: f64 = 35.0;

/// Meeting hours at or above this activate full MVD (when calendar data exists)
pub const HEAVY_CALENDAR_HOURS: f64 = 4.0;

/// Completion rate below this on each of the last N days flags a consistency drop
pub const CONSISTENCY_DROP_PCT: f64 = 50.0;

/// Consecutive days of low completion required for a consistency drop
pub const CONSISTENCY_DROP_DAYS: usize = 3;

/// Recovery score above this exits any active MVD, regardless of trigger
pub const RECOVERY_EXIT_THRESHOLD: f64 = 50.0;

/// MVD protocol set variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MvdType {
    Full,
    SemiActive,
    Travel,
}

impl MvdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MvdType::Full => "full",
            MvdType::SemiActive => "semi_active",
            MvdType::Travel => "travel",
        }
    }
}

/// What caused an MVD activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MvdTrigger {
    ManualActivation,
    TravelDetected,
    LowRecovery,
    HeavyCalendar,
    ConsistencyDrop,
}

impl MvdTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            MvdTrigger::ManualActivation => "manual_activation",
            MvdTrigger::TravelDetected => "travel_detected",
            MvdTrigger::LowRecovery => "low_recovery",
            MvdTrigger::HeavyCalendar => "heavy_calendar",
            MvdTrigger::ConsistencyDrop => "consistency_drop",
        }
    }
}

/// Inputs for one detection pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MvdSignals {
    /// User asked for MVD explicitly
    pub manual_request: bool,
    /// Absolute offset between stored and current device timezone (hours)
    pub timezone_offset_hours: f64,
    /// Latest recovery score, if one exists
    pub recovery_score: Option<f64>,
    /// Meeting hours today, if calendar data is available
    pub meeting_hours_today: Option<f64>,
    /// Daily completion rates (percent), most recent last
    pub completion_rates: Vec<f64>,
}

/// Current MVD state for one user (one per user, not per day)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MvdState {
    pub active: bool,
    pub mvd_type: Option<MvdType>,
    pub trigger: Option<MvdTrigger>,
    pub activated_at: Option<DateTime<Utc>>,
    /// Human-readable exit condition shown to the user
    pub exit_condition: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// One closed or open activation in the append-only history log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MvdEpisode {
    pub mvd_type: MvdType,
    pub trigger: MvdTrigger,
    pub activated_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
    /// Computed when the episode closes
    pub duration_hours: Option<f64>,
}

/// What a check did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum MvdTransition {
    Activated {
        mvd_type: MvdType,
        trigger: MvdTrigger,
    },
    Deactivated {
        mvd_type: MvdType,
        trigger: MvdTrigger,
    },
    NoChange,
}

/// Detect whether any trigger fires, in strict priority order.
/// The first matching trigger wins; there is no trigger combination logic.
pub fn detect_trigger(signals: &MvdSignals) -> Option<(MvdType, MvdTrigger)> {
    if signals.manual_request {
        return Some((MvdType::Full, MvdTrigger::ManualActivation));
    }
    if signals.timezone_offset_hours.abs() >= TRAVEL_TIMEZONE_OFFSET_HOURS {
        return Some((MvdType::Travel, MvdTrigger::TravelDetected));
    }
    if let Some(recovery) = signals.recovery_score {
        if recovery < LOW_RECOVERY_THRESHOLD {
            return Some((MvdType::Full, MvdTrigger::LowRecovery));
        }
    }
    if let Some(meeting_hours) = signals.meeting_hours_today {
        if meeting_hours >= HEAVY_CALENDAR_HOURS {
            return Some((MvdType::Full, MvdTrigger::HeavyCalendar));
        }
    }
    let rates = &signals.completion_rates;
    if rates.len() >= CONSISTENCY_DROP_DAYS
        && rates[rates.len() - CONSISTENCY_DROP_DAYS..]
            .iter()
            .all(|rate| *rate < CONSISTENCY_DROP_PCT)
    {
        return Some((MvdType::SemiActive, MvdTrigger::ConsistencyDrop));
    }
    None
}

/// Per-user MVD state machine with append-only history.
///
/// Persist across evaluations with [`MvdStateManager::to_json`] /
/// [`MvdStateManager::from_json`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MvdStateManager {
    state: MvdState,
    history: Vec<MvdEpisode>,
}

impl MvdStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &MvdState {
        &self.state
    }

    pub fn history(&self) -> &[MvdEpisode] {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Run one detection/exit pass.
    ///
    /// While active: recovery above the exit threshold clears the state
    /// regardless of the original trigger; further trigger detection is a
    /// no-op, so activating twice never double-logs.
    pub fn check(&mut self, signals: &MvdSignals, now: DateTime<Utc>) -> MvdTransition {
        self.state.last_checked_at = Some(now);

        if self.state.active {
            let recovered = signals
                .recovery_score
                .is_some_and(|score| score > RECOVERY_EXIT_THRESHOLD);
            if recovered {
                return self.deactivate(now);
            }
            return MvdTransition::NoChange;
        }

        match detect_trigger(signals) {
            Some((mvd_type, trigger)) => self.activate(mvd_type, trigger, now),
            None => MvdTransition::NoChange,
        }
    }

    fn activate(&mut self, mvd_type: MvdType, trigger: MvdTrigger, now: DateTime<Utc>) -> MvdTransition {
        self.state = MvdState {
            active: true,
            mvd_type: Some(mvd_type),
            trigger: Some(trigger),
            activated_at: Some(now),
            exit_condition: Some(format!(
                "Recovery score above {RECOVERY_EXIT_THRESHOLD:.0}"
            )),
            last_checked_at: Some(now),
        };
        self.history.push(MvdEpisode {
            mvd_type,
            trigger,
            activated_at: now,
            deactivated_at: None,
            duration_hours: None,
        });
        debug!(mvd_type = mvd_type.as_str(), trigger = trigger.as_str(), "mvd activated");
        MvdTransition::Activated { mvd_type, trigger }
    }

    fn deactivate(&mut self, now: DateTime<Utc>) -> MvdTransition {
        let mvd_type = self.state.mvd_type.unwrap_or(MvdType::Full);
        let trigger = self.state.trigger.unwrap_or(MvdTrigger::ManualActivation);

        if let Some(episode) = self.history.last_mut() {
            if episode.deactivated_at.is_none() {
                episode.deactivated_at = Some(now);
                episode.duration_hours =
                    Some((now - episode.activated_at).num_seconds() as f64 / 3600.0);
            }
        }

        self.state = MvdState {
            active: false,
            last_checked_at: Some(now),
            ..MvdState::default()
        };
        debug!(mvd_type = mvd_type.as_str(), "mvd deactivated");
        MvdTransition::Deactivated { mvd_type, trigger }
    }

    /// Load state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Protocols allowed while in full MVD
const FULL_PROTOCOLS: &[&str] = &["breath", "hydration", "sunlight", "walk", "rest"];

/// Protocols allowed while in semi-active MVD
const SEMI_ACTIVE_PROTOCOLS: &[&str] = &[
    "breath",
    "hydration",
    "sunlight",
    "walk",
    "rest",
    "stretch",
    "mobility",
    "journal",
];

/// Protocols allowed while in travel MVD
const TRAVEL_PROTOCOLS: &[&str] = &["breath", "hydration", "walk", "light", "sleep"];

/// The allowlist for an MVD type
pub fn allowlist(mvd_type: MvdType) -> &'static [&'static str] {
    match mvd_type {
        MvdType::Full => FULL_PROTOCOLS,
        MvdType::SemiActive => SEMI_ACTIVE_PROTOCOLS,
        MvdType::Travel => TRAVEL_PROTOCOLS,
    }
}

/// Whether a protocol name is allowed under an MVD type.
///
/// Matching is deliberately loose: case-insensitive substring in either
/// direction, so "Breathwork" matches "breath" and naming-scheme drift
/// between protocol catalogs does not silently drop everything. Do not
/// tighten this to exact match; callers and tests rely on the tolerance.
pub fn is_protocol_allowed(mvd_type: MvdType, protocol_name: &str) -> bool {
    let name = protocol_name.to_lowercase();
    allowlist(mvd_type)
        .iter()
        .any(|entry| name.contains(entry) || entry.contains(name.as_str()))
}

/// Whether a candidate belongs to the allowlist for an MVD type.
/// A candidate qualifies if its module or its category is allowed.
pub fn is_candidate_allowed(mvd_type: MvdType, candidate: &NudgeCandidate) -> bool {
    is_protocol_allowed(mvd_type, &candidate.module)
        || is_protocol_allowed(mvd_type, &candidate.category)
}
