//! Core types shared across the governance pipeline
//!
//! This module defines the data structures that flow between the pipeline
//! stages: daily metrics, baseline snapshots, nudge candidates, and the
//! enumerations used by the scoring and suppression components.

use serde::{Deserialize, Serialize};

/// Baseline confidence tier, a pure function of sample count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    /// Derive the tier from the number of baseline samples.
    /// Thresholds: fewer than 7 = low, 7-13 = medium, 14 or more = high.
    pub fn from_samples(samples: u32) -> Self {
        if samples < 7 {
            ConfidenceTier::Low
        } else if samples < 14 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::High
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        }
    }
}

/// Recovery zone derived from the overall score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryZone {
    Red,
    Yellow,
    Green,
}

impl RecoveryZone {
    /// Zone is a deterministic function of score alone: <34 red, <67 yellow, else green
    pub fn from_score(score: f64) -> Self {
        if score < 34.0 {
            RecoveryZone::Red
        } else if score < 67.0 {
            RecoveryZone::Yellow
        } else {
            RecoveryZone::Green
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryZone::Red => "red",
            RecoveryZone::Yellow => "yellow",
            RecoveryZone::Green => "green",
        }
    }
}

/// Priority class of a candidate nudge, used for suppression override checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityClass {
    Critical,
    Adaptive,
    Standard,
}

/// Coarse time-of-day bucket for timing-fit scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// Bucket a local hour (0-23) into a time-of-day
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }
}

/// Whether a candidate targets recovery or performance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Recovery,
    Performance,
    Neutral,
}

/// Qualitative evidence level attached to a candidate recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLevel {
    Strong,
    Moderate,
    Emerging,
    Anecdotal,
}

/// Menstrual cycle phase, present only when the user has cycle tracking enabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulatory,
    Luteal,
}

/// Normalized daily biometrics for one (user, date).
///
/// Produced by an external normalization step; consumed read-only here.
/// Missing signals are `None`, never zero-filled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyMetrics {
    /// Date this data represents (YYYY-MM-DD)
    pub date: String,
    /// Heart rate variability (ms, RMSSD)
    pub hrv_ms: Option<f64>,
    /// Resting heart rate (bpm)
    pub resting_hr_bpm: Option<f64>,
    /// Total sleep duration (hours)
    pub sleep_hours: Option<f64>,
    /// Sleep efficiency (0-1)
    pub sleep_efficiency: Option<f64>,
    /// Deep sleep share of total sleep (0-1)
    pub deep_sleep_pct: Option<f64>,
    /// REM sleep share of total sleep (0-1)
    pub rem_sleep_pct: Option<f64>,
    /// Respiratory rate (breaths per minute)
    pub respiratory_rate: Option<f64>,
    /// Skin/body temperature deviation from device baseline (celsius)
    pub temp_deviation_c: Option<f64>,
    /// Step count
    pub steps: Option<u32>,
    /// Active energy burned (kcal)
    pub active_energy_kcal: Option<f64>,
    /// Cycle phase for the day, when tracking is enabled
    pub cycle_phase: Option<CyclePhase>,
}

impl DailyMetrics {
    /// An empty metrics row for the given date
    pub fn empty(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            hrv_ms: None,
            resting_hr_bpm: None,
            sleep_hours: None,
            sleep_efficiency: None,
            deep_sleep_pct: None,
            rem_sleep_pct: None,
            respiratory_rate: None,
            temp_deviation_c: None,
            steps: None,
            active_energy_kcal: None,
            cycle_phase: None,
        }
    }
}

/// A candidate recommendation awaiting the governance decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NudgeCandidate {
    /// Stable identifier for the nudge
    pub id: String,
    /// Short human-readable title
    pub title: String,
    /// Module/protocol this nudge belongs to (e.g. "sleep", "movement")
    pub module: String,
    /// Category used for duplicate/conflict checks (e.g. "caffeine", "breathwork")
    pub category: String,
    /// Natural time-of-day for this nudge, if it has one
    pub time_of_day: Option<TimeOfDay>,
    /// Recovery/performance orientation
    pub orientation: Orientation,
    /// Evidence level behind the recommendation
    pub evidence_level: EvidenceLevel,
    /// Priority class for suppression override checks
    pub priority: PriorityClass,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(ConfidenceTier::from_samples(0), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_samples(6), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::from_samples(7), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_samples(13), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_samples(14), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_samples(200), ConfidenceTier::High);
    }

    #[test]
    fn test_tier_monotonic_in_samples() {
        let mut last = ConfidenceTier::Low;
        for n in 0..40 {
            let tier = ConfidenceTier::from_samples(n);
            assert!(tier >= last, "tier regressed at {n} samples");
            last = tier;
        }
    }

    #[test]
    fn test_zone_boundaries() {
        assert_eq!(RecoveryZone::from_score(0.0), RecoveryZone::Red);
        assert_eq!(RecoveryZone::from_score(33.9), RecoveryZone::Red);
        assert_eq!(RecoveryZone::from_score(34.0), RecoveryZone::Yellow);
        assert_eq!(RecoveryZone::from_score(66.9), RecoveryZone::Yellow);
        assert_eq!(RecoveryZone::from_score(67.0), RecoveryZone::Green);
        assert_eq!(RecoveryZone::from_score(100.0), RecoveryZone::Green);
    }

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Evening);
    }
}
