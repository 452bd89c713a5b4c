//! Recovery scoring
//!
//! This module converts one day's metrics plus the user's baseline into a
//! 0-100 composite readiness score with:
//! - Per-component breakdown (raw value, sub-score, vs-baseline, weight)
//! - Edge-case flags (alcohol pattern, illness risk, travel, cycle adjustment)
//! - Overall confidence and deterministic reasoning
//! - A fixed recommendation table keyed on (zone, edge cases)

pub mod edge_cases;
pub mod recommendations;

use crate::baseline::UserBaseline;
use crate::types::{ConfidenceTier, CyclePhase, DailyMetrics, RecoveryZone};
use edge_cases::EdgeCases;
use serde::{Deserialize, Serialize};

/// Minimum baseline samples before a score is produced at all
pub const MIN_SCORING_SAMPLES: u32 = 3;

/// Expected luteal-phase temperature elevation that should not be penalized (celsius)
pub const LUTEAL_TEMP_ELEVATION_C: f64 = 0.3;

/// Scoring component identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Hrv,
    RestingHr,
    SleepQuality,
    SleepDuration,
    RespiratoryRate,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Hrv => "hrv",
            Component::RestingHr => "resting_hr",
            Component::SleepQuality => "sleep_quality",
            Component::SleepDuration => "sleep_duration",
            Component::RespiratoryRate => "respiratory_rate",
        }
    }
}

/// One component's contribution to the composite score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentScore {
    pub component: Component,
    /// Raw input value, if available
    pub raw: Option<f64>,
    /// Sub-score on the 0-100 scale
    pub score: f64,
    /// Comparison-to-baseline string, templated from z-score buckets
    pub vs_baseline: String,
    /// Effective weight after missing-component redistribution
    pub weight: f64,
}

/// Result of scoring one (user, date)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub date: String,
    /// Composite readiness score, 0-100
    pub score: f64,
    pub zone: RecoveryZone,
    pub components: Vec<ComponentScore>,
    pub edge_cases: EdgeCases,
    /// Temperature penalty applied after the weighted average (0 to -15)
    pub temperature_penalty: f64,
    /// Overall confidence in the score (0-1)
    pub confidence: f64,
    /// Deterministic templated reasoning
    pub reasoning: String,
    /// Fixed-table recommendations for the day
    pub recommendations: Vec<String>,
}

/// Outcome of a scoring attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryOutcome {
    Ready(Box<RecoveryResult>),
    /// Baseline too thin to score; degrade instead of guessing
    NotReady { samples: u32, required: u32 },
}

impl RecoveryOutcome {
    pub fn as_ready(&self) -> Option<&RecoveryResult> {
        match self {
            RecoveryOutcome::Ready(result) => Some(result),
            RecoveryOutcome::NotReady { .. } => None,
        }
    }
}

/// Nominal component weights; missing components redistribute proportionally
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub hrv: f64,
    pub resting_hr: f64,
    pub sleep_quality: f64,
    pub sleep_duration: f64,
    pub respiratory_rate: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            hrv: 0.40,
            resting_hr: 0.25,
            sleep_quality: 0.20,
            sleep_duration: 0.10,
            respiratory_rate: 0.05,
        }
    }
}

/// Recovery scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    pub weights: ComponentWeights,
    /// Minimum baseline samples before scoring
    pub min_samples: u32,
    /// Z-scores are clipped to +/- this before rescaling
    pub z_clip: f64,
    /// Temperature elevation where the penalty starts (celsius)
    pub temp_penalty_onset_c: f64,
    /// Elevation above onset that reaches the maximum penalty (celsius)
    pub temp_penalty_span_c: f64,
    /// Maximum temperature penalty (points)
    pub temp_penalty_max: f64,
    /// Points lost per hour of sleep below target
    pub sleep_short_penalty_per_hour: f64,
    /// Points lost per hour of sleep above target
    pub sleep_over_penalty_per_hour: f64,
    /// Floor for the sleep-duration sub-score
    pub sleep_duration_floor: f64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            weights: ComponentWeights::default(),
            min_samples: MIN_SCORING_SAMPLES,
            z_clip: 3.0,
            temp_penalty_onset_c: 0.2,
            temp_penalty_span_c: 1.0,
            temp_penalty_max: 15.0,
            sleep_short_penalty_per_hour: 15.0,
            sleep_over_penalty_per_hour: 5.0,
            sleep_duration_floor: 20.0,
        }
    }
}

/// Recovery scorer
pub struct RecoveryScorer {
    config: RecoveryConfig,
}

impl Default for RecoveryScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryScorer {
    pub fn new() -> Self {
        Self::with_config(RecoveryConfig::default())
    }

    pub fn with_config(config: RecoveryConfig) -> Self {
        Self { config }
    }

    /// Score one day's metrics against the user's baseline.
    ///
    /// Returns `NotReady` until the baseline carries at least
    /// `min_samples` daily updates; a thin baseline degrades to a documented
    /// fallback instead of producing a low-quality score.
    pub fn score(
        &self,
        metrics: &DailyMetrics,
        baseline: &UserBaseline,
        previous: Option<&RecoveryResult>,
    ) -> RecoveryOutcome {
        if baseline.sample_count < self.config.min_samples {
            return RecoveryOutcome::NotReady {
                samples: baseline.sample_count,
                required: self.config.min_samples,
            };
        }

        let cfg = &self.config;
        let w = &cfg.weights;

        // Sub-scores; None means the component is unavailable for this day
        let hrv_score = self.hrv_sub_score(metrics, baseline);
        let rhr_score = self.rhr_sub_score(metrics, baseline);
        let sleep_quality_score = self.sleep_quality_sub_score(metrics);
        let sleep_duration_score = self.sleep_duration_sub_score(metrics, baseline);
        let respiratory_score = self.respiratory_sub_score(metrics, baseline);

        let available: Vec<(Component, Option<f64>, f64, Option<f64>)> = vec![
            (Component::Hrv, metrics.hrv_ms, w.hrv, hrv_score),
            (
                Component::RestingHr,
                metrics.resting_hr_bpm,
                w.resting_hr,
                rhr_score,
            ),
            (
                Component::SleepQuality,
                metrics.sleep_efficiency,
                w.sleep_quality,
                sleep_quality_score,
            ),
            (
                Component::SleepDuration,
                metrics.sleep_hours,
                w.sleep_duration,
                sleep_duration_score,
            ),
            (
                Component::RespiratoryRate,
                metrics.respiratory_rate,
                w.respiratory_rate,
                respiratory_score,
            ),
        ];

        // Availability-weighted average: effective weight = nominal / sum(available nominals)
        let available_weight: f64 = available
            .iter()
            .filter(|(_, _, _, score)| score.is_some())
            .map(|(_, _, weight, _)| weight)
            .sum();

        let mut components = Vec::with_capacity(available.len());
        let mut weighted_sum = 0.0;

        for (component, raw, nominal, sub_score) in &available {
            let (effective, score) = match sub_score {
                Some(score) if available_weight > 0.0 => {
                    let effective = nominal / available_weight;
                    weighted_sum += effective * score;
                    (effective, *score)
                }
                _ => (0.0, 0.0),
            };
            components.push(ComponentScore {
                component: *component,
                raw: *raw,
                score,
                vs_baseline: self.vs_baseline_label(*component, metrics, baseline),
                weight: effective,
            });
        }

        // With nothing available, fall back to a neutral midpoint rather than zero
        let base_score = if available_weight > 0.0 {
            weighted_sum
        } else {
            50.0
        };

        let temp_elevation = effective_temp_elevation(metrics, baseline);
        let temperature_penalty = self.temperature_penalty(temp_elevation);

        let score = (base_score - temperature_penalty).clamp(0.0, 100.0);
        let zone = RecoveryZone::from_score(score);

        let edge_cases = edge_cases::detect(metrics, baseline);
        let confidence = self.confidence(baseline.confidence_tier, available_weight);
        let reasoning = self.reasoning(score, zone, &components, &edge_cases, previous);
        let recommendations = recommendations::recommendations_for(zone, &edge_cases)
            .into_iter()
            .map(str::to_owned)
            .collect();

        RecoveryOutcome::Ready(Box::new(RecoveryResult {
            date: metrics.date.clone(),
            score,
            zone,
            components,
            edge_cases,
            temperature_penalty: -temperature_penalty,
            confidence,
            reasoning,
            recommendations,
        }))
    }

    /// HRV sub-score: log-space z-score, clipped and rescaled to 0-100
    fn hrv_sub_score(&self, metrics: &DailyMetrics, baseline: &UserBaseline) -> Option<f64> {
        let z = baseline.hrv_z(metrics.hrv_ms?)?;
        Some(self.z_to_score(z))
    }

    /// Resting HR sub-score: inverse z-score, since lower is better
    fn rhr_sub_score(&self, metrics: &DailyMetrics, baseline: &UserBaseline) -> Option<f64> {
        let z = baseline.resting_hr_z(metrics.resting_hr_bpm?)?;
        Some(self.z_to_score(-z))
    }

    /// Respiratory-rate sub-score: inverse z-score, elevation is the bad direction
    fn respiratory_sub_score(&self, metrics: &DailyMetrics, baseline: &UserBaseline) -> Option<f64> {
        let z = baseline.respiratory_z(metrics.respiratory_rate?)?;
        Some(self.z_to_score(-z))
    }

    /// Sleep quality blends efficiency, deep %, and REM %, redistributing
    /// weight across whichever of the three are present.
    fn sleep_quality_sub_score(&self, metrics: &DailyMetrics) -> Option<f64> {
        let efficiency = metrics
            .sleep_efficiency
            .map(|eff| ((eff - 0.70) / 0.25).clamp(0.0, 1.0) * 100.0);
        let deep = metrics
            .deep_sleep_pct
            .map(|pct| band_score(pct, 0.13, 0.23, 0.10));
        let rem = metrics
            .rem_sleep_pct
            .map(|pct| band_score(pct, 0.18, 0.28, 0.10));

        let parts = [(efficiency, 0.5), (deep, 0.25), (rem, 0.25)];
        let total: f64 = parts
            .iter()
            .filter(|(score, _)| score.is_some())
            .map(|(_, weight)| weight)
            .sum();
        if total == 0.0 {
            return None;
        }
        let blended = parts
            .iter()
            .filter_map(|(score, weight)| score.map(|s| s * weight / total))
            .sum();
        Some(blended)
    }

    /// Sleep duration against the personalized target: 100 on target,
    /// -15/hour short, -5/hour over, floor 20.
    fn sleep_duration_sub_score(
        &self,
        metrics: &DailyMetrics,
        baseline: &UserBaseline,
    ) -> Option<f64> {
        let hours = metrics.sleep_hours?;
        let target = baseline.sleep_target_hours;
        let score = if hours < target {
            100.0 - (target - hours) * self.config.sleep_short_penalty_per_hour
        } else {
            100.0 - (hours - target) * self.config.sleep_over_penalty_per_hour
        };
        Some(score.clamp(self.config.sleep_duration_floor, 100.0))
    }

    /// Temperature penalty: 0 until onset, linear to the maximum over the span.
    /// Never positive (the caller subtracts the returned magnitude).
    fn temperature_penalty(&self, elevation_c: Option<f64>) -> f64 {
        let Some(elevation) = elevation_c else {
            return 0.0;
        };
        let over = elevation - self.config.temp_penalty_onset_c;
        if over <= 0.0 {
            return 0.0;
        }
        (over / self.config.temp_penalty_span_c * self.config.temp_penalty_max)
            .clamp(0.0, self.config.temp_penalty_max)
    }

    fn z_to_score(&self, z: f64) -> f64 {
        let clipped = z.clamp(-self.config.z_clip, self.config.z_clip);
        (clipped + self.config.z_clip) / (2.0 * self.config.z_clip) * 100.0
    }

    /// Confidence combines baseline tier with component coverage
    fn confidence(&self, tier: ConfidenceTier, available_weight: f64) -> f64 {
        let tier_factor = match tier {
            ConfidenceTier::Low => 0.5,
            ConfidenceTier::Medium => 0.75,
            ConfidenceTier::High => 0.95,
        };
        (tier_factor * (0.4 + 0.6 * available_weight.clamp(0.0, 1.0))).clamp(0.0, 1.0)
    }

    fn vs_baseline_label(
        &self,
        component: Component,
        metrics: &DailyMetrics,
        baseline: &UserBaseline,
    ) -> String {
        let z = match component {
            Component::Hrv => metrics.hrv_ms.and_then(|v| baseline.hrv_z(v)),
            Component::RestingHr => metrics
                .resting_hr_bpm
                .and_then(|v| baseline.resting_hr_z(v)),
            Component::RespiratoryRate => metrics
                .respiratory_rate
                .and_then(|v| baseline.respiratory_z(v)),
            Component::SleepDuration => metrics
                .sleep_hours
                .map(|h| h - baseline.sleep_target_hours),
            Component::SleepQuality => return "vs sleep-quality bands".to_owned(),
        };
        match z {
            Some(z) if z >= 1.0 => "well above baseline".to_owned(),
            Some(z) if z >= 0.3 => "above baseline".to_owned(),
            Some(z) if z > -0.3 => "near baseline".to_owned(),
            Some(z) if z > -1.0 => "below baseline".to_owned(),
            Some(_) => "well below baseline".to_owned(),
            None => "no baseline".to_owned(),
        }
    }

    /// Deterministic reasoning string assembled from score buckets.
    /// Identical inputs always produce the identical string.
    fn reasoning(
        &self,
        score: f64,
        zone: RecoveryZone,
        components: &[ComponentScore],
        edge_cases: &EdgeCases,
        previous: Option<&RecoveryResult>,
    ) -> String {
        let mut parts = vec![format!("Recovery {:.0} ({})", score, zone.as_str())];

        for component in components {
            if component.weight > 0.0 {
                parts.push(format!(
                    "{} {}",
                    component.component.as_str(),
                    component.vs_baseline
                ));
            }
        }

        if edge_cases.alcohol_pattern {
            parts.push("alcohol-like pattern detected".to_owned());
        }
        if edge_cases.illness_risk {
            parts.push("illness risk flagged".to_owned());
        }
        if edge_cases.travel_suspected {
            parts.push("travel-scale deviation".to_owned());
        }
        if edge_cases.menstrual_adjustment {
            parts.push("expected cycle-phase temperature elevation".to_owned());
        }

        if let Some(prev) = previous {
            if score > prev.score + 5.0 {
                parts.push("trending up vs yesterday".to_owned());
            } else if score < prev.score - 5.0 {
                parts.push("trending down vs yesterday".to_owned());
            }
        }

        parts.join("; ")
    }
}

/// Temperature elevation after subtracting any expected cycle-phase elevation
fn effective_temp_elevation(metrics: &DailyMetrics, baseline: &UserBaseline) -> Option<f64> {
    let deviation = metrics.temp_deviation_c?;
    let mut elevation = baseline.temp_elevation(deviation).unwrap_or(deviation);
    if metrics.cycle_phase == Some(CyclePhase::Luteal) {
        elevation -= LUTEAL_TEMP_ELEVATION_C;
    }
    Some(elevation)
}

/// 100 inside [lo, hi], falling linearly to 0 over `falloff` outside the band
fn band_score(value: f64, lo: f64, hi: f64, falloff: f64) -> f64 {
    let distance = if value < lo {
        lo - value
    } else if value > hi {
        value - hi
    } else {
        return 100.0;
    };
    ((1.0 - distance / falloff) * 100.0).clamp(0.0, 100.0)
}
