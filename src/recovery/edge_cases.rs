//! Edge-case detection over one day's metrics
//!
//! Detects patterns that change how a recovery score should be read:
//! - Alcohol-like pattern: HRV suppressed while resting HR is elevated
//! - Illness risk: temperature and respiratory rate both elevated
//! - Travel: large baseline deviation across several signals at once
//! - Menstrual adjustment: expected luteal-phase temperature elevation

use crate::baseline::UserBaseline;
use crate::types::{CyclePhase, DailyMetrics};
use serde::{Deserialize, Serialize};

/// HRV z below this counts as suppressed
const HRV_SUPPRESSED_Z: f64 = -1.5;
/// RHR z above this counts as elevated
const RHR_ELEVATED_Z: f64 = 1.0;
/// Temperature elevation above baseline that suggests illness (celsius)
const ILLNESS_TEMP_ELEVATION_C: f64 = 0.4;
/// Respiratory z above this counts as elevated
const RESP_ELEVATED_Z: f64 = 1.5;
/// |z| above this counts toward the travel signal tally
const TRAVEL_DEVIATION_Z: f64 = 1.5;
/// Sleep deviation from target that counts toward the travel tally (hours)
const TRAVEL_SLEEP_DEVIATION_HOURS: f64 = 1.5;
/// Number of deviating signals that flags travel
const TRAVEL_SIGNAL_COUNT: usize = 3;

/// Edge-case flags attached to a recovery result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeCases {
    /// HRV suppressed and RHR elevated together
    pub alcohol_pattern: bool,
    /// Temperature and respiratory rate both elevated
    pub illness_risk: bool,
    /// Several signals deviating from baseline at once
    pub travel_suspected: bool,
    /// Luteal-phase temperature elevation treated as expected
    pub menstrual_adjustment: bool,
}

/// Detect edge cases for one day's metrics against the user's baseline
pub fn detect(metrics: &DailyMetrics, baseline: &UserBaseline) -> EdgeCases {
    let hrv_z = metrics.hrv_ms.and_then(|v| baseline.hrv_z(v));
    let rhr_z = metrics.resting_hr_bpm.and_then(|v| baseline.resting_hr_z(v));
    let resp_z = metrics
        .respiratory_rate
        .and_then(|v| baseline.respiratory_z(v));
    let temp_elevation = metrics
        .temp_deviation_c
        .map(|dev| baseline.temp_elevation(dev).unwrap_or(dev));

    let alcohol_pattern = matches!(
        (hrv_z, rhr_z),
        (Some(hrv), Some(rhr)) if hrv < HRV_SUPPRESSED_Z && rhr > RHR_ELEVATED_Z
    );

    let illness_risk = matches!(
        (temp_elevation, resp_z),
        (Some(temp), Some(resp)) if temp > ILLNESS_TEMP_ELEVATION_C && resp > RESP_ELEVATED_Z
    );

    let sleep_deviation = metrics
        .sleep_hours
        .map(|hours| (hours - baseline.sleep_target_hours).abs());

    let deviating = [
        hrv_z.map(|z| z.abs() > TRAVEL_DEVIATION_Z),
        rhr_z.map(|z| z.abs() > TRAVEL_DEVIATION_Z),
        resp_z.map(|z| z.abs() > TRAVEL_DEVIATION_Z),
        sleep_deviation.map(|d| d > TRAVEL_SLEEP_DEVIATION_HOURS),
        temp_elevation.map(|t| t.abs() > 0.5),
    ]
    .iter()
    .filter(|flag| **flag == Some(true))
    .count();

    let travel_suspected = deviating >= TRAVEL_SIGNAL_COUNT;

    let menstrual_adjustment = metrics.cycle_phase == Some(CyclePhase::Luteal);

    EdgeCases {
        alcohol_pattern,
        illness_risk,
        travel_suspected,
        menstrual_adjustment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::BaselineTracker;

    fn seeded_baseline() -> UserBaseline {
        let mut tracker = BaselineTracker::default();
        for (i, (hrv, rhr, rr)) in [
            (62.0, 54.0, 14.2),
            (58.0, 56.0, 14.6),
            (65.0, 53.0, 14.4),
            (60.0, 55.0, 14.3),
            (63.0, 54.0, 14.5),
            (59.0, 56.0, 14.4),
            (61.0, 55.0, 14.3),
        ]
        .into_iter()
        .enumerate()
        {
            tracker.update(&DailyMetrics {
                hrv_ms: Some(hrv),
                resting_hr_bpm: Some(rhr),
                respiratory_rate: Some(rr),
                sleep_hours: Some(7.5),
                temp_deviation_c: Some(0.0),
                ..DailyMetrics::empty(format!("2024-03-{:02}", i + 1))
            });
        }
        tracker.snapshot()
    }

    #[test]
    fn test_alcohol_pattern() {
        let baseline = seeded_baseline();

        let mut metrics = DailyMetrics::empty("2024-03-08");
        metrics.hrv_ms = Some(40.0);
        metrics.resting_hr_bpm = Some(62.0);
        assert!(detect(&metrics, &baseline).alcohol_pattern);

        // HRV suppressed alone is not the pattern
        metrics.resting_hr_bpm = Some(55.0);
        assert!(!detect(&metrics, &baseline).alcohol_pattern);
    }

    #[test]
    fn test_illness_risk() {
        let baseline = seeded_baseline();

        let mut metrics = DailyMetrics::empty("2024-03-08");
        metrics.temp_deviation_c = Some(0.7);
        metrics.respiratory_rate = Some(16.5);
        assert!(detect(&metrics, &baseline).illness_risk);

        // Elevated temperature without respiratory elevation is not illness risk
        metrics.respiratory_rate = Some(14.4);
        assert!(!detect(&metrics, &baseline).illness_risk);
    }

    #[test]
    fn test_travel_requires_several_signals() {
        let baseline = seeded_baseline();

        let mut metrics = DailyMetrics::empty("2024-03-08");
        metrics.hrv_ms = Some(40.0);
        metrics.resting_hr_bpm = Some(64.0);
        metrics.sleep_hours = Some(4.5);
        assert!(detect(&metrics, &baseline).travel_suspected);

        let mut single = DailyMetrics::empty("2024-03-08");
        single.hrv_ms = Some(40.0);
        assert!(!detect(&single, &baseline).travel_suspected);
    }

    #[test]
    fn test_menstrual_adjustment_only_when_tracked() {
        let baseline = seeded_baseline();

        let mut metrics = DailyMetrics::empty("2024-03-08");
        metrics.cycle_phase = Some(CyclePhase::Luteal);
        assert!(detect(&metrics, &baseline).menstrual_adjustment);

        metrics.cycle_phase = Some(CyclePhase::Follicular);
        assert!(!detect(&metrics, &baseline).menstrual_adjustment);

        metrics.cycle_phase = None;
        assert!(!detect(&metrics, &baseline).menstrual_adjustment);
    }

    #[test]
    fn test_missing_data_never_flags() {
        let baseline = seeded_baseline();
        let edge = detect(&DailyMetrics::empty("2024-03-08"), &baseline);
        assert!(!edge.alcohol_pattern);
        assert!(!edge.illness_risk);
        assert!(!edge.travel_suspected);
    }
}
