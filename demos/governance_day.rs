//! Run a week of metrics through the engine and print one day's decision

use attune_engine::engine::{EvaluationRequest, GovernanceEngine};
use attune_engine::types::{
    DailyMetrics, EvidenceLevel, NudgeCandidate, Orientation, PriorityClass, TimeOfDay,
};
use chrono::{Duration, TimeZone, Utc};

fn main() {
    let mut engine = GovernanceEngine::new();
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();

    // Warm the baseline with a steady week
    for day in 0..7 {
        let mut request = EvaluationRequest::empty("sleep");
        request.metrics = Some(DailyMetrics {
            hrv_ms: Some(62.0 + day as f64),
            resting_hr_bpm: Some(53.0),
            sleep_hours: Some(7.4),
            sleep_efficiency: Some(0.89),
            deep_sleep_pct: Some(0.17),
            rem_sleep_pct: Some(0.21),
            respiratory_rate: Some(14.2),
            temp_deviation_c: Some(0.0),
            ..DailyMetrics::empty(format!("2024-03-{:02}", day + 1))
        });
        engine.evaluate(&request, start + Duration::days(day));
    }

    // Day eight: evaluate a candidate batch
    let mut request = EvaluationRequest::empty("sleep");
    request.metrics = Some(DailyMetrics {
        hrv_ms: Some(58.0),
        resting_hr_bpm: Some(55.0),
        sleep_hours: Some(6.8),
        sleep_efficiency: Some(0.86),
        deep_sleep_pct: Some(0.15),
        rem_sleep_pct: Some(0.20),
        respiratory_rate: Some(14.6),
        temp_deviation_c: Some(0.1),
        ..DailyMetrics::empty("2024-03-08")
    });
    request.local_hour = 15;
    request.candidates = vec![
        NudgeCandidate {
            id: "wind-down-cue".to_owned(),
            title: "Start your wind-down".to_owned(),
            module: "sleep".to_owned(),
            category: "wind_down".to_owned(),
            time_of_day: Some(TimeOfDay::Evening),
            orientation: Orientation::Recovery,
            evidence_level: EvidenceLevel::Strong,
            priority: PriorityClass::Standard,
        },
        NudgeCandidate {
            id: "interval-block".to_owned(),
            title: "Interval session".to_owned(),
            module: "movement".to_owned(),
            category: "high_intensity".to_owned(),
            time_of_day: Some(TimeOfDay::Afternoon),
            orientation: Orientation::Performance,
            evidence_level: EvidenceLevel::Moderate,
            priority: PriorityClass::Standard,
        },
    ];

    let decision = engine.evaluate(&request, start + Duration::days(7));
    match serde_json::to_string_pretty(&decision) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
