//! Per-user baseline tracking
//!
//! This module maintains rolling per-signal baselines (HRV, resting HR,
//! respiratory rate, sleep duration, temperature) so that daily signals can be
//! interpreted relative to the user's own normal rather than population norms.
//!
//! HRV is tracked in log-space because HRV is log-normally distributed; all
//! other signals use raw mean/stddev.

use crate::types::{ConfidenceTier, DailyMetrics};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default baseline window in daily samples
pub const DEFAULT_BASELINE_WINDOW: usize = 14;

/// Default sleep-duration target before any data is available (hours)
pub const DEFAULT_SLEEP_TARGET_HOURS: f64 = 8.0;

/// Sleep target is clamped into this range regardless of observed history
pub const SLEEP_TARGET_RANGE_HOURS: (f64, f64) = (6.5, 9.0);

/// Mean and standard deviation over a signal's rolling window
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SignalStats {
    pub mean: f64,
    pub stddev: f64,
    pub samples: u32,
}

/// Snapshot of a user's statistical baseline, derived after every update.
///
/// All statistics are `None` until the corresponding signal has at least one
/// sample; a missing signal can never surface as NaN downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBaseline {
    /// Mean/stddev of ln(HRV)
    pub hrv_log: Option<SignalStats>,
    /// Mean/stddev of resting HR (bpm)
    pub resting_hr: Option<SignalStats>,
    /// Mean/stddev of respiratory rate (breaths/min)
    pub respiratory_rate: Option<SignalStats>,
    /// Mean/stddev of temperature deviation (celsius)
    pub temperature: Option<SignalStats>,
    /// Personalized sleep-duration target (hours)
    pub sleep_target_hours: f64,
    /// Total number of daily updates ever applied (monotonically non-decreasing)
    pub sample_count: u32,
    /// Confidence tier, a pure function of `sample_count`
    pub confidence_tier: ConfidenceTier,
}

impl UserBaseline {
    /// Z-score of an HRV reading against the log-space baseline
    pub fn hrv_z(&self, hrv_ms: f64) -> Option<f64> {
        let stats = self.hrv_log?;
        if hrv_ms <= 0.0 || stats.stddev <= 0.0 {
            return None;
        }
        Some((hrv_ms.ln() - stats.mean) / stats.stddev)
    }

    /// Z-score of a resting HR reading against the baseline
    pub fn resting_hr_z(&self, rhr_bpm: f64) -> Option<f64> {
        z_against(self.resting_hr, rhr_bpm)
    }

    /// Z-score of a respiratory-rate reading against the baseline
    pub fn respiratory_z(&self, breaths_per_min: f64) -> Option<f64> {
        z_against(self.respiratory_rate, breaths_per_min)
    }

    /// Temperature elevation above the user's baseline mean (celsius)
    pub fn temp_elevation(&self, temp_deviation_c: f64) -> Option<f64> {
        self.temperature.map(|stats| temp_deviation_c - stats.mean)
    }
}

fn z_against(stats: Option<SignalStats>, value: f64) -> Option<f64> {
    let stats = stats?;
    if stats.stddev <= 0.0 {
        return None;
    }
    Some((value - stats.mean) / stats.stddev)
}

/// Rolling baseline tracker for one user.
///
/// Maintains a trailing window per signal; missing days are excluded from that
/// signal's window rather than treated as zero. Persist across evaluations
/// with [`BaselineTracker::to_json`] / [`BaselineTracker::from_json`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineTracker {
    /// Rolling ln(HRV) values
    hrv_log_values: VecDeque<f64>,
    /// Rolling resting HR values (bpm)
    rhr_values: VecDeque<f64>,
    /// Rolling respiratory rate values (breaths/min)
    respiratory_values: VecDeque<f64>,
    /// Rolling sleep duration values (hours)
    sleep_values: VecDeque<f64>,
    /// Rolling temperature deviation values (celsius)
    temp_values: VecDeque<f64>,
    /// Maximum window size
    window_size: usize,
    /// Total distinct dates ever ingested; never decreases
    total_updates: u32,
    /// Date of the most recent update, for same-date corrections
    #[serde(default)]
    last_date: Option<String>,
    /// Which windows the most recent update pushed into
    #[serde(default)]
    last_contribution: DayContribution,
}

/// Per-signal record of what the last ingested day contributed, so a
/// corrected re-submission of the same date can retract exactly those samples.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct DayContribution {
    hrv: bool,
    rhr: bool,
    respiratory: bool,
    sleep: bool,
    temp: bool,
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WINDOW)
    }
}

impl BaselineTracker {
    /// Create a new tracker with the specified window size
    pub fn new(window_size: usize) -> Self {
        Self {
            hrv_log_values: VecDeque::with_capacity(window_size),
            rhr_values: VecDeque::with_capacity(window_size),
            respiratory_values: VecDeque::with_capacity(window_size),
            sleep_values: VecDeque::with_capacity(window_size),
            temp_values: VecDeque::with_capacity(window_size),
            window_size,
            total_updates: 0,
            last_date: None,
            last_contribution: DayContribution::default(),
        }
    }

    /// Apply one day's metrics and return the refreshed baseline snapshot.
    ///
    /// Re-submitting the same date replaces that day's samples instead of
    /// appending, so a corrected row never double-counts the day in any
    /// window or in `sample_count`.
    pub fn update(&mut self, metrics: &DailyMetrics) -> UserBaseline {
        if self.last_date.as_deref() == Some(metrics.date.as_str()) {
            self.retract_last_day();
        } else {
            self.total_updates = self.total_updates.saturating_add(1);
            self.last_date = Some(metrics.date.clone());
        }

        let mut contributed = DayContribution::default();
        if let Some(hrv) = metrics.hrv_ms {
            if hrv > 0.0 {
                push_bounded(&mut self.hrv_log_values, hrv.ln(), self.window_size);
                contributed.hrv = true;
            }
        }
        if let Some(rhr) = metrics.resting_hr_bpm {
            push_bounded(&mut self.rhr_values, rhr, self.window_size);
            contributed.rhr = true;
        }
        if let Some(rr) = metrics.respiratory_rate {
            push_bounded(&mut self.respiratory_values, rr, self.window_size);
            contributed.respiratory = true;
        }
        if let Some(sleep) = metrics.sleep_hours {
            push_bounded(&mut self.sleep_values, sleep, self.window_size);
            contributed.sleep = true;
        }
        if let Some(temp) = metrics.temp_deviation_c {
            push_bounded(&mut self.temp_values, temp, self.window_size);
            contributed.temp = true;
        }
        self.last_contribution = contributed;

        self.snapshot()
    }

    /// Pop the most recent update's samples ahead of a same-date correction.
    /// Each day's values sit at the back of their windows, so popping the
    /// back removes exactly that day's contribution.
    fn retract_last_day(&mut self) {
        if self.last_contribution.hrv {
            self.hrv_log_values.pop_back();
        }
        if self.last_contribution.rhr {
            self.rhr_values.pop_back();
        }
        if self.last_contribution.respiratory {
            self.respiratory_values.pop_back();
        }
        if self.last_contribution.sleep {
            self.sleep_values.pop_back();
        }
        if self.last_contribution.temp {
            self.temp_values.pop_back();
        }
        self.last_contribution = DayContribution::default();
    }

    /// Current baseline snapshot without applying new data
    pub fn snapshot(&self) -> UserBaseline {
        let sleep_target = match window_stats(&self.sleep_values) {
            Some(stats) => stats
                .mean
                .clamp(SLEEP_TARGET_RANGE_HOURS.0, SLEEP_TARGET_RANGE_HOURS.1),
            None => DEFAULT_SLEEP_TARGET_HOURS,
        };

        UserBaseline {
            hrv_log: window_stats(&self.hrv_log_values),
            resting_hr: window_stats(&self.rhr_values),
            respiratory_rate: window_stats(&self.respiratory_values),
            temperature: window_stats(&self.temp_values),
            sleep_target_hours: sleep_target,
            sample_count: self.total_updates,
            confidence_tier: ConfidenceTier::from_samples(self.total_updates),
        }
    }

    /// Total number of daily updates ever applied
    pub fn sample_count(&self) -> u32 {
        self.total_updates
    }

    /// Load tracker state from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize tracker state to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn push_bounded(queue: &mut VecDeque<f64>, value: f64, window: usize) {
    queue.push_back(value);
    while queue.len() > window {
        queue.pop_front();
    }
}

/// Mean and sample standard deviation over a rolling window
fn window_stats(queue: &VecDeque<f64>) -> Option<SignalStats> {
    if queue.is_empty() {
        return None;
    }
    let n = queue.len() as f64;
    let mean = queue.iter().sum::<f64>() / n;
    let stddev = if queue.len() < 2 {
        0.0
    } else {
        let var = queue.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        var.sqrt()
    };
    Some(SignalStats {
        mean,
        stddev,
        samples: queue.len() as u32,
    })
}
