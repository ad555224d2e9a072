use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Timing entry describing a single stage of block processing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub label: String,
    pub elapsed_ms: f64,
}

impl StageTiming {
    pub fn new(label: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            label: label.into(),
            elapsed_ms,
        }
    }
}

/// Aggregated timing trace for one block or one scale.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBreakdown {
    pub total_ms: f64,
    pub stages: Vec<StageTiming>,
}

impl TimingBreakdown {
    pub fn push(&mut self, label: impl Into<String>, elapsed_ms: f64) {
        self.stages.push(StageTiming::new(label, elapsed_ms));
    }

    /// Records the time since `start` under `label` and returns a fresh instant.
    pub fn lap(&mut self, label: impl Into<String>, start: Instant) -> Instant {
        self.push(label, elapsed_ms(start));
        Instant::now()
    }

    /// Sum of the stages recorded under `label`.
    pub fn stage_ms(&self, label: &str) -> f64 {
        self.stages
            .iter()
            .filter(|s| s.label == label)
            .map(|s| s.elapsed_ms)
            .sum()
    }
}

pub fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
