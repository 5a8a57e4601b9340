//! Summary statistics over the weight-telemetry history.

use serde::Serialize;

use crate::history::HistoryBuffer;
use crate::sample::WeightSample;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub count: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub latest: f64,
    pub stable: bool,
}

/// Round to `decimals` places, halves away from zero.
#[inline]
pub fn round_to(x: f64, decimals: i32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

/// `None` when the buffer is empty.
pub fn compute(buffer: &HistoryBuffer<WeightSample>) -> Option<Statistics> {
    let newest = buffer.latest()?;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for s in buffer.iter() {
        sum += s.weight;
        min = min.min(s.weight);
        max = max.max(s.weight);
    }
    let count = buffer.len();
    Some(Statistics {
        count,
        average: round_to(sum / count as f64, 2),
        min: round_to(min, 2),
        max: round_to(max, 2),
        latest: newest.weight,
        stable: newest.stable.unwrap_or(false),
    })
}
