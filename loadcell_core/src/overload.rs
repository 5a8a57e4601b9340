//! Overload detection.
//!
//! Two independent policies:
//! - [`OverloadDetector`] compares against the current per-RM target weight
//!   of the active order and reports rising and falling edges.
//! - [`ThresholdGuard`] compares against the fixed safety ceiling from config
//!   and is used to flash the indicator red.

use serde::Serialize;

use crate::config::ThresholdCfg;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OverloadSignal {
    Overload { weight: f64, target: f64 },
    Clear,
}

/// Edge detector for "weight above target". Starts disarmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverloadDetector {
    armed: bool,
}

impl OverloadDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// `Overload` on the first sample above `target`, `Clear` on the first
    /// sample at or below it.
    ///
    /// A non-positive or non-finite target never raises and never clears;
    /// callers that drop the target disarm through [`reset`](Self::reset).
    pub fn check(&mut self, weight: f64, target: f64) -> Option<OverloadSignal> {
        if !(target.is_finite() && target > 0.0) {
            return None;
        }
        match (self.armed, weight > target) {
            (false, true) => {
                self.armed = true;
                Some(OverloadSignal::Overload { weight, target })
            }
            (true, false) if weight <= target => {
                self.armed = false;
                Some(OverloadSignal::Clear)
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.armed = false;
    }
}

/// Fixed-threshold guard. Fires once per crossing of `weight >= threshold`
/// and re-arms when the weight drops back below.
#[derive(Debug, Clone)]
pub struct ThresholdGuard {
    cfg: ThresholdCfg,
    tripped: bool,
}

impl ThresholdGuard {
    pub fn new(cfg: ThresholdCfg) -> Self {
        Self {
            cfg,
            tripped: false,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.cfg.overload_threshold
    }

    /// True on the sample that crosses the threshold.
    pub fn check(&mut self, weight: f64) -> bool {
        if !self.cfg.alert_enabled {
            return false;
        }
        let over = weight >= self.cfg.overload_threshold;
        let fire = over && !self.tripped;
        self.tripped = over;
        fire
    }
}
