//! Configuration types for the gateway.
//!
//! These are the runtime configuration structs used by `Gateway`.
//! They are separate from the TOML-deserialized config in `loadcell_config`.

use std::time::Duration;

/// Topic routing and history sizing.
#[derive(Debug, Clone)]
pub struct RouterCfg {
    /// Rich telemetry topic (JSON object with numeric `weight`).
    pub telemetry_topic: String,
    /// Hardware confirm-button topic.
    pub confirm_topic: String,
    pub legacy_capacity: usize,
    pub weight_capacity: usize,
}

impl Default for RouterCfg {
    fn default() -> Self {
        Self {
            telemetry_topic: "amanerve/loadcell/telemetry".into(),
            confirm_topic: "amanerve/button/confirm".into(),
            legacy_capacity: 100,
            weight_capacity: 100,
        }
    }
}

/// Fixed safety ceiling, independent of any order.
#[derive(Debug, Clone)]
pub struct ThresholdCfg {
    /// Samples at or above this weight raise `BLINK_RED`.
    pub overload_threshold: f64,
    /// When false the guard never fires.
    pub alert_enabled: bool,
}

impl Default for ThresholdCfg {
    fn default() -> Self {
        Self {
            overload_threshold: 90.0,
            alert_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorCfg {
    /// Topic the indicator hardware listens on.
    pub topic: String,
}

impl Default for IndicatorCfg {
    fn default() -> Self {
        Self {
            topic: "amanerve/led/status".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LookupCfg {
    /// Passed to the order-lookup collaborator on every request.
    pub timeout: Duration,
    /// Pending requests the worker accepts before `submit` is refused.
    pub queue_depth: usize,
}

impl Default for LookupCfg {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(10_000),
            queue_depth: 4,
        }
    }
}

/// Everything the gateway needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct GatewayCfg {
    pub router: RouterCfg,
    pub threshold: ThresholdCfg,
    pub indicator: IndicatorCfg,
    pub lookup: LookupCfg,
    /// Default `limit` for history queries.
    pub history_default_limit: usize,
    /// Reported by status queries only.
    pub broker: String,
    /// Reported by status queries only.
    pub legacy_topic: String,
}

impl Default for GatewayCfg {
    fn default() -> Self {
        Self {
            router: RouterCfg::default(),
            threshold: ThresholdCfg::default(),
            indicator: IndicatorCfg::default(),
            lookup: LookupCfg::default(),
            history_default_limit: 50,
            broker: "mqtt://localhost".into(),
            legacy_topic: "amanerve/loadcell/telemetry".into(),
        }
    }
}
