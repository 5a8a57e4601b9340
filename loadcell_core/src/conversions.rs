//! `From` implementations bridging `loadcell_config` types to `loadcell_core` types.

use std::time::Duration;

use crate::config::{GatewayCfg, IndicatorCfg, LookupCfg, RouterCfg, ThresholdCfg};

// ── RouterCfg ────────────────────────────────────────────────────────────────

impl From<&loadcell_config::Config> for RouterCfg {
    fn from(c: &loadcell_config::Config) -> Self {
        Self {
            telemetry_topic: c.loadcell.topics.telemetry.clone(),
            confirm_topic: c.loadcell.topics.confirm.clone(),
            legacy_capacity: c.history.legacy_capacity,
            weight_capacity: c.history.weight_capacity,
        }
    }
}

// ── ThresholdCfg ─────────────────────────────────────────────────────────────

impl From<&loadcell_config::LoadcellCfg> for ThresholdCfg {
    fn from(c: &loadcell_config::LoadcellCfg) -> Self {
        Self {
            overload_threshold: c.overload_threshold,
            alert_enabled: c.alert_enabled,
        }
    }
}

// ── IndicatorCfg ─────────────────────────────────────────────────────────────

impl From<&loadcell_config::LoadcellCfg> for IndicatorCfg {
    fn from(c: &loadcell_config::LoadcellCfg) -> Self {
        Self {
            topic: c.topics.led.clone(),
        }
    }
}

// ── LookupCfg ────────────────────────────────────────────────────────────────

impl From<&loadcell_config::LookupCfg> for LookupCfg {
    fn from(c: &loadcell_config::LookupCfg) -> Self {
        Self {
            timeout: Duration::from_millis(c.timeout_ms),
            queue_depth: c.queue_depth,
        }
    }
}

// ── GatewayCfg ───────────────────────────────────────────────────────────────

impl From<&loadcell_config::Config> for GatewayCfg {
    fn from(c: &loadcell_config::Config) -> Self {
        Self {
            router: RouterCfg::from(c),
            threshold: ThresholdCfg::from(&c.loadcell),
            indicator: IndicatorCfg::from(&c.loadcell),
            lookup: LookupCfg::from(&c.lookup),
            history_default_limit: c.history.default_limit,
            broker: c.mqtt.broker.clone(),
            legacy_topic: c.mqtt.topic.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_line_up_with_config_defaults() {
        let file = loadcell_config::Config::default();
        let cfg = GatewayCfg::from(&file);
        let def = GatewayCfg::default();
        assert_eq!(cfg.router.telemetry_topic, def.router.telemetry_topic);
        assert_eq!(cfg.router.confirm_topic, def.router.confirm_topic);
        assert_eq!(cfg.indicator.topic, def.indicator.topic);
        assert_eq!(cfg.lookup.timeout, def.lookup.timeout);
        assert_eq!(cfg.history_default_limit, def.history_default_limit);
        assert!(cfg.threshold.alert_enabled);
    }
}
