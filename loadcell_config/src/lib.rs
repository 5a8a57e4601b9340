#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the weighing gateway.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Every section has defaults matching the deployed gateway, so an empty
//!   file is a valid config.
//! - Environment overrides (`MQTT_BROKER`, `OVERLOAD_THRESHOLD`, ...) are
//!   applied through an injectable lookup so tests never touch the process env.
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MqttCfg {
    /// Broker URL, e.g. `mqtt://localhost`
    pub broker: String,
    pub port: u16,
    /// Generic (legacy) telemetry topic
    pub topic: String,
    pub client_id: String,
}

impl Default for MqttCfg {
    fn default() -> Self {
        Self {
            broker: "mqtt://localhost".to_string(),
            port: 1883,
            topic: "amanerve/loadcell/telemetry".to_string(),
            client_id: "amanerve_gateway_3".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerCfg {
    pub port: u16,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TopicsCfg {
    /// Rich load-cell telemetry (JSON objects)
    pub telemetry: String,
    /// Physical confirm button
    pub confirm: String,
    /// Indicator command sink
    pub led: String,
}

impl Default for TopicsCfg {
    fn default() -> Self {
        Self {
            telemetry: "amanerve/loadcell/telemetry".to_string(),
            confirm: "amanerve/button/confirm".to_string(),
            led: "amanerve/led/status".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoadcellCfg {
    pub topics: TopicsCfg,
    /// Rated capacity of the cell (kg); informational, reported in status
    pub max_weight: f64,
    /// Hardware safety ceiling (kg); crossing it blinks the indicator red
    pub overload_threshold: f64,
    /// Disable the threshold guard entirely when false
    pub alert_enabled: bool,
}

impl Default for LoadcellCfg {
    fn default() -> Self {
        Self {
            topics: TopicsCfg::default(),
            max_weight: 100.0,
            overload_threshold: 90.0,
            alert_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryCfg {
    pub legacy_capacity: usize,
    pub weight_capacity: usize,
    /// Default `limit` for history queries that do not specify one
    pub default_limit: usize,
}

impl Default for HistoryCfg {
    fn default() -> Self {
        Self {
            legacy_capacity: 100,
            weight_capacity: 100,
            default_limit: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LookupCfg {
    pub url: String,
    pub timeout_ms: u64,
    /// Bound on queued lookup requests
    pub queue_depth: usize,
}

impl Default for LookupCfg {
    fn default() -> Self {
        Self {
            url: "https://services.ama.id/kanban/findOne".to_string(),
            timeout_ms: 10_000,
            queue_depth: 4,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PersistenceCfg {
    /// JSON-lines record file; records are dropped when unset
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttCfg,
    pub server: ServerCfg,
    pub loadcell: LoadcellCfg,
    pub history: HistoryCfg,
    pub lookup: LookupCfg,
    pub persistence: PersistenceCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file, then apply process env overrides.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let mut cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.apply_env_overrides(|k| std::env::var(k).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> eyre::Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| eyre::eyre!("environment override {key}={raw:?} is not a valid value"))
}

impl Config {
    /// Apply the deployment's environment overrides. `get` returns the value
    /// of a variable, or None when unset.
    pub fn apply_env_overrides<F>(&mut self, get: F) -> eyre::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("MQTT_BROKER") {
            self.mqtt.broker = v;
        }
        if let Some(v) = get("MQTT_PORT") {
            self.mqtt.port = parse_env("MQTT_PORT", &v)?;
        }
        if let Some(v) = get("MQTT_TOPIC") {
            self.mqtt.topic = v;
        }
        if let Some(v) = get("MQTT_CLIENT_ID") {
            self.mqtt.client_id = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = get("MAX_WEIGHT") {
            self.loadcell.max_weight = parse_env("MAX_WEIGHT", &v)?;
        }
        if let Some(v) = get("OVERLOAD_THRESHOLD") {
            self.loadcell.overload_threshold = parse_env("OVERLOAD_THRESHOLD", &v)?;
        }
        if let Some(v) = get("ALERT_ENABLED") {
            // Anything but the literal "false" keeps alerts on.
            self.loadcell.alert_enabled = v.trim() != "false";
        }
        Ok(())
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // MQTT
        if self.mqtt.broker.trim().is_empty() {
            eyre::bail!("mqtt.broker must not be empty");
        }
        if self.mqtt.port == 0 {
            eyre::bail!("mqtt.port must be > 0");
        }
        if self.mqtt.topic.trim().is_empty() {
            eyre::bail!("mqtt.topic must not be empty");
        }
        if self.mqtt.client_id.trim().is_empty() {
            eyre::bail!("mqtt.client_id must not be empty");
        }

        // Topics
        let t = &self.loadcell.topics;
        if t.telemetry.is_empty() || t.confirm.is_empty() || t.led.is_empty() {
            eyre::bail!("loadcell.topics entries must not be empty");
        }
        if t.telemetry == t.confirm {
            eyre::bail!("loadcell.topics.telemetry and loadcell.topics.confirm must differ");
        }
        if t.led == t.telemetry || t.led == t.confirm {
            eyre::bail!("loadcell.topics.led must not reuse an inbound topic");
        }

        // Load cell
        if !(self.loadcell.max_weight.is_finite() && self.loadcell.max_weight > 0.0) {
            eyre::bail!("loadcell.max_weight must be > 0");
        }
        if !(self.loadcell.overload_threshold.is_finite() && self.loadcell.overload_threshold > 0.0)
        {
            eyre::bail!("loadcell.overload_threshold must be > 0");
        }
        if self.loadcell.overload_threshold > self.loadcell.max_weight {
            eyre::bail!("loadcell.overload_threshold must be <= loadcell.max_weight");
        }

        // History
        if self.history.legacy_capacity == 0 {
            eyre::bail!("history.legacy_capacity must be >= 1");
        }
        if self.history.weight_capacity == 0 {
            eyre::bail!("history.weight_capacity must be >= 1");
        }
        if self.history.default_limit == 0 {
            eyre::bail!("history.default_limit must be >= 1");
        }

        // Lookup
        if self.lookup.timeout_ms == 0 {
            eyre::bail!("lookup.timeout_ms must be >= 1");
        }
        if self.lookup.timeout_ms > 5 * 60 * 1000 {
            eyre::bail!("lookup.timeout_ms is unreasonably large (>5min)");
        }
        if self.lookup.queue_depth == 0 {
            eyre::bail!("lookup.queue_depth must be >= 1");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
