//! Topic-based routing of inbound transport messages.
//!
//! Three kinds of message arrive on the pub/sub transport:
//!
//! - **Rich telemetry** on the telemetry topic: a JSON object with a numeric
//!   `weight`, optional `stable` flag and arbitrary extra fields.
//! - **Confirm-button presses** on the confirm topic: any JSON object. The
//!   `weight` member is read leniently and is NaN when absent or unreadable.
//! - **Legacy** payloads on any other topic: bare numbers, strings such as
//!   `"12.5kg"`, or JSON objects carrying the reading under `weight`, `value`
//!   or `kg`. See [`LegacyWeight`].
//!
//! The router owns both history buffers and is the only writer to them.

use std::time::SystemTime;

use serde_json::{Map, Value};

use crate::config::RouterCfg;
use crate::error::WeighError;
use crate::history::HistoryBuffer;
use crate::sample::{ConfirmationEvent, LegacySample, WeightSample, iso_timestamp};
use crate::stats::{self, Statistics};

/// Where a legacy reading was found, in priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyWeight {
    /// A `weight`, `value` or `kg` member of a JSON object.
    Field(&'static str, Value),
    /// Valid JSON without any of the known members; coerced as a whole.
    Whole(Value),
    /// Not JSON at all.
    RawText(String),
}

const LEGACY_FIELDS: [&str; 3] = ["weight", "value", "kg"];

impl LegacyWeight {
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(obj)) => {
                for name in LEGACY_FIELDS {
                    match obj.get(name) {
                        Some(Value::Null) | None => continue,
                        Some(v) => return LegacyWeight::Field(name, v.clone()),
                    }
                }
                LegacyWeight::Whole(Value::Object(obj))
            }
            Ok(other) => LegacyWeight::Whole(other),
            Err(_) => LegacyWeight::RawText(raw.to_string()),
        }
    }

    /// Numeric reading; NaN when nothing numeric can be recovered.
    pub fn weight(&self) -> f64 {
        match self {
            LegacyWeight::Field(_, v) | LegacyWeight::Whole(v) => coerce_value(v),
            LegacyWeight::RawText(s) => parse_float_prefix(s),
        }
    }
}

fn coerce_value(v: &Value) -> f64 {
    match v {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_float_prefix(s),
        _ => f64::NAN,
    }
}

/// Parse the longest leading decimal literal of `s` (after leading
/// whitespace), ignoring any trailing text. `"12.5kg"` is 12.5, `"kg"` is NaN.
pub fn parse_float_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    let bytes = t.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    if t[i..].starts_with("Infinity") {
        return if t.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        digits += j - frac_start;
        if digits > 0 {
            i = j;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    t[..i].parse().unwrap_or(f64::NAN)
}

/// Outcome of routing one message.
#[derive(Debug, Clone)]
pub enum RoutedEvent {
    /// Rich sample plus its mirror in the legacy history.
    Telemetry {
        sample: WeightSample,
        mirrored: LegacySample,
    },
    Confirmation(ConfirmationEvent),
    Legacy(LegacySample),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RouterCounters {
    pub routed: u64,
    pub malformed: u64,
}

#[derive(Debug)]
pub struct TelemetryRouter {
    cfg: RouterCfg,
    legacy: HistoryBuffer<LegacySample>,
    weights: HistoryBuffer<WeightSample>,
    counters: RouterCounters,
}

impl TelemetryRouter {
    pub fn new(cfg: RouterCfg) -> Self {
        Self {
            legacy: HistoryBuffer::with_capacity(cfg.legacy_capacity),
            weights: HistoryBuffer::with_capacity(cfg.weight_capacity),
            cfg,
            counters: RouterCounters::default(),
        }
    }

    pub fn route(
        &mut self,
        topic: &str,
        body: &[u8],
        received_at: SystemTime,
    ) -> Result<RoutedEvent, WeighError> {
        let result = self.route_inner(topic, body, iso_timestamp(received_at));
        match &result {
            Ok(_) => self.counters.routed += 1,
            Err(e) => {
                self.counters.malformed += 1;
                tracing::warn!(topic, error = %e, "discarding transport message");
            }
        }
        result
    }

    fn route_inner(
        &mut self,
        topic: &str,
        body: &[u8],
        timestamp: String,
    ) -> Result<RoutedEvent, WeighError> {
        if topic == self.cfg.telemetry_topic {
            let (obj, weight) = decode_weighted_object(topic, body)?;
            let sample = WeightSample::from_payload(obj, weight, timestamp.clone());
            let mirrored = LegacySample { weight, timestamp };
            self.weights.append(sample.clone());
            self.legacy.append(mirrored.clone());
            Ok(RoutedEvent::Telemetry { sample, mirrored })
        } else if topic == self.cfg.confirm_topic {
            let obj = decode_object(topic, body)?;
            let weight = obj.get("weight").map_or(f64::NAN, coerce_value);
            Ok(RoutedEvent::Confirmation(ConfirmationEvent::from_payload(
                obj, weight, timestamp,
            )))
        } else {
            let raw = String::from_utf8_lossy(body);
            let weight = LegacyWeight::decode(&raw).weight();
            let sample = LegacySample { weight, timestamp };
            self.legacy.append(sample.clone());
            Ok(RoutedEvent::Legacy(sample))
        }
    }

    pub fn legacy_history(&self) -> &HistoryBuffer<LegacySample> {
        &self.legacy
    }

    pub fn weight_history(&self) -> &HistoryBuffer<WeightSample> {
        &self.weights
    }

    pub fn latest_weight(&self) -> Option<&WeightSample> {
        self.weights.latest()
    }

    pub fn statistics(&self) -> Option<Statistics> {
        stats::compute(&self.weights)
    }

    pub fn counters(&self) -> RouterCounters {
        self.counters
    }
}

fn malformed(topic: &str, reason: String) -> WeighError {
    WeighError::MalformedPayload {
        topic: topic.to_string(),
        reason,
    }
}

fn decode_object(topic: &str, body: &[u8]) -> Result<Map<String, Value>, WeighError> {
    let value: Value = serde_json::from_slice(body).map_err(|e| malformed(topic, e.to_string()))?;
    match value {
        Value::Object(obj) => Ok(obj),
        _ => Err(malformed(topic, "expected a JSON object".into())),
    }
}

fn decode_weighted_object(
    topic: &str,
    body: &[u8],
) -> Result<(Map<String, Value>, f64), WeighError> {
    let obj = decode_object(topic, body)?;
    let weight = obj
        .get("weight")
        .and_then(Value::as_f64)
        .ok_or_else(|| malformed(topic, "missing numeric `weight`".into()))?;
    Ok((obj, weight))
}
