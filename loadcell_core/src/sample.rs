//! Recorded telemetry types.

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// ISO-8601 UTC timestamp with millisecond precision (`2026-01-01T00:00:00.000Z`).
pub fn iso_timestamp(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Rich telemetry sample. Fields other than `weight`/`stable` are carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightSample {
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub timestamp: String,
}

impl WeightSample {
    pub fn new(weight: f64, stable: Option<bool>, timestamp: impl Into<String>) -> Self {
        Self {
            weight,
            stable,
            extra: Map::new(),
            timestamp: timestamp.into(),
        }
    }

    /// Build from a decoded payload object. The caller has already checked
    /// that `weight` is numeric; any `timestamp` in the payload is replaced by
    /// the receipt time.
    pub(crate) fn from_payload(mut obj: Map<String, Value>, weight: f64, timestamp: String) -> Self {
        obj.remove("weight");
        obj.remove("timestamp");
        let stable = match obj.get("stable") {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        };
        if stable.is_some() {
            obj.remove("stable");
        }
        Self {
            weight,
            stable,
            extra: obj,
            timestamp,
        }
    }
}

/// Entry of the legacy history. `weight` may be NaN; it serializes as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct LegacySample {
    pub weight: f64,
    pub timestamp: String,
}

/// Hardware confirm-button press. `weight` is NaN when the press carried none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationEvent {
    pub weight: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub timestamp: String,
}

impl ConfirmationEvent {
    pub(crate) fn from_payload(mut obj: Map<String, Value>, weight: f64, timestamp: String) -> Self {
        obj.remove("weight");
        obj.remove("timestamp");
        Self {
            weight,
            extra: obj,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn timestamps_use_millis_and_z() {
        let t = UNIX_EPOCH + Duration::from_millis(1_767_225_600_123);
        assert_eq!(iso_timestamp(t), "2026-01-01T00:00:00.123Z");
    }

    #[test]
    fn nan_legacy_weight_serializes_as_null() {
        let s = LegacySample {
            weight: f64::NAN,
            timestamp: "t".into(),
        };
        assert_eq!(
            serde_json::to_string(&s).unwrap(),
            r#"{"weight":null,"timestamp":"t"}"#
        );
    }

    #[test]
    fn extra_fields_survive() {
        let obj: Map<String, Value> =
            serde_json::from_str(r#"{"weight":1.5,"stable":true,"unit":"kg","timestamp":"x"}"#)
                .unwrap();
        let s = WeightSample::from_payload(obj, 1.5, "now".into());
        assert_eq!(s.stable, Some(true));
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["unit"], "kg");
        assert_eq!(v["timestamp"], "now");
    }
}
