//! Simulated collaborators for the weighing gateway.
//!
//! These stand in for the MQTT broker session, the web-socket fan-out and the
//! external order API when running the CLI without a plant network, and in
//! tests. Each type is cheap to clone; clones share state so a test can keep a
//! handle while the gateway owns another.
pub mod error;
pub mod util;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use loadcell_traits::{BoxError, FanOut, OrderLookup, Publisher, Qos};

use crate::error::SimError;

/// One message handed to the simulated broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
}

impl Published {
    pub fn payload_str(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or("")
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    connected: bool,
    refuse_acks: bool,
    published: Vec<Published>,
}

/// In-memory broker session. Starts disconnected, like a real client before
/// its first CONNACK.
#[derive(Debug, Clone, Default)]
pub struct SimBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl SimBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        let b = Self::new();
        b.set_connected(true);
        b
    }

    pub fn set_connected(&self, on: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.connected = on;
        }
    }

    /// Make every subsequent publish report a failed acknowledgement.
    pub fn refuse_acks(&self, refuse: bool) {
        if let Ok(mut s) = self.state.lock() {
            s.refuse_acks = refuse;
        }
    }

    pub fn published(&self) -> Vec<Published> {
        self.state
            .lock()
            .map(|s| s.published.clone())
            .unwrap_or_default()
    }

    /// Payloads published to `topic`, in order.
    pub fn payloads_on(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload_str().to_string())
            .collect()
    }
}

impl Publisher for SimBroker {
    fn is_connected(&self) -> bool {
        self.state.lock().map(|s| s.connected).unwrap_or(false)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), BoxError> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| SimError::Fixture("broker state poisoned".into()))?;
        if !s.connected {
            return Err(Box::new(SimError::NotConnected));
        }
        s.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        });
        tracing::debug!(topic, qos = qos.level(), bytes = payload.len(), "sim publish");
        if s.refuse_acks {
            return Err(Box::new(SimError::AckRefused));
        }
        Ok(())
    }
}

/// Fan-out sink that records every event for later inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingFanOut {
    events: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingFanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, String)> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Names of emitted events, in order.
    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|(n, _)| n).collect()
    }

    /// Parsed payloads of every event called `name`.
    pub fn payloads(&self, name: &str) -> Vec<serde_json::Value> {
        self.events()
            .into_iter()
            .filter(|(n, _)| n == name)
            .filter_map(|(_, p)| serde_json::from_str(&p).ok())
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() {
            e.clear();
        }
    }
}

impl FanOut for RecordingFanOut {
    fn emit(&mut self, event: &str, payload: &str) -> Result<(), BoxError> {
        let mut e = self
            .events
            .lock()
            .map_err(|_| SimError::Fixture("fan-out state poisoned".into()))?;
        e.push((event.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Order API backed by canned response bodies keyed by MO number.
#[derive(Debug, Clone, Default)]
pub struct FixtureLookup {
    orders: Arc<HashMap<String, serde_json::Value>>,
    latency: Duration,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FixtureLookup {
    pub fn new(orders: HashMap<String, serde_json::Value>) -> Self {
        Self {
            orders: Arc::new(orders),
            latency: Duration::ZERO,
            calls: Arc::default(),
        }
    }

    /// Load fixtures from a JSON object `{ "<nomor_mo>": <response body>, ... }`.
    pub fn from_json_file(path: &Path) -> error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> error::Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| SimError::Fixture(e.to_string()))?;
        let serde_json::Value::Object(map) = value else {
            return Err(SimError::Fixture(
                "order fixtures must be a JSON object keyed by MO number".into(),
            ));
        };
        Ok(Self::new(map.into_iter().collect()))
    }

    /// Simulated round-trip latency for every lookup.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// MO numbers requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl OrderLookup for FixtureLookup {
    fn find_one(&mut self, nomor_mo: &str, timeout: Duration) -> Result<Vec<u8>, BoxError> {
        if let Ok(mut c) = self.calls.lock() {
            c.push(nomor_mo.to_string());
        }
        if !self.latency.is_zero() {
            if self.latency > timeout {
                std::thread::sleep(timeout);
                return Err(Box::new(SimError::Timeout));
            }
            std::thread::sleep(self.latency);
        }
        match self.orders.get(nomor_mo) {
            Some(body) => Ok(serde_json::to_vec(body)?),
            None => Err(Box::new(SimError::OrderNotFound(nomor_mo.to_string()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_rejects_publish_while_disconnected() {
        let mut broker = SimBroker::new();
        assert!(!broker.is_connected());
        let err = broker
            .publish("t", b"x", Qos::AtLeastOnce)
            .expect_err("disconnected");
        assert!(err.to_string().contains("not connected"));
        assert!(broker.published().is_empty());
    }

    #[test]
    fn broker_records_even_when_ack_is_refused() {
        let mut broker = SimBroker::connected();
        broker.refuse_acks(true);
        assert!(broker.publish("t", b"HIGH_GREEN", Qos::AtLeastOnce).is_err());
        assert_eq!(broker.payloads_on("t"), vec!["HIGH_GREEN".to_string()]);
    }

    #[test]
    fn fixture_lookup_serves_known_orders() {
        let mut lookup =
            FixtureLookup::from_json_str(r#"{"MO-1": {"data": {"nomor_mo": "MO-1"}}}"#).unwrap();
        let body = lookup.find_one("MO-1", Duration::from_secs(1)).unwrap();
        assert!(String::from_utf8(body).unwrap().contains("MO-1"));
        let err = lookup
            .find_one("MO-2", Duration::from_secs(1))
            .expect_err("unknown order");
        assert!(err.to_string().contains("MO-2"));
        assert_eq!(lookup.calls(), vec!["MO-1".to_string(), "MO-2".to_string()]);
    }
}
