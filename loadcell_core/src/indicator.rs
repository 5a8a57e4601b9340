//! Indicator (LED) commands published to the hardware.

use std::fmt;
use std::str::FromStr;

use loadcell_traits::{Publisher, Qos};

use crate::config::IndicatorCfg;
use crate::error::WeighError;
use crate::transport_error::map_transport_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorCommand {
    HighGreen,
    HighRed,
    BlinkGreen,
    BlinkRed,
}

impl IndicatorCommand {
    pub const ALL: [IndicatorCommand; 4] = [
        IndicatorCommand::HighGreen,
        IndicatorCommand::HighRed,
        IndicatorCommand::BlinkGreen,
        IndicatorCommand::BlinkRed,
    ];

    /// Wire form published to the indicator topic.
    pub fn as_str(self) -> &'static str {
        match self {
            IndicatorCommand::HighGreen => "HIGH_GREEN",
            IndicatorCommand::HighRed => "HIGH_RED",
            IndicatorCommand::BlinkGreen => "BLINK_GREEN",
            IndicatorCommand::BlinkRed => "BLINK_RED",
        }
    }
}

impl fmt::Display for IndicatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndicatorCommand {
    type Err = WeighError;

    /// Exact, case-sensitive match on the wire form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IndicatorCommand::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| WeighError::InvalidCommand(s.to_string()))
    }
}

pub struct IndicatorDispatcher {
    publisher: Box<dyn Publisher + Send>,
    cfg: IndicatorCfg,
}

impl fmt::Debug for IndicatorDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndicatorDispatcher")
            .field("topic", &self.cfg.topic)
            .field("connected", &self.publisher.is_connected())
            .finish()
    }
}

impl IndicatorDispatcher {
    pub fn new(publisher: Box<dyn Publisher + Send>, cfg: IndicatorCfg) -> Self {
        Self { publisher, cfg }
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    /// Validate and publish a raw command string. Returns whether the command
    /// was handed to the transport.
    pub fn send(&mut self, command: &str) -> bool {
        let result = command
            .parse::<IndicatorCommand>()
            .and_then(|c| self.dispatch(c));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(command, error = %e, "indicator command not sent");
                false
            }
        }
    }

    /// Publish with at-least-once delivery. A failed acknowledgement is
    /// logged and still counts as sent.
    pub fn dispatch(&mut self, command: IndicatorCommand) -> Result<(), WeighError> {
        if !self.publisher.is_connected() {
            return Err(WeighError::NotConnected);
        }
        let topic = self.cfg.topic.as_str();
        match self
            .publisher
            .publish(topic, command.as_str().as_bytes(), Qos::AtLeastOnce)
        {
            Ok(()) => tracing::info!(topic, %command, "indicator command published"),
            Err(e) => {
                let mapped = map_transport_error(e.as_ref());
                tracing::warn!(topic, %command, error = %mapped, "indicator publish not acknowledged");
            }
        }
        Ok(())
    }
}
