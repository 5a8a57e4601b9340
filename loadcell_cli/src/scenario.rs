//! Recorded scenarios: one JSON step per line.
//!
//! ```text
//! {"kind":"link","event":{"state":"connected"}}
//! {"kind":"transport","topic":"amanerve/loadcell/telemetry","payload":{"weight":1.5}}
//! {"kind":"transport","topic":"plant/scale/raw","payload":"12.5kg"}
//! {"kind":"delay","ms":250}
//! {"kind":"operator","action":{"type":"mo-confirmed","mo":"MO-1"}}
//! {"kind":"viewer"}
//! ```
//!
//! A string `payload` is sent as raw text; anything else is sent as its JSON
//! encoding. Blank lines and lines starting with `#` are skipped.

use std::path::Path;

use loadcell_core::events::{Inbound, LinkEvent, OperatorAction, TransportMessage};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("read scenario {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("scenario line {line}: {reason}")]
    Line { line: usize, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Transport { topic: String, payload: Value },
    Link { event: LinkEvent },
    Operator { action: OperatorAction },
    Delay { ms: u64 },
    /// A viewer connects and receives the initial snapshot.
    Viewer,
}

impl Step {
    /// The inbound event this step feeds the gateway, if any.
    pub fn inbound(&self) -> Option<Inbound> {
        match self {
            Step::Transport { topic, payload } => {
                let bytes = match payload {
                    Value::String(s) => s.clone().into_bytes(),
                    other => other.to_string().into_bytes(),
                };
                Some(Inbound::Transport(TransportMessage::new(topic.clone(), bytes)))
            }
            Step::Link { event } => Some(Inbound::Link(event.clone())),
            Step::Operator { action } => Some(Inbound::Operator(action.clone())),
            Step::Delay { .. } | Step::Viewer => None,
        }
    }
}

pub fn parse(text: &str) -> Result<Vec<Step>, ScenarioError> {
    let mut steps = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = serde_json::from_str::<Step>(line).map_err(|e| ScenarioError::Line {
            line: idx + 1,
            reason: e.to_string(),
        })?;
        steps.push(step);
    }
    Ok(steps)
}

pub fn load(path: &Path) -> Result<Vec<Step>, ScenarioError> {
    let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse(&text)
}
