//! Inbound events consumed by the gateway and outbound fan-out events.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::WeighError;
use crate::lookup::{LookupTicket, MoApiResponse, MoDataConfirm, OrderRecord};
use crate::sample::{ConfirmationEvent, LegacySample, WeightSample};
use crate::workflow::{OrderSummary, Position};

/// Everything the gateway reacts to, in arrival order.
#[derive(Debug, Clone)]
pub enum Inbound {
    Transport(TransportMessage),
    Link(LinkEvent),
    Operator(OperatorAction),
    LookupCompleted {
        ticket: LookupTicket,
        result: Result<OrderRecord, WeighError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl TransportMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Broker session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LinkEvent {
    Connected,
    Closed,
    Offline,
    Reconnecting,
    Error { message: String },
}

impl LinkEvent {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkEvent::Connected)
    }
}

/// Actions sent by the operator UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OperatorAction {
    MoConfirmed {
        mo: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    PrintConfirm {
        #[serde(default)]
        mo: Option<String>,
        #[serde(default)]
        lot: Option<u32>,
        #[serde(default)]
        rm_index: Option<usize>,
        #[serde(default)]
        rm_name: Option<String>,
        weight: f64,
        #[serde(default)]
        target: Option<f64>,
        #[serde(default)]
        timestamp: Option<String>,
    },
    RequestHistory,
    ConfirmPlan,
    CancelPlan,
    CancelEntry,
    RequestReset,
    ConfirmReset,
    CancelReset,
    AcknowledgeCompletion,
}

impl OperatorAction {
    /// Position a print confirmation claims to be for, when it says so.
    pub fn claimed_position(lot: Option<u32>, rm_index: Option<usize>) -> Option<Position> {
        Some(Position {
            lot: lot?,
            rm_index: rm_index?,
        })
    }
}

/// Event published to every connected viewer.
#[derive(Debug, Clone)]
pub enum FanOutEvent {
    MqttStatus {
        connected: bool,
        error: Option<String>,
    },
    TelemetryData(LegacySample),
    WeightData(WeightSample),
    ConfirmData(ConfirmationEvent),
    HistoryData(Vec<LegacySample>),
    MoDataConfirm(MoDataConfirm),
    MoApiResponse(MoApiResponse),
    MoEntryRequested {
        weight: f64,
    },
    OverloadAlert {
        weight: f64,
        target: f64,
    },
    OverloadClear,
    RmAdvanced {
        mo: String,
        position: Position,
        rm_name: String,
        target: f64,
    },
    LotAdvanced {
        completed_lot: u32,
        next_lot: u32,
    },
    OrderComplete(OrderSummary),
    ResetConfirmRequired {
        mo: Option<String>,
    },
    WorkflowReset,
    WorkflowError(WeighError),
}

impl FanOutEvent {
    pub fn name(&self) -> &'static str {
        match self {
            FanOutEvent::MqttStatus { .. } => "mqtt-status",
            FanOutEvent::TelemetryData(_) => "telemetry-data",
            FanOutEvent::WeightData(_) => "weightData",
            FanOutEvent::ConfirmData(_) => "confirmData",
            FanOutEvent::HistoryData(_) => "history-data",
            FanOutEvent::MoDataConfirm(_) => "mo-data-confirm",
            FanOutEvent::MoApiResponse(_) => "mo-api-response",
            FanOutEvent::MoEntryRequested { .. } => "mo-entry-requested",
            FanOutEvent::OverloadAlert { .. } => "overload-alert",
            FanOutEvent::OverloadClear => "overload-clear",
            FanOutEvent::RmAdvanced { .. } => "rm-advanced",
            FanOutEvent::LotAdvanced { .. } => "lot-advanced",
            FanOutEvent::OrderComplete(_) => "order-complete",
            FanOutEvent::ResetConfirmRequired { .. } => "reset-confirm-required",
            FanOutEvent::WorkflowReset => "workflow-reset",
            FanOutEvent::WorkflowError(_) => "workflow-error",
        }
    }

    pub fn payload(&self) -> serde_json::Result<String> {
        match self {
            FanOutEvent::MqttStatus { connected, error } => {
                let mut v = json!({ "connected": connected });
                if let Some(e) = error {
                    v["error"] = json!(e);
                }
                serde_json::to_string(&v)
            }
            FanOutEvent::TelemetryData(s) => serde_json::to_string(s),
            FanOutEvent::WeightData(s) => serde_json::to_string(s),
            FanOutEvent::ConfirmData(c) => serde_json::to_string(c),
            FanOutEvent::HistoryData(h) => serde_json::to_string(h),
            FanOutEvent::MoDataConfirm(d) => serde_json::to_string(d),
            FanOutEvent::MoApiResponse(r) => serde_json::to_string(r),
            FanOutEvent::MoEntryRequested { weight } => {
                serde_json::to_string(&json!({ "weight": weight }))
            }
            FanOutEvent::OverloadAlert { weight, target } => {
                serde_json::to_string(&json!({ "weight": weight, "target": target }))
            }
            FanOutEvent::OverloadClear | FanOutEvent::WorkflowReset => Ok("{}".to_string()),
            FanOutEvent::RmAdvanced {
                mo,
                position,
                rm_name,
                target,
            } => serde_json::to_string(&json!({
                "mo": mo,
                "lot": position.lot,
                "rm_index": position.rm_index,
                "rm_name": rm_name,
                "target": target,
            })),
            FanOutEvent::LotAdvanced {
                completed_lot,
                next_lot,
            } => serde_json::to_string(&json!({
                "completed_lot": completed_lot,
                "next_lot": next_lot,
            })),
            FanOutEvent::OrderComplete(s) => serde_json::to_string(s),
            FanOutEvent::ResetConfirmRequired { mo } => {
                serde_json::to_string(&json!({ "mo": mo }))
            }
            FanOutEvent::WorkflowError(e) => serde_json::to_string(&json!({
                "kind": e.kind(),
                "message": e.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_actions_use_kebab_case_tags() {
        let a: OperatorAction =
            serde_json::from_str(r#"{"type":"mo-confirmed","mo":"MO-1","timestamp":"t"}"#)
                .unwrap();
        assert_eq!(
            a,
            OperatorAction::MoConfirmed {
                mo: "MO-1".into(),
                timestamp: Some("t".into())
            }
        );
        let a: OperatorAction = serde_json::from_str(r#"{"type":"confirm-reset"}"#).unwrap();
        assert_eq!(a, OperatorAction::ConfirmReset);
    }

    #[test]
    fn print_confirm_position_is_optional() {
        let a: OperatorAction =
            serde_json::from_str(r#"{"type":"print-confirm","weight":2.5}"#).unwrap();
        let OperatorAction::PrintConfirm { lot, rm_index, .. } = a else {
            panic!("wrong variant");
        };
        assert_eq!(OperatorAction::claimed_position(lot, rm_index), None);
    }

    #[test]
    fn mqtt_status_omits_missing_error() {
        let e = FanOutEvent::MqttStatus {
            connected: false,
            error: None,
        };
        assert_eq!(e.payload().unwrap(), r#"{"connected":false}"#);
    }
}
