#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core of the load-cell weighing gateway (transport-agnostic).
//!
//! All I/O goes through the `loadcell_traits` collaborators (`Publisher`,
//! `FanOut`, `OrderLookup`, `Clock`) and the `persistence::RecordStore` trait.
//!
//! ## Architecture
//!
//! - **Routing**: topic-based decoding of telemetry, confirm-button and legacy
//!   payloads into bounded histories (`router`, `history`, `stats`)
//! - **Overload**: per-target edge detector and fixed safety threshold (`overload`)
//! - **Indicator**: validated LED commands over the transport (`indicator`)
//! - **Workflow**: MO/RM/lot state machine (`workflow`) fed by order lookups
//!   running on a worker thread (`lookup`)
//! - **Gateway**: session context performing side effects (`gateway`), driven
//!   one event at a time by `runner`; `api` answers HTTP facade queries

pub mod api;
pub mod config;
pub mod conversions;
pub mod error;
pub mod events;
pub mod gateway;
pub mod history;
pub mod indicator;
pub mod lookup;
pub mod mocks;
pub mod overload;
pub mod persistence;
pub mod router;
pub mod runner;
pub mod sample;
pub mod stats;
pub mod transport_error;
pub mod workflow;

pub use config::{GatewayCfg, IndicatorCfg, LookupCfg, RouterCfg, ThresholdCfg};
pub use error::{BuildError, WeighError};
pub use events::{FanOutEvent, Inbound, LinkEvent, OperatorAction, TransportMessage};
pub use gateway::{Gateway, GatewayBuilder, LookupHandle};
pub use history::HistoryBuffer;
pub use indicator::{IndicatorCommand, IndicatorDispatcher};
pub use overload::{OverloadDetector, OverloadSignal, ThresholdGuard};
pub use router::{LegacyWeight, RoutedEvent, TelemetryRouter};
pub use sample::{ConfirmationEvent, LegacySample, WeightSample};
pub use stats::Statistics;
pub use workflow::{Advance, MoWorkflow, MoWorkflowState, OrderPlan, Phase, Position};
