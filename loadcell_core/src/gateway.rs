//! The gateway: session context that owns every component and performs the
//! side effects the pure parts ask for.
//!
//! One `Gateway` serves one broker session and any number of viewers. All
//! mutation goes through [`Gateway::handle`], which the runner calls once per
//! inbound event, so the workflow and histories never see concurrent access.

use std::fmt;
use std::time::{Duration, Instant};

use loadcell_traits::{Clock, FanOut, MonotonicClock, OrderLookup, Publisher};
use serde::Serialize;

use crate::config::GatewayCfg;
use crate::error::{BuildError, Result, WeighError};
use crate::events::{FanOutEvent, Inbound, LinkEvent, OperatorAction, TransportMessage};
use crate::indicator::{IndicatorCommand, IndicatorDispatcher};
use crate::lookup::{LookupTicket, LookupWorker, MoApiResponse, MoDataConfirm, OrderRecord};
use crate::overload::{OverloadDetector, OverloadSignal, ThresholdGuard};
use crate::persistence::{BestEffort, NullStore, RecordStore};
use crate::router::{RoutedEvent, RouterCounters, TelemetryRouter};
use crate::sample::{LegacySample, WeightSample, iso_timestamp};
use crate::stats::Statistics;
use crate::transport_error::{map_lookup_error, map_transport_error};
use crate::workflow::{Advance, MoWorkflow, MoWorkflowState, Phase, Position, ResetDecision};

/// How order lookups are carried out.
pub enum LookupHandle {
    /// Background thread; completions arrive later through the inbox.
    Worker(LookupWorker),
    /// Called in place; the completion is handled before `handle` returns.
    Inline {
        lookup: Box<dyn OrderLookup + Send>,
        timeout: Duration,
    },
}

impl fmt::Debug for LookupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupHandle::Worker(_) => f.write_str("Worker"),
            LookupHandle::Inline { timeout, .. } => {
                f.debug_struct("Inline").field("timeout", timeout).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Point-in-time view for status queries.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub mqtt_connected: bool,
    pub latest_weight: Option<WeightSample>,
    pub uptime: f64,
    pub phase: &'static str,
    pub workflow: MoWorkflowState,
    pub router: RouterCounters,
    pub persistence_failures: u64,
}

pub struct Gateway {
    cfg: GatewayCfg,
    router: TelemetryRouter,
    detector: OverloadDetector,
    guard: ThresholdGuard,
    indicator: IndicatorDispatcher,
    workflow: MoWorkflow,
    fanout: Box<dyn FanOut + Send>,
    store: BestEffort,
    lookup: Option<LookupHandle>,
    clock: Box<dyn Clock + Send>,
    link: LinkStatus,
    order_id: Option<u64>,
    started: Instant,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("phase", &self.workflow.phase())
            .field("link", &self.link)
            .field("router", &self.router.counters())
            .field("lookup", &self.lookup)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    /// Process one inbound event.
    pub fn handle(&mut self, event: Inbound) {
        match event {
            Inbound::Transport(msg) => self.on_transport(msg),
            Inbound::Link(link) => self.on_link(link),
            Inbound::Operator(action) => self.on_operator(action),
            Inbound::LookupCompleted { ticket, result } => self.on_lookup_completed(ticket, result),
        }
    }

    /// Initial state for a newly connected viewer.
    pub fn greet_viewer(&mut self) {
        self.emit(FanOutEvent::MqttStatus {
            connected: self.link.connected,
            error: None,
        });
        self.emit(FanOutEvent::HistoryData(self.router.legacy_history().list(None)));
    }

    // ── Transport ────────────────────────────────────────────────────────────

    fn on_transport(&mut self, msg: TransportMessage) {
        let received_at = self.clock.wall();
        let Ok(routed) = self.router.route(&msg.topic, &msg.payload, received_at) else {
            return;
        };
        match routed {
            RoutedEvent::Telemetry { sample, mirrored } => {
                if self.guard.check(sample.weight) {
                    tracing::warn!(
                        weight = sample.weight,
                        threshold = self.guard.threshold(),
                        "overload threshold reached"
                    );
                    self.indicate(IndicatorCommand::BlinkRed);
                }
                let weight = sample.weight;
                self.emit(FanOutEvent::WeightData(sample));
                self.emit(FanOutEvent::TelemetryData(mirrored));
                self.observe(weight);
            }
            RoutedEvent::Confirmation(confirm) => {
                tracing::info!(weight = confirm.weight, "confirm button pressed");
                self.indicate(IndicatorCommand::HighGreen);
                self.emit(FanOutEvent::ConfirmData(confirm));
            }
            RoutedEvent::Legacy(sample) => {
                let weight = sample.weight;
                self.emit(FanOutEvent::TelemetryData(sample));
                self.observe(weight);
            }
        }
    }

    /// Live weight for the entry prompt and the per-target overload check.
    fn observe(&mut self, weight: f64) {
        if weight.is_nan() {
            return;
        }
        if self.workflow.observe_weight(weight) {
            self.emit(FanOutEvent::MoEntryRequested { weight });
        }
        let target = self.workflow.current_target().unwrap_or(0.0);
        match self.detector.check(weight, target) {
            Some(OverloadSignal::Overload { weight, target }) => {
                tracing::warn!(weight, target, "weight above target");
                self.emit(FanOutEvent::OverloadAlert { weight, target });
            }
            Some(OverloadSignal::Clear) => self.emit(FanOutEvent::OverloadClear),
            None => {}
        }
    }

    // ── Link ─────────────────────────────────────────────────────────────────

    fn on_link(&mut self, event: LinkEvent) {
        let error = match &event {
            LinkEvent::Error { message } => Some(message.clone()),
            _ => None,
        };
        match &event {
            LinkEvent::Connected => tracing::info!("broker session established"),
            LinkEvent::Reconnecting => tracing::info!("reconnecting to broker"),
            other => tracing::warn!(?other, "broker session down"),
        }
        self.link = LinkStatus {
            connected: event.is_connected(),
            last_error: error.clone().or_else(|| self.link.last_error.take()),
        };
        self.emit(FanOutEvent::MqttStatus {
            connected: self.link.connected,
            error,
        });
    }

    // ── Operator ─────────────────────────────────────────────────────────────

    fn on_operator(&mut self, action: OperatorAction) {
        let result = match action {
            OperatorAction::MoConfirmed { mo, .. } => self.submit_mo(&mo),
            OperatorAction::PrintConfirm {
                lot,
                rm_index,
                weight,
                ..
            } => self.confirm_rm(weight, OperatorAction::claimed_position(lot, rm_index)),
            OperatorAction::RequestHistory => {
                self.emit(FanOutEvent::HistoryData(self.router.legacy_history().list(None)));
                Ok(())
            }
            OperatorAction::ConfirmPlan => self.confirm_plan(),
            OperatorAction::CancelPlan => self.workflow.cancel_plan().map(|()| self.after_reset()),
            OperatorAction::CancelEntry => self.workflow.cancel_entry(),
            OperatorAction::RequestReset => {
                match self.workflow.request_reset() {
                    ResetDecision::Applied => self.after_reset(),
                    ResetDecision::NeedsConfirmation => {
                        let mo = self.active_mo();
                        self.emit(FanOutEvent::ResetConfirmRequired { mo });
                    }
                }
                Ok(())
            }
            OperatorAction::ConfirmReset => self.workflow.confirm_reset().map(|()| self.after_reset()),
            OperatorAction::CancelReset => {
                self.workflow.abort_reset();
                Ok(())
            }
            OperatorAction::AcknowledgeCompletion => {
                self.workflow.acknowledge().map(|()| self.after_reset())
            }
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, phase = self.workflow.phase().name(), "operator action rejected");
            self.emit(FanOutEvent::WorkflowError(e));
        }
    }

    fn active_mo(&self) -> Option<String> {
        self.workflow
            .state()
            .mo_identifier
            .clone()
            .or_else(|| self.workflow.pending_plan().map(|p| p.mo_identifier.clone()))
    }

    fn submit_mo(&mut self, mo: &str) -> std::result::Result<(), WeighError> {
        let ticket = self.workflow.submit(mo)?;
        let mo = mo.trim();
        tracing::info!(ticket = ticket.0, mo, "MO submitted");
        match self.lookup.as_mut() {
            Some(LookupHandle::Worker(worker)) => {
                if let Err(e) = worker.submit(ticket, mo) {
                    self.on_lookup_completed(ticket, Err(e));
                }
            }
            Some(LookupHandle::Inline { lookup, timeout }) => {
                let result = lookup
                    .find_one(mo, *timeout)
                    .map_err(|e| map_lookup_error(e.as_ref()))
                    .and_then(|body| crate::lookup::decode_order(&body));
                self.on_lookup_completed(ticket, result);
            }
            None => self.on_lookup_completed(
                ticket,
                Err(WeighError::LookupFailed("no order lookup configured".into())),
            ),
        }
        Ok(())
    }

    fn confirm_plan(&mut self) -> std::result::Result<(), WeighError> {
        let plan = self.workflow.pending_plan().cloned();
        let position = self.workflow.confirm_plan()?;
        if let Some(plan) = plan {
            let created_at = iso_timestamp(self.clock.wall());
            self.order_id = self.store.record_plan(&plan, &created_at);
            tracing::info!(mo = %plan.mo_identifier, lots = plan.total_lots_planned, rms = plan.rm_items.len(), "order plan confirmed");
        }
        self.announce_position(position);
        Ok(())
    }

    fn confirm_rm(
        &mut self,
        weight: f64,
        claimed: Option<Position>,
    ) -> std::result::Result<(), WeighError> {
        let advance = self.workflow.confirm_rm(weight, claimed)?;
        let record = advance.record();
        tracing::info!(
            mo = %record.mo_identifier,
            lot = record.lot,
            rm = %record.rm_name,
            weight,
            target = record.target,
            "weighing confirmed"
        );
        let timestamp = iso_timestamp(self.clock.wall());
        self.store.record_weight(self.order_id, record, &timestamp);
        self.indicate(IndicatorCommand::HighGreen);
        self.clear_overload();
        match advance {
            Advance::NextRm { next, .. } => self.announce_position(next),
            Advance::LotAdvanced {
                completed_lot,
                next_lot,
                ..
            } => {
                tracing::info!(completed_lot, next_lot, "lot complete");
                self.emit(FanOutEvent::LotAdvanced {
                    completed_lot,
                    next_lot,
                });
                self.announce_position(Position {
                    lot: next_lot,
                    rm_index: 0,
                });
            }
            Advance::Completed { summary, .. } => {
                tracing::info!(mo = %summary.mo_identifier, items = summary.total_items_weighed, "order complete");
                self.emit(FanOutEvent::OrderComplete(summary));
            }
        }
        Ok(())
    }

    fn announce_position(&mut self, position: Position) {
        let state = self.workflow.state();
        let event = FanOutEvent::RmAdvanced {
            mo: state.mo_identifier.clone().unwrap_or_default(),
            position,
            rm_name: state
                .rm_items
                .get(position.rm_index)
                .map(|r| r.name.clone())
                .unwrap_or_default(),
            target: state
                .target_weights
                .get(position.rm_index)
                .copied()
                .unwrap_or(0.0),
        };
        self.emit(event);
    }

    fn clear_overload(&mut self) {
        if self.detector.is_armed() {
            self.detector.reset();
            self.emit(FanOutEvent::OverloadClear);
        }
    }

    fn after_reset(&mut self) {
        self.order_id = None;
        self.clear_overload();
        tracing::info!("workflow reset");
        self.emit(FanOutEvent::WorkflowReset);
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    fn on_lookup_completed(
        &mut self,
        ticket: LookupTicket,
        result: std::result::Result<OrderRecord, WeighError>,
    ) {
        match result {
            Ok(record) => match self.workflow.lookup_succeeded(ticket, &record) {
                Ok(plan) => {
                    let confirm = MoDataConfirm::from(plan);
                    self.emit(FanOutEvent::MoApiResponse(MoApiResponse::ok(&record)));
                    self.emit(FanOutEvent::MoDataConfirm(confirm));
                }
                Err(e @ WeighError::StaleLookup { .. }) => {
                    tracing::debug!(error = %e, "discarding lookup result");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "order cannot be weighed");
                    self.emit(FanOutEvent::MoApiResponse(MoApiResponse::ok(&record)));
                    self.emit(FanOutEvent::WorkflowError(e));
                }
            },
            Err(err) => match self.workflow.lookup_failed(ticket) {
                Ok(()) => self.emit(FanOutEvent::MoApiResponse(MoApiResponse::failed(&err))),
                Err(stale) => tracing::debug!(error = %stale, "discarding lookup failure"),
            },
        }
    }

    // ── Outputs ──────────────────────────────────────────────────────────────

    fn indicate(&mut self, command: IndicatorCommand) {
        if let Err(e) = self.indicator.dispatch(command) {
            tracing::warn!(%command, error = %e, "indicator command not sent");
        }
    }

    fn emit(&mut self, event: FanOutEvent) {
        let name = event.name();
        let payload = match event.payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(event = name, error = %e, "fan-out payload not serializable");
                return;
            }
        };
        if let Err(e) = self.fanout.emit(name, &payload) {
            let mapped = map_transport_error(e.as_ref());
            tracing::warn!(event = name, error = %mapped, "fan-out failed");
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    /// Validate and publish a raw indicator command.
    pub fn send_indicator(&mut self, command: &str) -> bool {
        self.indicator.send(command)
    }

    pub fn is_connected(&self) -> bool {
        self.link.connected
    }

    pub fn link(&self) -> &LinkStatus {
        &self.link
    }

    pub fn latest_weight(&self) -> Option<&WeightSample> {
        self.router.latest_weight()
    }

    pub fn weight_history(&self, limit: usize) -> Vec<WeightSample> {
        self.router.weight_history().list(Some(limit))
    }

    pub fn legacy_history(&self) -> Vec<LegacySample> {
        self.router.legacy_history().list(None)
    }

    pub fn statistics(&self) -> Option<Statistics> {
        self.router.statistics()
    }

    pub fn workflow(&self) -> &MoWorkflow {
        &self.workflow
    }

    pub fn phase(&self) -> Phase {
        self.workflow.phase()
    }

    pub fn cfg(&self) -> &GatewayCfg {
        &self.cfg
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            mqtt_connected: self.link.connected,
            latest_weight: self.router.latest_weight().cloned(),
            uptime: self
                .clock
                .now()
                .saturating_duration_since(self.started)
                .as_secs_f64(),
            phase: self.workflow.phase().name(),
            workflow: self.workflow.state().clone(),
            router: self.router.counters(),
            persistence_failures: self.store.failures(),
        }
    }
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Builder for `Gateway`. Publisher and fan-out are required.
#[derive(Default)]
pub struct GatewayBuilder {
    cfg: Option<GatewayCfg>,
    publisher: Option<Box<dyn Publisher + Send>>,
    fanout: Option<Box<dyn FanOut + Send>>,
    store: Option<Box<dyn RecordStore + Send>>,
    lookup: Option<LookupHandle>,
    clock: Option<Box<dyn Clock + Send>>,
}

impl GatewayBuilder {
    pub fn config(mut self, cfg: GatewayCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    pub fn publisher(mut self, p: impl Publisher + Send + 'static) -> Self {
        self.publisher = Some(Box::new(p));
        self
    }

    pub fn fanout(mut self, f: impl FanOut + Send + 'static) -> Self {
        self.fanout = Some(Box::new(f));
        self
    }

    pub fn store(mut self, s: impl RecordStore + Send + 'static) -> Self {
        self.store = Some(Box::new(s));
        self
    }

    pub fn lookup(mut self, handle: LookupHandle) -> Self {
        self.lookup = Some(handle);
        self
    }

    /// Call the lookup in place instead of on a worker thread.
    pub fn inline_lookup(self, l: impl OrderLookup + Send + 'static, timeout: Duration) -> Self {
        self.lookup(LookupHandle::Inline {
            lookup: Box::new(l),
            timeout,
        })
    }

    pub fn clock(mut self, c: impl Clock + Send + 'static) -> Self {
        self.clock = Some(Box::new(c));
        self
    }

    pub fn build(self) -> Result<Gateway> {
        let cfg = self.cfg.unwrap_or_default();
        validate(&cfg)?;
        let publisher = self
            .publisher
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPublisher))?;
        let fanout = self
            .fanout
            .ok_or_else(|| eyre::Report::new(BuildError::MissingFanOut))?;
        let clock = self.clock.unwrap_or_else(|| Box::new(MonotonicClock::new()));
        let started = clock.now();
        Ok(Gateway {
            router: TelemetryRouter::new(cfg.router.clone()),
            detector: OverloadDetector::new(),
            guard: ThresholdGuard::new(cfg.threshold.clone()),
            indicator: IndicatorDispatcher::new(publisher, cfg.indicator.clone()),
            workflow: MoWorkflow::new(),
            fanout,
            store: BestEffort::new(self.store.unwrap_or_else(|| Box::new(NullStore::default()))),
            lookup: self.lookup,
            clock,
            link: LinkStatus::default(),
            order_id: None,
            started,
            cfg,
        })
    }
}

fn validate(cfg: &GatewayCfg) -> Result<()> {
    let invalid = |msg: &'static str| Err(eyre::Report::new(BuildError::InvalidConfig(msg)));
    if cfg.router.telemetry_topic == cfg.router.confirm_topic {
        return invalid("telemetry and confirm topics must differ");
    }
    if cfg.router.legacy_capacity == 0 || cfg.router.weight_capacity == 0 {
        return invalid("history capacities must be >= 1");
    }
    if !(cfg.threshold.overload_threshold.is_finite() && cfg.threshold.overload_threshold > 0.0) {
        return invalid("overload_threshold must be > 0");
    }
    if cfg.history_default_limit == 0 {
        return invalid("history default limit must be >= 1");
    }
    Ok(())
}
