//! MO/lot weighing workflow.
//!
//! The workflow is a pure state machine: every operation validates the
//! current [`Phase`], mutates [`MoWorkflowState`] and returns what happened.
//! It never publishes, persists or talks to the lookup service itself; the
//! gateway turns the returned values into side effects.
//!
//! ```text
//! Idle ──weight>0──▶ AwaitingMoEntry ──submit──▶ AwaitingLookup
//!   ▲                      ▲                        │ ok        │ err / degenerate
//!   │                      └────────────────────────┼───────────┘
//!   │                                               ▼
//!   │◀──cancel_plan── AwaitingDataConfirmation ◀────┘
//!   │                        │ confirm_plan
//!   │                        ▼
//!   │                    Weighing ──confirm_rm──▶ (next RM | next lot)
//!   │                        │ last RM of last lot
//!   └──acknowledge── AllLotsComplete
//! ```

use serde::Serialize;

use crate::error::WeighError;
use crate::lookup::{LookupTicket, OrderRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum Phase {
    #[default]
    Idle,
    AwaitingMoEntry,
    AwaitingLookup { ticket: LookupTicket },
    AwaitingDataConfirmation,
    Weighing,
    AllLotsComplete,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingMoEntry => "awaiting_mo_entry",
            Phase::AwaitingLookup { .. } => "awaiting_lookup",
            Phase::AwaitingDataConfirmation => "awaiting_data_confirmation",
            Phase::Weighing => "weighing",
            Phase::AllLotsComplete => "all_lots_complete",
        }
    }

    /// An order is in flight and a reset would discard operator work.
    pub fn has_active_order(self) -> bool {
        matches!(
            self,
            Phase::AwaitingLookup { .. } | Phase::AwaitingDataConfirmation | Phase::Weighing
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RmItem {
    pub name: String,
    pub qty: f64,
}

/// Order data awaiting operator confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPlan {
    pub mo_identifier: String,
    pub total_lots_planned: u32,
    pub lot_start: u32,
    pub rm_items: Vec<RmItem>,
    pub target_weights: Vec<f64>,
}

impl OrderPlan {
    /// Derive per-RM targets (`qty / total_lots_planned`) from a lookup
    /// result. Rejects anything that would yield a non-finite target or an
    /// empty weighing sequence.
    pub fn from_record(record: &OrderRecord, submitted: &str) -> Result<Self, WeighError> {
        let degenerate = |msg: String| WeighError::DegenerateTarget(msg);

        let qty_plan = record
            .qty_plan
            .ok_or_else(|| degenerate("qty_plan is missing".into()))?;
        if !qty_plan.is_finite() || qty_plan < 1.0 || qty_plan.fract() != 0.0 {
            return Err(degenerate(format!(
                "qty_plan must be a whole number >= 1, got {qty_plan}"
            )));
        }
        if qty_plan > f64::from(u32::MAX) {
            return Err(degenerate(format!("qty_plan {qty_plan} is out of range")));
        }
        let total_lots_planned = qty_plan as u32;

        let lot = record.lot.unwrap_or(0.0);
        if !lot.is_finite() || lot < 0.0 || lot.fract() != 0.0 {
            return Err(degenerate(format!(
                "lot must be a whole number >= 0, got {lot}"
            )));
        }
        if lot >= qty_plan {
            return Err(degenerate(format!(
                "starting lot {lot} leaves nothing to weigh of {total_lots_planned} planned"
            )));
        }
        let lot_start = lot as u32;

        if record.produk_rm.is_empty() {
            return Err(degenerate("order has no raw materials".into()));
        }
        let mut rm_items = Vec::with_capacity(record.produk_rm.len());
        let mut target_weights = Vec::with_capacity(record.produk_rm.len());
        for rm in &record.produk_rm {
            let qty = match rm.qty {
                Some(q) if q.is_finite() => q,
                _ => {
                    return Err(degenerate(format!(
                        "raw material {:?} has no finite qty",
                        rm.item
                    )));
                }
            };
            target_weights.push(qty / qty_plan);
            rm_items.push(RmItem {
                name: rm.item.clone(),
                qty,
            });
        }

        let mo_identifier = match record.nomor_mo.trim() {
            "" => submitted.to_string(),
            s => s.to_string(),
        };
        Ok(Self {
            mo_identifier,
            total_lots_planned,
            lot_start,
            rm_items,
            target_weights,
        })
    }
}

/// Committed workflow data. Empty whenever no order is being weighed.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MoWorkflowState {
    pub mo_identifier: Option<String>,
    pub rm_items: Vec<RmItem>,
    pub target_weights: Vec<f64>,
    pub total_lots_planned: u32,
    pub current_lot_index: u32,
    pub current_rm_index: usize,
}

impl MoWorkflowState {
    pub fn is_empty(&self) -> bool {
        self.mo_identifier.is_none()
    }

    fn current_target(&self) -> Option<f64> {
        self.target_weights.get(self.current_rm_index).copied()
    }
}

/// Position of the next weighing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub lot: u32,
    pub rm_index: usize,
}

/// One confirmed weighing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeighRecord {
    pub mo_identifier: String,
    pub lot: u32,
    pub rm_index: usize,
    pub rm_name: String,
    pub target: f64,
    pub actual_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub mo_identifier: String,
    pub total_lots_planned: u32,
    pub rm_count: usize,
    pub total_items_weighed: u64,
}

/// Result of a confirmed weighing.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Next RM within the same lot.
    NextRm { record: WeighRecord, next: Position },
    /// Lot finished, more lots remain.
    LotAdvanced {
        record: WeighRecord,
        completed_lot: u32,
        next_lot: u32,
    },
    /// Last RM of the last lot.
    Completed {
        record: WeighRecord,
        summary: OrderSummary,
    },
}

impl Advance {
    pub fn record(&self) -> &WeighRecord {
        match self {
            Advance::NextRm { record, .. }
            | Advance::LotAdvanced { record, .. }
            | Advance::Completed { record, .. } => record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetDecision {
    Applied,
    NeedsConfirmation,
}

#[derive(Debug, Default)]
pub struct MoWorkflow {
    phase: Phase,
    state: MoWorkflowState,
    pending_plan: Option<OrderPlan>,
    submitted: Option<String>,
    last_ticket: u64,
    reset_pending: bool,
    /// Set when the entry prompt was raised; cleared once the scale reads <= 0.
    prompt_latched: bool,
}

impl MoWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &MoWorkflowState {
        &self.state
    }

    pub fn pending_plan(&self) -> Option<&OrderPlan> {
        self.pending_plan.as_ref()
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// Target of the RM currently being weighed.
    pub fn current_target(&self) -> Option<f64> {
        match self.phase {
            Phase::Weighing => self.state.current_target(),
            _ => None,
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self.phase {
            Phase::Weighing => Some(Position {
                lot: self.state.current_lot_index,
                rm_index: self.state.current_rm_index,
            }),
            _ => None,
        }
    }

    /// Feed a live weight. Returns true when this sample should prompt the
    /// operator for an MO number.
    pub fn observe_weight(&mut self, weight: f64) -> bool {
        if weight <= 0.0 {
            self.prompt_latched = false;
            return false;
        }
        // NaN falls through both comparisons: no prompt, latch untouched
        if weight > 0.0 && self.phase == Phase::Idle && !self.prompt_latched {
            self.prompt_latched = true;
            self.enter(Phase::AwaitingMoEntry);
            return true;
        }
        false
    }

    /// Operator dismissed the entry prompt.
    pub fn cancel_entry(&mut self) -> Result<(), WeighError> {
        self.require(self.phase == Phase::AwaitingMoEntry, "cancel_entry")?;
        self.enter(Phase::Idle);
        Ok(())
    }

    /// Accept an MO number and issue a ticket for its lookup. A newer
    /// submission supersedes an outstanding lookup.
    pub fn submit(&mut self, mo_identifier: &str) -> Result<LookupTicket, WeighError> {
        self.require(
            matches!(
                self.phase,
                Phase::Idle | Phase::AwaitingMoEntry | Phase::AwaitingLookup { .. }
            ),
            "submit",
        )?;
        let mo = mo_identifier.trim();
        if mo.is_empty() {
            return Err(WeighError::InvalidInput(
                "MO number must not be empty".into(),
            ));
        }
        self.last_ticket += 1;
        let ticket = LookupTicket(self.last_ticket);
        self.submitted = Some(mo.to_string());
        self.enter(Phase::AwaitingLookup { ticket });
        Ok(ticket)
    }

    fn check_ticket(&self, ticket: LookupTicket) -> Result<(), WeighError> {
        match self.phase {
            Phase::AwaitingLookup { ticket: current } if current == ticket => Ok(()),
            Phase::AwaitingLookup { ticket: current } => Err(WeighError::StaleLookup {
                ticket: ticket.0,
                current: Some(current.0),
            }),
            _ => Err(WeighError::StaleLookup {
                ticket: ticket.0,
                current: None,
            }),
        }
    }

    pub fn lookup_succeeded(
        &mut self,
        ticket: LookupTicket,
        record: &OrderRecord,
    ) -> Result<&OrderPlan, WeighError> {
        self.check_ticket(ticket)?;
        let submitted = self.submitted.take().unwrap_or_default();
        match OrderPlan::from_record(record, &submitted) {
            Ok(plan) => {
                self.enter(Phase::AwaitingDataConfirmation);
                Ok(self.pending_plan.insert(plan))
            }
            Err(e) => {
                self.enter(Phase::AwaitingMoEntry);
                Err(e)
            }
        }
    }

    /// Return to MO entry after a failed lookup.
    pub fn lookup_failed(&mut self, ticket: LookupTicket) -> Result<(), WeighError> {
        self.check_ticket(ticket)?;
        self.submitted = None;
        self.enter(Phase::AwaitingMoEntry);
        Ok(())
    }

    /// Commit the pending plan and start weighing its first RM.
    pub fn confirm_plan(&mut self) -> Result<Position, WeighError> {
        let plan = match (self.phase, self.pending_plan.take()) {
            (Phase::AwaitingDataConfirmation, Some(plan)) => plan,
            (_, pending) => {
                self.pending_plan = pending;
                return Err(self.state_error("confirm_plan"));
            }
        };
        self.state = MoWorkflowState {
            mo_identifier: Some(plan.mo_identifier),
            rm_items: plan.rm_items,
            target_weights: plan.target_weights,
            total_lots_planned: plan.total_lots_planned,
            current_lot_index: plan.lot_start,
            current_rm_index: 0,
        };
        self.enter(Phase::Weighing);
        Ok(Position {
            lot: plan.lot_start,
            rm_index: 0,
        })
    }

    pub fn cancel_plan(&mut self) -> Result<(), WeighError> {
        self.require(self.phase == Phase::AwaitingDataConfirmation, "cancel_plan")?;
        self.reset();
        Ok(())
    }

    /// Record a confirmed weighing of the current RM and advance. When
    /// `expected` is given it must match the current position.
    pub fn confirm_rm(
        &mut self,
        actual_weight: f64,
        expected: Option<Position>,
    ) -> Result<Advance, WeighError> {
        let Some(here) = self.position() else {
            return Err(self.state_error("confirm_rm"));
        };
        if let Some(exp) = expected.filter(|exp| *exp != here) {
            return Err(WeighError::State(format!(
                "confirmation for lot {} rm {} but current is lot {} rm {}",
                exp.lot, exp.rm_index, here.lot, here.rm_index
            )));
        }

        let s = &mut self.state;
        let record = WeighRecord {
            mo_identifier: s.mo_identifier.clone().unwrap_or_default(),
            lot: here.lot,
            rm_index: here.rm_index,
            rm_name: s.rm_items[here.rm_index].name.clone(),
            target: s.target_weights[here.rm_index],
            actual_weight,
        };

        s.current_rm_index += 1;
        if s.current_rm_index < s.rm_items.len() {
            return Ok(Advance::NextRm {
                record,
                next: Position {
                    lot: here.lot,
                    rm_index: s.current_rm_index,
                },
            });
        }

        s.current_rm_index = 0;
        s.current_lot_index += 1;
        if s.current_lot_index < s.total_lots_planned {
            return Ok(Advance::LotAdvanced {
                record,
                completed_lot: here.lot,
                next_lot: s.current_lot_index,
            });
        }

        let summary = OrderSummary {
            mo_identifier: record.mo_identifier.clone(),
            total_lots_planned: s.total_lots_planned,
            rm_count: s.rm_items.len(),
            total_items_weighed: u64::from(s.total_lots_planned) * s.rm_items.len() as u64,
        };
        self.enter(Phase::AllLotsComplete);
        Ok(Advance::Completed { record, summary })
    }

    /// Operator closed the completion summary.
    pub fn acknowledge(&mut self) -> Result<(), WeighError> {
        self.require(self.phase == Phase::AllLotsComplete, "acknowledge")?;
        self.reset();
        Ok(())
    }

    /// Reset on operator request. Needs a second confirmation while an order
    /// is in flight.
    pub fn request_reset(&mut self) -> ResetDecision {
        if self.phase.has_active_order() {
            self.reset_pending = true;
            ResetDecision::NeedsConfirmation
        } else {
            self.reset();
            ResetDecision::Applied
        }
    }

    pub fn confirm_reset(&mut self) -> Result<(), WeighError> {
        if !self.reset_pending {
            return Err(WeighError::State("no reset awaiting confirmation".into()));
        }
        self.reset();
        Ok(())
    }

    /// Keep the current order; returns whether a reset was pending.
    pub fn abort_reset(&mut self) -> bool {
        std::mem::take(&mut self.reset_pending)
    }

    /// Unconditional teardown to `Idle`. Outstanding lookup tickets become
    /// stale.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.state = MoWorkflowState::default();
        self.pending_plan = None;
        self.submitted = None;
        self.reset_pending = false;
    }

    /// A pending reset belongs to the phase it was requested in.
    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.reset_pending = false;
    }

    fn require(&self, ok: bool, op: &str) -> Result<(), WeighError> {
        if ok { Ok(()) } else { Err(self.state_error(op)) }
    }

    fn state_error(&self, op: &str) -> WeighError {
        WeighError::State(format!("{op} not allowed in {}", self.phase.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::RmRecord;

    fn record(qty_plan: Option<f64>, lot: Option<f64>, rms: &[(&str, f64)]) -> OrderRecord {
        OrderRecord {
            t_mo_id: None,
            nomor_mo: "MO-1".into(),
            qty_plan,
            lot,
            produk_rm: rms
                .iter()
                .map(|(n, q)| RmRecord {
                    item: (*n).into(),
                    qty: Some(*q),
                })
                .collect(),
        }
    }

    #[test]
    fn observe_weight_prompts_once_per_loading() {
        let mut wf = MoWorkflow::new();
        assert!(wf.observe_weight(1.0));
        assert_eq!(wf.phase(), Phase::AwaitingMoEntry);
        wf.cancel_entry().unwrap();
        assert!(!wf.observe_weight(2.0));
        assert_eq!(wf.phase(), Phase::Idle);
        assert!(!wf.observe_weight(0.0));
        assert!(wf.observe_weight(0.5));
    }

    #[test]
    fn nan_weight_neither_prompts_nor_clears() {
        let mut wf = MoWorkflow::new();
        assert!(!wf.observe_weight(f64::NAN));
        assert_eq!(wf.phase(), Phase::Idle);
    }

    #[test]
    fn plan_uses_response_mo_number_and_lot_offset() {
        let plan =
            OrderPlan::from_record(&record(Some(4.0), Some(1.0), &[("A", 8.0)]), "mo-1").unwrap();
        assert_eq!(plan.mo_identifier, "MO-1");
        assert_eq!(plan.lot_start, 1);
        assert_eq!(plan.target_weights, vec![2.0]);
    }

    #[test]
    fn confirm_plan_outside_confirmation_keeps_state() {
        let mut wf = MoWorkflow::new();
        assert!(matches!(wf.confirm_plan(), Err(WeighError::State(_))));
        assert_eq!(wf.phase(), Phase::Idle);
    }

    #[test]
    fn request_reset_without_order_applies() {
        let mut wf = MoWorkflow::new();
        wf.observe_weight(3.0);
        assert_eq!(wf.request_reset(), ResetDecision::Applied);
        assert_eq!(wf.phase(), Phase::Idle);
        assert!(wf.confirm_reset().is_err());
    }
}
