//! External order lookup: response decoding and the background worker.
//!
//! The lookup call can take seconds. It runs on a dedicated thread that owns
//! the `OrderLookup` collaborator; results re-enter the gateway inbox tagged
//! with the [`LookupTicket`] issued by the workflow, so a result that arrives
//! after a reset or a newer submission is recognised and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use loadcell_traits::OrderLookup;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::LookupCfg;
use crate::error::WeighError;
use crate::events::Inbound;
use crate::transport_error::map_lookup_error;
use crate::workflow::OrderPlan;

/// Generation number of one submitted MO lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LookupTicket(pub u64);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FindOneResponse {
    pub data: OrderRecord,
}

/// `data` member of the order API response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct OrderRecord {
    #[serde(default)]
    pub t_mo_id: Option<Value>,
    #[serde(default)]
    pub nomor_mo: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub qty_plan: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lot: Option<f64>,
    #[serde(default)]
    pub produk_rm: Vec<RmRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RmRecord {
    pub item: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub qty: Option<f64>,
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("not a number: {s:?}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a number, got {other}"
        ))),
    }
}

/// Decode a raw `findOne` response body.
pub fn decode_order(body: &[u8]) -> Result<OrderRecord, WeighError> {
    serde_json::from_slice::<FindOneResponse>(body)
        .map(|r| r.data)
        .map_err(|e| WeighError::LookupFailed(format!("unexpected response: {e}")))
}

// ── Fan-out payloads ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MoDataConfirm {
    pub success: bool,
    pub data: MoData,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoData {
    pub nomor_mo: String,
    pub qty_plan: u32,
    pub lot: u32,
    pub produk_rm_items: Vec<String>,
    pub produk_rm_qty: Vec<f64>,
    pub target_weights: Vec<f64>,
    pub total_rm: usize,
}

impl From<&OrderPlan> for MoDataConfirm {
    fn from(plan: &OrderPlan) -> Self {
        Self {
            success: true,
            data: MoData {
                nomor_mo: plan.mo_identifier.clone(),
                qty_plan: plan.total_lots_planned,
                lot: plan.lot_start,
                produk_rm_items: plan.rm_items.iter().map(|r| r.name.clone()).collect(),
                produk_rm_qty: plan.rm_items.iter().map(|r| r.qty).collect(),
                target_weights: plan.target_weights.clone(),
                total_rm: plan.rm_items.len(),
            },
        }
    }
}

/// Raw outcome of the lookup call. `data` mirrors the response body.
#[derive(Debug, Clone, Serialize)]
pub struct MoApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MoApiResponse {
    pub fn ok(record: &OrderRecord) -> Self {
        Self {
            success: true,
            data: Some(serde_json::json!({ "data": record })),
            error: None,
        }
    }

    pub fn failed(error: &WeighError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }
    }
}

// ── Worker ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct LookupRequest {
    ticket: LookupTicket,
    nomor_mo: String,
}

/// Background thread serving order lookups. Dropping it signals shutdown
/// and joins the thread once the in-flight call returns.
pub struct LookupWorker {
    tx: xch::Sender<LookupRequest>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

const IDLE_POLL: Duration = Duration::from_millis(25);

impl LookupWorker {
    pub fn spawn<L: OrderLookup + Send + 'static>(
        mut lookup: L,
        cfg: LookupCfg,
        inbox: xch::Sender<Inbound>,
    ) -> Self {
        let (tx, rx) = xch::bounded::<LookupRequest>(cfg.queue_depth.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let timeout = cfg.timeout;

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("lookup worker received shutdown signal");
                    break;
                }
                let req = match rx.recv_timeout(IDLE_POLL) {
                    Ok(req) => req,
                    Err(xch::RecvTimeoutError::Timeout) => continue,
                    Err(xch::RecvTimeoutError::Disconnected) => break,
                };
                tracing::info!(ticket = req.ticket.0, nomor_mo = %req.nomor_mo, "looking up order");
                let result = lookup
                    .find_one(&req.nomor_mo, timeout)
                    .map_err(|e| map_lookup_error(e.as_ref()))
                    .and_then(|body| decode_order(&body));
                if let Err(e) = &result {
                    tracing::warn!(ticket = req.ticket.0, error = %e, "order lookup failed");
                }
                let done = Inbound::LookupCompleted {
                    ticket: req.ticket,
                    result,
                };
                if inbox.send(done).is_err() {
                    tracing::debug!("gateway inbox closed, lookup worker exiting");
                    break;
                }
            }
            tracing::trace!("lookup worker exiting cleanly");
        });

        Self {
            tx,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Queue a lookup. Refused when the queue is full or the worker has exited.
    pub fn submit(&self, ticket: LookupTicket, nomor_mo: &str) -> Result<(), WeighError> {
        let req = LookupRequest {
            ticket,
            nomor_mo: nomor_mo.to_string(),
        };
        self.tx.try_send(req).map_err(|e| match e {
            xch::TrySendError::Full(_) => WeighError::LookupFailed("lookup queue is full".into()),
            xch::TrySendError::Disconnected(_) => {
                WeighError::LookupFailed("lookup worker is not running".into())
            }
        })
    }
}

impl Drop for LookupWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("lookup worker joined"),
                Err(e) => tracing::warn!(?e, "lookup worker panicked during shutdown"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_numeric_strings_and_missing_lot() {
        let body = br#"{"data":{"t_mo_id":7,"nomor_mo":"MO-7","qty_plan":"2",
            "produk_rm":[{"item":"Sugar","qty":10},{"item":"Salt","qty":"5"}]}}"#;
        let order = decode_order(body).unwrap();
        assert_eq!(order.qty_plan, Some(2.0));
        assert_eq!(order.lot, None);
        assert_eq!(order.produk_rm[1].qty, Some(5.0));
    }

    #[test]
    fn malformed_body_is_lookup_failure() {
        assert!(matches!(
            decode_order(b"<html>502</html>"),
            Err(WeighError::LookupFailed(_))
        ));
        assert!(matches!(
            decode_order(br#"{"data":{"qty_plan":true}}"#),
            Err(WeighError::LookupFailed(_))
        ));
    }
}
