use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use loadcell_core::config::{GatewayCfg, LookupCfg};
use loadcell_core::events::{Inbound, OperatorAction};
use loadcell_core::lookup::{LookupTicket, LookupWorker};
use loadcell_core::runner::{self, RunOptions, StopReason};
use loadcell_core::{Gateway, LookupHandle, Phase, WeighError};
use loadcell_sim::util::wait_until_with_timeout;
use loadcell_sim::{FixtureLookup, RecordingFanOut, SimBroker};
use serde_json::json;

fn fixture(latency: Duration) -> FixtureLookup {
    let mut orders = HashMap::new();
    orders.insert(
        "MO-9".to_string(),
        json!({"data": {"nomor_mo": "MO-9", "qty_plan": 1,
            "produk_rm": [{"item": "Flour", "qty": 4}]}}),
    );
    FixtureLookup::new(orders).with_latency(latency)
}

fn gateway(lookup: FixtureLookup, fan: &RecordingFanOut) -> (Gateway, xch::Receiver<Inbound>) {
    let (tx, rx) = xch::unbounded();
    let worker = LookupWorker::spawn(lookup, LookupCfg::default(), tx);
    let gw = Gateway::builder()
        .config(GatewayCfg::default())
        .publisher(SimBroker::connected())
        .fanout(fan.clone())
        .lookup(LookupHandle::Worker(worker))
        .build()
        .unwrap();
    (gw, rx)
}

fn idle_run(gw: &mut Gateway, rx: &xch::Receiver<Inbound>) -> runner::RunSummary {
    let shutdown = AtomicBool::new(false);
    runner::run(
        gw,
        rx,
        &shutdown,
        RunOptions {
            poll: Duration::from_millis(10),
            idle_exit: Some(Duration::from_millis(400)),
        },
    )
}

#[test]
fn worker_result_reaches_the_workflow_through_the_inbox() {
    let fan = RecordingFanOut::new();
    let (mut gw, rx) = gateway(fixture(Duration::ZERO), &fan);

    gw.handle(Inbound::Operator(OperatorAction::MoConfirmed {
        mo: "MO-9".into(),
        timestamp: None,
    }));
    assert!(matches!(gw.phase(), Phase::AwaitingLookup { .. }));

    let summary = idle_run(&mut gw, &rx);
    assert_eq!(summary.stop, StopReason::Idle);
    assert_eq!(summary.events, 1);
    assert_eq!(gw.phase(), Phase::AwaitingDataConfirmation);
    assert_eq!(fan.payloads("mo-data-confirm")[0]["data"]["target_weights"], json!([4.0]));
}

#[test]
fn result_arriving_after_reset_is_discarded() {
    let fan = RecordingFanOut::new();
    let (mut gw, rx) = gateway(fixture(Duration::from_millis(150)), &fan);

    gw.handle(Inbound::Operator(OperatorAction::MoConfirmed {
        mo: "MO-9".into(),
        timestamp: None,
    }));
    gw.handle(Inbound::Operator(OperatorAction::RequestReset));
    gw.handle(Inbound::Operator(OperatorAction::ConfirmReset));
    assert_eq!(gw.phase(), Phase::Idle);

    let summary = idle_run(&mut gw, &rx);
    assert_eq!(summary.events, 1);
    assert_eq!(gw.phase(), Phase::Idle);
    assert!(fan.payloads("mo-data-confirm").is_empty());
    assert!(fan.payloads("mo-api-response").is_empty());
}

#[test]
fn drain_handles_only_what_is_queued() {
    let fan = RecordingFanOut::new();
    let (mut gw, rx) = gateway(fixture(Duration::ZERO), &fan);
    assert_eq!(runner::drain(&mut gw, &rx), 0);
}

#[test]
fn full_queue_refuses_submissions() {
    let (tx, _rx) = xch::unbounded();
    let cfg = LookupCfg {
        timeout: Duration::from_secs(2),
        queue_depth: 1,
    };
    let lookup = fixture(Duration::from_millis(400));
    let worker = LookupWorker::spawn(lookup.clone(), cfg, tx);

    worker.submit(LookupTicket(1), "MO-9").unwrap();
    // the first request must leave the queue before the second fits
    wait_until_with_timeout(
        || lookup.calls().len() == 1,
        Duration::from_secs(2),
        Duration::from_millis(5),
    )
    .unwrap();
    worker.submit(LookupTicket(2), "MO-9").unwrap();
    let err = worker.submit(LookupTicket(3), "MO-9").unwrap_err();
    assert_eq!(err, WeighError::LookupFailed("lookup queue is full".into()));
}

#[test]
fn timeout_is_reported_as_lookup_failure() {
    let (tx, rx) = xch::unbounded();
    let cfg = LookupCfg {
        timeout: Duration::from_millis(50),
        queue_depth: 1,
    };
    let worker = LookupWorker::spawn(fixture(Duration::from_secs(5)), cfg, tx);
    worker.submit(LookupTicket(7), "MO-9").unwrap();

    let done = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let Inbound::LookupCompleted { ticket, result } = done else {
        panic!("expected a lookup completion");
    };
    assert_eq!(ticket, LookupTicket(7));
    assert_eq!(
        result.unwrap_err(),
        WeighError::LookupFailed("request timed out".into())
    );
}

#[test]
fn drop_joins_an_idle_worker_promptly() {
    let (tx, _rx) = xch::unbounded();
    let worker = LookupWorker::spawn(fixture(Duration::ZERO), LookupCfg::default(), tx);
    let start = Instant::now();
    drop(worker);
    assert!(start.elapsed() < Duration::from_secs(1));
}
