use std::time::{Duration, UNIX_EPOCH};

use loadcell_core::config::RouterCfg;
use loadcell_core::router::{LegacyWeight, RoutedEvent, TelemetryRouter};
use loadcell_core::WeighError;
use rstest::{fixture, rstest};

const TELEMETRY: &str = "amanerve/loadcell/telemetry";
const CONFIRM: &str = "amanerve/button/confirm";
const LEGACY: &str = "plant/scale/raw";

#[fixture]
fn router() -> TelemetryRouter {
    TelemetryRouter::new(RouterCfg::default())
}

fn at(ms: u64) -> std::time::SystemTime {
    UNIX_EPOCH + Duration::from_millis(1_767_225_600_000 + ms)
}

#[rstest]
#[case::weight_field(r#"{"weight": 12.5, "value": 3}"#, Some(12.5))]
#[case::value_field(r#"{"value": 7}"#, Some(7.0))]
#[case::kg_field(r#"{"kg": "4.2kg"}"#, Some(4.2))]
#[case::zero_weight_wins_by_presence(r#"{"weight": 0, "value": 9}"#, Some(0.0))]
#[case::null_weight_skipped(r#"{"weight": null, "kg": 2}"#, Some(2.0))]
#[case::bare_number("42", Some(42.0))]
#[case::json_string(r#""8.75 kg""#, Some(8.75))]
#[case::raw_text_with_unit("12.5kg", Some(12.5))]
#[case::raw_text_garbage("abc", None)]
#[case::object_without_known_fields(r#"{"reading": 5}"#, None)]
#[case::boolean("true", None)]
fn legacy_decode_priority(#[case] raw: &str, #[case] expected: Option<f64>) {
    let w = LegacyWeight::decode(raw).weight();
    match expected {
        Some(e) => assert!((w - e).abs() < 1e-12, "{raw} -> {w}, expected {e}"),
        None => assert!(w.is_nan(), "{raw} -> {w}, expected NaN"),
    }
}

#[test]
fn legacy_decode_reports_the_source() {
    assert_eq!(
        LegacyWeight::decode(r#"{"value": 1, "kg": 2}"#),
        LegacyWeight::Field("value", serde_json::json!(1))
    );
    assert_eq!(
        LegacyWeight::decode("12kg"),
        LegacyWeight::RawText("12kg".into())
    );
}

#[rstest]
fn nan_legacy_weight_is_still_recorded(mut router: TelemetryRouter) {
    let ev = router.route(LEGACY, b"not a number", at(0)).unwrap();
    let RoutedEvent::Legacy(sample) = ev else {
        panic!("expected legacy event");
    };
    assert!(sample.weight.is_nan());
    assert_eq!(router.legacy_history().len(), 1);
    assert!(router.weight_history().is_empty());
}

#[rstest]
#[case::not_json(b"12.5".as_slice())]
#[case::not_object(b"[1,2]".as_slice())]
#[case::missing_weight(br#"{"stable":true}"#.as_slice())]
#[case::string_weight(br#"{"weight":"12"}"#.as_slice())]
#[case::invalid_utf8(b"\xff\xfe".as_slice())]
fn malformed_rich_telemetry_leaves_history_unchanged(
    mut router: TelemetryRouter,
    #[case] body: &[u8],
) {
    router.route(TELEMETRY, br#"{"weight": 1.0}"#, at(0)).unwrap();
    let err = router.route(TELEMETRY, body, at(1)).unwrap_err();
    assert!(matches!(err, WeighError::MalformedPayload { .. }));
    assert_eq!(router.weight_history().len(), 1);
    assert_eq!(router.legacy_history().len(), 1);
    assert_eq!(router.counters().malformed, 1);
    assert_eq!(router.counters().routed, 1);
}

#[rstest]
fn rich_telemetry_is_mirrored_into_legacy_history(mut router: TelemetryRouter) {
    let ev = router
        .route(
            TELEMETRY,
            br#"{"weight": 3.25, "stable": true, "unit": "kg"}"#,
            at(5),
        )
        .unwrap();
    let RoutedEvent::Telemetry { sample, mirrored } = ev else {
        panic!("expected telemetry event");
    };
    assert_eq!(sample.weight, 3.25);
    assert_eq!(sample.stable, Some(true));
    assert_eq!(sample.timestamp, "2026-01-01T00:00:00.005Z");
    assert_eq!(mirrored.weight, 3.25);
    assert_eq!(mirrored.timestamp, sample.timestamp);
    assert_eq!(router.latest_weight(), Some(&sample));
    assert_eq!(router.legacy_history().len(), 1);
}

#[rstest]
fn confirmations_are_not_buffered(mut router: TelemetryRouter) {
    let ev = router
        .route(CONFIRM, br#"{"weight": 2.0, "button": "A"}"#, at(0))
        .unwrap();
    let RoutedEvent::Confirmation(c) = ev else {
        panic!("expected confirmation");
    };
    assert_eq!(c.weight, 2.0);
    assert_eq!(c.extra["button"], "A");
    assert!(router.weight_history().is_empty());
    assert!(router.legacy_history().is_empty());

    let err = router.route(CONFIRM, b"pressed", at(1)).unwrap_err();
    assert!(matches!(err, WeighError::MalformedPayload { .. }));
    let err = router.route(CONFIRM, b"[1]", at(2)).unwrap_err();
    assert!(matches!(err, WeighError::MalformedPayload { .. }));
}

#[rstest]
#[case::no_weight(r#"{"pressed": true}"#, None)]
#[case::string_weight(r#"{"weight": "12.5"}"#, Some(12.5))]
#[case::null_weight(r#"{"weight": null}"#, None)]
fn confirmations_read_weight_leniently(
    mut router: TelemetryRouter,
    #[case] body: &str,
    #[case] expected: Option<f64>,
) {
    let ev = router.route(CONFIRM, body.as_bytes(), at(0)).unwrap();
    let RoutedEvent::Confirmation(c) = ev else {
        panic!("expected confirmation");
    };
    match expected {
        Some(e) => assert_eq!(c.weight, e),
        None => assert!(c.weight.is_nan()),
    }
    assert_eq!(router.counters().malformed, 0);
}

#[test]
fn capacities_come_from_config() {
    let mut router = TelemetryRouter::new(RouterCfg {
        legacy_capacity: 2,
        weight_capacity: 3,
        ..RouterCfg::default()
    });
    for i in 0..5 {
        let body = format!(r#"{{"weight": {i}}}"#);
        router.route(TELEMETRY, body.as_bytes(), at(i)).unwrap();
    }
    assert_eq!(router.weight_history().len(), 3);
    assert_eq!(router.legacy_history().len(), 2);
    assert_eq!(router.statistics().unwrap().min, 2.0);
}
