#![no_main]
use libfuzzer_sys::fuzz_target;
use loadcell_core::{LegacyWeight, RouterCfg, TelemetryRouter};
use std::time::{Duration, UNIX_EPOCH};

fuzz_target!(|data: &[u8]| {
    let cfg = RouterCfg::default();
    let telemetry = cfg.telemetry_topic.clone();
    let confirm = cfg.confirm_topic.clone();
    let mut router = TelemetryRouter::new(cfg);
    let at = UNIX_EPOCH + Duration::from_millis(1_767_225_600_000);

    // Malformed bodies must be rejected without touching the histories.
    let before = router.weight_history().len();
    if router.route(&telemetry, data, at).is_err() {
        assert_eq!(router.weight_history().len(), before);
    }
    let _ = router.route(&confirm, data, at);
    let _ = router.route("plant/scale/raw", data, at);
    assert!(router.legacy_history().len() <= 2);

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = LegacyWeight::decode(text).weight();
    }
});
