#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are both fine; panics are not.
    if let Ok(mut cfg) = loadcell_config::load_toml(data) {
        let _ = cfg.apply_env_overrides(|_| None);
        if cfg.validate().is_ok() {
            // Anything that validates must convert into runtime config.
            let _ = loadcell_core::GatewayCfg::from(&cfg);
        }
    }
});
