//! Human-readable error descriptions, exit codes and structured JSON errors.

use loadcell_core::error::{BuildError, WeighError};
use serde_json::json;

use crate::scenario::ScenarioError;

/// An HTTP facade route answered with an error status.
#[derive(Debug, thiserror::Error)]
#[error("route answered {status}: {message}")]
pub struct RouteError {
    pub status: u16,
    pub message: String,
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPublisher => {
                "What happened: No transport publisher was provided to the gateway.\nLikely causes: The broker session was not wired into the builder.\nHow to fix: Pass a publisher via Gateway::builder().publisher(...).".to_string()
            }
            BuildError::MissingFanOut => {
                "What happened: No fan-out sink was provided to the gateway.\nLikely causes: The viewer channel was not wired into the builder.\nHow to fix: Pass a sink via Gateway::builder().fanout(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid gateway configuration ({msg}).\nLikely causes: Conflicting topics or zero-sized histories in the TOML.\nHow to fix: Edit the config file, then rerun `loadcell check-config`."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScenarioError>() {
        return match se {
            ScenarioError::Read { path, source } => format!(
                "What happened: Could not read scenario {path} ({source}).\nHow to fix: Check the path and file permissions."
            ),
            ScenarioError::Line { line, reason } => format!(
                "What happened: Scenario line {line} is not a valid step ({reason}).\nLikely causes: Unknown `kind` or a missing field.\nHow to fix: Each line must be one of transport, link, operator, delay or viewer."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RouteError>() {
        return format!(
            "What happened: The route answered {} ({}).\nHow to fix: Check the route and method, or replay a scenario first so data exists.",
            re.status, re.message
        );
    }

    if let Some(we) = err.downcast_ref::<WeighError>() {
        return format!(
            "What happened: {we}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") {
        return format!(
            "What happened: The config file could not be read.\nHow to fix: Check the --config path. Original: {msg}"
        );
    }
    if lower.starts_with("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this gateway.\nLikely causes: A typo in a key or a value of the wrong type.\nHow to fix: Compare with etc/loadcell.toml. Original: {msg}"
        );
    }
    if lower.contains("environment override") {
        return format!(
            "What happened: An environment override could not be parsed.\nHow to fix: Fix or unset the variable. Original: {msg}"
        );
    }
    if lower.contains(" must ") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nHow to fix: Edit the TOML config or environment overrides and try again."
        );
    }
    if lower.contains("order fixtures") {
        return format!(
            "What happened: The order fixture file could not be loaded.\nHow to fix: --orders expects a JSON object keyed by MO number. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn is_config_error(err: &eyre::Report) -> bool {
    if matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ) {
        return true;
    }
    let lower = err.to_string().to_ascii_lowercase();
    lower.starts_with("read config")
        || lower.starts_with("parse config")
        || lower.contains("environment override")
        || lower.contains(" must ")
}

/// Stable exit codes: 2 config, 3 scenario, 4 route error status, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ScenarioError>().is_some() {
        return 3;
    }
    if err.downcast_ref::<RouteError>().is_some() {
        return 4;
    }
    if is_config_error(err) {
        return 2;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<ScenarioError>().is_some() {
        "Scenario"
    } else if err.downcast_ref::<RouteError>().is_some() {
        "Route"
    } else if is_config_error(err) {
        "Config"
    } else {
        "Error"
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let msg = humanize(err);
    if let Some(re) = err.downcast_ref::<RouteError>() {
        return json!({ "reason": "Route", "details": { "status": re.status }, "message": msg })
            .to_string();
    }
    if let Some(ScenarioError::Line { line, .. }) = err.downcast_ref::<ScenarioError>() {
        return json!({ "reason": "Scenario", "details": { "line": line }, "message": msg })
            .to_string();
    }
    json!({ "reason": reason_name(err), "message": msg }).to_string()
}
