#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod logging;
mod replay;
mod scenario;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use loadcell_core::api;
use loadcell_core::mocks::SinkFanOut;
use serde_json::json;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{RouteError, exit_code_for_error, format_error_json, humanize};
use crate::replay::{Session, StdoutFanOut};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    logging::init(&cfg.logging, cli.json, &cli.log_level)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .wrap_err("install Ctrl-C handler")?;
    }

    match cli.cmd {
        Commands::Replay {
            scenario,
            orders,
            paced,
        } => {
            let steps = scenario::load(&scenario)?;
            tracing::info!(steps = steps.len(), scenario = %scenario.display(), "replaying");
            let mut session = Session::build(&cfg, StdoutFanOut, orders.as_deref(), paced)?;
            let summary = session.play(&steps, &shutdown);
            let status = session.gateway.status();
            if cli.json {
                println!("{}", json!({ "summary": summary, "status": status }));
            } else {
                eprintln!(
                    "Replayed {} steps ({} events); phase: {}",
                    summary.steps, summary.events, status.phase
                );
            }
            Ok(())
        }
        Commands::Query {
            route,
            method,
            body,
            scenario,
            orders,
        } => {
            let body = body
                .map(|b| serde_json::from_str::<serde_json::Value>(&b))
                .transpose()
                .wrap_err("--body is not valid JSON")?;
            let mut session = Session::build(&cfg, SinkFanOut, orders.as_deref(), false)?;
            if let Some(path) = scenario {
                let steps = scenario::load(&path)?;
                session.play(&steps, &shutdown);
            }
            let resp = api::route(&mut session.gateway, &method, &route, body.as_ref());
            println!("{}", resp.body);
            if resp.status >= 400 {
                let message = resp.body["message"].as_str().unwrap_or_default().to_string();
                return Err(RouteError {
                    status: resp.status,
                    message,
                }
                .into());
            }
            Ok(())
        }
        Commands::CheckConfig => {
            // Build once so gateway-level checks run too
            Session::build(&cfg, SinkFanOut, None, false)?;
            if cli.json {
                println!(
                    "{}",
                    json!({
                        "ok": true,
                        "broker": format!("{}:{}", cfg.mqtt.broker, cfg.mqtt.port),
                        "topics": {
                            "telemetry": cfg.loadcell.topics.telemetry,
                            "confirm": cfg.loadcell.topics.confirm,
                            "led": cfg.loadcell.topics.led,
                            "legacy": cfg.mqtt.topic,
                        },
                        "overload_threshold": cfg.loadcell.overload_threshold,
                        "alert_enabled": cfg.loadcell.alert_enabled,
                        "history_capacity": cfg.history.weight_capacity,
                    })
                );
            } else {
                println!("Config OK");
                println!("  broker: {}:{}", cfg.mqtt.broker, cfg.mqtt.port);
                println!(
                    "  topics: telemetry={} confirm={} led={} legacy={}",
                    cfg.loadcell.topics.telemetry,
                    cfg.loadcell.topics.confirm,
                    cfg.loadcell.topics.led,
                    cfg.mqtt.topic
                );
                println!(
                    "  overload threshold: {} (alerts {})",
                    cfg.loadcell.overload_threshold,
                    if cfg.loadcell.alert_enabled { "on" } else { "off" }
                );
            }
            Ok(())
        }
        Commands::Health => {
            let session = Session::build(&cfg, SinkFanOut, None, false)?;
            let status = session.gateway.status();
            if cli.json {
                println!("{}", json!({ "status": "ok", "phase": status.phase }));
            } else {
                println!("ok");
            }
            Ok(())
        }
    }
}

/// `--config` when given; otherwise defaults. Env overrides apply either way.
fn load_config(path: Option<&Path>) -> eyre::Result<loadcell_config::Config> {
    if let Some(p) = path {
        return loadcell_config::load_file(p);
    }
    let mut cfg = loadcell_config::Config::default();
    cfg.apply_env_overrides(|k| std::env::var(k).ok())?;
    cfg.validate()?;
    Ok(cfg)
}
