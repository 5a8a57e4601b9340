//! Replay sessions: a gateway wired to simulated collaborators and driven
//! step by step from a scenario.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel as xch;
use eyre::WrapErr;
use loadcell_core::config::GatewayCfg;
use loadcell_core::persistence::JsonlStore;
use loadcell_core::{Gateway, runner};
use loadcell_sim::{FixtureLookup, SimBroker};
use loadcell_traits::{BoxError, Clock, FanOut};
use serde::Serialize;

use crate::scenario::Step;

/// 2026-01-01T00:00:00Z, so replays print the same timestamps every run.
const REPLAY_EPOCH_SECS: u64 = 1_767_225_600;

/// Clock advanced by `delay` steps. When paced it also sleeps for real.
#[derive(Debug, Clone)]
pub struct ReplayClock {
    origin: Instant,
    wall_origin: SystemTime,
    offset: Arc<Mutex<Duration>>,
    paced: bool,
}

impl ReplayClock {
    pub fn new(paced: bool) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin: UNIX_EPOCH + Duration::from_secs(REPLAY_EPOCH_SECS),
            offset: Arc::default(),
            paced,
        }
    }

    fn offset(&self) -> Duration {
        self.offset.lock().map(|o| *o).unwrap_or_default()
    }
}

impl Clock for ReplayClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }

    fn sleep(&self, d: Duration) {
        if self.paced && !d.is_zero() {
            std::thread::sleep(d);
        }
        if let Ok(mut o) = self.offset.lock() {
            *o += d;
        }
    }

    fn wall(&self) -> SystemTime {
        self.wall_origin + self.offset()
    }
}

/// Writes each fan-out event to stdout as `{"event": ..., "payload": ...}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutFanOut;

impl FanOut for StdoutFanOut {
    fn emit(&mut self, event: &str, payload: &str) -> Result<(), BoxError> {
        let mut out = std::io::stdout().lock();
        writeln!(out, r#"{{"event":"{event}","payload":{payload}}}"#)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReplaySummary {
    pub steps: usize,
    pub events: u64,
    pub interrupted: bool,
}

pub struct Session {
    pub gateway: Gateway,
    broker: SimBroker,
    clock: ReplayClock,
}

impl Session {
    /// Gateway with a disconnected simulated broker, the configured record
    /// file, and fixture-backed order lookups when `orders` is given.
    pub fn build(
        cfg: &loadcell_config::Config,
        fanout: impl FanOut + Send + 'static,
        orders: Option<&Path>,
        paced: bool,
    ) -> eyre::Result<Self> {
        let gw_cfg = GatewayCfg::from(cfg);
        let lookup_timeout = gw_cfg.lookup.timeout;
        let broker = SimBroker::new();
        let clock = ReplayClock::new(paced);

        let mut builder = Gateway::builder()
            .config(gw_cfg)
            .publisher(broker.clone())
            .fanout(fanout)
            .clock(clock.clone());
        if let Some(path) = cfg.persistence.file.as_deref() {
            let store =
                JsonlStore::open(path).wrap_err_with(|| format!("open record file {path:?}"))?;
            builder = builder.store(store);
        }
        if let Some(path) = orders {
            let fixtures = FixtureLookup::from_json_file(path)
                .wrap_err_with(|| format!("load order fixtures {}", path.display()))?;
            builder = builder.inline_lookup(fixtures, lookup_timeout);
        }
        let gateway = builder.build()?;
        Ok(Self {
            gateway,
            broker,
            clock,
        })
    }

    /// Feed `steps` through the inbox, handling each before the next starts.
    /// Stops early when `shutdown` is raised.
    pub fn play(&mut self, steps: &[Step], shutdown: &AtomicBool) -> ReplaySummary {
        let (tx, rx) = xch::unbounded();
        let mut summary = ReplaySummary {
            steps: 0,
            events: 0,
            interrupted: false,
        };
        for step in steps {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!(done = summary.steps, "replay interrupted");
                summary.interrupted = true;
                break;
            }
            match step {
                Step::Link { event } => self.broker.set_connected(event.is_connected()),
                Step::Delay { ms } => self.clock.sleep(Duration::from_millis(*ms)),
                Step::Viewer => self.gateway.greet_viewer(),
                Step::Transport { .. } | Step::Operator { .. } => {}
            }
            if let Some(inbound) = step.inbound()
                && tx.send(inbound).is_err()
            {
                break;
            }
            summary.events += runner::drain(&mut self.gateway, &rx);
            summary.steps += 1;
        }
        tracing::debug!(steps = summary.steps, events = summary.events, "replay finished");
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpaced_clock_only_moves_on_sleep() {
        let clock = ReplayClock::new(false);
        let t0 = clock.wall();
        assert_eq!(t0, UNIX_EPOCH + Duration::from_secs(REPLAY_EPOCH_SECS));
        let start = Instant::now();
        clock.sleep(Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(
            clock.wall().duration_since(t0).unwrap(),
            Duration::from_secs(30)
        );
    }
}
