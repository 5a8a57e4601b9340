//! Serialized event loop driving a [`Gateway`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;

use crate::events::Inbound;
use crate::gateway::Gateway;

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The shutdown flag was raised.
    Shutdown,
    /// Every sender was dropped.
    Disconnected,
    /// No event arrived within the idle limit.
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub events: u64,
    pub stop: StopReason,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// How often the shutdown flag is checked while the inbox is empty.
    pub poll: Duration,
    /// Return after this long without an event. `None` runs until shutdown
    /// or disconnect.
    pub idle_exit: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(50),
            idle_exit: None,
        }
    }
}

/// Process inbound events one at a time until shutdown, disconnect or idle.
pub fn run(
    gateway: &mut Gateway,
    inbox: &xch::Receiver<Inbound>,
    shutdown: &AtomicBool,
    opts: RunOptions,
) -> RunSummary {
    let mut events = 0u64;
    let mut last_event = Instant::now();
    let stop = loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!(events, "shutdown requested, leaving event loop");
            break StopReason::Shutdown;
        }
        match inbox.recv_timeout(opts.poll) {
            Ok(event) => {
                gateway.handle(event);
                events += 1;
                last_event = Instant::now();
            }
            Err(xch::RecvTimeoutError::Timeout) => {
                if opts.idle_exit.is_some_and(|idle| last_event.elapsed() >= idle) {
                    break StopReason::Idle;
                }
            }
            Err(xch::RecvTimeoutError::Disconnected) => {
                tracing::debug!(events, "inbox closed");
                break StopReason::Disconnected;
            }
        }
    };
    RunSummary { events, stop }
}

/// Handle every event already queued, without waiting.
pub fn drain(gateway: &mut Gateway, inbox: &xch::Receiver<Inbound>) -> u64 {
    let mut n = 0;
    while let Ok(event) = inbox.try_recv() {
        gateway.handle(event);
        n += 1;
    }
    n
}
