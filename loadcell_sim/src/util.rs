use std::time::{Duration, Instant};

use crate::error::{Result, SimError};

/// Poll `ready` until it returns true or `timeout` expires. Sleeps in small
/// intervals to avoid CPU spinning.
pub fn wait_until_with_timeout(
    mut ready: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !ready() {
        if Instant::now() >= deadline {
            return Err(SimError::Timeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}
