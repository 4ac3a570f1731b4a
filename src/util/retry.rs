//! Bounded wall-clock retry for transient filesystem races.

use std::thread;
use std::time::{Duration, Instant};

/// Default budget for one retried operation.
pub const DEFAULT_BUDGET: Duration = Duration::from_secs(1);

/// Sleep between attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Retry `op` until it returns `true` or `budget` elapses.
///
/// The bound is a duration rather than an attempt count: the cost of a
/// single attempt depends on the filesystem and cannot be known in advance.
/// A first failure never sleeps past the deadline.
pub fn retry_for(budget: Duration, mut op: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + budget;
    loop {
        if op() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}
