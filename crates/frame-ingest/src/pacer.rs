use std::{
    sync::Mutex,
    thread,
    time::{Duration, Instant},
};

/// Blocks callers until the next frame is due, absorbing scheduling drift so
/// the long-run rate matches the configured fps.
pub(crate) struct Pacer {
    interval: Duration,
    next_due: Mutex<Option<Instant>>,
}

impl Pacer {
    pub(crate) fn new(fps: u32) -> Self {
        let fps = fps.max(1);
        Self {
            interval: Duration::from_micros(1_000_000 / u64::from(fps)),
            next_due: Mutex::new(None),
        }
    }

    /// Sleep until the current frame slot opens. The first call returns
    /// immediately and starts the cadence.
    pub(crate) fn wait(&self) {
        let now = Instant::now();
        let sleep_for = match self.next_due.lock() {
            Ok(mut due) => {
                let target = due.map_or(now, |d| d.max(now));
                *due = Some(target + self.interval);
                target.saturating_duration_since(now)
            }
            Err(_) => Duration::ZERO,
        };
        if !sleep_for.is_zero() {
            thread::sleep(sleep_for);
        }
    }
}
