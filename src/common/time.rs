use chrono::{DateTime, Utc};
use std::time::{Instant, SystemTime};

/// Monotonic time source for the scheduler.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub fn format_utc(ts: SystemTime) -> String {
    DateTime::<Utc>::from(ts).format("%Y/%m/%d %H:%M:%S").to_string()
}

pub fn utc_run_stamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}
