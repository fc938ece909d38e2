//! Time source for pacing decisions

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Wall clock in epoch seconds plus the ability to block
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_epoch_seconds(&self) -> i64;

    async fn sleep(&self, duration: Duration);
}

/// Real time: `chrono` for the epoch, `tokio` for sleeping
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now_epoch_seconds(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manually driven clock
///
/// Sleeping returns immediately and moves the clock forward by the requested
/// duration (rounded up to whole seconds). Every sleep is recorded so callers
/// can assert on the pacing that would have happened.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(start_epoch_seconds: i64) -> Self {
        Self {
            now: AtomicI64::new(start_epoch_seconds),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Sleeps requested so far, oldest first
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now_epoch_seconds(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
        self.advance(i64::try_from(secs).unwrap_or(i64::MAX));
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}
