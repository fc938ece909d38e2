//! Cross-process request pacing backed by a locked state file
//!
//! Every invocation that talks to the external source goes through the same
//! lock file. Holding the exclusive advisory lock means the holder is the only
//! process allowed to read the pacing state, sleep, issue a request and write
//! the state back. State is reloaded from disk on every acquisition, so
//! pacing survives restarts and is shared by unrelated processes.
//!
//! # Example
//!
//! ```no_run
//! use igsync_ingest::limiter::{PacingConfig, RateLimiter};
//!
//! # async fn run() -> igsync_ingest::Result<()> {
//! let limiter = RateLimiter::new(PacingConfig::default());
//! let mut guard = limiter.acquire().await?;
//! let body = guard
//!     .guarded_call("coffee", || async { Ok::<_, anyhow::Error>("payload") })
//!     .await?;
//! guard.release()?;
//! # Ok(())
//! # }
//! ```

mod clock;
mod pacing;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use pacing::{PacingConfig, PacingDecision};
pub use state::RateLimitState;

use crate::error::{IngestError, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Poll interval while waiting for another process to release the lock
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Hands out exclusive pacing guards for one lock file
#[derive(Clone)]
pub struct RateLimiter {
    config: PacingConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: PacingConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: PacingConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Take the exclusive lock and load the pacing state
    ///
    /// Creates the lock file if it does not exist yet. Fails with
    /// [`IngestError::Acquisition`] when another holder keeps the lock past
    /// the configured timeout. A corrupt state file is logged and replaced by
    /// the default state on release; it never fails the acquisition.
    pub async fn acquire(&self) -> Result<PacingGuard> {
        let path = &self.config.lock_path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let timeout = self.config.lock_timeout();
        let started = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if started.elapsed() >= timeout {
                        warn!(path = %path.display(), "Pacing lock held by another process");
                        return Err(IngestError::Acquisition {
                            path: path.clone(),
                            timeout_ms: self.config.lock_timeout_ms,
                        });
                    }
                    tokio::time::sleep(LOCK_POLL_INTERVAL).await;
                },
                Err(e) => return Err(e.into()),
            }
        }
        debug!(path = %path.display(), "Acquired pacing lock");

        let mut contents = String::new();
        let state = match file.read_to_string(&mut contents) {
            Ok(_) => match RateLimitState::parse(&contents) {
                Ok(state) => state,
                Err(reason) => {
                    let err = IngestError::CorruptState {
                        path: path.clone(),
                        reason,
                    };
                    error!(error = %err, "Resetting pacing state to defaults");
                    RateLimitState::default()
                },
            },
            Err(e) => {
                let err = IngestError::CorruptState {
                    path: path.clone(),
                    reason: e.to_string(),
                };
                error!(error = %err, "Resetting pacing state to defaults");
                RateLimitState::default()
            },
        };

        Ok(PacingGuard {
            file,
            state,
            limiter: self.clone(),
            released: false,
        })
    }

    /// Acquire, make one guarded call, release
    ///
    /// The guard is released on drop, so a failed final write is logged and
    /// the call's outcome is still returned.
    pub async fn call<F, Fut, T>(&self, item: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut guard = self.acquire().await?;
        let outcome = guard.guarded_call(item, call).await;
        drop(guard);
        outcome
    }
}

/// Exclusive hold on the pacing lock file
///
/// Dropping the guard (or calling [`PacingGuard::release`]) writes the
/// in-memory state back to the file and releases the lock.
pub struct PacingGuard {
    file: File,
    state: RateLimitState,
    limiter: RateLimiter,
    released: bool,
}

impl PacingGuard {
    pub fn state(&self) -> RateLimitState {
        self.state
    }

    /// Pace, record the request, then run `call`
    ///
    /// The request is recorded and persisted before `call` runs, so a failed
    /// call still spends its pacing slot. A failure of `call` is logged and
    /// returned as [`IngestError::Fetch`].
    pub async fn guarded_call<F, Fut, T>(&mut self, item: &str, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.pace().await?;

        call().await.map_err(|e| {
            let err = IngestError::fetch(item, &e);
            error!(item = %item, error = %err, "Guarded call failed");
            err
        })
    }

    async fn pace(&mut self) -> Result<()> {
        let clock = Arc::clone(&self.limiter.clock);
        let decision = self.limiter.config.decide(
            self.state.last_request_epoch_seconds,
            self.state.total_request_count,
            clock.now_epoch_seconds(),
            &mut rand::thread_rng(),
        );

        match decision {
            PacingDecision::ResetAfterIdle => {
                debug!("Idle past the long break window, resetting request count");
                self.state.total_request_count = 0;
            },
            PacingDecision::LongBreak(pause) => {
                info!(
                    secs = pause.as_secs(),
                    count = self.state.total_request_count,
                    "Request budget spent, taking a long break"
                );
                clock.sleep(pause).await;
                self.state.total_request_count = 0;
            },
            PacingDecision::Wait(pause) => {
                debug!(secs = pause.as_secs(), "Sleeping before the next request");
                clock.sleep(pause).await;
            },
            PacingDecision::Proceed => {},
        }

        self.state.last_request_epoch_seconds = clock.now_epoch_seconds();
        self.state.total_request_count += 1;
        self.persist()
    }

    /// Truncate and rewrite the lock file; only the lock holder gets here
    fn persist(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.set_len(0)?;
        self.file.write_all(self.state.render().as_bytes())?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Write the final state and release the lock
    pub fn release(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let written = self.persist();
        FileExt::unlock(&self.file)?;
        debug!(path = %self.limiter.config.lock_path.display(), "Released pacing lock");
        written
    }
}

impl Drop for PacingGuard {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!(error = %e, "Failed to release pacing lock cleanly");
        }
    }
}
