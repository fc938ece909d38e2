//! Two-tier pacing: a short gap between requests and a long break after a burst

use igsync_common::env;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Pacing Defaults
// ============================================================================

/// Default lock file, relative to the working directory.
pub const DEFAULT_LOCK_PATH: &str = ".interval.lock";

/// Default bounded wait for the pacing lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 1_000;

/// Default short interval range `[min, max)` in seconds.
pub const DEFAULT_MIN_SHORT_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MAX_SHORT_INTERVAL_SECS: u64 = 60;

/// Default long break range `[min, max)` in seconds.
pub const DEFAULT_MIN_LONG_BREAK_SECS: u64 = 300;
pub const DEFAULT_MAX_LONG_BREAK_SECS: u64 = 600;

/// Requests allowed before a long break is forced.
pub const DEFAULT_LONG_BREAK_COUNT: u64 = 10;

/// Pacing configuration shared by every invocation using the same lock file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacingConfig {
    pub lock_path: PathBuf,
    pub lock_timeout_ms: u64,
    pub min_short_interval_secs: u64,
    pub max_short_interval_secs: u64,
    pub min_long_break_secs: u64,
    pub max_long_break_secs: u64,
    pub long_break_count: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            lock_path: PathBuf::from(DEFAULT_LOCK_PATH),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            min_short_interval_secs: DEFAULT_MIN_SHORT_INTERVAL_SECS,
            max_short_interval_secs: DEFAULT_MAX_SHORT_INTERVAL_SECS,
            min_long_break_secs: DEFAULT_MIN_LONG_BREAK_SECS,
            max_long_break_secs: DEFAULT_MAX_LONG_BREAK_SECS,
            long_break_count: DEFAULT_LONG_BREAK_COUNT,
        }
    }
}

/// What the limiter must do before the next request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingDecision {
    /// Enough time has passed since the last request
    Proceed,
    /// Idle longer than a long break: the burst counter starts over
    ResetAfterIdle,
    /// Burst budget spent: sleep, then start the counter over
    LongBreak(Duration),
    /// Too soon after the previous request
    Wait(Duration),
}

impl PacingConfig {
    /// Load pacing configuration from `PACING_*` environment variables
    ///
    /// Numeric values are parsed strictly; an unparsable value is an error.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Self {
            lock_path: PathBuf::from(env::string_or("PACING_LOCK_PATH", DEFAULT_LOCK_PATH)),
            lock_timeout_ms: env::parse_strict("PACING_LOCK_TIMEOUT_MS")?
                .unwrap_or(DEFAULT_LOCK_TIMEOUT_MS),
            min_short_interval_secs: env::parse_strict("PACING_MIN_SHORT_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_MIN_SHORT_INTERVAL_SECS),
            max_short_interval_secs: env::parse_strict("PACING_MAX_SHORT_INTERVAL_SECS")?
                .unwrap_or(DEFAULT_MAX_SHORT_INTERVAL_SECS),
            min_long_break_secs: env::parse_strict("PACING_MIN_LONG_BREAK_SECS")?
                .unwrap_or(DEFAULT_MIN_LONG_BREAK_SECS),
            max_long_break_secs: env::parse_strict("PACING_MAX_LONG_BREAK_SECS")?
                .unwrap_or(DEFAULT_MAX_LONG_BREAK_SECS),
            long_break_count: env::parse_strict("PACING_LONG_BREAK_COUNT")?
                .unwrap_or(DEFAULT_LONG_BREAK_COUNT),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.lock_path.as_os_str().is_empty() {
            anyhow::bail!("PACING_LOCK_PATH cannot be empty");
        }
        if self.min_short_interval_secs >= self.max_short_interval_secs {
            anyhow::bail!(
                "PACING_MIN_SHORT_INTERVAL_SECS ({}) must be less than PACING_MAX_SHORT_INTERVAL_SECS ({})",
                self.min_short_interval_secs,
                self.max_short_interval_secs
            );
        }
        if self.min_long_break_secs >= self.max_long_break_secs {
            anyhow::bail!(
                "PACING_MIN_LONG_BREAK_SECS ({}) must be less than PACING_MAX_LONG_BREAK_SECS ({})",
                self.min_long_break_secs,
                self.max_long_break_secs
            );
        }
        if self.long_break_count == 0 {
            anyhow::bail!("PACING_LONG_BREAK_COUNT must be greater than 0");
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Sample a short interval from `[min, max)`
    pub fn sample_short_interval<R: Rng>(&self, rng: &mut R) -> u64 {
        sample(rng, self.min_short_interval_secs, self.max_short_interval_secs)
    }

    /// Sample a long break from `[min, max)`
    pub fn sample_long_break<R: Rng>(&self, rng: &mut R) -> u64 {
        sample(rng, self.min_long_break_secs, self.max_long_break_secs)
    }

    /// Decide how to pace the next request
    ///
    /// Both intervals are sampled afresh on every call; a forced long break
    /// sleeps for a third, independent sample.
    pub fn decide<R: Rng>(
        &self,
        last_request_epoch_seconds: i64,
        total_request_count: u64,
        now_epoch_seconds: i64,
        rng: &mut R,
    ) -> PacingDecision {
        // A clock that moved backwards counts as "just requested".
        let elapsed = now_epoch_seconds
            .saturating_sub(last_request_epoch_seconds)
            .max(0)
            .unsigned_abs();
        let long_break = self.sample_long_break(rng);
        let short_interval = self.sample_short_interval(rng);

        if elapsed > long_break {
            PacingDecision::ResetAfterIdle
        } else if total_request_count >= self.long_break_count {
            PacingDecision::LongBreak(Duration::from_secs(self.sample_long_break(rng)))
        } else if elapsed < short_interval {
            PacingDecision::Wait(Duration::from_secs(short_interval - elapsed))
        } else {
            PacingDecision::Proceed
        }
    }
}

/// Uniform sample from `[min, max)`; an empty range yields `min`
fn sample<R: Rng>(rng: &mut R, min: u64, max: u64) -> u64 {
    if min >= max {
        min
    } else {
        rng.gen_range(min..max)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn fixed() -> PacingConfig {
        PacingConfig {
            min_short_interval_secs: 30,
            max_short_interval_secs: 31,
            min_long_break_secs: 300,
            max_long_break_secs: 301,
            long_break_count: 10,
            ..PacingConfig::default()
        }
    }

    #[test]
    fn test_idle_longer_than_break_resets() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            fixed().decide(1_000, 10, 1_000 + 301, &mut rng),
            PacingDecision::ResetAfterIdle
        );
    }

    #[test]
    fn test_threshold_forces_long_break() {
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(
            fixed().decide(1_000, 10, 1_005, &mut rng),
            PacingDecision::LongBreak(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_short_wait_is_remaining_gap() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            fixed().decide(1_000, 3, 1_012, &mut rng),
            PacingDecision::Wait(Duration::from_secs(18))
        );
    }

    #[test]
    fn test_proceed_after_short_interval() {
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(
            fixed().decide(1_000, 3, 1_030, &mut rng),
            PacingDecision::Proceed
        );
    }

    #[test]
    fn test_clock_skew_waits_full_interval() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(
            fixed().decide(2_000, 0, 1_990, &mut rng),
            PacingDecision::Wait(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_samples_stay_in_half_open_range() {
        let config = PacingConfig::default();
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..500 {
            let short = config.sample_short_interval(&mut rng);
            assert!((30..60).contains(&short));
            let long = config.sample_long_break(&mut rng);
            assert!((300..600).contains(&long));
        }
    }

    #[test]
    fn test_validate_rejects_empty_ranges() {
        let mut config = PacingConfig::default();
        config.max_short_interval_secs = config.min_short_interval_secs;
        assert!(config.validate().is_err());

        let mut config = PacingConfig::default();
        config.long_break_count = 0;
        assert!(config.validate().is_err());

        assert!(PacingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_unvalidated_empty_ranges_use_minimum() {
        let config = PacingConfig {
            min_short_interval_secs: 45,
            max_short_interval_secs: 45,
            min_long_break_secs: 700,
            max_long_break_secs: 600,
            ..PacingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(config.sample_short_interval(&mut rng), 45);
        assert_eq!(config.sample_long_break(&mut rng), 700);
        assert_eq!(
            config.decide(1_000, 0, 1_010, &mut rng),
            PacingDecision::Wait(Duration::from_secs(35))
        );
    }
}
