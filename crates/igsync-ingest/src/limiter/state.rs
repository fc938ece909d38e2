//! On-disk pacing state
//!
//! The lock file holds exactly two lines once it has been used:
//!
//! ```text
//! 1700000000
//! 3
//! ```
//!
//! the epoch second of the last request and the number of requests since the
//! last long break. An empty file is a fresh state; anything else is corrupt.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub last_request_epoch_seconds: i64,
    pub total_request_count: u64,
}

impl RateLimitState {
    pub fn new(last_request_epoch_seconds: i64, total_request_count: u64) -> Self {
        Self {
            last_request_epoch_seconds,
            total_request_count,
        }
    }

    /// Parse the lock file contents, returning the corruption reason on failure
    pub fn parse(contents: &str) -> std::result::Result<Self, String> {
        let lines: Vec<&str> = contents.lines().collect();

        match lines.as_slice() {
            [] => Ok(Self::default()),
            [last, count] => {
                let last: i64 = last
                    .trim()
                    .parse()
                    .map_err(|_| format!("last request time {:?} is not an integer", last))?;
                if last < 0 {
                    return Err(format!("last request time {} is negative", last));
                }
                let count: u64 = count.trim().parse().map_err(|_| {
                    format!("request count {:?} is not a non-negative integer", count)
                })?;
                Ok(Self::new(last, count))
            },
            other => Err(format!("expected 0 or 2 lines, found {}", other.len())),
        }
    }

    /// Two-line file representation
    pub fn render(&self) -> String {
        format!(
            "{}\n{}",
            self.last_request_epoch_seconds, self.total_request_count
        )
    }
}
