//! Optimistic-concurrency update loop.
//!
//! The client itself never retries.  Callers that share a record with
//! other writers use `update_with_retry`: read the current version and
//! data, compute a patch from that snapshot, submit it against the read
//! version, and on `Conflict` back off for a random interval and start
//! over.  Any other error ends the loop immediately.

use std::thread;
use std::time::Duration;

use log::debug;
use rand::Rng;
use serde_json::Value;

use crate::client::{KvClient, PatchOps, PatchOptions, PatchResponse, Transport};
use crate::errors::{KvError, Result};

/// Bounds for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of conflicts tolerated before giving up.
    pub max_retries: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            backoff_min: Duration::from_millis(50),
            backoff_max: Duration::from_millis(150),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries immediately (useful in tests).
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff_min: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }

    fn backoff(&self) -> Duration {
        if self.backoff_max <= self.backoff_min {
            return self.backoff_min;
        }
        let min = self.backoff_min.as_millis() as u64;
        let max = self.backoff_max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Result of a successful `update_with_retry`.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    /// The winning patch response.
    pub response: PatchResponse,
    /// Version the winning patch was based on.
    pub based_on: u64,
    /// Data snapshot the winning patch was computed from.
    pub snapshot: Value,
    /// Total patch attempts, including the successful one.
    pub attempts: u32,
    /// Number of conflicts encountered along the way.
    pub conflicts: u32,
}

/// Read-modify-patch with bounded retries on version conflicts.
///
/// `mutate` receives the current record data and returns the patch to
/// apply.  It is re-run against fresh data after every conflict, so it
/// must derive its result from the snapshot rather than from captured
/// state.
pub fn update_with_retry<T, F>(
    client: &KvClient<T>,
    options: &PatchOptions,
    policy: &RetryPolicy,
    mut mutate: F,
) -> Result<RetryOutcome>
where
    T: Transport,
    F: FnMut(&Value) -> Result<PatchOps>,
{
    let mut conflicts = 0;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let current = client.retrieve(options.token.as_deref())?;
        let ops = mutate(&current.data)?;

        match client.patch(current.version, &ops, options) {
            Ok(response) => {
                return Ok(RetryOutcome {
                    response,
                    based_on: current.version,
                    snapshot: current.data,
                    attempts,
                    conflicts,
                })
            }
            Err(err) if err.is_conflict() => {
                conflicts += 1;
                if conflicts > policy.max_retries {
                    return Err(KvError::RetriesExhausted { attempts });
                }
                let pause = policy.backoff();
                debug!("version {} is stale, retrying in {pause:?}", current.version);
                thread::sleep(pause);
            }
            Err(err) => return Err(err),
        }
    }
}
