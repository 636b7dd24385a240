//! Bounded polling of assistant runs.
//!
//! A run is polled at a fixed interval until it reaches a terminal state.
//! Both the number of polls and the wall-clock time are capped, and each
//! individual poll request is cut off at the remaining deadline, so a
//! stalled run ends in [`VisionError::Timeout`] instead of hanging the
//! caller.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::VisionError;
use crate::messages::Run;

/// Tunable parameters for run polling.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between two polls.
    pub interval: Duration,
    /// Upper bound on total time spent polling one run.
    pub timeout: Duration,
    /// Upper bound on the number of polls for one run.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(300),
            max_attempts: 200,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            ..Default::default()
        }
    }
}

/// Poll `fetch` until the returned run is terminal.
///
/// Errors from `fetch` are returned as-is; the caller decides whether a
/// transport error is worth another pass.
pub async fn poll_until_terminal<F, Fut>(
    config: &PollConfig,
    run_id: &str,
    mut fetch: F,
) -> Result<Run, VisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Run, VisionError>>,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut attempts = 0u32;

    let timed_out = |attempts: u32| VisionError::Timeout {
        run_id: run_id.to_string(),
        attempts,
        elapsed: started.elapsed(),
    };

    loop {
        attempts += 1;

        let run = match tokio::time::timeout_at(deadline, fetch()).await {
            Ok(result) => result?,
            Err(_) => return Err(timed_out(attempts)),
        };

        if run.status.is_terminal() {
            tracing::debug!(run_id, attempts, status = ?run.status, "Run reached terminal state");
            return Ok(run);
        }

        if attempts >= config.max_attempts || Instant::now() + config.interval >= deadline {
            return Err(timed_out(attempts));
        }

        tracing::trace!(run_id, attempts, status = ?run.status, "Run still pending");
        tokio::time::sleep(config.interval).await;
    }
}
