//! Retry/backoff state machine wrapping whole batch attempts
//!
//! ```text
//! Attempt(0) --fail--> Countdown(2) -> Countdown(1) -> Reconnecting -> Attempt(1)
//! Attempt(1) --fail--> FinalAttempt -> Attempt(2)
//! Attempt(2) --fail--> TerminalFailure
//! Attempt(n) --ok----> Success
//! ```

use std::time::Duration;
use tracing::{info, warn};

use crate::config::RetryConfig;
use crate::error::{AppError, Result};
use crate::orchestrator::batch::{AttemptState, BatchRunner};
use crate::orchestrator::events::{GenerationObserver, RetryStatus};
use crate::orchestrator::types::{BatchResult, GenerationRequest};

/// Initial try plus two retries
pub const MAX_ATTEMPTS: u32 = 3;

/// Injectable delay policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Countdown ticks emitted before the first retry
    pub countdown_ticks: u32,
    pub tick: Duration,
}

impl RetryPolicy {
    /// Same status sequence, no waiting
    pub fn immediate() -> Self {
        Self {
            countdown_ticks: 2,
            tick: Duration::ZERO,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            countdown_ticks: config.countdown_ticks,
            tick: Duration::from_millis(config.tick_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            countdown_ticks: 2,
            tick: Duration::from_secs(1),
        }
    }
}

/// States of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempt(u32),
    Countdown(u32),
    Reconnecting,
    FinalAttempt,
    Success,
    TerminalFailure,
}

impl RetryState {
    /// State entered when the given attempt fails
    pub fn after_failure(attempt_index: u32, policy: &RetryPolicy) -> RetryState {
        match attempt_index {
            0 if policy.countdown_ticks > 0 => RetryState::Countdown(policy.countdown_ticks),
            0 => RetryState::Reconnecting,
            1 => RetryState::FinalAttempt,
            _ => RetryState::TerminalFailure,
        }
    }
}

/// Runs attempts until one succeeds or the budget is spent
pub struct RetryMachine {
    policy: RetryPolicy,
}

impl RetryMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Drive a request through up to [`MAX_ATTEMPTS`] attempts.
    ///
    /// Hard stops such as suspension or a moderated attempt return at once. After the last
    /// attempt fails the error message is carried verbatim in `TerminalFailure`.
    pub async fn run(
        &self,
        runner: &dyn BatchRunner,
        request: &GenerationRequest,
        observer: &mut dyn GenerationObserver,
    ) -> Result<BatchResult> {
        let mut state = AttemptState::new();
        let mut current = RetryState::Attempt(0);
        observer.on_status(&RetryStatus::Generating);

        loop {
            current = match current {
                RetryState::Attempt(index) => {
                    info!(attempt = index, mode = %request.mode, "Starting batch attempt");
                    match runner.run_batch(request, &mut state, &mut *observer).await {
                        Ok(batch) => {
                            info!(attempt = index, images = batch.len(), "Batch succeeded");
                            return Ok(batch);
                        }
                        Err(e) if e.is_hard_stop() => return Err(e),
                        Err(e) => {
                            warn!(attempt = index, error = %e, "Batch attempt failed");
                            let next = RetryState::after_failure(index, &self.policy);
                            if next == RetryState::TerminalFailure {
                                return Err(AppError::TerminalFailure(e.to_string()));
                            }
                            observer.on_cleared(index);
                            state.advance();
                            next
                        }
                    }
                }
                RetryState::Countdown(remaining) => {
                    observer.on_status(&RetryStatus::RetryingIn(remaining));
                    tokio::time::sleep(self.policy.tick).await;
                    if remaining > 1 {
                        RetryState::Countdown(remaining - 1)
                    } else {
                        RetryState::Reconnecting
                    }
                }
                RetryState::Reconnecting => {
                    observer.on_status(&RetryStatus::Reconnecting);
                    RetryState::Attempt(state.attempt_index())
                }
                RetryState::FinalAttempt => {
                    observer.on_status(&RetryStatus::FinalAttempt);
                    RetryState::Attempt(state.attempt_index())
                }
                RetryState::Success | RetryState::TerminalFailure => {
                    return Err(AppError::Internal(format!(
                        "retry machine re-entered terminal state {:?}",
                        current
                    )));
                }
            };
        }
    }
}
