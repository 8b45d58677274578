use chrono::Utc;
use std::time::Duration;

use crate::{
    channel::{EmailMessage, NotificationChannel, SendStatus},
    models::{AttemptOutcome, DispatchAttempt},
    utils::{JobError, Sleeper},
};

/// Waiting rules for the completion polls of one send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Tracks the time spent waiting for one send.
/// A wait is only granted while it keeps the total within the timeout.
#[derive(Debug, Clone, Copy)]
pub struct PollBudget {
    policy: PollPolicy,
    elapsed: Duration,
}

impl PollBudget {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            elapsed: Duration::ZERO,
        }
    }

    /// Interval to wait before the next poll, `None` once the timeout is used up
    pub fn next_wait(&mut self) -> Option<Duration> {
        let after = self.elapsed + self.policy.interval;
        if after > self.policy.timeout {
            return None;
        }
        self.elapsed = after;
        Some(self.policy.interval)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

enum SendState {
    Polling,
    Completed,
    Expired,
}

/// Submit one email and poll it to a terminal status or until the budget
/// is spent.
///
/// A failed or timed-out send still returns `Ok`, the outcome is in the
/// attempt. Errors are only returned when talking to the channel failed,
/// `SubmitRejected` when nothing was accepted for delivery.
pub async fn send_and_confirm(
    channel: &dyn NotificationChannel,
    sleeper: &dyn Sleeper,
    policy: PollPolicy,
    message: &EmailMessage,
) -> Result<DispatchAttempt, JobError> {
    let submitted_at = Utc::now();
    let mut handle = channel
        .submit(message)
        .await
        .map_err(JobError::SubmitRejected)?;
    let mut budget = PollBudget::new(policy);
    let mut polls = 0;
    let mut state = SendState::Polling;

    while let SendState::Polling = state {
        polls += 1;
        let done = channel
            .poll(&mut handle)
            .await
            .map_err(JobError::Transport)?;
        state = if done {
            SendState::Completed
        } else {
            match budget.next_wait() {
                Some(wait) => {
                    tracing::trace!(operation_id = %handle.operation_id, polls, "send still running");
                    sleeper.sleep(wait).await;
                    SendState::Polling
                }
                None => SendState::Expired,
            }
        };
    }

    let outcome = match state {
        SendState::Expired => AttemptOutcome::TimedOut,
        _ => {
            let result = channel
                .result(&handle)
                .await
                .map_err(JobError::Transport)?;
            match result.status {
                SendStatus::Succeeded => AttemptOutcome::Succeeded,
                SendStatus::Failed => AttemptOutcome::Failed {
                    status: result.raw_status,
                    message: result.error,
                },
            }
        }
    };

    Ok(DispatchAttempt {
        submitted_at,
        operation_id: handle.operation_id,
        polls,
        elapsed: budget.elapsed(),
        outcome,
    })
}
