use chrono::{DateTime, Utc};
use std::{fmt, time::Duration};

/// How one send cycle for one reminder ended
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed {
        status: String,
        message: Option<String>,
    },
    TimedOut,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed { status, .. } => write!(f, "failed ({status})"),
            Self::TimedOut => write!(f, "timed-out"),
        }
    }
}

/// Ephemeral record of a single send cycle. Never persisted, it only lives
/// while one reminder is processed and ends up in the logs.
#[derive(Debug, Clone)]
pub struct DispatchAttempt {
    pub submitted_at: DateTime<Utc>,
    pub operation_id: String,
    pub polls: u32,
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
}

impl DispatchAttempt {
    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }
}

/// Counters collected over one run of the job
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub users_scanned: usize,
    pub users_skipped: usize,
    pub reminders_skipped: usize,
    pub reminders_claimed_elsewhere: usize,
    pub sent: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub inconsistencies: usize,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed + self.timed_out + self.inconsistencies
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "users={} users_skipped={} reminders_skipped={} claimed_elsewhere={} sent={} failed={} timed_out={} inconsistencies={}",
            self.users_scanned,
            self.users_skipped,
            self.reminders_skipped,
            self.reminders_claimed_elsewhere,
            self.sent,
            self.failed,
            self.timed_out,
            self.inconsistencies
        )
    }
}
