use thiserror::Error;

/// Problems with the job configuration, detected before any I/O happens
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing configuration value {}: all of {} must be set", .0.first().unwrap_or(&""), .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("invalid configuration value {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("connection error: {0:#}")]
    Connection(anyhow::Error),

    #[error("send failed with status {status}: {}", .message.as_deref().unwrap_or("no error details"))]
    SendFailure {
        operation_id: String,
        status: String,
        message: Option<String>,
    },

    #[error("submit rejected: {0:#}")]
    SubmitRejected(anyhow::Error),

    #[error("send not confirmed within {waited_secs}s")]
    PollTimeout {
        operation_id: String,
        waited_secs: u64,
    },

    #[error("no document modified for user {user_key} reminder {reminder_id}")]
    PersistenceInconsistency {
        user_key: String,
        reminder_id: String,
    },

    #[error("transport error: {0:#}")]
    Transport(anyhow::Error),
}

impl JobError {
    /// Only configuration and setup failures stop a whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Connection(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Connection(_) => "connection",
            Self::SendFailure { .. } => "send_failure",
            Self::SubmitRejected(_) => "submit_rejected",
            Self::PollTimeout { .. } => "poll_timeout",
            Self::PersistenceInconsistency { .. } => "persistence_inconsistency",
            Self::Transport(_) => "transport",
        }
    }
}
