mod azure_email;
mod scripted;

use async_trait::async_trait;
use serde::Deserialize;

pub use azure_email::{AzureEmailClient, EmailConnectionString};
pub use scripted::{ChannelEvent, ScriptedEmailChannel, SendScript};

/// One outbound email, already rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipient_address: String,
    pub display_name: String,
    pub subject: String,
    pub body: String,
}

/// Status of a send operation as reported by the email service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::Unknown => "Unknown",
        }
    }
}

/// Token for one in-flight send request. Polling updates it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendHandle {
    pub operation_id: String,
    pub last_status: OperationStatus,
    pub error: Option<String>,
}

impl SendHandle {
    pub fn new(operation_id: &str, status: OperationStatus) -> Self {
        Self {
            operation_id: operation_id.to_owned(),
            last_status: status,
            error: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.last_status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Succeeded,
    Failed,
}

/// Terminal outcome of a send request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub status: SendStatus,
    pub id: String,
    pub raw_status: String,
    pub error: Option<String>,
}

/// Email delivery with an asynchronous completion protocol:
/// `submit` hands out a handle, `poll` refreshes it until it is done and
/// `result` reads the terminal outcome.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn submit(&self, message: &EmailMessage) -> anyhow::Result<SendHandle>;

    /// Refresh the handle, returns true once the operation reached a terminal status
    async fn poll(&self, handle: &mut SendHandle) -> anyhow::Result<bool>;

    async fn result(&self, handle: &SendHandle) -> anyhow::Result<SendResult> {
        terminal_result(handle)
    }
}

/// Result of a handle which has reached a terminal status.
/// Canceled operations count as failed.
pub fn terminal_result(handle: &SendHandle) -> anyhow::Result<SendResult> {
    let status = match handle.last_status {
        OperationStatus::Succeeded => SendStatus::Succeeded,
        OperationStatus::Failed | OperationStatus::Canceled => SendStatus::Failed,
        ref other => anyhow::bail!(
            "operation {} not finished, last status {}",
            handle.operation_id,
            other.as_str()
        ),
    };
    Ok(SendResult {
        status,
        id: handle.operation_id.clone(),
        raw_status: handle.last_status.as_str().to_owned(),
        error: handle.error.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_result() {
        let mut handle = SendHandle::new("op-1", OperationStatus::Running);
        assert!(!handle.is_done());
        assert!(terminal_result(&handle).is_err());

        handle.last_status = OperationStatus::Succeeded;
        let result = terminal_result(&handle).unwrap();
        assert_eq!(result.status, SendStatus::Succeeded);
        assert_eq!(result.id, "op-1");

        handle.last_status = OperationStatus::Canceled;
        handle.error = Some("canceled by service".into());
        let result = terminal_result(&handle).unwrap();
        assert_eq!(result.status, SendStatus::Failed);
        assert_eq!(result.raw_status, "Canceled");
        assert_eq!(result.error.as_deref(), Some("canceled by service"));
    }

    #[test]
    fn test_status_from_json() {
        let status: OperationStatus = serde_json::from_str("\"Running\"").unwrap();
        assert_eq!(status, OperationStatus::Running);
        let status: OperationStatus = serde_json::from_str("\"SomethingNew\"").unwrap();
        assert_eq!(status, OperationStatus::Unknown);
        assert!(!status.is_terminal());
    }
}
