use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use super::{
    terminal_result, EmailMessage, NotificationChannel, OperationStatus, SendHandle, SendResult,
    SendStatus,
};

/// How the fake service behaves for one send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendScript {
    /// Reports success after the given number of polls
    Succeed { after_polls: u32 },
    /// Reports a failed terminal status after the given number of polls
    Fail { after_polls: u32, message: String },
    /// Stays running forever
    NeverComplete,
    /// The submit call itself errors
    RejectSubmit,
    /// Polling errors after the operation was accepted
    PollError,
}

impl Default for SendScript {
    fn default() -> Self {
        Self::Succeed { after_polls: 0 }
    }
}

/// Everything the fake channel was asked to do, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Submitted { operation_id: String, message: EmailMessage },
    Polled { operation_id: String, done: bool },
    Result { operation_id: String, succeeded: bool },
}

#[derive(Debug)]
struct Operation {
    script: SendScript,
    polls: u32,
}

/// In-memory email channel whose behavior is scripted per recipient
#[derive(Debug, Default)]
pub struct ScriptedEmailChannel {
    default_script: SendScript,
    per_recipient: Mutex<HashMap<String, SendScript>>,
    operations: Mutex<HashMap<String, Operation>>,
    events: Mutex<Vec<ChannelEvent>>,
}

impl ScriptedEmailChannel {
    pub fn new(default_script: SendScript) -> Self {
        Self {
            default_script,
            ..Default::default()
        }
    }

    /// Channel where every send succeeds on the first poll
    pub fn succeeding() -> Self {
        Self::new(SendScript::default())
    }

    pub fn script_for(&self, recipient: &str, script: SendScript) {
        lock(&self.per_recipient).insert(recipient.to_owned(), script);
    }

    pub fn events(&self) -> Vec<ChannelEvent> {
        lock(&self.events).clone()
    }

    pub fn submitted(&self) -> Vec<EmailMessage> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ChannelEvent::Submitted { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn poll_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, ChannelEvent::Polled { .. }))
            .count()
    }

    /// Recipients for which a successful terminal result was handed out
    pub fn confirmed_recipients(&self) -> Vec<String> {
        let events = self.events();
        events
            .iter()
            .filter_map(|event| match event {
                ChannelEvent::Result {
                    operation_id,
                    succeeded: true,
                } => events.iter().find_map(|e| match e {
                    ChannelEvent::Submitted {
                        operation_id: id,
                        message,
                    } if id == operation_id => Some(message.recipient_address.clone()),
                    _ => None,
                }),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: ChannelEvent) {
        lock(&self.events).push(event);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl NotificationChannel for ScriptedEmailChannel {
    async fn submit(&self, message: &EmailMessage) -> anyhow::Result<SendHandle> {
        let script = lock(&self.per_recipient)
            .get(&message.recipient_address)
            .cloned()
            .unwrap_or_else(|| self.default_script.clone());
        if script == SendScript::RejectSubmit {
            anyhow::bail!("submit rejected for {}", message.recipient_address);
        }
        let operation_id = {
            let mut operations = lock(&self.operations);
            let operation_id = format!("op-{}", operations.len() + 1);
            operations.insert(operation_id.clone(), Operation { script, polls: 0 });
            operation_id
        };
        self.record(ChannelEvent::Submitted {
            operation_id: operation_id.clone(),
            message: message.clone(),
        });
        Ok(SendHandle::new(&operation_id, OperationStatus::NotStarted))
    }

    async fn poll(&self, handle: &mut SendHandle) -> anyhow::Result<bool> {
        let (status, error) = {
            let mut operations = lock(&self.operations);
            let Some(operation) = operations.get_mut(&handle.operation_id) else {
                anyhow::bail!("unknown operation {}", handle.operation_id);
            };
            operation.polls += 1;
            // polls counts the current one, `after_polls: 0` completes on the first poll
            let polls_before = operation.polls - 1;
            match &operation.script {
                SendScript::Succeed { after_polls } if polls_before >= *after_polls => {
                    (OperationStatus::Succeeded, None)
                }
                SendScript::Fail {
                    after_polls,
                    message,
                } if polls_before >= *after_polls => {
                    (OperationStatus::Failed, Some(message.clone()))
                }
                SendScript::PollError => anyhow::bail!("poll failed for {}", handle.operation_id),
                _ => (OperationStatus::Running, None),
            }
        };
        handle.last_status = status;
        handle.error = error;
        let done = handle.is_done();
        self.record(ChannelEvent::Polled {
            operation_id: handle.operation_id.clone(),
            done,
        });
        Ok(done)
    }

    async fn result(&self, handle: &SendHandle) -> anyhow::Result<SendResult> {
        let result = terminal_result(handle)?;
        self.record(ChannelEvent::Result {
            operation_id: handle.operation_id.clone(),
            succeeded: result.status == SendStatus::Succeeded,
        });
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            recipient_address: to.into(),
            display_name: "User".into(),
            subject: "Reminder".into(),
            body: "body".into(),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_polls() {
        let channel = ScriptedEmailChannel::new(SendScript::Succeed { after_polls: 2 });
        let mut handle = channel.submit(&message("a@x.com")).await.unwrap();
        assert!(!channel.poll(&mut handle).await.unwrap());
        assert!(!channel.poll(&mut handle).await.unwrap());
        assert!(channel.poll(&mut handle).await.unwrap());
        let result = channel.result(&handle).await.unwrap();
        assert_eq!(result.status, SendStatus::Succeeded);
        assert_eq!(channel.confirmed_recipients(), vec!["a@x.com".to_owned()]);
    }

    #[tokio::test]
    async fn test_per_recipient_scripts() {
        let channel = ScriptedEmailChannel::succeeding();
        channel.script_for("bad@x.com", SendScript::RejectSubmit);
        channel.script_for("slow@x.com", SendScript::NeverComplete);
        assert!(channel.submit(&message("bad@x.com")).await.is_err());
        let mut handle = channel.submit(&message("slow@x.com")).await.unwrap();
        for _ in 0..5 {
            assert!(!channel.poll(&mut handle).await.unwrap());
        }
        assert!(channel.result(&handle).await.is_err());
        assert_eq!(channel.submitted().len(), 1);
        assert_eq!(channel.poll_count(), 5);
    }
}
