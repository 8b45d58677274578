use std::sync::Arc;

use reminder_email_job::{
    channel::ScriptedEmailChannel,
    config::JobConfig,
    jobs::reminder::run_with,
    models::{Reminder, RunSummary, UserRecord},
    store::InMemoryReminderStore,
    utils::{JobError, RecordingSleeper},
};

pub fn test_config(claim_lease_secs: u64) -> JobConfig {
    let claim_lease = claim_lease_secs.to_string();
    JobConfig::from_lookup(move |key| match key {
        "MONGODB_URI" => Some("mongodb://localhost:27017".into()),
        "DATABASE_NAME" => Some("gnosis".into()),
        "COLLECTION_NAME" => Some("users".into()),
        "AZURE_EMAIL_CONNECTION_STRING" => {
            Some("endpoint=https://mail.example.com;accesskey=c2VjcmV0".into())
        }
        "EMAIL_SENDER_ADDRESS" => Some("DoNotReply@mail.example.com".into()),
        "REMINDER_CLAIM_LEASE_SECS" => Some(claim_lease.clone()),
        _ => None,
    })
    .expect("valid test configuration")
}

pub fn reminder(id: &str, title: &str) -> Reminder {
    Reminder::new(id, Some(title))
}

pub fn sent_reminder(id: &str, title: &str) -> Reminder {
    let mut reminder = Reminder::new(id, Some(title));
    reminder.sent = true;
    reminder
}

pub fn reminder_without_id(title: &str) -> Reminder {
    Reminder {
        title: Some(title.to_owned()),
        ..Default::default()
    }
}

/// In-memory store and scripted channel wired to the real job entry point
pub struct Harness {
    pub store: Arc<InMemoryReminderStore>,
    pub channel: Arc<ScriptedEmailChannel>,
    pub sleeper: Arc<RecordingSleeper>,
    pub config: JobConfig,
}

impl Harness {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self::with_channel(users, ScriptedEmailChannel::succeeding())
    }

    pub fn with_channel(users: Vec<UserRecord>, channel: ScriptedEmailChannel) -> Self {
        Self {
            store: Arc::new(InMemoryReminderStore::new(users)),
            channel: Arc::new(channel),
            sleeper: Arc::new(RecordingSleeper::new()),
            config: test_config(0),
        }
    }

    pub fn with_claim_lease(mut self, secs: u64) -> Self {
        self.config = test_config(secs);
        self
    }

    pub async fn run(&self) -> Result<RunSummary, JobError> {
        run_with(
            self.store.clone(),
            self.channel.clone(),
            self.sleeper.clone(),
            &self.config,
        )
        .await
    }
}
