use std::{collections::HashMap, sync::Arc, time::Duration};

use super::send_confirm::{send_and_confirm, PollPolicy};
use crate::{
    channel::{EmailMessage, NotificationChannel},
    config::JobConfig,
    models::{AttemptOutcome, Reminder, RunSummary, UserRecord},
    store::ReminderStore,
    utils::{get_epoch_ts, replace_placeholders, JobError, Sleeper},
};

/// What the dispatcher needs from the job configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub poll: PollPolicy,
    /// Zero turns the claim step off
    pub claim_lease: Duration,
    pub subject_template: String,
    pub body_template: String,
}

impl DispatchSettings {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            poll: PollPolicy {
                interval: config.poll_interval,
                timeout: config.send_timeout,
            },
            claim_lease: config.claim_lease,
            subject_template: config.subject_template.clone(),
            body_template: config.body_template.clone(),
        }
    }
}

/// How a single reminder ended when nothing went wrong
enum ReminderOutcome {
    Sent,
    ClaimedElsewhere,
}

/// Sends every pending reminder once and records the delivery.
///
/// Users and reminders are processed one after the other in the order the
/// store returned them. A failing reminder or a malformed user is logged and
/// skipped, only a failing candidate query ends the run early.
pub struct ReminderDispatcher {
    store: Arc<dyn ReminderStore>,
    channel: Arc<dyn NotificationChannel>,
    sleeper: Arc<dyn Sleeper>,
    settings: DispatchSettings,
}

impl ReminderDispatcher {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        channel: Arc<dyn NotificationChannel>,
        sleeper: Arc<dyn Sleeper>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            channel,
            sleeper,
            settings,
        }
    }

    pub async fn dispatch_pending(&self) -> Result<RunSummary, JobError> {
        let mut summary = RunSummary::default();
        let users = self
            .store
            .find_pending()
            .await
            .map_err(JobError::Connection)?;
        if users.is_empty() {
            tracing::info!("no pending reminders found");
            return Ok(summary);
        }
        tracing::info!("found {} users with pending reminders", users.len());
        for user in &users {
            summary.users_scanned += 1;
            self.process_user(user, &mut summary).await;
        }
        Ok(summary)
    }

    async fn process_user(&self, user: &UserRecord, summary: &mut RunSummary) {
        if let Some(reason) = user.decode_error.as_deref() {
            tracing::warn!(user = ?user.key, "skipping malformed user document: {reason}");
            summary.users_skipped += 1;
            return;
        }
        let Some(user_key) = user.key.as_deref() else {
            tracing::warn!("skipping user document without key");
            summary.users_skipped += 1;
            return;
        };
        let Some(address) = user.contact_address() else {
            tracing::warn!(user = user_key, "skipping user without email address");
            summary.users_skipped += 1;
            return;
        };
        if user.reminders().is_empty() {
            tracing::warn!(user = user_key, "skipping user without reminders");
            summary.users_skipped += 1;
            return;
        }
        if !user.has_pending_reminders() {
            tracing::debug!(user = user_key, "all reminders already sent");
            summary.users_skipped += 1;
            return;
        }

        for reminder in user.reminders().iter().filter(|r| !r.sent) {
            let Some(reminder_id) = reminder.id.as_deref() else {
                tracing::warn!(user = user_key, "skipping reminder without id");
                summary.reminders_skipped += 1;
                continue;
            };
            let message = self.render_message(user, address, reminder);
            match self.process_reminder(user_key, reminder_id, &message).await {
                Ok(ReminderOutcome::Sent) => summary.sent += 1,
                Ok(ReminderOutcome::ClaimedElsewhere) => {
                    tracing::info!(
                        user = user_key,
                        reminder = reminder_id,
                        "reminder claimed by another run, skipping"
                    );
                    summary.reminders_claimed_elsewhere += 1;
                }
                Err(err @ JobError::PersistenceInconsistency { .. }) => {
                    tracing::warn!(
                        user = user_key,
                        reminder = reminder_id,
                        "reminder sent but not marked: {err}"
                    );
                    summary.inconsistencies += 1;
                }
                Err(err @ JobError::PollTimeout { .. }) => {
                    tracing::error!(
                        user = user_key,
                        reminder = reminder_id,
                        "giving up on reminder: {err}"
                    );
                    summary.timed_out += 1;
                }
                Err(err) => {
                    tracing::error!(
                        user = user_key,
                        reminder = reminder_id,
                        kind = err.kind(),
                        "reminder not sent: {err}"
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    async fn process_reminder(
        &self,
        user_key: &str,
        reminder_id: &str,
        message: &EmailMessage,
    ) -> Result<ReminderOutcome, JobError> {
        let leased = !self.settings.claim_lease.is_zero();
        if leased {
            let now = get_epoch_ts();
            let until = now.saturating_add(self.settings.claim_lease.as_secs());
            let claimed = self
                .store
                .claim(user_key, reminder_id, now, until)
                .await
                .map_err(JobError::Transport)?;
            if !claimed {
                return Ok(ReminderOutcome::ClaimedElsewhere);
            }
        }

        let result = self.send_and_mark(user_key, reminder_id, message).await;
        // nothing went out, the next run may retry at once
        if leased
            && matches!(
                result,
                Err(JobError::SendFailure { .. } | JobError::SubmitRejected(_))
            )
        {
            if let Err(e) = self.store.release(user_key, reminder_id).await {
                tracing::warn!(
                    user = user_key,
                    reminder = reminder_id,
                    "failed to release claim: {e:#}"
                );
            }
        }
        result
    }

    async fn send_and_mark(
        &self,
        user_key: &str,
        reminder_id: &str,
        message: &EmailMessage,
    ) -> Result<ReminderOutcome, JobError> {
        let attempt = send_and_confirm(
            self.channel.as_ref(),
            self.sleeper.as_ref(),
            self.settings.poll,
            message,
        )
        .await?;
        tracing::debug!(
            user = user_key,
            reminder = reminder_id,
            operation_id = %attempt.operation_id,
            submitted_at = %attempt.submitted_at,
            polls = attempt.polls,
            elapsed_secs = attempt.elapsed.as_secs(),
            outcome = %attempt.outcome,
            "send attempt finished"
        );
        match attempt.outcome {
            AttemptOutcome::Succeeded => {}
            AttemptOutcome::Failed { status, message } => {
                return Err(JobError::SendFailure {
                    operation_id: attempt.operation_id,
                    status,
                    message,
                });
            }
            AttemptOutcome::TimedOut => {
                return Err(JobError::PollTimeout {
                    operation_id: attempt.operation_id,
                    waited_secs: attempt.elapsed.as_secs(),
                });
            }
        }

        let modified = self
            .store
            .mark_sent(user_key, reminder_id)
            .await
            .map_err(JobError::Transport)?;
        if modified == 0 {
            return Err(JobError::PersistenceInconsistency {
                user_key: user_key.to_owned(),
                reminder_id: reminder_id.to_owned(),
            });
        }
        tracing::info!(user = user_key, reminder = reminder_id, "reminder sent");
        Ok(ReminderOutcome::Sent)
    }

    fn render_message(&self, user: &UserRecord, address: &str, reminder: &Reminder) -> EmailMessage {
        let title = reminder.display_title();
        let mut data = HashMap::new();
        data.insert("title".to_owned(), title.to_owned());
        data.insert("name".to_owned(), user.display_name().to_owned());
        data.insert("email".to_owned(), address.to_owned());
        let render = |template: &str| {
            replace_placeholders(template, &data).unwrap_or_else(|e| {
                tracing::debug!("{:?}", e);
                title.to_owned()
            })
        };
        EmailMessage {
            recipient_address: address.to_owned(),
            display_name: user.display_name().to_owned(),
            subject: render(&self.settings.subject_template),
            body: render(&self.settings.body_template),
        }
    }
}
