use async_trait::async_trait;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use super::ReminderStore;
use crate::{models::UserRecord, utils::get_epoch_ts};

/// Operations observed by [`InMemoryReminderStore`], in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    FindPending,
    Claim { user_key: String, reminder_id: String },
    Release { user_key: String, reminder_id: String },
    MarkSent { user_key: String, reminder_id: String },
    Close,
}

/// Store keeping the user documents in memory, with hooks to inject failures
#[derive(Debug, Default)]
pub struct InMemoryReminderStore {
    users: Mutex<Vec<UserRecord>>,
    calls: Mutex<Vec<StoreCall>>,
    close_count: AtomicUsize,
    fail_find: AtomicBool,
    fail_mark_sent: Mutex<HashSet<(String, String)>>,
    foreign_claims: Mutex<HashSet<(String, String)>>,
}

impl InMemoryReminderStore {
    pub fn new(users: Vec<UserRecord>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Default::default()
        }
    }

    pub fn fail_find_pending(&self) {
        self.fail_find.store(true, Ordering::SeqCst);
    }

    pub fn fail_mark_sent_for(&self, user_key: &str, reminder_id: &str) {
        lock(&self.fail_mark_sent).insert((user_key.to_owned(), reminder_id.to_owned()));
    }

    /// Pretend another invocation holds the lease on this reminder
    pub fn claimed_elsewhere(&self, user_key: &str, reminder_id: &str) {
        lock(&self.foreign_claims).insert((user_key.to_owned(), reminder_id.to_owned()));
    }

    pub fn users(&self) -> Vec<UserRecord> {
        lock(&self.users).clone()
    }

    pub fn is_sent(&self, user_key: &str, reminder_id: &str) -> bool {
        lock(&self.users)
            .iter()
            .filter(|u| u.key.as_deref() == Some(user_key))
            .flat_map(|u| u.reminders())
            .any(|r| r.id.as_deref() == Some(reminder_id) && r.sent)
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    pub fn mark_sent_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::MarkSent {
                    user_key,
                    reminder_id,
                } => Some((user_key, reminder_id)),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push(call);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn find_pending(&self) -> anyhow::Result<Vec<UserRecord>> {
        self.record(StoreCall::FindPending);
        if self.fail_find.load(Ordering::SeqCst) {
            anyhow::bail!("find_pending failed");
        }
        let users = lock(&self.users)
            .iter()
            .filter(|u| u.has_pending_reminders())
            .cloned()
            .collect();
        Ok(users)
    }

    async fn claim(
        &self,
        user_key: &str,
        reminder_id: &str,
        now: u64,
        until: u64,
    ) -> anyhow::Result<bool> {
        self.record(StoreCall::Claim {
            user_key: user_key.to_owned(),
            reminder_id: reminder_id.to_owned(),
        });
        let key = (user_key.to_owned(), reminder_id.to_owned());
        if lock(&self.foreign_claims).contains(&key) {
            return Ok(false);
        }
        let mut users = lock(&self.users);
        let reminder = users
            .iter_mut()
            .filter(|u| u.key.as_deref() == Some(user_key))
            .flat_map(|u| u.reminders.iter_mut().flatten())
            .find(|r| r.id.as_deref() == Some(reminder_id) && !r.sent);
        match reminder {
            Some(reminder) if reminder.claimed_until.map_or(true, |t| t <= now) => {
                reminder.claimed_until = Some(until);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, user_key: &str, reminder_id: &str) -> anyhow::Result<()> {
        self.record(StoreCall::Release {
            user_key: user_key.to_owned(),
            reminder_id: reminder_id.to_owned(),
        });
        let mut users = lock(&self.users);
        let reminders = users
            .iter_mut()
            .filter(|u| u.key.as_deref() == Some(user_key))
            .flat_map(|u| u.reminders.iter_mut().flatten())
            .filter(|r| r.id.as_deref() == Some(reminder_id) && !r.sent);
        for reminder in reminders {
            reminder.claimed_until = None;
        }
        Ok(())
    }

    async fn mark_sent(&self, user_key: &str, reminder_id: &str) -> anyhow::Result<u64> {
        self.record(StoreCall::MarkSent {
            user_key: user_key.to_owned(),
            reminder_id: reminder_id.to_owned(),
        });
        let key = (user_key.to_owned(), reminder_id.to_owned());
        if lock(&self.fail_mark_sent).contains(&key) {
            anyhow::bail!("mark_sent failed for {user_key}/{reminder_id}");
        }
        let mut users = lock(&self.users);
        let reminder = users
            .iter_mut()
            .filter(|u| u.key.as_deref() == Some(user_key))
            .flat_map(|u| u.reminders.iter_mut().flatten())
            .find(|r| r.id.as_deref() == Some(reminder_id) && !r.sent);
        match reminder {
            Some(reminder) => {
                reminder.sent = true;
                reminder.sent_at = Some(get_epoch_ts());
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.record(StoreCall::Close);
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
