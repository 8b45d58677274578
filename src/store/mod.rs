mod inmemory;
mod mongo;

use async_trait::async_trait;

pub use inmemory::{InMemoryReminderStore, StoreCall};
pub use mongo::MongoReminderStore;

use crate::models::UserRecord;

/// Narrow view on the collection of user documents the job works on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Users owning at least one reminder that is not sent yet
    async fn find_pending(&self) -> anyhow::Result<Vec<UserRecord>>;

    /// Take a lease on an unsent reminder until the `until` epoch second.
    /// Granted only if no other lease is active at `now`.
    async fn claim(
        &self,
        user_key: &str,
        reminder_id: &str,
        now: u64,
        until: u64,
    ) -> anyhow::Result<bool>;

    /// Drop the lease on a reminder that is still unsent, so the next run
    /// may pick it up right away.
    async fn release(&self, user_key: &str, reminder_id: &str) -> anyhow::Result<()>;

    /// Flip `sent` to true for exactly this reminder of this user if it is
    /// still unsent. Returns the number of modified documents.
    async fn mark_sent(&self, user_key: &str, reminder_id: &str) -> anyhow::Result<u64>;

    /// Release the underlying connection. Safe to call more than once.
    async fn close(&self) -> anyhow::Result<()>;
}
