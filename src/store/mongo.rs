use async_trait::async_trait;
use anyhow::Context;
use mongodb::{
    bson::{self, doc, Document},
    options::FindOptions,
};

use super::ReminderStore;
use crate::{
    config::JobConfig,
    database::AppDatabase,
    models::UserRecord,
    utils::{get_epoch_ts, id_candidates, id_to_string},
};

pub struct MongoReminderStore {
    db: AppDatabase,
    db_name: String,
    coll_name: String,
}

impl MongoReminderStore {
    pub async fn connect(config: &JobConfig) -> anyhow::Result<Self> {
        let db = AppDatabase::connect(config).await?;
        Ok(Self {
            db,
            db_name: config.database_name.clone(),
            coll_name: config.collection_name.clone(),
        })
    }

    fn reminder_filter(user_key: &str, reminder_match: Document) -> Document {
        doc! {
            "_id": {"$in": id_candidates(user_key)},
            "reminders": {"$elemMatch": reminder_match}
        }
    }
}

/// Decode the raw candidates one by one. A document of the wrong shape
/// becomes a malformed record instead of failing the whole batch.
fn decode_candidates(docs: Vec<Document>) -> Vec<UserRecord> {
    docs.into_iter()
        .map(|doc| {
            let key = doc.get("_id").and_then(id_to_string);
            bson::from_document::<UserRecord>(doc).unwrap_or_else(|e| {
                tracing::warn!(user = ?key, "cannot decode user document: {e}");
                UserRecord::malformed(key, e.to_string())
            })
        })
        .collect()
}

fn epoch_to_bson(ts: u64) -> anyhow::Result<i64> {
    i64::try_from(ts).with_context(|| format!("timestamp {ts} out of range"))
}

#[async_trait]
impl ReminderStore for MongoReminderStore {
    async fn find_pending(&self) -> anyhow::Result<Vec<UserRecord>> {
        // documents without a sent flag count as unsent
        let filter = doc! {"reminders": {"$elemMatch": {"sent": {"$ne": true}}}};
        let options = FindOptions::builder().sort(Some(doc! {"_id": 1})).build();
        let docs = self
            .db
            .find::<Document>(&self.db_name, &self.coll_name, Some(filter), Some(options))
            .await?;
        Ok(decode_candidates(docs))
    }

    async fn claim(
        &self,
        user_key: &str,
        reminder_id: &str,
        now: u64,
        until: u64,
    ) -> anyhow::Result<bool> {
        let filter = Self::reminder_filter(
            user_key,
            doc! {
                "id": {"$in": id_candidates(reminder_id)},
                "sent": {"$ne": true},
                "$or": [
                    {"claimedUntil": null},
                    {"claimedUntil": {"$lte": epoch_to_bson(now)?}}
                ]
            },
        );
        let update = doc! {"$set": {"reminders.$.claimedUntil": epoch_to_bson(until)?}};
        let result = self
            .db
            .update_one(&self.db_name, &self.coll_name, filter, update, None)
            .await?;
        Ok(result.modified_count == 1)
    }

    async fn release(&self, user_key: &str, reminder_id: &str) -> anyhow::Result<()> {
        let filter = Self::reminder_filter(
            user_key,
            doc! {
                "id": {"$in": id_candidates(reminder_id)},
                "sent": {"$ne": true}
            },
        );
        let update = doc! {"$unset": {"reminders.$.claimedUntil": ""}};
        self.db
            .update_one(&self.db_name, &self.coll_name, filter, update, None)
            .await?;
        Ok(())
    }

    async fn mark_sent(&self, user_key: &str, reminder_id: &str) -> anyhow::Result<u64> {
        let filter = Self::reminder_filter(
            user_key,
            doc! {
                "id": {"$in": id_candidates(reminder_id)},
                "sent": {"$ne": true}
            },
        );
        let ts = epoch_to_bson(get_epoch_ts())?;
        let update = doc! {
            "$set": {
                "reminders.$.sent": true,
                "reminders.$.sentAt": ts
            }
        };
        let result = self
            .db
            .update_one(&self.db_name, &self.coll_name, filter, update, None)
            .await?;
        Ok(result.modified_count)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.db.close().await;
        Ok(())
    }
}
