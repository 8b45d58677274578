use futures::stream::StreamExt;
use mongodb::bson::{doc, Document};
use mongodb::error::Result as MongoResult;
use mongodb::options::{FindOptions, UpdateOptions};
use mongodb::results::UpdateResult;
use mongodb::{options::ClientOptions, Client};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::JobConfig;

pub struct AppDatabase {
    client: Client,
    closed: AtomicBool,
}

impl AppDatabase {
    /// Create the client and make sure the server is reachable.
    /// The driver connects lazily, the ping turns an unreachable server into
    /// an error here instead of on the first query.
    pub async fn connect(config: &JobConfig) -> MongoResult<Self> {
        let mut client_options = ClientOptions::parse(&config.mongodb_uri).await?;
        client_options.app_name = Some(env!("CARGO_PKG_NAME").to_owned());
        client_options.min_pool_size = Some(config.mongo_min_pool_size);
        client_options.max_pool_size = Some(config.mongo_max_pool_size);
        client_options.connect_timeout = Some(config.mongo_conn_timeout);
        client_options.server_selection_timeout = Some(config.mongo_conn_timeout);
        let client = Client::with_options(client_options)?;
        client
            .database(&config.database_name)
            .run_command(doc! {"ping": 1}, None)
            .await?;
        Ok(Self {
            client,
            closed: AtomicBool::new(false),
        })
    }

    pub async fn find<T>(
        &self,
        db: &str,
        coll: &str,
        filter: Option<Document>,
        options: Option<FindOptions>,
    ) -> MongoResult<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync + 'static,
    {
        let coll = self.client.database(db).collection::<T>(coll);
        let mut cursor = coll.find(filter, options).await?;
        let mut data = vec![];
        while let Some(doc) = cursor.next().await {
            data.push(doc?);
        }
        Ok(data)
    }

    pub async fn update_one(
        &self,
        db: &str,
        coll: &str,
        filter: Document,
        update: Document,
        options: Option<UpdateOptions>,
    ) -> MongoResult<UpdateResult> {
        let coll = self.client.database(db).collection::<Document>(coll);
        coll.update_one(filter, update, options).await
    }

    /// Shut the client down. Only the first call does any work.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("database client already closed");
            return;
        }
        self.client.clone().shutdown().await;
    }
}
