use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use super::dispatcher::{DispatchSettings, ReminderDispatcher};
use crate::{
    channel::{AzureEmailClient, NotificationChannel},
    config::JobConfig,
    models::RunSummary,
    store::{MongoReminderStore, ReminderStore},
    utils::{JobError, Sleeper, TokioSleeper},
};

/// Run the reminder job on a fixed cadence. Each run is awaited before the
/// next tick so two runs of this loop never overlap.
pub async fn reminder_job(config: JobConfig, every: Duration) {
    tracing::debug!("initializing reminder scheduler job, every {}s", every.as_secs());
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        if let Err(err) = run_reminder_job(&config).await {
            tracing::error!("Error in reminder_job => {err}");
        }
    }
}

/// One invocation against the real services: validate the configuration,
/// connect, dispatch and release the connection.
pub async fn run_reminder_job(config: &JobConfig) -> Result<RunSummary, JobError> {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("reminder_run", %run_id);
    async {
        config.validate()?;
        let channel = AzureEmailClient::from_config(config)?;
        let store = MongoReminderStore::connect(config)
            .await
            .map_err(JobError::Connection)?;
        dispatch_and_close(
            Arc::new(store),
            Arc::new(channel),
            Arc::new(TokioSleeper),
            config,
        )
        .await
    }
    .instrument(span)
    .await
}

/// Same as [`run_reminder_job`] with the collaborators supplied by the caller.
/// Nothing is touched when the configuration is invalid, otherwise the store
/// is closed exactly once whatever the outcome.
pub async fn run_with(
    store: Arc<dyn ReminderStore>,
    channel: Arc<dyn NotificationChannel>,
    sleeper: Arc<dyn Sleeper>,
    config: &JobConfig,
) -> Result<RunSummary, JobError> {
    config.validate()?;
    dispatch_and_close(store, channel, sleeper, config).await
}

async fn dispatch_and_close(
    store: Arc<dyn ReminderStore>,
    channel: Arc<dyn NotificationChannel>,
    sleeper: Arc<dyn Sleeper>,
    config: &JobConfig,
) -> Result<RunSummary, JobError> {
    tracing::info!("reminder run started");
    let dispatcher = ReminderDispatcher::new(
        store.clone(),
        channel,
        sleeper,
        DispatchSettings::from_config(config),
    );
    let result = dispatcher.dispatch_pending().await;
    // a failing close is only logged, it must not hide the run result
    if let Err(err) = store.close().await {
        tracing::error!("failed to close the store connection: {err:?}");
    }
    match &result {
        Ok(summary) => tracing::info!("reminder run finished: {summary}"),
        Err(err) => tracing::error!(kind = err.kind(), "reminder run aborted: {err}"),
    }
    result
}
