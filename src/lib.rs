use std::process::ExitCode;

use config::JobConfig;
use constants::ENV_LOG_FORMAT;
use dotenvy::dotenv;
use jobs::{reminder_job, run_reminder_job};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod channel;
pub mod config;
pub mod constants;
pub mod database;
pub mod jobs;
pub mod models;
pub mod store;
pub mod utils;

/// Entry point of the binary. Runs the job once, or forever on the
/// configured interval.
pub async fn start_reminder_job() -> ExitCode {
    // import .env file
    dotenv().ok();
    initialize_logging();
    let config = match JobConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!("loaded {config:?}");

    if let Some(every) = config.job_interval {
        reminder_job(config, every).await;
        return ExitCode::SUCCESS;
    }
    match run_reminder_job(&config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn initialize_logging() {
    // create default env filter
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or("reminder_email_job=debug".into());
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // initialize tracing subscriber for logging
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}
