use async_trait::async_trait;
use std::{sync::Mutex, time::Duration};

/// Suspension used between completion polls.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and keeps track of the time that would have passed
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    naps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> Duration {
        self.naps().iter().sum()
    }

    pub fn naps(&self) -> Vec<Duration> {
        self.naps.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut naps) = self.naps.lock() {
            naps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}
