pub mod reminder;

pub use reminder::{reminder_job, run_reminder_job};
