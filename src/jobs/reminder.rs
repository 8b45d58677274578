pub mod dispatcher;
pub mod reminder_job;
pub mod send_confirm;

pub use dispatcher::{DispatchSettings, ReminderDispatcher};
pub use reminder_job::{reminder_job, run_reminder_job, run_with};
pub use send_confirm::{send_and_confirm, PollBudget, PollPolicy};
