pub(crate) mod clock;
pub(crate) mod error_handler;
pub(crate) mod misc;

pub use clock::{RecordingSleeper, Sleeper, TokioSleeper};
pub use error_handler::{ConfigError, JobError};
pub use misc::*;
