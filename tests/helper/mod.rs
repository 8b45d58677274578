pub mod helper;

pub use helper::reminder;
pub use helper::reminder_without_id;
pub use helper::sent_reminder;
pub use helper::test_config;
pub use helper::Harness;
