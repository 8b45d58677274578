pub mod dispatch;
pub mod user;

pub use dispatch::*;
pub use user::*;
