// mandatory environment variables
pub const ENV_MONGODB_URI: &str = "MONGODB_URI";
pub const ENV_DATABASE_NAME: &str = "DATABASE_NAME";
pub const ENV_COLLECTION_NAME: &str = "COLLECTION_NAME";
pub const ENV_EMAIL_CONNECTION_STRING: &str = "AZURE_EMAIL_CONNECTION_STRING";

// optional environment variables
pub const ENV_MONGODB_MIN_POOL_SIZE: &str = "MONGODB_MIN_POOL_SIZE";
pub const ENV_MONGODB_MAX_POOL_SIZE: &str = "MONGODB_MAX_POOL_SIZE";
pub const ENV_MONGODB_CONN_TIMEOUT: &str = "MONGODB_CONN_TIMEOUT_SECS";
pub const ENV_EMAIL_SENDER_ADDRESS: &str = "EMAIL_SENDER_ADDRESS";
pub const ENV_POLL_INTERVAL: &str = "REMINDER_POLL_INTERVAL_SECS";
pub const ENV_SEND_TIMEOUT: &str = "REMINDER_SEND_TIMEOUT_SECS";
pub const ENV_CLAIM_LEASE: &str = "REMINDER_CLAIM_LEASE_SECS";
pub const ENV_SUBJECT_TEMPLATE: &str = "REMINDER_SUBJECT_TEMPLATE";
pub const ENV_BODY_TEMPLATE: &str = "REMINDER_BODY_TEMPLATE";
pub const ENV_JOB_INTERVAL: &str = "REMINDER_JOB_INTERVAL_SECS";
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

// the store is used by a single sequential run, a tiny pool is enough
pub const MONGO_MIN_POOL_SIZE: u32 = 1;
pub const MONGO_MAX_POOL_SIZE: u32 = 2;
pub const MONGO_CONN_TIMEOUT: u64 = 10;

pub const POLL_INTERVAL_SECS: u64 = 10;
pub const SEND_TIMEOUT_SECS: u64 = 180;
pub const CLAIM_LEASE_SECS: u64 = 15 * 60;
pub const MAX_CLAIM_LEASE_SECS: u64 = 7 * 24 * 60 * 60;

pub const DEFAULT_DISPLAY_NAME: &str = "User";
pub const DEFAULT_REMINDER_TITLE: &str = "You have a pending reminder";
pub const DEFAULT_SUBJECT_TEMPLATE: &str = "Reminder: {{title}}";
pub const DEFAULT_BODY_TEMPLATE: &str = "{{title}}";

pub const EMAIL_API_VERSION: &str = "2023-03-31";
pub const EMAIL_REQUEST_TIMEOUT_SECS: u64 = 30;
