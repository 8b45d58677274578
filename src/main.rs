use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    reminder_email_job::start_reminder_job().await
}
