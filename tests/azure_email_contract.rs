use std::time::Duration;

use reminder_email_job::{
    channel::{AzureEmailClient, EmailMessage, NotificationChannel, OperationStatus},
    jobs::reminder::{send_and_confirm, PollPolicy},
    models::AttemptOutcome,
    utils::{JobError, RecordingSleeper},
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCESS_KEY: &str = "c2VjcmV0";
const SENDER: &str = "DoNotReply@mail.example.com";

fn client(server: &MockServer) -> AzureEmailClient {
    let connection_string = format!("endpoint={}/;accesskey={}", server.uri(), ACCESS_KEY);
    AzureEmailClient::new(&connection_string, SENDER).unwrap()
}

fn message() -> EmailMessage {
    EmailMessage {
        recipient_address: "a@x.com".into(),
        display_name: "Ana".into(),
        subject: "Reminder: Pay bill".into(),
        body: "Pay bill".into(),
    }
}

fn policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(10),
        timeout: Duration::from_secs(180),
    }
}

async fn mount_submit(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/emails:send"))
        .and(query_param("api-version", "2023-03-31"))
        .and(header_exists("x-ms-date"))
        .and(header_exists("x-ms-content-sha256"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(json!({
            "senderAddress": SENDER,
            "recipients": {"to": [{"address": "a@x.com", "displayName": "Ana"}]},
            "content": {"subject": "Reminder: Pay bill", "plainText": "Pay bill"}
        })))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({"id": "op-1", "status": "Running"})),
        )
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_submit_and_poll_until_succeeded() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/emails/operations/op-1"))
        .and(query_param("api-version", "2023-03-31"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "op-1", "status": "Running"})),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/emails/operations/op-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "op-1", "status": "Succeeded"})),
        )
        .mount(&server)
        .await;

    let channel = client(&server);
    let sleeper = RecordingSleeper::new();
    let attempt = send_and_confirm(&channel, &sleeper, policy(), &message())
        .await
        .unwrap();

    assert_eq!(attempt.outcome, AttemptOutcome::Succeeded);
    assert_eq!(attempt.operation_id, "op-1");
    assert_eq!(attempt.polls, 3);
    assert_eq!(sleeper.total(), Duration::from_secs(20));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
    for request in requests {
        let authorization = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        assert!(
            authorization
                .starts_with("HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature="),
            "{authorization}"
        );
    }
}

#[tokio::test]
async fn test_failed_operation_reports_error() {
    let server = MockServer::start().await;
    mount_submit(&server).await;
    Mock::given(method("GET"))
        .and(path("/emails/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "op-1",
            "status": "Failed",
            "error": {"code": "EmailDroppedAllRecipientsSuppressed", "message": "recipient suppressed"}
        })))
        .mount(&server)
        .await;

    let channel = client(&server);
    let mut handle = channel.submit(&message()).await.unwrap();
    assert_eq!(handle.last_status, OperationStatus::Running);
    assert!(channel.poll(&mut handle).await.unwrap());
    let result = channel.result(&handle).await.unwrap();
    assert_eq!(result.raw_status, "Failed");
    assert_eq!(
        result.error.as_deref(),
        Some("EmailDroppedAllRecipientsSuppressed: recipient suppressed")
    );
}

#[tokio::test]
async fn test_rejected_submit_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails:send"))
        .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
        .mount(&server)
        .await;

    let channel = client(&server);
    let sleeper = RecordingSleeper::new();
    let err = send_and_confirm(&channel, &sleeper, policy(), &message())
        .await
        .unwrap_err();
    match err {
        JobError::SubmitRejected(inner) => {
            let text = format!("{inner:#}");
            assert!(text.contains("401"), "{text}");
            assert!(text.contains("denied"), "{text}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}
