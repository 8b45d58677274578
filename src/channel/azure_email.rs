use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use chrono::Utc;
use jsonwebtoken::{crypto, Algorithm, EncodingKey};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Method, Url,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{str::FromStr, time::Duration};

use super::{EmailMessage, NotificationChannel, OperationStatus, SendHandle};
use crate::{
    config::JobConfig,
    constants::*,
    utils::{ConfigError, JobError},
};

/// Parsed `endpoint=...;accesskey=...` connection string of the email service
#[derive(Clone, PartialEq, Eq)]
pub struct EmailConnectionString {
    pub endpoint: String,
    access_key: Vec<u8>,
}

impl FromStr for EmailConnectionString {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::Invalid {
            var: ENV_EMAIL_CONNECTION_STRING,
            reason: reason.to_owned(),
        };
        let mut endpoint = None;
        let mut access_key = None;
        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, val)) = part.split_once('=') else {
                return Err(invalid("expected key=value pairs"));
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(val.trim().trim_end_matches('/').to_owned()),
                // the key is base64 and may itself end with '=' padding
                "accesskey" => access_key = Some(val.trim().to_owned()),
                _ => {}
            }
        }
        let endpoint = endpoint
            .filter(|e| !e.is_empty())
            .ok_or_else(|| invalid("endpoint is missing"))?;
        Url::parse(&endpoint).map_err(|e| invalid(&format!("endpoint is not a valid url: {e}")))?;
        let access_key = access_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| invalid("accesskey is missing"))?;
        let access_key = STANDARD
            .decode(access_key)
            .map_err(|_| invalid("accesskey is not valid base64"))?;
        Ok(Self {
            endpoint,
            access_key,
        })
    }
}

impl std::fmt::Debug for EmailConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConnectionString")
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress<'a> {
    address: &'a str,
    display_name: &'a str,
}

#[derive(Debug, Serialize)]
struct EmailRecipients<'a> {
    to: Vec<EmailAddress<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailContent<'a> {
    subject: &'a str,
    plain_text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailPayload<'a> {
    sender_address: &'a str,
    recipients: EmailRecipients<'a>,
    content: EmailContent<'a>,
}

impl<'a> SendEmailPayload<'a> {
    fn new(sender: &'a str, message: &'a EmailMessage) -> Self {
        Self {
            sender_address: sender,
            recipients: EmailRecipients {
                to: vec![EmailAddress {
                    address: &message.recipient_address,
                    display_name: &message.display_name,
                }],
            },
            content: EmailContent {
                subject: &message.subject,
                plain_text: &message.body,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct OperationError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    id: String,
    status: OperationStatus,
    error: Option<OperationError>,
}

impl OperationResponse {
    fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        match (&error.code, &error.message) {
            (Some(code), Some(msg)) => Some(format!("{code}: {msg}")),
            (None, Some(msg)) => Some(msg.to_owned()),
            (Some(code), None) => Some(code.to_owned()),
            (None, None) => None,
        }
    }
}

/// Client for the Azure Communication Services email REST API
pub struct AzureEmailClient {
    connection: EmailConnectionString,
    sender_address: String,
    http: reqwest::Client,
}

impl AzureEmailClient {
    pub fn new(connection_string: &str, sender_address: &str) -> Result<Self, JobError> {
        let connection = connection_string.parse::<EmailConnectionString>()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(EMAIL_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| JobError::Connection(e.into()))?;
        Ok(Self {
            connection,
            sender_address: sender_address.to_owned(),
            http,
        })
    }

    /// The sender address is only needed by this channel, so it is checked
    /// here instead of with the mandatory job settings
    pub fn from_config(config: &JobConfig) -> Result<Self, JobError> {
        let sender = config
            .email_sender_address
            .as_deref()
            .ok_or(ConfigError::Missing(vec![ENV_EMAIL_SENDER_ADDRESS]))?;
        Self::new(&config.email_connection_string, sender)
    }

    fn url(&self, path: &str) -> anyhow::Result<Url> {
        let url = format!(
            "{}/{}?api-version={}",
            self.connection.endpoint, path, EMAIL_API_VERSION
        );
        Ok(Url::parse(&url)?)
    }

    fn signed_headers(&self, method: &Method, url: &Url, body: &[u8]) -> anyhow::Result<HeaderMap> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let content_hash = STANDARD.encode(Sha256::digest(body));
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            (None, _) => anyhow::bail!("url without host: {url}"),
        };
        let path_and_query = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_owned(),
        };
        let to_sign = string_to_sign(method.as_str(), &path_and_query, &date, &host, &content_hash);
        let signature = sign(&self.connection.access_key, &to_sign)?;
        let authorization = format!(
            "HMAC-SHA256 SignedHeaders=x-ms-date;host;x-ms-content-sha256&Signature={signature}"
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-ms-date", HeaderValue::from_str(&date)?);
        headers.insert("x-ms-content-sha256", HeaderValue::from_str(&content_hash)?);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&authorization)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn send_signed(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
    ) -> anyhow::Result<OperationResponse> {
        let headers = self.signed_headers(&method, &url, &body)?;
        let res = self
            .http
            .request(method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("email service returned {status}: {text}");
        }
        Ok(res.json::<OperationResponse>().await?)
    }
}

#[async_trait]
impl NotificationChannel for AzureEmailClient {
    async fn submit(&self, message: &EmailMessage) -> anyhow::Result<SendHandle> {
        let payload = SendEmailPayload::new(&self.sender_address, message);
        let body = serde_json::to_vec(&payload)?;
        let url = self.url("emails:send")?;
        let response = self.send_signed(Method::POST, url, body).await?;
        tracing::debug!(operation_id = %response.id, status = response.status.as_str(), "email submitted");
        let mut handle = SendHandle::new(&response.id, response.status.clone());
        handle.error = response.error_message();
        Ok(handle)
    }

    async fn poll(&self, handle: &mut SendHandle) -> anyhow::Result<bool> {
        let url = self.url(&format!("emails/operations/{}", handle.operation_id))?;
        let response = self.send_signed(Method::GET, url, vec![]).await?;
        handle.error = response.error_message();
        handle.last_status = response.status;
        Ok(handle.is_done())
    }
}

fn string_to_sign(method: &str, path_and_query: &str, date: &str, host: &str, hash: &str) -> String {
    format!("{method}\n{path_and_query}\n{date};{host};{hash}")
}

/// Base64 HMAC-SHA256 of the message
fn sign(key: &[u8], message: &str) -> anyhow::Result<String> {
    let signature = crypto::sign(
        message.as_bytes(),
        &EncodingKey::from_secret(key),
        Algorithm::HS256,
    )?;
    let raw = URL_SAFE_NO_PAD.decode(signature)?;
    Ok(STANDARD.encode(raw))
}
