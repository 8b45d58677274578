use serde::Deserialize;

use crate::{constants::*, utils::deserialize_id};

/// A user document together with the reminders it owns
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "_id")]
    #[serde(deserialize_with = "deserialize_id")]
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub reminders: Option<Vec<Reminder>>,

    /// Set when the stored document could not be read as a user
    #[serde(skip)]
    pub decode_error: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    #[serde(deserialize_with = "deserialize_id")]
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub sent: bool,

    #[serde(default)]
    pub sent_at: Option<u64>,

    #[serde(default)]
    pub claimed_until: Option<u64>,
}

impl UserRecord {
    pub fn new(key: &str, email: &str, name: Option<&str>, reminders: Vec<Reminder>) -> Self {
        Self {
            key: Some(key.to_owned()),
            email: Some(email.to_owned()),
            name: name.map(str::to_owned),
            reminders: Some(reminders),
            decode_error: None,
        }
    }

    /// Placeholder for a document that failed to decode, kept so the
    /// dispatcher can report and skip it
    pub fn malformed(key: Option<String>, reason: String) -> Self {
        Self {
            key,
            decode_error: Some(reason),
            ..Default::default()
        }
    }

    /// Email address if present and not blank
    pub fn contact_address(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
    }

    pub fn reminders(&self) -> &[Reminder] {
        self.reminders.as_deref().unwrap_or_default()
    }

    pub fn has_pending_reminders(&self) -> bool {
        self.reminders().iter().any(|r| !r.sent)
    }
}

impl Reminder {
    pub fn new(id: &str, title: Option<&str>) -> Self {
        Self {
            id: Some(id.to_owned()),
            title: title.map(str::to_owned),
            ..Default::default()
        }
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_REMINDER_TITLE)
    }
}
