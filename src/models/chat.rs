use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use serde_json::Value as JsonValue;

/// One turn of the conversation, user or assistant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<JsonValue>,
}

/// A turn that has not been persisted yet; the backend assigns id and timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct NewChatMessage {
    pub text: String,
    pub is_user: bool,
    pub response_data: Option<JsonValue>,
}

impl NewChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_user: true, response_data: None }
    }
}
