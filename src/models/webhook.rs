use serde::{ Serialize, Deserialize };
use serde_json::Value as JsonValue;

use super::saved::SavedItem;

pub const ANONYMOUS_USER: &str = "anonymous";

/// Body posted to the assistant webhook.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    pub query: String,
    pub timestamp: String,
    pub user_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub text: String,
    pub query: String,
}

/// Assistant answer after the loose response has been mapped for display.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub text: String,
    pub cards: Vec<SavedItem>,
    pub suggestions: Vec<Suggestion>,
    /// Raw webhook body, stored as the assistant turn's response data.
    pub raw: Option<JsonValue>,
    /// Set when the canned fallback replaced a failed webhook call.
    pub degraded: bool,
}
