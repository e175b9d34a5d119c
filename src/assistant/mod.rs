pub mod cards;
pub mod webhook;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::webhook::AssistantReply;

pub use self::webhook::WebhookAssistant;

pub const FALLBACK_REPLY: &str =
    "I'm having trouble connecting right now. Please check your connection and try again in a moment.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("assistant returned status {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },

    #[error("assistant response is not JSON: {0}")]
    Malformed(String),
}

/// Remote recommendation assistant.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn ask(&self, query: &str, user_id: Option<&str>) -> Result<AssistantReply, AssistantError>;
}

/// Reply shown in place of the assistant's answer when the call failed.
pub fn fallback_reply() -> AssistantReply {
    AssistantReply {
        text: FALLBACK_REPLY.to_string(),
        cards: Vec::new(),
        suggestions: Vec::new(),
        raw: None,
        degraded: true,
    }
}
